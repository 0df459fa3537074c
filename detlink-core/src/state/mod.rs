pub mod channel;

pub use channel::{ChannelLifecycle, ChannelState};
