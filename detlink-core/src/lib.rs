//! # detlink-core
//!
//! Client side of the detection overlay link: reads inference results
//! from a byte channel and turns them into boxes on a render surface.
//!
//! This crate contains:
//! - **Codec**: text wire format for detection messages, plus
//!   `DetectionCodec` for `tokio_util` datagram framing
//! - **Rescale**: source-image to surface coordinate mapping
//! - **Network**: the `ChannelManager` interface and a UDP implementation
//! - **State**: the channel lifecycle state machine
//! - **Poller**: fixed-period read/decode/rescale loop
//! - **Overlay**: renderer trait and the hand-off task that feeds it
//! - **Session**: lifecycle + poller wiring
//! - **Error**: typed, `thiserror`-based errors per layer

pub mod codec;
pub mod error;
pub mod labels;
pub mod message;
pub mod network;
pub mod overlay;
pub mod poller;
pub mod rescale;
pub mod session;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::DetectionCodec;
pub use error::{ConnError, DecodeError, DetlinkError, PollError, TransportError};
pub use labels::{COCO_LABELS, LabelTable};
pub use message::{
    DetectionBatch, DetectionMessage, DetectionRecord, ImageExtent, PlacedBox, SurfaceExtent,
};
pub use network::{
    ChannelId, ChannelManager, DeviceType, ErrorCode, ReadResult, TransmissionControl, UdpChannel,
    UdpChannelConfig,
};
pub use overlay::{OverlayRenderer, spawn_overlay_dispatch};
pub use poller::{DetectionPoller, PollSignal, PollStats, PollerConfig, PollerState};
pub use rescale::{rescale, rescale_all};
pub use session::DetectionSession;
pub use state::{ChannelLifecycle, ChannelState};
