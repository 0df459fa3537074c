//! Channel lifecycle state machine.
//!
//! ```text
//!  Disconnected ──connect()──► Connecting ──(ack)──► Connected
//!       ▲                          │                     │
//!       └────── (manager error) ───┘◄───disconnect()─────┘
//! ```
//!
//! The lifecycle is the only writer of [`ChannelState`]. Everyone else,
//! the poller in particular, observes it through a `watch` receiver.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::error::ConnError;
use crate::network::{ChannelId, ChannelManager};

// ── ChannelState ─────────────────────────────────────────────────

/// The current phase of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No channel. Initial and terminal state.
    #[default]
    Disconnected,

    /// `connect()` issued, waiting for the manager to acknowledge.
    Connecting,

    /// The manager acknowledged; reads are allowed.
    Connected,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

impl ChannelState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

// ── ChannelLifecycle ─────────────────────────────────────────────

/// Drives a [`ChannelManager`] through the channel lifecycle.
///
/// `connect()` and `disconnect()` are idempotent and serialized: a
/// disconnect issued while a connect is in flight waits for it.
pub struct ChannelLifecycle {
    manager: Arc<dyn ChannelManager>,
    channel: ChannelId,
    state_tx: watch::Sender<ChannelState>,
    transition: Mutex<()>,
}

impl ChannelLifecycle {
    pub fn new(manager: Arc<dyn ChannelManager>, channel: ChannelId) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        Self {
            manager,
            channel,
            state_tx,
            transition: Mutex::new(()),
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn manager(&self) -> &Arc<dyn ChannelManager> {
        &self.manager
    }

    pub fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    /// Open the channel.
    ///
    /// Returns immediately when already `Connecting` or `Connected`. On
    /// a manager error the state falls back to `Disconnected`.
    pub async fn connect(&self) -> Result<(), ConnError> {
        let _guard = self.transition.lock().await;
        let state = self.state();
        if !state.is_disconnected() {
            debug!("connect on {}: already {state}", self.channel);
            return Ok(());
        }

        self.state_tx.send_replace(ChannelState::Connecting);
        match self.manager.connect(&self.channel).await {
            Ok(()) => {
                self.state_tx.send_replace(ChannelState::Connected);
                info!("connected to channel {}", self.channel);
                Ok(())
            }
            Err(e) => {
                self.state_tx.send_replace(ChannelState::Disconnected);
                warn!("connect to channel {} failed: {e}", self.channel);
                Err(e)
            }
        }
    }

    /// Close the channel.
    ///
    /// A no-op when already `Disconnected`. The state is published as
    /// `Disconnected` before the manager is asked to tear down, so
    /// observers stop reading first; a manager error is returned but
    /// does not keep the channel open.
    pub async fn disconnect(&self) -> Result<(), ConnError> {
        let _guard = self.transition.lock().await;
        if self.state().is_disconnected() {
            debug!("disconnect on {}: already Disconnected", self.channel);
            return Ok(());
        }

        self.state_tx.send_replace(ChannelState::Disconnected);
        match self.manager.disconnect(&self.channel).await {
            Ok(()) => {
                info!("disconnected from channel {}", self.channel);
                Ok(())
            }
            Err(e) => {
                warn!("disconnect from channel {} failed: {e}", self.channel);
                Err(e)
            }
        }
    }
}

impl fmt::Debug for ChannelLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelLifecycle")
            .field("channel", &self.channel)
            .field("state", &self.state())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::network::ReadResult;

    #[derive(Default)]
    struct CountingManager {
        connects: AtomicUsize,
        disconnects: AtomicUsize,
        refuse: AtomicBool,
    }

    #[async_trait]
    impl ChannelManager for CountingManager {
        async fn connect(&self, _channel: &ChannelId) -> Result<(), ConnError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Err(ConnError::Rejected("busy".into()));
            }
            Ok(())
        }

        async fn disconnect(&self, _channel: &ChannelId) -> Result<(), ConnError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn read(&self, _buf: &mut [u8]) -> ReadResult {
            ReadResult::timeout()
        }
    }

    fn lifecycle() -> (Arc<CountingManager>, ChannelLifecycle) {
        let manager = Arc::new(CountingManager::default());
        let lifecycle = ChannelLifecycle::new(manager.clone(), ChannelId::default());
        (manager, lifecycle)
    }

    #[tokio::test]
    async fn happy_path_lifecycle() {
        let (manager, lifecycle) = lifecycle();
        assert!(lifecycle.state().is_disconnected());

        lifecycle.connect().await.unwrap();
        assert!(lifecycle.state().is_connected());

        lifecycle.disconnect().await.unwrap();
        assert!(lifecycle.state().is_disconnected());
        assert_eq!(manager.connects.load(Ordering::SeqCst), 1);
        assert_eq!(manager.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let (manager, lifecycle) = lifecycle();
        lifecycle.connect().await.unwrap();
        lifecycle.connect().await.unwrap();
        assert_eq!(manager.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_when_disconnected_is_a_no_op() {
        let (manager, lifecycle) = lifecycle();
        lifecycle.disconnect().await.unwrap();
        lifecycle.disconnect().await.unwrap();
        assert_eq!(manager.disconnects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_connect_returns_to_disconnected() {
        let (manager, lifecycle) = lifecycle();
        manager.refuse.store(true, Ordering::SeqCst);
        let mut rx = lifecycle.subscribe();

        assert!(lifecycle.connect().await.is_err());
        assert!(lifecycle.state().is_disconnected());
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ChannelState::Disconnected);

        manager.refuse.store(false, Ordering::SeqCst);
        lifecycle.connect().await.unwrap();
        assert!(lifecycle.state().is_connected());
    }

    #[tokio::test]
    async fn observers_see_transitions() {
        let (_manager, lifecycle) = lifecycle();
        let mut rx = lifecycle.subscribe();
        lifecycle.connect().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ChannelState::Connected);
        lifecycle.disconnect().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ChannelState::Disconnected);
    }

    #[test]
    fn display_format() {
        assert_eq!(ChannelState::Disconnected.to_string(), "Disconnected");
        assert_eq!(ChannelState::Connecting.to_string(), "Connecting");
        assert_eq!(ChannelState::Connected.to_string(), "Connected");
    }

    #[test]
    fn default_state_is_disconnected() {
        assert!(ChannelState::default().is_disconnected());
    }
}
