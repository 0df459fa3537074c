//! Channel + poller orchestration.
//!
//! [`DetectionSession`] keeps the ordering rules between the lifecycle
//! and the poller in one place: the poller only starts once the channel
//! is connected, and it is stopped before the channel is torn down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::info;

use crate::error::DetlinkError;
use crate::labels::LabelTable;
use crate::message::SurfaceExtent;
use crate::network::{ChannelId, ChannelManager};
use crate::poller::{DetectionPoller, PollerConfig};
use crate::state::{ChannelLifecycle, ChannelState};

/// A detection feed: one channel and the poller reading it.
pub struct DetectionSession {
    lifecycle: Arc<ChannelLifecycle>,
    poller: DetectionPoller,
    drawing: AtomicBool,
}

impl DetectionSession {
    pub fn new(
        manager: Arc<dyn ChannelManager>,
        channel: ChannelId,
        labels: LabelTable,
        surface: watch::Receiver<SurfaceExtent>,
        config: PollerConfig,
    ) -> Self {
        let lifecycle = Arc::new(ChannelLifecycle::new(manager, channel));
        let poller = DetectionPoller::with_config(Arc::clone(&lifecycle), labels, surface, config);
        Self {
            lifecycle,
            poller,
            drawing: AtomicBool::new(true),
        }
    }

    pub fn poller(&self) -> &DetectionPoller {
        &self.poller
    }

    pub fn channel_state(&self) -> ChannelState {
        self.lifecycle.state()
    }

    /// Connect the channel and, if drawing is enabled, start polling.
    ///
    /// Safe to call again after a fatal read error to reconnect.
    pub async fn open(&self) -> Result<(), DetlinkError> {
        self.lifecycle.connect().await?;
        if self.drawing.load(Ordering::SeqCst) {
            self.poller.start()?;
        }
        Ok(())
    }

    /// Stop polling, then disconnect the channel.
    pub async fn close(&self) -> Result<(), DetlinkError> {
        self.poller.stop();
        self.lifecycle.disconnect().await?;
        Ok(())
    }

    /// Pause or resume drawing without touching the channel.
    ///
    /// Takes effect immediately while connected; otherwise on the next
    /// [`open`](Self::open).
    pub fn set_drawing(&self, enabled: bool) -> Result<(), DetlinkError> {
        self.drawing.store(enabled, Ordering::SeqCst);
        if !self.lifecycle.state().is_connected() {
            return Ok(());
        }
        if enabled {
            self.poller.start()?;
        } else {
            self.poller.stop();
        }
        info!("drawing {}", if enabled { "enabled" } else { "paused" });
        Ok(())
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing.load(Ordering::SeqCst)
    }
}
