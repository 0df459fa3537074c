//! Detection poller.
//!
//! A single Tokio task reads the channel on a fixed period, decodes
//! each message, rescales it onto the current surface, and publishes
//! the resulting [`DetectionBatch`] on a `watch` channel for the
//! renderer (see [`crate::overlay`]).
//!
//! Failure handling per tick:
//!
//! | Read / decode outcome      | Action                                   |
//! |----------------------------|------------------------------------------|
//! | timeout                    | nothing emitted, keep polling            |
//! | other transport error      | [`PollSignal::Fatal`], disconnect, stop  |
//! | zero-length read           | empty batch (clears the overlay)         |
//! | decode error               | [`PollSignal::Decode`], keep polling     |
//! | decoded message            | rescaled batch                           |

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::codec;
use crate::error::{DecodeError, PollError, TransportError};
use crate::labels::LabelTable;
use crate::message::{DetectionBatch, SurfaceExtent};
use crate::rescale::rescale_all;
use crate::state::{ChannelLifecycle, ChannelState};

/// Default tick period.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(10);

/// Default read buffer size in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

const SIGNAL_CAPACITY: usize = 16;

// ── PollerConfig ─────────────────────────────────────────────────

/// Configuration for [`DetectionPoller`].
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between ticks.
    pub period: Duration,
    /// Bytes requested per read. Larger messages are truncated by the
    /// channel and will fail to decode.
    pub buffer_capacity: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

// ── Signals / stats ──────────────────────────────────────────────

/// Whether the poll loop is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Running,
}

/// Out-of-band notifications for whoever surfaces problems to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollSignal {
    /// A message was dropped; polling continues.
    Decode(DecodeError),
    /// The channel failed; the poller disconnected it and stopped.
    Fatal(TransportError),
}

/// Counters for the current poller, published on every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub ticks: u64,
    pub batches: u64,
    pub timeouts: u64,
    pub decode_errors: u64,
}

// ── DetectionPoller ──────────────────────────────────────────────

struct PollSession {
    token: CancellationToken,
    _handle: JoinHandle<()>,
}

/// Fixed-period reader that turns channel bytes into placed boxes.
///
/// `start()` and `stop()` are idempotent. Once `stop()` returns no new
/// tick begins and nothing further is delivered; a tick already
/// awaiting its read is abandoned at its next check rather than
/// waited for.
pub struct DetectionPoller {
    lifecycle: Arc<ChannelLifecycle>,
    labels: LabelTable,
    surface: watch::Receiver<SurfaceExtent>,
    config: PollerConfig,
    batch_tx: Arc<watch::Sender<DetectionBatch>>,
    stats_tx: Arc<watch::Sender<PollStats>>,
    signal_tx: broadcast::Sender<PollSignal>,
    session: Mutex<Option<PollSession>>,
}

impl DetectionPoller {
    pub fn new(
        lifecycle: Arc<ChannelLifecycle>,
        labels: LabelTable,
        surface: watch::Receiver<SurfaceExtent>,
    ) -> Self {
        Self::with_config(lifecycle, labels, surface, PollerConfig::default())
    }

    pub fn with_config(
        lifecycle: Arc<ChannelLifecycle>,
        labels: LabelTable,
        surface: watch::Receiver<SurfaceExtent>,
        config: PollerConfig,
    ) -> Self {
        let (batch_tx, _) = watch::channel(DetectionBatch::new());
        let (stats_tx, _) = watch::channel(PollStats::default());
        let (signal_tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            lifecycle,
            labels,
            surface,
            config,
            batch_tx: Arc::new(batch_tx),
            stats_tx: Arc::new(stats_tx),
            signal_tx,
            session: Mutex::new(None),
        }
    }

    /// Latest delivered batch. Intermediate batches may be coalesced.
    pub fn batch_receiver(&self) -> watch::Receiver<DetectionBatch> {
        self.batch_tx.subscribe()
    }

    pub fn stats_receiver(&self) -> watch::Receiver<PollStats> {
        self.stats_tx.subscribe()
    }

    /// Decode diagnostics and fatal transport failures.
    pub fn signals(&self) -> broadcast::Receiver<PollSignal> {
        self.signal_tx.subscribe()
    }

    pub fn lifecycle(&self) -> &Arc<ChannelLifecycle> {
        &self.lifecycle
    }

    pub fn state(&self) -> PollerState {
        match self.lock_session().as_ref() {
            Some(session) if !session.token.is_cancelled() => PollerState::Running,
            _ => PollerState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == PollerState::Running
    }

    /// Begin ticking.
    ///
    /// A no-op while running. Must be called from within a Tokio
    /// runtime, and only once the channel is connected.
    pub fn start(&self) -> Result<(), PollError> {
        let mut session = self.lock_session();
        if matches!(session.as_ref(), Some(s) if !s.token.is_cancelled()) {
            debug!("poller already running");
            return Ok(());
        }
        if !self.lifecycle.state().is_connected() {
            return Err(PollError::NotConnected);
        }

        // Subscribed before spawning so a disconnect landing before the
        // task first runs is still observed.
        let channel_state = self.lifecycle.subscribe();
        let token = CancellationToken::new();
        let worker = PollWorker {
            lifecycle: Arc::clone(&self.lifecycle),
            channel_state,
            labels: self.labels.clone(),
            surface: self.surface.clone(),
            period: self.config.period,
            buf: vec![0u8; self.config.buffer_capacity],
            batch_tx: Arc::clone(&self.batch_tx),
            stats_tx: Arc::clone(&self.stats_tx),
            signal_tx: self.signal_tx.clone(),
            token: token.clone(),
        };
        let handle = tokio::spawn(worker.run());
        *session = Some(PollSession {
            token,
            _handle: handle,
        });

        info!(
            "poller started on channel {} every {:?}",
            self.lifecycle.channel(),
            self.config.period
        );
        Ok(())
    }

    /// Stop ticking. A no-op while idle.
    pub fn stop(&self) {
        if let Some(session) = self.lock_session().take() {
            if !session.token.is_cancelled() {
                session.token.cancel();
                info!("poller stopped");
            }
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<PollSession>> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for DetectionPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── PollWorker ───────────────────────────────────────────────────

/// State owned by the running poll task.
struct PollWorker {
    lifecycle: Arc<ChannelLifecycle>,
    channel_state: watch::Receiver<ChannelState>,
    labels: LabelTable,
    surface: watch::Receiver<SurfaceExtent>,
    period: Duration,
    buf: Vec<u8>,
    batch_tx: Arc<watch::Sender<DetectionBatch>>,
    stats_tx: Arc<watch::Sender<PollStats>>,
    signal_tx: broadcast::Sender<PollSignal>,
    token: CancellationToken,
}

impl PollWorker {
    async fn run(mut self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        if !self.channel_state.borrow_and_update().is_connected() {
            debug!("channel not connected at poller start; stopping");
            self.token.cancel();
            return;
        }

        loop {
            tokio::select! {
                biased;

                _ = self.token.cancelled() => break,

                changed = self.channel_state.changed() => {
                    if changed.is_err() || !self.channel_state.borrow_and_update().is_connected() {
                        debug!("channel left Connected; poller stopping");
                        self.token.cancel();
                        break;
                    }
                }

                _ = interval.tick() => {
                    if self.token.is_cancelled() || self.tick().await.is_break() {
                        break;
                    }
                }
            }
        }

        trace!("poll loop exited");
    }

    async fn tick(&mut self) -> ControlFlow<()> {
        self.stats_tx.send_modify(|s| s.ticks += 1);

        let result = self.lifecycle.manager().read(&mut self.buf).await;
        let length = match result.into_result() {
            Ok(length) => length,
            Err(err) if err.is_fatal() => {
                self.fail(err).await;
                return ControlFlow::Break(());
            }
            Err(_) => {
                trace!("read timed out");
                self.stats_tx.send_modify(|s| s.timeouts += 1);
                return ControlFlow::Continue(());
            }
        };

        if length == 0 {
            self.deliver(DetectionBatch::new());
            return ControlFlow::Continue(());
        }

        match codec::decode(&self.buf, result.length, &self.labels) {
            Ok(message) => {
                let dest = *self.surface.borrow();
                let batch = rescale_all(&message, dest, &self.labels);
                trace!(
                    "decoded {} records from {length} bytes, {} placed",
                    message.records.len(),
                    batch.len()
                );
                self.deliver(batch);
            }
            Err(e) if e.is_precondition() => {
                warn!("channel returned an unusable read: {e}");
                self.stats_tx.send_modify(|s| s.decode_errors += 1);
                let _ = self.signal_tx.send(PollSignal::Decode(e));
            }
            Err(e) => {
                debug!("dropping message: {e}");
                self.stats_tx.send_modify(|s| s.decode_errors += 1);
                let _ = self.signal_tx.send(PollSignal::Decode(e));
            }
        }
        ControlFlow::Continue(())
    }

    fn deliver(&self, batch: DetectionBatch) {
        // stop() may have landed while the read was pending.
        if self.token.is_cancelled() {
            return;
        }
        self.stats_tx.send_modify(|s| s.batches += 1);
        self.batch_tx.send_replace(batch);
    }

    async fn fail(&self, err: TransportError) {
        error!("channel read failed: {err}; disconnecting");
        self.token.cancel();
        let _ = self.signal_tx.send(PollSignal::Fatal(err));
        if let Err(e) = self.lifecycle.disconnect().await {
            warn!("disconnect after read failure: {e}");
        }
    }
}
