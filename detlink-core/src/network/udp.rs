//! UDP-backed channel manager.
//!
//! Serves [`TransmissionControl::Unreliable`] channels: one datagram is
//! one message, and a read waits at most `read_timeout` before
//! reporting [`ErrorCode::Timeout`].

use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::error::ConnError;
use crate::network::{ChannelId, ChannelManager, ErrorCode, ReadResult, TransmissionControl};

// ── UdpChannelConfig ─────────────────────────────────────────────

/// Configuration for [`UdpChannel`].
#[derive(Debug, Clone)]
pub struct UdpChannelConfig {
    /// Local address to bind, e.g. `0.0.0.0:7340`.
    pub bind_addr: SocketAddr,
    /// Only accept datagrams from this sender when set.
    pub peer_addr: Option<SocketAddr>,
    /// How long a single read waits for a datagram.
    pub read_timeout: Duration,
}

impl Default for UdpChannelConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7340)),
            peer_addr: None,
            read_timeout: Duration::from_millis(5),
        }
    }
}

// ── UdpChannel ───────────────────────────────────────────────────

/// A channel manager that reads detection datagrams from a UDP socket.
pub struct UdpChannel {
    config: UdpChannelConfig,
    socket: RwLock<Option<Arc<UdpSocket>>>,
}

impl UdpChannel {
    pub fn new(config: UdpChannelConfig) -> Self {
        Self {
            config,
            socket: RwLock::new(None),
        }
    }

    /// Address the socket is bound to, once connected.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.current()?.local_addr().ok()
    }

    fn current(&self) -> Option<Arc<UdpSocket>> {
        match self.socket.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, socket: Option<Arc<UdpSocket>>) -> Option<Arc<UdpSocket>> {
        match self.socket.write() {
            Ok(mut guard) => std::mem::replace(&mut *guard, socket),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), socket),
        }
    }
}

#[async_trait]
impl ChannelManager for UdpChannel {
    async fn connect(&self, channel: &ChannelId) -> Result<(), ConnError> {
        if channel.transport == TransmissionControl::Stable {
            return Err(ConnError::Unsupported(
                "stable transmission needs a stream transport",
            ));
        }

        let socket = UdpSocket::bind(self.config.bind_addr).await?;
        if let Some(peer) = self.config.peer_addr {
            socket.connect(peer).await?;
        }
        info!(
            "channel {channel} bound on {}",
            socket.local_addr()?
        );
        self.replace(Some(Arc::new(socket)));
        Ok(())
    }

    async fn disconnect(&self, channel: &ChannelId) -> Result<(), ConnError> {
        if self.replace(None).is_some() {
            info!("channel {channel} closed");
        }
        Ok(())
    }

    async fn read(&self, buf: &mut [u8]) -> ReadResult {
        let Some(socket) = self.current() else {
            return ReadResult::failed(ErrorCode::NotConnected);
        };

        match tokio::time::timeout(self.config.read_timeout, socket.recv_from(buf)).await {
            Ok(Ok((n, from))) => {
                debug!("read {n} bytes from {from}");
                ReadResult::ok(n)
            }
            Ok(Err(e)) => {
                warn!("channel read failed: {e}");
                ReadResult::failed(ErrorCode::Transport(e.raw_os_error().unwrap_or(-1)))
            }
            Err(_) => ReadResult::timeout(),
        }
    }
}
