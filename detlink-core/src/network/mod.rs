//! Channel manager interface.
//!
//! The channel is a byte pipe owned by an external manager. detlink
//! only needs three things from it: connect, disconnect, and a
//! non-blocking-ish read that fills a caller buffer and reports a
//! signed length, negative meaning "see `error`".

pub mod udp;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConnError, TransportError};

pub use udp::{UdpChannel, UdpChannelConfig};

/// Identifier used when none is configured.
pub const DEFAULT_CHANNEL_ID: u16 = 49155;

// ── ChannelId ────────────────────────────────────────────────────

/// Which end of the link the channel talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Companion computer on the vehicle.
    #[default]
    Onboard,
    /// Compute module mounted as a payload.
    Payload,
}

/// Delivery guarantee requested from the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionControl {
    /// Ordered, retransmitted delivery.
    Stable,
    /// Best-effort datagrams.
    #[default]
    Unreliable,
}

/// The triple a manager uses to address a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelId {
    pub id: u16,
    pub device_type: DeviceType,
    pub transport: TransmissionControl,
}

impl Default for ChannelId {
    fn default() -> Self {
        Self {
            id: DEFAULT_CHANNEL_ID,
            device_type: DeviceType::default(),
            transport: TransmissionControl::default(),
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}/{:?}", self.id, self.device_type, self.transport)
    }
}

// ── ReadResult ───────────────────────────────────────────────────

/// Error codes a read may report alongside a negative length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Nothing arrived before the read deadline.
    Timeout,
    /// The channel is not connected.
    NotConnected,
    /// Any other transport failure, with the manager's raw code.
    Transport(i32),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::NotConnected => write!(f, "not connected"),
            Self::Transport(code) => write!(f, "transport failure ({code})"),
        }
    }
}

/// Outcome of one [`ChannelManager::read`].
///
/// `length >= 0` is the number of bytes written to the buffer. A
/// negative length is a sentinel and `error` says why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResult {
    pub length: i32,
    pub error: Option<ErrorCode>,
}

impl ReadResult {
    pub fn ok(length: usize) -> Self {
        Self {
            length: i32::try_from(length).unwrap_or(i32::MAX),
            error: None,
        }
    }

    pub fn failed(error: ErrorCode) -> Self {
        Self {
            length: -1,
            error: Some(error),
        }
    }

    pub fn timeout() -> Self {
        Self::failed(ErrorCode::Timeout)
    }

    /// Split into a byte count or a classified transport error.
    ///
    /// A negative length without an error code counts as a generic
    /// transport failure.
    pub fn into_result(self) -> Result<usize, TransportError> {
        if self.length < 0 {
            let code = self.error.unwrap_or(ErrorCode::Transport(self.length));
            return Err(TransportError::from(code));
        }
        Ok(self.length as usize)
    }
}

// ── ChannelManager ───────────────────────────────────────────────

/// The external collaborator that owns the transport.
#[async_trait]
pub trait ChannelManager: Send + Sync {
    async fn connect(&self, channel: &ChannelId) -> Result<(), ConnError>;

    async fn disconnect(&self, channel: &ChannelId) -> Result<(), ConnError>;

    /// Read at most `buf.len()` bytes.
    async fn read(&self, buf: &mut [u8]) -> ReadResult;
}
