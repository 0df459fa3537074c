//! Domain-specific error types for detlink.
//!
//! Every layer has its own typed error so the poller can classify
//! failures without string matching. `DetlinkError` is the umbrella
//! type for callers that do not care which layer failed.

use thiserror::Error;

use crate::network::ErrorCode;

/// The canonical error type for the detlink crates.
#[derive(Debug, Error)]
pub enum DetlinkError {
    /// A detection message could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The channel reported a read failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Connecting or disconnecting the channel failed.
    #[error("connection error: {0}")]
    Connection(#[from] ConnError),

    /// The poller refused an operation.
    #[error("poller error: {0}")]
    Poll(#[from] PollError),

    /// The TCP/UDP/IO layer reported an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ── DecodeError ──────────────────────────────────────────────────

/// Failure to turn raw channel bytes into a detection message.
///
/// `Empty` and `LengthOutOfBounds` are caller bugs (the poller never
/// decodes a non-positive length); the rest describe a bad payload and
/// only cost the current frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Decode was called with a non-positive length.
    #[error("empty payload")]
    Empty,

    /// The declared length exceeds the buffer it refers to.
    #[error("length {length} exceeds buffer capacity {capacity}")]
    LengthOutOfBounds { length: usize, capacity: usize },

    /// The payload does not follow the message grammar.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A record referenced a class outside the label table.
    #[error("unknown class index: {0}")]
    UnknownClass(u32),
}

impl DecodeError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        DecodeError::Malformed(msg.into())
    }

    /// Returns `true` for errors caused by the caller rather than the
    /// payload.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Empty | Self::LengthOutOfBounds { .. })
    }
}

// ── TransportError ───────────────────────────────────────────────

/// A read that returned the negative-length sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Nothing arrived within the channel's read deadline.
    #[error("read timed out")]
    Timeout,

    /// Any other read failure. Fatal to the current session.
    #[error("read failed: {0}")]
    Failure(ErrorCode),
}

impl TransportError {
    /// Timeouts are benign; everything else ends the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Timeout)
    }
}

impl From<ErrorCode> for TransportError {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Timeout => TransportError::Timeout,
            other => TransportError::Failure(other),
        }
    }
}

// ── ConnError ────────────────────────────────────────────────────

/// Failure reported by a channel manager on connect or disconnect.
#[derive(Debug, Error)]
pub enum ConnError {
    /// The manager cannot provide the requested transmission mode.
    #[error("unsupported channel configuration: {0}")]
    Unsupported(&'static str),

    /// The underlying socket failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote end or the manager refused the request.
    #[error("rejected: {0}")]
    Rejected(String),
}

// ── PollError ────────────────────────────────────────────────────

/// Errors from the detection poller's own API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PollError {
    /// `start()` was called while the channel was not connected.
    #[error("channel is not connected")]
    NotConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = DecodeError::UnknownClass(91);
        assert!(e.to_string().contains("91"));

        let e = DecodeError::LengthOutOfBounds {
            length: 2048,
            capacity: 1024,
        };
        assert!(e.to_string().contains("2048"));
        assert!(e.to_string().contains("1024"));
    }

    #[test]
    fn precondition_classification() {
        assert!(DecodeError::Empty.is_precondition());
        assert!(!DecodeError::malformed("x").is_precondition());
        assert!(!DecodeError::UnknownClass(3).is_precondition());
    }

    #[test]
    fn timeout_is_not_fatal() {
        assert!(!TransportError::from(ErrorCode::Timeout).is_fatal());
        assert!(TransportError::from(ErrorCode::Transport(-7)).is_fatal());
        assert!(TransportError::from(ErrorCode::NotConnected).is_fatal());
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: DetlinkError = io_err.into();
        assert!(matches!(e, DetlinkError::Io(_)));
    }
}
