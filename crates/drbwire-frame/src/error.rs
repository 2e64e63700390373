use std::fmt;
use std::time::Duration;

use drbwire_marshal::MarshalError;

/// Which part of a piece an I/O attempt was working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The 4-byte length prefix.
    Length,
    /// The encoded value following the prefix.
    Payload,
    /// Writing a message.
    Write,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Length => "piece length",
            Phase::Payload => "piece payload",
            Phase::Write => "message write",
        })
    }
}

/// Errors that can occur while reading or writing pieces.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The peer closed the connection cleanly before the first byte of a piece.
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer hung up in the middle of a length prefix.
    #[error("connection closed after {received} of 4 length bytes")]
    ClosedMidHeader { received: usize },

    /// The peer hung up in the middle of a payload.
    #[error("connection closed after {received} of {expected} payload bytes")]
    ClosedMidPayload { expected: usize, received: usize },

    /// A single I/O attempt exceeded its bound.
    #[error("timed out on {phase} after {after:?}")]
    Timeout { phase: Phase, after: Duration },

    /// The declared or supplied payload exceeds the configured maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The piece payload is not a valid encoded value.
    #[error("malformed piece: {0}")]
    Marshal(#[from] MarshalError),

    /// An I/O error occurred while reading or writing pieces.
    #[error("piece I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether this is the clean end-of-stream signal rather than a fault.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, FrameError::ConnectionClosed)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FrameError::Timeout { .. })
    }
}

impl From<drbwire_transport::TransportError> for FrameError {
    fn from(err: drbwire_transport::TransportError) -> Self {
        use drbwire_transport::TransportError;
        match err {
            TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
            TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
                FrameError::Io(source)
            }
            other => FrameError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
