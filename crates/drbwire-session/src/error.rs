use bytes::Bytes;
use drbwire_marshal::MarshalError;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] drbwire_transport::TransportError),

    /// Piece-level error (timeout, close, malformed piece).
    #[error("frame error: {0}")]
    Frame(#[from] drbwire_frame::FrameError),

    /// A call could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] MarshalError),

    /// The success flag of a reply was not `true` or `false`.
    #[error("invalid success flag in reply: {0}")]
    InvalidBoolean(String),

    /// The reply was read completely but its success piece does not decode.
    #[error("reply success flag could not be decoded: {source}")]
    UndecodableFlag {
        raw: Bytes,
        #[source]
        source: MarshalError,
    },

    /// The reply was read completely but its result piece does not decode.
    ///
    /// The stream stays in sync, and the raw payload is kept so it can be
    /// inspected or forwarded.
    #[error("reply result could not be decoded: {source}")]
    UndecodableResult {
        success: bool,
        raw: Bytes,
        #[source]
        source: MarshalError,
    },
}

/// Error returned by a request handler.
///
/// The server loop logs it, sends no reply and moves on to the next request.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<MarshalError> for HandlerError {
    fn from(err: MarshalError) -> Self {
        Self::new(err)
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
