use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use drbwire_marshal::{encode, Value};

use crate::error::{FrameError, Result};

/// Size of the big-endian length prefix in front of every piece.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum payload size (16 MiB).
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Default per-attempt bound while waiting for a length prefix.
pub const DEFAULT_LENGTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Default per-attempt bound while receiving a payload.
pub const DEFAULT_PAYLOAD_TIMEOUT: Duration = Duration::from_secs(4);

/// Piece I/O configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Largest payload accepted on read or produced on write.
    pub max_payload_size: usize,
    /// Bound on each read attempt for the length prefix. `None` blocks.
    pub length_timeout: Option<Duration>,
    /// Bound on each read attempt for the payload. `None` blocks.
    pub payload_timeout: Option<Duration>,
    /// Bound on each write attempt. `None` blocks.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            length_timeout: Some(DEFAULT_LENGTH_TIMEOUT),
            payload_timeout: Some(DEFAULT_PAYLOAD_TIMEOUT),
            write_timeout: None,
        }
    }
}

impl FrameConfig {
    /// A configuration with every timeout disabled.
    pub fn blocking() -> Self {
        Self {
            length_timeout: None,
            payload_timeout: None,
            write_timeout: None,
            ..Self::default()
        }
    }
}

/// A decoded piece together with the exact payload bytes it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPiece {
    pub value: Value,
    /// Payload as received, including the `04 08` version header.
    pub raw: Bytes,
}

/// Borrowed piece content for writing.
#[derive(Debug, Clone, Copy)]
pub enum Piece<'a> {
    /// A value, encoded with the version header on write.
    Value(&'a Value),
    /// An already encoded payload, written verbatim.
    Raw(&'a [u8]),
}

impl<'a> From<&'a Value> for Piece<'a> {
    fn from(value: &'a Value) -> Self {
        Piece::Value(value)
    }
}

/// Owned piece content, either a value or pre-encoded payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PieceBody {
    Value(Value),
    Raw(Bytes),
}

impl PieceBody {
    pub fn as_piece(&self) -> Piece<'_> {
        match self {
            PieceBody::Value(value) => Piece::Value(value),
            PieceBody::Raw(raw) => Piece::Raw(raw),
        }
    }
}

impl From<Value> for PieceBody {
    fn from(value: Value) -> Self {
        PieceBody::Value(value)
    }
}

impl From<bool> for PieceBody {
    fn from(flag: bool) -> Self {
        PieceBody::Value(Value::Bool(flag))
    }
}

/// Append one framed piece (length prefix + payload) to `dst`.
pub fn put_piece(dst: &mut BytesMut, piece: Piece<'_>, max_payload_size: usize) -> Result<()> {
    match piece {
        Piece::Value(value) => {
            let payload = encode(value)?;
            put_raw_piece(dst, &payload, max_payload_size)
        }
        Piece::Raw(payload) => put_raw_piece(dst, payload, max_payload_size),
    }
}

/// Append an already encoded payload with its length prefix.
pub fn put_raw_piece(dst: &mut BytesMut, payload: &[u8], max_payload_size: usize) -> Result<()> {
    let len = checked_length(payload.len(), max_payload_size)?;
    dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
    dst.put_u32(len);
    dst.put_slice(payload);
    Ok(())
}

/// Encode a single value as a framed piece.
pub fn encode_piece(value: &Value) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    put_piece(&mut dst, Piece::Value(value), DEFAULT_MAX_PAYLOAD)?;
    Ok(dst.freeze())
}

/// Parse a length prefix.
pub fn decode_length(prefix: [u8; LENGTH_PREFIX_SIZE]) -> usize {
    u32::from_be_bytes(prefix) as usize
}

fn checked_length(len: usize, max_payload_size: usize) -> Result<u32> {
    if len > max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: max_payload_size,
        });
    }
    u32::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        size: len,
        max: u32::MAX as usize,
    })
}
