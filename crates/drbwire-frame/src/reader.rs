use std::io::{ErrorKind, Read};
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use drbwire_marshal::{decode, Value};
use drbwire_transport::StreamControl;
use tracing::trace;

use crate::codec::{decode_length, FrameConfig, RawPiece, LENGTH_PREFIX_SIZE};
use crate::error::{FrameError, Phase, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete pieces from a connected stream.
///
/// Each read attempt is bounded by the timeout for the phase it serves: the
/// length prefix uses [`FrameConfig::length_timeout`], the payload
/// [`FrameConfig::payload_timeout`]. The bounds apply per attempt, so a slow
/// peer that keeps delivering bytes is never cut off.
///
/// After any error other than [`FrameError::ConnectionClosed`] the stream
/// position is unknown and the connection should be dropped.
pub struct PieceReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    applied_timeout: Option<Option<Duration>>,
}

impl<T: Read + StreamControl> PieceReader<T> {
    /// Create a piece reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a piece reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            applied_timeout: None,
        }
    }

    /// Read and decode the next piece.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when the peer closed the
    /// connection before sending any byte of the piece.
    pub fn read_piece(&mut self) -> Result<Value> {
        let payload = self.read_piece_bytes()?;
        Ok(decode(&payload, true)?)
    }

    /// Read the next piece, keeping its payload bytes alongside the value.
    pub fn read_piece_with_raw(&mut self) -> Result<RawPiece> {
        let raw = self.read_piece_bytes()?;
        let value = decode(&raw, true)?;
        Ok(RawPiece { value, raw })
    }

    /// Read the next piece payload without decoding it.
    pub fn read_piece_bytes(&mut self) -> Result<Bytes> {
        self.fill(LENGTH_PREFIX_SIZE, Phase::Length)?;
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix.copy_from_slice(&self.buf[..LENGTH_PREFIX_SIZE]);
        let len = decode_length(prefix);
        if len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }
        self.buf.advance(LENGTH_PREFIX_SIZE);

        self.fill(len, Phase::Payload)?;
        trace!(len, "read piece");
        Ok(self.buf.split_to(len).freeze())
    }

    /// Buffer at least `needed` bytes, bounding each attempt by the phase timeout.
    fn fill(&mut self, needed: usize, phase: Phase) -> Result<()> {
        if self.buf.len() >= needed {
            return Ok(());
        }

        let timeout = match phase {
            Phase::Length => self.config.length_timeout,
            _ => self.config.payload_timeout,
        };
        self.apply_timeout(timeout)?;

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while self.buf.len() < needed {
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(match timeout {
                        Some(after) => FrameError::Timeout { phase, after },
                        None => FrameError::Io(err),
                    });
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(match phase {
                    Phase::Length if self.buf.is_empty() => FrameError::ConnectionClosed,
                    Phase::Length => FrameError::ClosedMidHeader {
                        received: self.buf.len(),
                    },
                    _ => FrameError::ClosedMidPayload {
                        expected: needed,
                        received: self.buf.len(),
                    },
                });
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
        Ok(())
    }

    fn apply_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        if self.applied_timeout != Some(timeout) {
            self.inner.set_read_timeout(timeout)?;
            self.applied_timeout = Some(timeout);
        }
        Ok(())
    }
}

impl<T> PieceReader<T> {
    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
