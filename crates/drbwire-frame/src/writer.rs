use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use drbwire_marshal::Value;
use drbwire_transport::StreamControl;
use tracing::trace;

use crate::codec::{put_piece, put_raw_piece, FrameConfig, Piece};
use crate::error::{FrameError, Phase, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes framed pieces to any `Write` stream.
///
/// A message of several pieces is assembled in one buffer and written in a
/// single pass, so an encoding failure never leaves half a message on the wire.
pub struct PieceWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> PieceWriter<T> {
    /// Create a piece writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a piece writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and write one value as a piece.
    pub fn write_piece(&mut self, value: &Value) -> Result<()> {
        self.write_pieces([Piece::Value(value)])
    }

    /// Write an already encoded payload as a piece.
    pub fn write_raw_piece(&mut self, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        put_raw_piece(&mut self.buf, payload, self.config.max_payload_size)?;
        self.write_buffer()
    }

    /// Encode and write a whole message.
    pub fn write_pieces<'a, I>(&mut self, pieces: I) -> Result<()>
    where
        I: IntoIterator<Item = Piece<'a>>,
    {
        self.buf.clear();
        let mut count = 0usize;
        for piece in pieces {
            put_piece(&mut self.buf, piece, self.config.max_payload_size)?;
            count += 1;
        }
        trace!(pieces = count, bytes = self.buf.len(), "writing message");
        self.write_buffer()
    }

    fn write_buffer(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(match self.config.write_timeout {
                        Some(after) => FrameError::Timeout {
                            phase: Phase::Write,
                            after,
                        },
                        None => FrameError::Io(err),
                    });
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }
}

impl<T: Write + StreamControl> PieceWriter<T> {
    /// Create a piece writer and apply the configured write timeout.
    pub fn with_config_stream(inner: T, config: FrameConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

impl<T> PieceWriter<T> {
    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
