use std::any::Any;
use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use drbwire_frame::{FrameError, PieceBody, PieceReader, PieceWriter};
use drbwire_marshal::Value;
use drbwire_transport::StreamControl;
use tracing::{debug, error, warn};

use crate::error::HandlerError;
use crate::request::{read_request, write_reply, Request};

/// What a handler wants sent back for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub result: PieceBody,
    /// Close the connection after the reply is written.
    pub close: bool,
}

impl Outcome {
    /// A successful reply carrying `result`.
    pub fn success(result: impl Into<Value>) -> Self {
        Self {
            success: true,
            result: PieceBody::Value(result.into()),
            close: false,
        }
    }

    /// A failed reply; `result` usually describes the failure.
    pub fn failure(result: impl Into<Value>) -> Self {
        Self {
            success: false,
            result: PieceBody::Value(result.into()),
            close: false,
        }
    }

    /// A reply whose result is an already encoded payload, forwarded verbatim.
    pub fn raw(success: bool, payload: impl Into<Bytes>) -> Self {
        Self {
            success,
            result: PieceBody::Raw(payload.into()),
            close: false,
        }
    }

    /// Close the connection once this reply has been written.
    pub fn and_close(mut self) -> Self {
        self.close = true;
        self
    }
}

/// Serves requests on one connection.
pub trait Handler {
    fn handle(&mut self, request: &Request) -> Result<Outcome, HandlerError>;
}

impl<F> Handler for F
where
    F: FnMut(&Request) -> Result<Outcome, HandlerError>,
{
    fn handle(&mut self, request: &Request) -> Result<Outcome, HandlerError> {
        self(request)
    }
}

/// Why a serve loop ended.
#[derive(Debug)]
pub enum ServeOutcome {
    /// The peer closed the connection between requests.
    PeerClosed,
    /// A handler asked for the connection to be closed.
    HandlerClosed,
    /// Reading a request failed.
    ReadFailed(FrameError),
    /// Writing a reply failed.
    WriteFailed(FrameError),
}

impl ServeOutcome {
    /// Whether the loop ended on a close signal rather than a fault.
    pub fn is_clean(&self) -> bool {
        matches!(self, ServeOutcome::PeerClosed | ServeOutcome::HandlerClosed)
    }
}

/// Run the request/reply loop until a close signal or a connection fault.
///
/// A handler error or panic is logged and no reply is written for that
/// request; the loop moves on to the next one. Any read or write fault ends
/// the loop.
pub fn serve<R, W, H>(
    reader: &mut PieceReader<R>,
    writer: &mut PieceWriter<W>,
    handler: &mut H,
) -> ServeOutcome
where
    R: Read + StreamControl,
    W: Write + StreamControl,
    H: Handler + ?Sized,
{
    let mut served = 0u64;
    loop {
        let request = match read_request(reader) {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!(served, "peer closed connection");
                return ServeOutcome::PeerClosed;
            }
            Err(err) => {
                error!(error = %err, served, "failed to read request");
                return ServeOutcome::ReadFailed(err);
            }
        };
        served += 1;

        let method = request.method.value.to_string();
        debug!(%method, args = request.args.len(), "handling request");

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&request))) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                error!(%method, error = %err, "request handler failed; no reply sent");
                continue;
            }
            Err(payload) => {
                error!(%method, panic = panic_message(payload.as_ref()), "request handler panicked; no reply sent");
                continue;
            }
        };

        if let Err(err) = write_reply(writer, &outcome.success.into(), &outcome.result) {
            error!(error = %err, %method, "failed to write reply");
            return ServeOutcome::WriteFailed(err);
        }

        if outcome.close {
            debug!(served, "handler requested close");
            if let Err(err) = writer.get_ref().shutdown() {
                warn!(error = %err, "shutdown after close request failed");
            }
            return ServeOutcome::HandlerClosed;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
