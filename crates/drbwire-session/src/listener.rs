use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use drbwire_frame::{FrameConfig, PieceReader, PieceWriter};
use drbwire_transport::{DrbListener, DrbStream, DrbUri, StreamControl};
use tracing::{debug, error, info, info_span, warn};

use crate::client::{send_request, send_request_with_raw, Reply};
use crate::error::Result;
use crate::request::Call;
use crate::server::{serve, Handler, ServeOutcome};

/// One dRuby connection split into an independent reader and writer.
pub struct Connection {
    id: String,
    reader: PieceReader<DrbStream>,
    writer: PieceWriter<DrbStream>,
}

impl Connection {
    /// Connect to a `druby://` or `drbunix:` endpoint.
    pub fn connect(uri: &DrbUri, config: FrameConfig) -> Result<Self> {
        let stream = DrbStream::connect(uri)?;
        Self::from_stream(uri.to_string(), stream, config)
    }

    /// Wrap an already connected stream.
    pub fn from_stream(id: impl Into<String>, stream: DrbStream, config: FrameConfig) -> Result<Self> {
        let reader_stream = stream.try_clone()?;
        let writer = PieceWriter::with_config_stream(stream, config.clone())?;
        let reader = PieceReader::with_config(reader_stream, config);
        Ok(Self {
            id: id.into(),
            reader,
            writer,
        })
    }

    /// Label used in logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send a call and wait for its reply.
    pub fn call(&mut self, call: &Call) -> Result<Reply> {
        send_request(&mut self.reader, &mut self.writer, call)
    }

    /// Send a call and wait for its reply, keeping the raw result payload.
    pub fn call_with_raw(&mut self, call: &Call) -> Result<Reply> {
        send_request_with_raw(&mut self.reader, &mut self.writer, call)
    }

    /// Serve requests on this connection until it closes or fails.
    pub fn serve<H: Handler + ?Sized>(&mut self, handler: &mut H) -> ServeOutcome {
        let _span = info_span!("connection", id = %self.id).entered();
        serve(&mut self.reader, &mut self.writer, handler)
    }

    /// Close both directions; a read blocked on another thread returns promptly.
    pub fn shutdown(&self) -> Result<()> {
        self.writer.get_ref().shutdown().map_err(drbwire_transport::TransportError::Io)?;
        Ok(())
    }

    /// Split into the underlying reader and writer.
    pub fn into_parts(self) -> (PieceReader<DrbStream>, PieceWriter<DrbStream>) {
        (self.reader, self.writer)
    }
}

/// Accepts dRuby connections on a bound endpoint.
pub struct Listener {
    inner: DrbListener,
    config: FrameConfig,
    next_conn_id: AtomicU64,
}

impl Listener {
    /// Bind with the default frame configuration.
    pub fn bind(uri: &DrbUri) -> Result<Self> {
        Self::bind_with_config(uri, FrameConfig::default())
    }

    pub fn bind_with_config(uri: &DrbUri, config: FrameConfig) -> Result<Self> {
        Ok(Self {
            inner: DrbListener::bind(uri)?,
            config,
            next_conn_id: AtomicU64::new(1),
        })
    }

    /// The URI peers should use to reach this listener.
    pub fn local_uri(&self) -> Result<DrbUri> {
        Ok(self.inner.local_uri()?)
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<Connection> {
        let stream = self.inner.accept()?;
        self.setup(stream)
    }

    fn setup(&self, stream: DrbStream) -> Result<Connection> {
        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let label = format!("conn-{id} ({})", stream.peer_label());
        debug!(conn = %label, "accepted connection");
        Connection::from_stream(label, stream, self.config.clone())
    }

    /// Serve every accepted connection on its own thread.
    ///
    /// `make_handler` builds a fresh handler per connection, so no state is
    /// shared between serve loops. Failing to set up one connection is logged
    /// and skipped; an accept failure ends the loop.
    pub fn serve_forever<F, H>(&self, make_handler: F) -> Result<()>
    where
        F: FnMut() -> H,
        H: Handler + Send + 'static,
    {
        self.serve_until(&AtomicBool::new(false), make_handler)
    }

    /// Like [`Listener::serve_forever`], returning once `stop` is set.
    ///
    /// The flag is checked after each accept; to stop a listener idling in
    /// `accept`, set the flag and then open one connection to it.
    pub fn serve_until<F, H>(&self, stop: &AtomicBool, mut make_handler: F) -> Result<()>
    where
        F: FnMut() -> H,
        H: Handler + Send + 'static,
    {
        if let Ok(uri) = self.local_uri() {
            info!(%uri, "serving connections");
        }
        loop {
            let stream = match self.inner.accept() {
                Ok(stream) => stream,
                Err(err) => {
                    error!(error = %err, "accept failed");
                    return Err(err.into());
                }
            };
            if stop.load(Ordering::SeqCst) {
                debug!("stop requested; no longer accepting");
                return Ok(());
            }
            let mut conn = match self.setup(stream) {
                Ok(conn) => conn,
                Err(err) => {
                    warn!(error = %err, "dropping connection that failed setup");
                    continue;
                }
            };

            let mut handler = make_handler();
            let spawned = thread::Builder::new()
                .name(format!("drb-{}", conn.id()))
                .spawn(move || {
                    let outcome = conn.serve(&mut handler);
                    if outcome.is_clean() {
                        debug!(conn = %conn.id(), ?outcome, "connection finished");
                    } else {
                        warn!(conn = %conn.id(), ?outcome, "connection ended on fault");
                    }
                });
            if let Err(err) = spawned {
                error!(error = %err, "failed to spawn connection thread");
            }
        }
    }
}
