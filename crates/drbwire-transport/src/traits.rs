use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::uri::DrbUri;

/// Per-attempt timeouts and shutdown on a connected byte stream.
///
/// Read timeouts bound each individual `read` call, not a whole message; the
/// framing layer switches between a short bound for length fields and a
/// longer one for payloads. `shutdown` makes any in-flight read on a clone of
/// the stream return promptly.
pub trait StreamControl {
    /// Bound every subsequent `read` call. `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Bound every subsequent `write` call. `None` blocks indefinitely.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Close both directions of the connection.
    fn shutdown(&self) -> io::Result<()>;
}

impl StreamControl for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

#[cfg(unix)]
impl StreamControl for std::os::unix::net::UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        std::os::unix::net::UnixStream::set_write_timeout(self, timeout)
    }

    fn shutdown(&self) -> io::Result<()> {
        std::os::unix::net::UnixStream::shutdown(self, Shutdown::Both)
    }
}

/// A connected dRuby stream implementing Read + Write.
///
/// Wraps either a TCP connection (`druby://`) or a Unix domain socket
/// connection (`drbunix:`).
pub struct DrbStream {
    inner: DrbStreamInner,
}

enum DrbStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for DrbStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            DrbStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            DrbStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for DrbStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            DrbStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            DrbStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            DrbStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            DrbStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl StreamControl for DrbStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match &self.inner {
            DrbStreamInner::Tcp(stream) => StreamControl::set_read_timeout(stream, timeout),
            #[cfg(unix)]
            DrbStreamInner::Unix(stream) => StreamControl::set_read_timeout(stream, timeout),
        }
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match &self.inner {
            DrbStreamInner::Tcp(stream) => StreamControl::set_write_timeout(stream, timeout),
            #[cfg(unix)]
            DrbStreamInner::Unix(stream) => StreamControl::set_write_timeout(stream, timeout),
        }
    }

    fn shutdown(&self) -> io::Result<()> {
        match &self.inner {
            DrbStreamInner::Tcp(stream) => StreamControl::shutdown(stream),
            #[cfg(unix)]
            DrbStreamInner::Unix(stream) => StreamControl::shutdown(stream),
        }
    }
}

impl DrbStream {
    /// Connect to a dRuby endpoint (blocking).
    pub fn connect(uri: &DrbUri) -> Result<Self> {
        match uri {
            DrbUri::Tcp { host, port } => {
                let host = DrbUri::connect_host(host);
                let stream =
                    TcpStream::connect((host, *port)).map_err(|e| TransportError::Connect {
                        addr: uri.to_string(),
                        source: e,
                    })?;
                stream.set_nodelay(true)?;
                debug!(%uri, "connected over tcp");
                Ok(Self::from_tcp(stream))
            }
            #[cfg(unix)]
            DrbUri::Unix(path) => crate::uds::UnixDomainSocket::connect(path),
            #[cfg(not(unix))]
            DrbUri::Unix(_) => Err(TransportError::UnixUnsupported),
        }
    }

    /// Wrap an already connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: DrbStreamInner::Tcp(stream),
        }
    }

    /// Wrap an already connected Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: DrbStreamInner::Unix(stream),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// Used to split one connection into an independent reader and writer.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            DrbStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
            #[cfg(unix)]
            DrbStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Human-readable description of the remote end, for logs.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            DrbStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:unknown".to_string()),
            #[cfg(unix)]
            DrbStreamInner::Unix(_) => "unix".to_string(),
        }
    }
}

impl std::fmt::Debug for DrbStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            DrbStreamInner::Tcp(_) => f.debug_struct("DrbStream").field("type", &"tcp").finish(),
            #[cfg(unix)]
            DrbStreamInner::Unix(_) => f.debug_struct("DrbStream").field("type", &"unix").finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn tcp_connect_read_write() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = std::thread::spawn(move || {
            let (mut server, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            server.read_exact(&mut buf).unwrap();
            server.write_all(&buf).unwrap();
        });

        let uri = DrbUri::Tcp {
            host: "127.0.0.1".to_string(),
            port,
        };
        let mut client = DrbStream::connect(&uri).unwrap();
        client.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        assert!(client.peer_label().starts_with("127.0.0.1:"));

        handle.join().unwrap();
    }

    #[test]
    fn connect_refused_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let uri = DrbUri::Tcp {
            host: "127.0.0.1".to_string(),
            port,
        };
        assert!(matches!(
            DrbStream::connect(&uri),
            Err(TransportError::Connect { .. })
        ));
    }

    #[test]
    #[cfg(unix)]
    fn read_timeout_expires_as_would_block_or_timed_out() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut stream = DrbStream::from_unix(left);
        StreamControl::set_read_timeout(&stream, Some(Duration::from_millis(20))).unwrap();

        let mut buf = [0u8; 1];
        let err = stream.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));
    }

    #[test]
    #[cfg(unix)]
    fn shutdown_unblocks_clone() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let stream = DrbStream::from_unix(left);
        let mut reader = stream.try_clone().unwrap();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 1];
            reader.read(&mut buf).unwrap()
        });

        std::thread::sleep(Duration::from_millis(20));
        StreamControl::shutdown(&stream).unwrap();
        assert_eq!(handle.join().unwrap(), 0);
    }
}
