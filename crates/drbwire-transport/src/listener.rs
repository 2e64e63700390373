use std::net::TcpListener;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::DrbStream;
use crate::uri::DrbUri;

/// A bound dRuby endpoint accepting connections.
pub enum DrbListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(crate::uds::UnixDomainSocket),
}

impl DrbListener {
    /// Bind to a `druby://host:port` or `drbunix:/path` URI.
    ///
    /// Port 0 picks an ephemeral port; [`DrbListener::local_uri`] reports it.
    pub fn bind(uri: &DrbUri) -> Result<Self> {
        match uri {
            DrbUri::Tcp { host, port } => {
                let listener = TcpListener::bind((DrbUri::bind_host(host), *port)).map_err(
                    |e| TransportError::Bind {
                        addr: uri.to_string(),
                        source: e,
                    },
                )?;
                info!(%uri, "listening on tcp");
                Ok(DrbListener::Tcp(listener))
            }
            #[cfg(unix)]
            DrbUri::Unix(path) => Ok(DrbListener::Unix(crate::uds::UnixDomainSocket::bind(
                path,
            )?)),
            #[cfg(not(unix))]
            DrbUri::Unix(_) => Err(TransportError::UnixUnsupported),
        }
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<DrbStream> {
        match self {
            DrbListener::Tcp(listener) => {
                let (stream, addr) = listener.accept().map_err(TransportError::Accept)?;
                stream.set_nodelay(true)?;
                debug!(%addr, "accepted tcp connection");
                Ok(DrbStream::from_tcp(stream))
            }
            #[cfg(unix)]
            DrbListener::Unix(socket) => socket.accept(),
        }
    }

    /// The URI peers should use to reach this listener.
    pub fn local_uri(&self) -> Result<DrbUri> {
        match self {
            DrbListener::Tcp(listener) => {
                let addr = listener.local_addr()?;
                Ok(DrbUri::Tcp {
                    host: addr.ip().to_string(),
                    port: addr.port(),
                })
            }
            #[cfg(unix)]
            DrbListener::Unix(socket) => Ok(DrbUri::Unix(socket.path().to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    #[test]
    fn tcp_ephemeral_port_reported() {
        let listener = DrbListener::bind(&DrbUri::parse("druby://127.0.0.1:0").unwrap()).unwrap();
        let uri = listener.local_uri().unwrap();
        let DrbUri::Tcp { host, port } = &uri else {
            panic!("expected tcp uri, got {uri}");
        };
        assert_eq!(host, "127.0.0.1");
        assert_ne!(*port, 0);

        let handle = std::thread::spawn(move || {
            let mut client = DrbStream::connect(&uri).unwrap();
            client.write_all(b"x").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 1];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x");
        handle.join().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn unix_listener_roundtrip() {
        let dir = std::env::temp_dir().join(format!("drbwire-listener-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let uri = DrbUri::Unix(dir.join("drb.sock"));

        let listener = DrbListener::bind(&uri).unwrap();
        assert_eq!(listener.local_uri().unwrap(), uri);

        let client_uri = uri.clone();
        let handle = std::thread::spawn(move || {
            let mut client = DrbStream::connect(&client_uri).unwrap();
            client.write_all(b"y").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 1];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"y");
        handle.join().unwrap();

        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
