use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

const TCP_SCHEME: &str = "druby://";
const UNIX_SCHEME: &str = "drbunix:";

/// Address of a dRuby endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrbUri {
    /// `druby://host:port`. An empty host binds every interface and connects
    /// to localhost.
    Tcp { host: String, port: u16 },
    /// `drbunix:/path/to/socket`
    Unix(PathBuf),
}

impl DrbUri {
    /// Parse a URI, ignoring any `?query` suffix.
    pub fn parse(uri: &str) -> Result<Self, TransportError> {
        let invalid = |reason| TransportError::InvalidUri {
            uri: uri.to_string(),
            reason,
        };
        let without_query = uri.split_once('?').map_or(uri, |(head, _)| head);

        if let Some(rest) = without_query.strip_prefix(TCP_SCHEME) {
            let (host, port) = rest
                .rsplit_once(':')
                .ok_or_else(|| invalid("missing port"))?;
            let port = port.parse().map_err(|_| invalid("port is not a number"))?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            return Ok(DrbUri::Tcp {
                host: host.to_string(),
                port,
            });
        }

        if let Some(path) = without_query.strip_prefix(UNIX_SCHEME) {
            if path.is_empty() {
                return Err(invalid("missing socket path"));
            }
            return Ok(DrbUri::Unix(PathBuf::from(path)));
        }

        Err(invalid("expected druby:// or drbunix: scheme"))
    }

    /// Host to connect to (empty host means localhost).
    pub(crate) fn connect_host(host: &str) -> &str {
        if host.is_empty() {
            "localhost"
        } else {
            host
        }
    }

    /// Host to bind (empty host means every interface).
    pub(crate) fn bind_host(host: &str) -> &str {
        if host.is_empty() {
            "0.0.0.0"
        } else {
            host
        }
    }
}

impl FromStr for DrbUri {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DrbUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrbUri::Tcp { host, port } if host.contains(':') => {
                write!(f, "{TCP_SCHEME}[{host}]:{port}")
            }
            DrbUri::Tcp { host, port } => write!(f, "{TCP_SCHEME}{host}:{port}"),
            DrbUri::Unix(path) => write!(f, "{UNIX_SCHEME}{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_uri() {
        assert_eq!(
            DrbUri::parse("druby://localhost:8787").unwrap(),
            DrbUri::Tcp {
                host: "localhost".to_string(),
                port: 8787
            }
        );
    }

    #[test]
    fn parses_tcp_uri_with_empty_host_and_query() {
        assert_eq!(
            "druby://:9000?load_limit=1".parse::<DrbUri>().unwrap(),
            DrbUri::Tcp {
                host: String::new(),
                port: 9000
            }
        );
    }

    #[test]
    fn parses_ipv6_host() {
        let uri = DrbUri::parse("druby://[::1]:8787").unwrap();
        assert_eq!(
            uri,
            DrbUri::Tcp {
                host: "::1".to_string(),
                port: 8787
            }
        );
        assert_eq!(uri.to_string(), "druby://[::1]:8787");
    }

    #[test]
    fn parses_unix_uri() {
        assert_eq!(
            DrbUri::parse("drbunix:/tmp/drb.sock").unwrap(),
            DrbUri::Unix(PathBuf::from("/tmp/drb.sock"))
        );
    }

    #[test]
    fn rejects_bad_uris() {
        for bad in [
            "http://x:1",
            "druby://host",
            "druby://host:port",
            "druby://host:70000",
            "drbunix:",
        ] {
            assert!(
                matches!(DrbUri::parse(bad), Err(TransportError::InvalidUri { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn display_roundtrips() {
        for uri in ["druby://example.org:8787", "drbunix:/var/run/app.sock"] {
            assert_eq!(DrbUri::parse(uri).unwrap().to_string(), uri);
        }
    }
}
