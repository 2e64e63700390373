//! Transports for dRuby connections.
//!
//! Provides a unified stream type over:
//! - TCP (`druby://host:port`)
//! - Unix domain sockets (`drbunix:/path`, Unix only)
//!
//! This is the lowest I/O layer of drbwire. Framing builds on [`DrbStream`]
//! and the [`StreamControl`] trait for per-read timeouts.

pub mod error;
pub mod listener;
pub mod traits;
pub mod uri;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use listener::DrbListener;
pub use traits::{DrbStream, StreamControl};
pub use uri::DrbUri;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
