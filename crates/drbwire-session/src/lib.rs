//! dRuby session protocol.
//!
//! A request is five pieces (object id, method, argument count, arguments,
//! block); a reply is two (success flag, result). This crate provides:
//! - [`send_request`] / [`send_request_with_raw`] for the client side
//! - [`serve`], the per-connection server loop driving a [`Handler`]
//! - [`Connection`] and [`Listener`] over `druby://` and `drbunix:` endpoints
//!
//! # Example
//!
//! ```no_run
//! use drbwire_session::{Call, Connection};
//! use drbwire_frame::FrameConfig;
//! use drbwire_transport::DrbUri;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let uri = DrbUri::parse("druby://localhost:8787")?;
//! let mut conn = Connection::connect(&uri, FrameConfig::default())?;
//! let reply = conn.call(&Call::new("upcase").on(()).arg("hello"))?;
//! println!("{} {}", reply.success, reply.result);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod listener;
pub mod request;
pub mod server;

pub use client::{read_reply, send_request, send_request_with_raw, Reply};
pub use error::{HandlerError, Result, SessionError};
pub use listener::{Connection, Listener};
pub use request::{make_reply, make_request, read_request, write_reply, write_request, Call, Request};
pub use server::{serve, Handler, Outcome, ServeOutcome};
