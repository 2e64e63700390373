//! Byte-exact Marshal 4.8 codec and the dRuby session protocol built on it.
//!
//! drbwire speaks the wire format of dRuby peers without a Ruby runtime:
//! the value subset dRuby needs (nil, booleans, 31-bit integers, symbols,
//! strings, arrays and opaque user-defined blobs), the length-prefixed piece
//! framing, and the five-piece request / two-piece reply exchange.
//!
//! # Crate Structure
//!
//! - [`marshal`]: Value model, encoder, decoder and integer codec
//! - [`transport`]: TCP and Unix socket streams, `druby://` / `drbunix:` URIs
//! - [`frame`]: Length-prefixed pieces with per-phase read timeouts
//! - [`session`]: Client calls, server loop and listener (behind `session` feature)

/// Re-export marshal types.
pub mod marshal {
    pub use drbwire_marshal::*;
}

/// Re-export transport types.
pub mod transport {
    pub use drbwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use drbwire_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use drbwire_session::*;
}

pub use drbwire_marshal::{decode, encode, MarshalError, Value};
