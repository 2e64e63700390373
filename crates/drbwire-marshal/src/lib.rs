//! Byte-exact codec for the subset of the Marshal 4.8 value format spoken by
//! dRuby peers.
//!
//! Supported: `nil`, booleans, 31-bit integers, symbols, strings with their
//! `:E` encoding flag, arrays, and user-defined (`_dump`) values kept as
//! opaque payloads. Everything else the format can express is recognized and
//! rejected with [`MarshalError::Unsupported`] naming the construct.
//!
//! The lowest layer of drbwire; framing and the session protocol build on
//! [`encode`] and [`decode`].

pub mod decode;
pub mod encode;
pub mod error;
pub mod integer;
pub mod value;

pub use decode::{
    decode, decode_partial, decode_raw, decode_raw_bool, decode_raw_bytes, strip_version,
    RawBytes, MAX_DEPTH,
};
pub use encode::{encode, encode_raw, encode_top_level, put_raw, put_value, VERSION};
pub use error::{Construct, MarshalError, Result};
pub use integer::{decode_integer, encode_integer, put_integer, INTEGER_MAX, INTEGER_MIN};
pub use value::Value;
