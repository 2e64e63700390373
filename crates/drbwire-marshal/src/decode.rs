use tracing::{debug, warn};

use crate::encode::{tag, ENCODING_IVAR, MAJOR_VERSION, MINOR_VERSION};
use crate::error::{Construct, MarshalError, Result};
use crate::integer::{decode_integer, INTEGER_MAX, INTEGER_MIN};
use crate::value::Value;

/// Maximum nesting of arrays and user-defined payloads accepted from a peer.
pub const MAX_DEPTH: usize = 128;

/// Body of a raw string or symbol, borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawBytes<'a> {
    Symbol(&'a [u8]),
    String(&'a [u8]),
}

impl<'a> RawBytes<'a> {
    pub fn bytes(&self) -> &'a [u8] {
        match self {
            RawBytes::Symbol(b) | RawBytes::String(b) => b,
        }
    }

    /// Convert into an owned value. A raw string carries no encoding flag and
    /// is reported as non-UTF-8.
    pub fn into_value(self) -> Value {
        match self {
            RawBytes::Symbol(b) => Value::Symbol(b.to_vec()),
            RawBytes::String(b) => Value::ascii(b),
        }
    }
}

/// Remove the two-byte version header.
///
/// A version other than 4.8 is logged and otherwise ignored.
pub fn strip_version(src: &[u8]) -> Result<&[u8]> {
    match src {
        [major, minor, rest @ ..] => {
            if (*major, *minor) != (MAJOR_VERSION, MINOR_VERSION) {
                warn!(
                    major = *major as i8,
                    minor = *minor as i8,
                    "unsupported value format version, decoding anyway"
                );
            }
            Ok(rest)
        }
        _ => Err(MarshalError::UnexpectedEof("version header")),
    }
}

/// Decode exactly one value that must span the whole input.
pub fn decode(src: &[u8], expect_version: bool) -> Result<Value> {
    let (value, rest) = decode_partial(src, expect_version)?;
    if !rest.is_empty() {
        return Err(MarshalError::TrailingBytes {
            what: value.kind(),
            count: rest.len(),
        });
    }
    Ok(value)
}

/// Decode one value from the front of `src`, returning the unconsumed remainder.
pub fn decode_partial(src: &[u8], expect_version: bool) -> Result<(Value, &[u8])> {
    let body = if expect_version {
        strip_version(src)?
    } else {
        src
    };
    decode_value(body, 0)
}

/// Decode a raw nil, bool, string or symbol, reporting the bytes consumed.
pub fn decode_raw(src: &[u8]) -> Result<(Value, usize)> {
    match src.first() {
        None => Err(MarshalError::UnexpectedEof("raw value")),
        Some(&tag::NIL) => Ok((Value::Nil, 1)),
        Some(&tag::TRUE) | Some(&tag::FALSE) => {
            let (b, consumed) = decode_raw_bool(src)?;
            Ok((Value::Bool(b), consumed))
        }
        Some(&tag::STRING) | Some(&tag::SYMBOL) => {
            let (raw, consumed) = decode_raw_bytes(src)?;
            Ok((raw.into_value(), consumed))
        }
        Some(&found) => Err(unexpected("raw nil, bool, string or symbol", found)),
    }
}

/// Decode a raw `T`/`F`.
pub fn decode_raw_bool(src: &[u8]) -> Result<(bool, usize)> {
    match src.first() {
        None => Err(MarshalError::UnexpectedEof("bool")),
        Some(&tag::TRUE) => Ok((true, 1)),
        Some(&tag::FALSE) => Ok((false, 1)),
        Some(&found) => Err(unexpected("bool", found)),
    }
}

/// Decode a raw `"` string or `:` symbol body.
pub fn decode_raw_bytes(src: &[u8]) -> Result<(RawBytes<'_>, usize)> {
    let (&first, rest) = src
        .split_first()
        .ok_or(MarshalError::UnexpectedEof("string or symbol"))?;
    let what = match first {
        tag::STRING => "string",
        tag::SYMBOL => "symbol",
        found => return Err(unexpected("string or symbol", found)),
    };

    let (len, len_size) = decode_integer(rest)?;
    let len = to_len(what, len)?;
    let body = &rest[len_size..];
    let bytes = body.get(..len).ok_or(MarshalError::MalformedPayload {
        what,
        declared: len,
        available: body.len(),
    })?;

    let raw = if first == tag::STRING {
        RawBytes::String(bytes)
    } else {
        RawBytes::Symbol(bytes)
    };
    Ok((raw, 1 + len_size + len))
}

fn decode_value(src: &[u8], depth: usize) -> Result<(Value, &[u8])> {
    if depth > MAX_DEPTH {
        return Err(MarshalError::TooDeep(MAX_DEPTH));
    }

    let (&first, rest) = src
        .split_first()
        .ok_or(MarshalError::UnexpectedEof("value"))?;

    match first {
        tag::NIL => Ok((Value::Nil, rest)),
        tag::TRUE => Ok((Value::Bool(true), rest)),
        tag::FALSE => Ok((Value::Bool(false), rest)),
        tag::INTEGER => {
            let (i, consumed) = decode_integer(rest)?;
            Ok((Value::Integer(to_value_integer(i)?), &rest[consumed..]))
        }
        tag::SYMBOL => {
            let (raw, consumed) = decode_raw_bytes(src)?;
            Ok((raw.into_value(), &src[consumed..]))
        }
        tag::IVAR => decode_ivar_string(rest),
        tag::ARRAY => decode_array(rest, depth),
        tag::USER_DEFINED => decode_user_defined(rest, depth),
        other => Err(match Construct::from_tag(other) {
            Some(construct) => MarshalError::Unsupported(construct),
            None => MarshalError::UnknownTag(other),
        }),
    }
}

/// `I` wrapper: a raw string followed by exactly one `:E => bool` ivar.
fn decode_ivar_string(src: &[u8]) -> Result<(Value, &[u8])> {
    match src.first() {
        Some(&tag::STRING) => {}
        Some(&found) => return Err(unexpected("raw string inside instance-variable wrapper", found)),
        None => return Err(MarshalError::UnexpectedEof("instance-variable wrapper")),
    }
    let (raw, consumed) = decode_raw_bytes(src)?;
    let bytes = raw.bytes().to_vec();
    let rest = &src[consumed..];

    let (count, consumed) = decode_integer(rest)?;
    if count != 1 {
        return Err(MarshalError::UnsupportedIvar(format!(
            "{count} instance variables (expected exactly 1)"
        )));
    }
    let rest = &rest[consumed..];

    let (name, consumed) = decode_raw_bytes(rest)?;
    match name {
        RawBytes::Symbol(ENCODING_IVAR) => {}
        RawBytes::Symbol(other) => {
            return Err(MarshalError::UnsupportedIvar(format!(
                "instance variable :{}",
                String::from_utf8_lossy(other)
            )))
        }
        RawBytes::String(_) => return Err(unexpected("instance variable name", tag::STRING)),
    }
    let rest = &rest[consumed..];

    let (is_utf8, consumed) = decode_raw_bool(rest)?;
    Ok((Value::String { bytes, is_utf8 }, &rest[consumed..]))
}

fn decode_array(src: &[u8], depth: usize) -> Result<(Value, &[u8])> {
    let (count, consumed) = decode_integer(src)?;
    let count = to_len("array", count)?;
    let mut rest = &src[consumed..];

    // Every element takes at least one byte.
    let mut items = Vec::with_capacity(count.min(rest.len()));
    for _ in 0..count {
        let (item, next) = decode_value(rest, depth + 1)?;
        items.push(item);
        rest = next;
    }
    Ok((Value::Array(items), rest))
}

/// `u` value: class symbol, length, opaque payload. The payload is decoded on
/// a best-effort basis; failure leaves `decoded` empty.
fn decode_user_defined(src: &[u8], depth: usize) -> Result<(Value, &[u8])> {
    let (class, consumed) = decode_raw_bytes(src)?;
    let class = match class {
        RawBytes::Symbol(name) => name.to_vec(),
        RawBytes::String(_) => return Err(unexpected("user-defined class symbol", tag::STRING)),
    };
    let rest = &src[consumed..];

    let (len, consumed) = decode_integer(rest)?;
    let len = to_len("user-defined payload", len)?;
    let body = &rest[consumed..];
    let payload = body.get(..len).ok_or(MarshalError::MalformedPayload {
        what: "user-defined payload",
        declared: len,
        available: body.len(),
    })?;

    let decoded = match strip_version(payload).and_then(|inner| {
        let (value, trailing) = decode_value(inner, depth + 1)?;
        if trailing.is_empty() {
            Ok(value)
        } else {
            Err(MarshalError::TrailingBytes {
                what: value.kind(),
                count: trailing.len(),
            })
        }
    }) {
        Ok(value) => Some(Box::new(value)),
        Err(err) => {
            debug!(
                class = %String::from_utf8_lossy(&class),
                error = %err,
                "user-defined payload kept opaque"
            );
            None
        }
    };

    let value = Value::UserDefined {
        tag: class,
        decoded,
        raw_payload: payload.to_vec(),
    };
    Ok((value, &body[len..]))
}

fn to_len(what: &'static str, len: i64) -> Result<usize> {
    if len < 0 {
        return Err(MarshalError::NegativeLength { what, len });
    }
    Ok(len as usize)
}

fn to_value_integer(i: i64) -> Result<i32> {
    if (INTEGER_MIN..=INTEGER_MAX).contains(&i) {
        Ok(i as i32)
    } else {
        Err(MarshalError::IntegerOutOfRange(i))
    }
}

fn unexpected(expected: &'static str, found: u8) -> MarshalError {
    match Construct::from_tag(found) {
        Some(construct) => MarshalError::Unsupported(construct),
        None => MarshalError::UnexpectedTag { expected, found },
    }
}
