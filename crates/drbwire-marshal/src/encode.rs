use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Result;
use crate::integer::put_integer;
use crate::value::Value;

/// Format version emitted in front of every top-level value.
pub const VERSION: [u8; 2] = [MAJOR_VERSION, MINOR_VERSION];
pub const MAJOR_VERSION: u8 = 4;
pub const MINOR_VERSION: u8 = 8;

/// Wire tag bytes of the supported constructs.
pub mod tag {
    pub const NIL: u8 = b'0';
    pub const TRUE: u8 = b'T';
    pub const FALSE: u8 = b'F';
    pub const INTEGER: u8 = b'i';
    pub const SYMBOL: u8 = b':';
    pub const STRING: u8 = b'"';
    pub const IVAR: u8 = b'I';
    pub const ARRAY: u8 = b'[';
    pub const USER_DEFINED: u8 = b'u';
}

/// Name of the single instance variable carried by strings.
pub const ENCODING_IVAR: &[u8] = b"E";

/// Encode a value in top-level form, prefixed with the `04 08` version.
pub fn encode(value: &Value) -> Result<Bytes> {
    encode_top_level(value, true)
}

/// Encode a value in top-level form, optionally without the version prefix.
pub fn encode_top_level(value: &Value, prepend_version: bool) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    if prepend_version {
        dst.put_slice(&VERSION);
    }
    put_value(&mut dst, value)?;
    Ok(dst.freeze())
}

/// Encode the raw form of a value.
///
/// Raw forms are the building blocks nested inside other constructs: an
/// integer without its `i` tag, a string without the instance-variable
/// wrapper. Arrays and user-defined values have no separate raw form and are
/// emitted exactly as their top-level form.
pub fn encode_raw(value: &Value) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    put_raw(&mut dst, value)?;
    Ok(dst.freeze())
}

/// Append the top-level form of `value` (without version) to `dst`.
pub fn put_value(dst: &mut BytesMut, value: &Value) -> Result<()> {
    match value {
        Value::Nil | Value::Bool(_) | Value::Symbol(_) => put_raw(dst, value),
        Value::Integer(i) => {
            dst.put_u8(tag::INTEGER);
            put_integer(dst, i64::from(*i))
        }
        Value::String { bytes, is_utf8 } => {
            dst.put_u8(tag::IVAR);
            put_raw_bytes(dst, tag::STRING, bytes)?;
            put_integer(dst, 1)?;
            put_raw_bytes(dst, tag::SYMBOL, ENCODING_IVAR)?;
            put_bool(dst, *is_utf8);
            Ok(())
        }
        Value::Array(items) => {
            dst.put_u8(tag::ARRAY);
            put_len(dst, items.len())?;
            for item in items {
                put_value(dst, item)?;
            }
            Ok(())
        }
        Value::UserDefined {
            tag: class,
            raw_payload,
            ..
        } => {
            dst.put_u8(tag::USER_DEFINED);
            put_raw_bytes(dst, tag::SYMBOL, class)?;
            put_len(dst, raw_payload.len())?;
            dst.put_slice(raw_payload);
            Ok(())
        }
    }
}

/// Append the raw form of `value` to `dst`.
pub fn put_raw(dst: &mut BytesMut, value: &Value) -> Result<()> {
    match value {
        Value::Nil => {
            dst.put_u8(tag::NIL);
            Ok(())
        }
        Value::Bool(b) => {
            put_bool(dst, *b);
            Ok(())
        }
        Value::Integer(i) => put_integer(dst, i64::from(*i)),
        Value::Symbol(name) => put_raw_bytes(dst, tag::SYMBOL, name),
        Value::String { bytes, .. } => put_raw_bytes(dst, tag::STRING, bytes),
        Value::Array(_) | Value::UserDefined { .. } => put_value(dst, value),
    }
}

fn put_bool(dst: &mut BytesMut, b: bool) {
    dst.put_u8(if b { tag::TRUE } else { tag::FALSE });
}

fn put_raw_bytes(dst: &mut BytesMut, tag: u8, bytes: &[u8]) -> Result<()> {
    dst.put_u8(tag);
    put_len(dst, bytes.len())?;
    dst.put_slice(bytes);
    Ok(())
}

fn put_len(dst: &mut BytesMut, len: usize) -> Result<()> {
    put_integer(dst, i64::try_from(len).unwrap_or(i64::MAX))
}
