//! Variable-width integer codec.
//!
//! Every integer, length and count in the value format goes through this
//! codec: one signed tag byte, optionally followed by 1-4 little-endian
//! payload bytes.
//!
//! ```text
//! value range              tag         payload
//! 0                        0           -
//! 1 ..= 122                value + 5   -
//! 123 ..= 2^8-1            1           1 byte
//! 2^8 ..= 2^16-1           2           2 bytes LE
//! 2^16 ..= 2^24-1          3           3 bytes LE
//! 2^24 ..= 2^30-1          4           4 bytes LE
//! -123 ..= -1              value - 5   -
//! -2^8 ..= -124            -1          1 byte two's complement
//! -2^16 ..= -257           -2          2 bytes LE two's complement
//! -2^24 ..= -65537         -3          3 bytes LE two's complement
//! -2^30 ..= -2^24-1        -4          4 bytes LE two's complement
//! ```
//!
//! Tag bytes 5 and -5 are never produced and are rejected on decode.

use bytes::{BufMut, BytesMut};

use crate::error::{MarshalError, Result};

/// Smallest encodable integer (-2^30).
pub const INTEGER_MIN: i64 = -(1 << 30);

/// Largest encodable integer (2^30 - 1).
pub const INTEGER_MAX: i64 = (1 << 30) - 1;

/// Append the encoded form of `value` to `dst`.
///
/// Values outside [`INTEGER_MIN`, `INTEGER_MAX`] are rejected, never truncated.
pub fn put_integer(dst: &mut BytesMut, value: i64) -> Result<()> {
    if !(INTEGER_MIN..=INTEGER_MAX).contains(&value) {
        return Err(MarshalError::IntegerOutOfRange(value));
    }

    let le = (value as u32).to_le_bytes();
    match value {
        0 => dst.put_i8(0),
        1..=122 => dst.put_i8((value + 5) as i8),
        123..=0xFF => {
            dst.put_i8(1);
            dst.put_slice(&le[..1]);
        }
        0x100..=0xFFFF => {
            dst.put_i8(2);
            dst.put_slice(&le[..2]);
        }
        0x1_0000..=0xFF_FFFF => {
            dst.put_i8(3);
            dst.put_slice(&le[..3]);
        }
        0x100_0000..=INTEGER_MAX => {
            dst.put_i8(4);
            dst.put_slice(&le[..4]);
        }
        -123..=-1 => dst.put_i8((value - 5) as i8),
        -0x100..=-124 => {
            dst.put_i8(-1);
            dst.put_slice(&le[..1]);
        }
        -0x1_0000..=-0x101 => {
            dst.put_i8(-2);
            dst.put_slice(&le[..2]);
        }
        -0x100_0000..=-0x1_0001 => {
            dst.put_i8(-3);
            dst.put_slice(&le[..3]);
        }
        _ => {
            dst.put_i8(-4);
            dst.put_slice(&le[..4]);
        }
    }
    Ok(())
}

/// Encode `value` into a fresh buffer.
pub fn encode_integer(value: i64) -> Result<BytesMut> {
    let mut dst = BytesMut::with_capacity(5);
    put_integer(&mut dst, value)?;
    Ok(dst)
}

/// Decode one integer from the front of `src`.
///
/// Returns the value and the number of bytes consumed (1-5).
pub fn decode_integer(src: &[u8]) -> Result<(i64, usize)> {
    let (&tag, rest) = src
        .split_first()
        .ok_or(MarshalError::UnexpectedEof("integer"))?;
    let tag = tag as i8;

    match tag {
        0 => Ok((0, 1)),
        1..=4 => {
            let n = tag as usize;
            let magnitude = read_le(rest, n)?;
            Ok((magnitude as i64, 1 + n))
        }
        -4..=-1 => {
            let n = tag.unsigned_abs() as usize;
            let magnitude = read_le(rest, n)?;
            Ok((magnitude as i64 - (1i64 << (8 * n)), 1 + n))
        }
        6..=127 => Ok((tag as i64 - 5, 1)),
        -128..=-6 => Ok((tag as i64 + 5, 1)),
        _ => Err(MarshalError::UndefinedIntegerTag(tag)),
    }
}

/// Read `n` payload bytes as an unsigned little-endian number, zero-padded to
/// four bytes.
fn read_le(src: &[u8], n: usize) -> Result<u32> {
    let payload = src
        .get(..n)
        .ok_or(MarshalError::UnexpectedEof("integer payload"))?;
    let mut padded = [0u8; 4];
    padded[..n].copy_from_slice(payload);
    Ok(u32::from_le_bytes(padded))
}
