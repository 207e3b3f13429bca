//! ULEB128 varints and their zigzag encoded signed variant.
//!
//! <https://en.wikipedia.org/wiki/LEB128#Unsigned_LEB128>
use rayexec_error::{RayexecError, Result};

/// ULEB128 encode a u64 onto the end of `buf`.
pub fn encode_uleb128(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

pub fn encode_zigzag_uleb128(value: i64, buf: &mut Vec<u8>) {
    encode_uleb128(((value << 1) ^ (value >> 63)) as u64, buf)
}

/// Decodes a u64 from `buf`.
///
/// Returns (val, num_bytes) pair. Errors are corruption errors with the offset
/// relative to `buf`.
pub fn decode_uleb128(buf: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0;

    for (idx, &byte) in buf.iter().enumerate() {
        if shift > 63 {
            return Err(RayexecError::corruption("ULEB128 value is too large", idx as u64));
        }
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((value, idx + 1));
        }
    }

    Err(RayexecError::corruption(
        "Unterminated ULEB128 sequence",
        buf.len() as u64,
    ))
}

pub fn decode_zigzag_uleb128(buf: &[u8]) -> Result<(i64, usize)> {
    let (v, num_bytes) = decode_uleb128(buf)?;
    let v = (v >> 1) as i64 ^ -((v & 1) as i64);
    Ok((v, num_bytes))
}
