//! Variable-length integer encoding (VInt / VLong).
//!
//! Seven data bits per byte, least significant group first, with the high bit
//! of each byte set while more bytes follow. VInts carry `u32` values and
//! VLongs carry `u64` values; both share the same byte format.

use std::io::{Read, Write};

use byteorder::ReadBytesExt;

use crate::error::{GlaiveError, Result};

/// Maximum encoded length of a VInt.
pub const MAX_VINT_LEN: usize = 5;

/// Maximum encoded length of a VLong.
pub const MAX_VLONG_LEN: usize = 10;

/// Number of bytes `value` occupies once encoded.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Encode a `u32` as a VInt.
pub fn encode_vint(value: u32) -> Vec<u8> {
    encode_vlong(value as u64)
}

/// Encode a `u64` as a VLong.
pub fn encode_vlong(value: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(encoded_len(value));
    let mut val = value;

    while val > 0x7F {
        bytes.push((val & 0x7F) as u8 | 0x80);
        val >>= 7;
    }
    bytes.push(val as u8);

    bytes
}

/// Decode a VInt from the front of `bytes`, returning the value and the
/// number of bytes consumed.
pub fn decode_vint(bytes: &[u8]) -> Result<(u32, usize)> {
    let (value, read) = decode_with_limit(bytes, MAX_VINT_LEN)?;
    let value = u32::try_from(value).map_err(|_| GlaiveError::invalid_argument("VInt overflow"))?;
    Ok((value, read))
}

/// Decode a VLong from the front of `bytes`.
pub fn decode_vlong(bytes: &[u8]) -> Result<(u64, usize)> {
    decode_with_limit(bytes, MAX_VLONG_LEN)
}

fn decode_with_limit(bytes: &[u8], max_len: usize) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        if i >= max_len {
            return Err(GlaiveError::invalid_argument("VInt overflow"));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok((result, i + 1));
        }

        shift += 7;
    }

    Err(GlaiveError::eof("incomplete VInt"))
}

/// Write a VInt, returning the number of bytes written.
pub fn write_vint<W: Write + ?Sized>(writer: &mut W, value: u32) -> Result<usize> {
    write_vlong(writer, value as u64)
}

/// Write a VLong, returning the number of bytes written.
pub fn write_vlong<W: Write + ?Sized>(writer: &mut W, value: u64) -> Result<usize> {
    let bytes = encode_vlong(value);
    writer.write_all(&bytes)?;
    Ok(bytes.len())
}

/// Read a VInt.
pub fn read_vint<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let value = read_with_limit(reader, MAX_VINT_LEN)?;
    u32::try_from(value).map_err(|_| GlaiveError::invalid_argument("VInt overflow"))
}

/// Read a VLong.
pub fn read_vlong<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    read_with_limit(reader, MAX_VLONG_LEN)
}

fn read_with_limit<R: Read + ?Sized>(reader: &mut R, max_len: usize) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0;

    for _ in 0..max_len {
        let byte = reader
            .read_u8()
            .map_err(|e| GlaiveError::from_read(e, "read past end of stream"))?;

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok(result);
        }

        shift += 7;
    }

    Err(GlaiveError::invalid_argument("VInt overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode_vint() {
        let test_values = [0, 1, 127, 128, 255, 256, 16383, 16384, u32::MAX];

        for &value in &test_values {
            let encoded = encode_vint(value);
            let (decoded, bytes_read) = decode_vint(&encoded).unwrap();

            assert_eq!(value, decoded);
            assert_eq!(encoded.len(), bytes_read);
        }
    }

    #[test]
    fn test_encode_decode_vlong() {
        let test_values = [0, 1, 127, 128, (1u64 << 35) - 1, 1u64 << 35, u64::MAX];

        for &value in &test_values {
            let encoded = encode_vlong(value);
            let (decoded, bytes_read) = decode_vlong(&encoded).unwrap();

            assert_eq!(value, decoded);
            assert_eq!(encoded.len(), bytes_read);
        }
    }

    #[test]
    fn test_little_endian_groups() {
        assert_eq!(encode_vint(300), vec![0xAC, 0x02]);
        assert_eq!(encode_vint(127), vec![0x7F]);
        assert_eq!(encode_vint(128), vec![0x80, 0x01]);
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(encoded_len(0), 1);
        assert_eq!(encoded_len(127), 1);
        assert_eq!(encoded_len(128), 2);
        assert_eq!(encoded_len(16383), 2);
        assert_eq!(encoded_len(16384), 3);
        assert_eq!(encoded_len((1 << 35) - 1), 5);
        assert_eq!(encoded_len(u64::MAX), MAX_VLONG_LEN);

        for shift in 0..35 {
            let value = 1u64 << shift;
            assert_eq!(encode_vlong(value).len(), encoded_len(value));
        }
    }

    #[test]
    fn test_write_read() {
        let mut buffer = Vec::new();

        let written = write_vint(&mut buffer, 12345).unwrap();
        write_vlong(&mut buffer, 123456789012345).unwrap();
        assert_eq!(written, 2);

        let mut cursor = Cursor::new(buffer);
        assert_eq!(read_vint(&mut cursor).unwrap(), 12345);
        assert_eq!(read_vlong(&mut cursor).unwrap(), 123456789012345);
        assert!(read_vint(&mut cursor).unwrap_err().is_eof());
    }

    #[test]
    fn test_incomplete_and_overflow() {
        assert!(decode_vint(&[0x80]).unwrap_err().is_eof());
        assert!(decode_vint(&[0xFF; 6]).is_err());
        // Five bytes that decode past u32::MAX
        assert!(decode_vint(&[0xFF, 0xFF, 0xFF, 0xFF, 0x7F]).is_err());
    }
}
