//! Read/write helpers for packet payloads.
//!
//! All integers are big-endian. Strings and byte slices are
//! length-prefixed: u16 for strings (the same layout the frame id uses),
//! u32 for raw byte slices.

use std::io::{Read, Write};

/// Writes a u16 big-endian length-prefixed UTF-8 string.
///
/// Fails with `InvalidInput` when the string exceeds 65 535 bytes.
pub fn write_str(out: &mut dyn Write, value: &str) -> std::io::Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("string too long for u16 prefix: {} bytes", value.len()),
        )
    })?;
    out.write_all(&len.to_be_bytes())?;
    out.write_all(value.as_bytes())
}

/// Reads a u16 big-endian length-prefixed UTF-8 string.
pub fn read_str(input: &mut dyn Read) -> std::io::Result<String> {
    let mut len_buf = [0u8; 2];
    input.read_exact(&mut len_buf)?;
    let len = u16::from_be_bytes(len_buf) as usize;

    let mut bytes = vec![0u8; len];
    input.read_exact(&mut bytes)?;
    String::from_utf8(bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Writes a u32 big-endian length-prefixed byte slice.
pub fn write_bytes(out: &mut dyn Write, value: &[u8]) -> std::io::Result<()> {
    let len = u32::try_from(value.len()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("byte slice too long for u32 prefix: {} bytes", value.len()),
        )
    })?;
    out.write_all(&len.to_be_bytes())?;
    out.write_all(value)
}

/// Reads a u32 big-endian length-prefixed byte slice.
pub fn read_bytes(input: &mut dyn Read) -> std::io::Result<Vec<u8>> {
    let len = read_u32(input)? as usize;
    let mut bytes = vec![0u8; len];
    input.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Writes a boolean as a single byte.
pub fn write_bool(out: &mut dyn Write, value: bool) -> std::io::Result<()> {
    out.write_all(&[u8::from(value)])
}

/// Reads a boolean; any non-zero byte is true.
pub fn read_bool(input: &mut dyn Read) -> std::io::Result<bool> {
    let mut buf = [0u8; 1];
    input.read_exact(&mut buf)?;
    Ok(buf[0] != 0)
}

/// Writes a u16 big-endian.
pub fn write_u16(out: &mut dyn Write, value: u16) -> std::io::Result<()> {
    out.write_all(&value.to_be_bytes())
}

/// Reads a u16 big-endian.
pub fn read_u16(input: &mut dyn Read) -> std::io::Result<u16> {
    let mut buf = [0u8; 2];
    input.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

/// Writes a u32 big-endian.
pub fn write_u32(out: &mut dyn Write, value: u32) -> std::io::Result<()> {
    out.write_all(&value.to_be_bytes())
}

/// Reads a u32 big-endian.
pub fn read_u32(input: &mut dyn Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Writes an i64 big-endian.
pub fn write_i64(out: &mut dyn Write, value: i64) -> std::io::Result<()> {
    out.write_all(&value.to_be_bytes())
}

/// Reads an i64 big-endian.
pub fn read_i64(input: &mut dyn Read) -> std::io::Result<i64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn str_roundtrip() {
        let mut buf = Vec::new();
        write_str(&mut buf, "héllo").unwrap();
        assert_eq!(&buf[..2], &(6u16).to_be_bytes());

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_str(&mut cursor).unwrap(), "héllo");
    }

    #[test]
    fn empty_str_roundtrip() {
        let mut buf = Vec::new();
        write_str(&mut buf, "").unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_str(&mut cursor).unwrap(), "");
    }

    #[test]
    fn str_too_long_is_rejected() {
        let long = "x".repeat(usize::from(u16::MAX) + 1);
        let mut buf = Vec::new();
        let err = write_str(&mut buf, &long).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn read_str_rejects_invalid_utf8() {
        let mut buf = Vec::new();
        write_u16(&mut buf, 2).unwrap();
        buf.extend_from_slice(&[0xff, 0xfe]);

        let mut cursor = Cursor::new(buf);
        let err = read_str(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_str_is_eof() {
        let mut buf = Vec::new();
        write_u16(&mut buf, 10).unwrap();
        buf.extend_from_slice(b"abc");

        let mut cursor = Cursor::new(buf);
        let err = read_str(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn integer_roundtrips() {
        let mut buf = Vec::new();
        write_u16(&mut buf, 513).unwrap();
        write_u32(&mut buf, 70_000).unwrap();
        write_i64(&mut buf, -9).unwrap();
        write_bool(&mut buf, true).unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_u16(&mut cursor).unwrap(), 513);
        assert_eq!(read_u32(&mut cursor).unwrap(), 70_000);
        assert_eq!(read_i64(&mut cursor).unwrap(), -9);
        assert!(read_bool(&mut cursor).unwrap());
    }

    #[test]
    fn bytes_roundtrip() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, &[1, 2, 3]).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_bytes(&mut cursor).unwrap(), vec![1, 2, 3]);
    }
}
