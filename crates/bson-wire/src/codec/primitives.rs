//! Primitive encoding/decoding for the BSON binary format.
//!
//! All multi-byte integers and floats are little-endian. Two string forms
//! exist on the wire: the C string (raw UTF-8 plus a null byte, used for keys
//! and regex parts) and the length-prefixed string (int32 byte count that
//! includes the terminator, the bytes, then a null byte).

use crate::error::DecodeError;
use crate::limits::OBJECT_ID_LEN;
use crate::model::ObjectId;

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives
/// with bounds checking and error handling.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the remaining bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        if self.pos >= self.data.len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_bytes(N, context)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Reads a little-endian i32.
    #[inline]
    pub fn read_i32(&mut self, context: &'static str) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian i64.
    #[inline]
    pub fn read_i64(&mut self, context: &'static str) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian f64. NaN is a legal BSON double.
    #[inline]
    pub fn read_f64(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a 12-byte object id.
    #[inline]
    pub fn read_object_id(&mut self, context: &'static str) -> Result<ObjectId, DecodeError> {
        Ok(ObjectId::from_bytes(self.read_array::<OBJECT_ID_LEN>(context)?))
    }

    /// Reads a null-terminated UTF-8 string, borrowing from the input.
    pub fn read_cstring(&mut self, field: &'static str) -> Result<&'a str, DecodeError> {
        let rest = self.remaining();
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::MissingTerminator { context: field })?;
        let bytes = &rest[..len];
        self.pos += len + 1;
        std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    /// Reads a length-prefixed, null-terminated UTF-8 string.
    #[inline]
    pub fn read_string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let len = self.read_i32(field)?;
        if len < 1 {
            return Err(DecodeError::InvalidLength {
                context: field,
                len: len as i64,
            });
        }
        let len = len as usize;
        if len > self.remaining_len() {
            return Err(DecodeError::UnexpectedEof { context: field });
        }
        let bytes = self.read_bytes(len - 1, field)?;
        if self.read_byte(field)? != 0 {
            return Err(DecodeError::MissingTerminator { context: field });
        }
        // Validate UTF-8 on borrowed slice, then allocate once
        std::str::from_utf8(bytes)
            .map(|s| s.to_string())
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discards everything written after `len` bytes.
    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    /// Overwrites four bytes at `pos` with a little-endian i32.
    ///
    /// Panics if `pos + 4` is past the written bytes.
    #[inline]
    pub fn patch_i32(&mut self, pos: usize, value: i32) {
        self.buf[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a little-endian i32.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian u32.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian i64.
    #[inline]
    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian f64.
    #[inline]
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a 12-byte object id.
    #[inline]
    pub fn write_object_id(&mut self, id: &ObjectId) {
        self.buf.extend_from_slice(&id.bytes());
    }

    /// Writes UTF-8 bytes followed by a null terminator.
    ///
    /// The caller must ensure `s` contains no null byte.
    #[inline]
    pub fn write_cstring(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    /// Writes an int32 byte length (terminator included), the bytes and a null.
    #[inline]
    pub fn write_string(&mut self, s: &str) {
        self.write_i32((s.len() + 1) as i32);
        self.write_cstring(s);
    }
}

/// Encoded size of a C string.
#[inline]
pub fn cstring_size(s: &str) -> usize {
    s.len() + 1
}

/// Encoded size of a length-prefixed string.
#[inline]
pub fn string_size(s: &str) -> usize {
    4 + s.len() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i32_le() {
        let mut writer = Writer::new();
        writer.write_i32(5);
        assert_eq!(writer.as_bytes(), &[5, 0, 0, 0]);

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_i32("test").unwrap(), 5);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_string_roundtrip() {
        let test_strings = ["", "hello", "hello world", "unicode: \u{1F600}", "\u{20ac}\u{20ac}"];

        for s in test_strings {
            let mut writer = Writer::new();
            writer.write_string(s);
            assert_eq!(writer.len(), string_size(s));

            let mut reader = Reader::new(writer.as_bytes());
            let decoded = reader.read_string("test").unwrap();
            assert_eq!(s, decoded);
        }
    }

    #[test]
    fn test_multibyte_length_counts_bytes() {
        let s = "\u{20ac}\u{20ac}\u{20ac}";
        let mut writer = Writer::new();
        writer.write_string(s);
        // 3 chars, 9 UTF-8 bytes, plus terminator
        assert_eq!(&writer.as_bytes()[0..4], &10i32.to_le_bytes());
        assert_eq!(writer.len(), 4 + 10);
    }

    #[test]
    fn test_cstring_roundtrip() {
        let mut writer = Writer::new();
        writer.write_cstring("key");
        writer.write_cstring("");
        assert_eq!(writer.as_bytes(), b"key\0\0");

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_cstring("test").unwrap(), "key");
        assert_eq!(reader.read_cstring("test").unwrap(), "");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_cstring_missing_terminator() {
        let mut reader = Reader::new(b"abc");
        assert!(matches!(
            reader.read_cstring("key"),
            Err(DecodeError::MissingTerminator { .. })
        ));
    }

    #[test]
    fn test_string_bad_length() {
        let mut writer = Writer::new();
        writer.write_i32(0);
        let mut reader = Reader::new(writer.as_bytes());
        assert!(matches!(
            reader.read_string("test"),
            Err(DecodeError::InvalidLength { len: 0, .. })
        ));

        let mut writer = Writer::new();
        writer.write_i32(100);
        writer.write_bytes(b"short\0");
        let mut reader = Reader::new(writer.as_bytes());
        assert!(matches!(
            reader.read_string("test"),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_string_missing_terminator() {
        let mut writer = Writer::new();
        writer.write_i32(3);
        writer.write_bytes(b"abc");
        let mut reader = Reader::new(writer.as_bytes());
        assert!(matches!(
            reader.read_string("test"),
            Err(DecodeError::MissingTerminator { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut writer = Writer::new();
        writer.write_i32(3);
        writer.write_bytes(&[0xC3, 0x28, 0x00]);
        let mut reader = Reader::new(writer.as_bytes());
        assert!(matches!(
            reader.read_string("test"),
            Err(DecodeError::InvalidUtf8 { .. })
        ));
    }

    #[test]
    fn test_f64_roundtrip() {
        let test_values = [0.0, 1.0, -1.0, f64::INFINITY, f64::NEG_INFINITY, 3.14159];

        for v in test_values {
            let mut writer = Writer::new();
            writer.write_f64(v);

            let mut reader = Reader::new(writer.as_bytes());
            let decoded = reader.read_f64("test").unwrap();
            assert_eq!(v, decoded, "failed for {}", v);
        }
    }

    #[test]
    fn test_unexpected_eof() {
        let data = [0u8; 5];
        let mut reader = Reader::new(&data);
        let result = reader.read_bytes(10, "test");
        assert!(matches!(result, Err(DecodeError::UnexpectedEof { .. })));
        assert!(matches!(reader.read_i64("test"), Err(DecodeError::UnexpectedEof { .. })));
    }
}
