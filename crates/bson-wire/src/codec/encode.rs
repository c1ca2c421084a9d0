//! Document encoding.
//!
//! Encoding is two-pass. The size of a top-level document is computed up front
//! from the value tree alone, checked against the configured limit, and only
//! then are bytes produced. Nested documents are written with a placeholder
//! length that is patched once their terminator is out, so sizing runs once per
//! call. The sizing functions below mirror the writer exactly; any disagreement
//! between the two is reported as [`EncodeError::SizeMismatch`].
//!
//! A failed write leaves the [`Writer`] as it was before the call.

use std::io::Write;

use crate::codec::options::EncodeOptions;
use crate::codec::primitives::{cstring_size, string_size, Writer};
use crate::error::EncodeError;
use crate::limits::MAX_WIRE_LENGTH;
use crate::model::{Binary, BinarySubtype, Document, ElementType, Value};

// =============================================================================
// SIZING
// =============================================================================

/// Payload size of a value: the bytes after the tag and key.
pub fn calculate_size(value: &Value) -> usize {
    match value {
        Value::Double(_) | Value::DateTime(_) | Value::Int64(_) | Value::Timestamp { .. } => 8,
        Value::Int32(_) => 4,
        Value::Boolean(_) => 1,
        Value::Null | Value::MinKey | Value::MaxKey => 0,
        Value::ObjectId(_) => 12,
        Value::String(s) | Value::Symbol(s) | Value::Code(s) => string_size(s),
        Value::Document(doc) | Value::Array(doc) => calculate_document_size(doc),
        Value::Binary(bin) => binary_size(bin),
        Value::Regex { pattern, options } => cstring_size(pattern) + cstring_size(options),
        Value::CodeWithScope { code, scope } => 4 + string_size(code) + calculate_document_size(scope),
    }
}

/// Size of one element: tag byte, key, payload.
pub fn calculate_element_size(key: &str, value: &Value) -> usize {
    1 + cstring_size(key) + calculate_size(value)
}

/// Total encoded size of a document, including its length prefix and terminator.
pub fn calculate_document_size(doc: &Document) -> usize {
    let body: usize = doc.iter().map(|(k, v)| calculate_element_size(k, v)).sum();
    4 + body + 1
}

fn binary_size(bin: &Binary) -> usize {
    // length + subtype + bytes, and subtype 0x02 repeats the length inside
    let inner = if bin.subtype == BinarySubtype::BinaryOld { 4 } else { 0 };
    4 + 1 + inner + bin.bytes.len()
}

/// Payload size of `value` written under `tag`, or the reason it can't be.
fn calculate_size_as(key: &str, tag: ElementType, value: &Value) -> Result<usize, EncodeError> {
    if tag == value.element_type() {
        return Ok(calculate_size(value));
    }
    match (tag, value) {
        (ElementType::Document | ElementType::Array, Value::Document(doc) | Value::Array(doc)) => {
            Ok(calculate_document_size(doc))
        }
        (ElementType::Int64 | ElementType::Double, Value::Int32(_))
        | (ElementType::Double, Value::Int64(_)) => Ok(8),
        (
            ElementType::String | ElementType::Symbol | ElementType::Code,
            Value::String(s) | Value::Symbol(s) | Value::Code(s),
        ) => Ok(string_size(s)),
        _ => Err(unsupported(key, tag, value)),
    }
}

fn unsupported(key: &str, tag: ElementType, value: &Value) -> EncodeError {
    EncodeError::UnsupportedType {
        key: key.to_string(),
        value_type: value.type_name(),
        requested: tag,
    }
}

// =============================================================================
// WRITING
// =============================================================================

/// Writes documents and values into a [`Writer`] under the configured limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct BsonWriter {
    options: EncodeOptions,
}

impl BsonWriter {
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Writes a top-level document.
    ///
    /// Fails with [`EncodeError::DocumentTooLarge`] before writing anything if
    /// the computed size reaches the document limit.
    pub fn write_document(&self, out: &mut Writer, doc: &Document) -> Result<(), EncodeError> {
        let size = calculate_document_size(doc);
        self.check_document_size(size)?;
        rollback_on_error(out, size, |out| write_document_body(out, doc))
    }

    /// Writes the payload of `value` as if it carried `tag`.
    ///
    /// No tag byte or key is written. Values that have no encoding under the
    /// requested tag fail with [`EncodeError::UnsupportedType`]. Document and
    /// array payloads are subject to the document limit.
    pub fn write_value(
        &self,
        out: &mut Writer,
        tag: ElementType,
        value: &Value,
    ) -> Result<(), EncodeError> {
        let size = calculate_size_as("", tag, value)?;
        if matches!(tag, ElementType::Document | ElementType::Array) {
            self.check_document_size(size)?;
        }
        rollback_on_error(out, size, |out| write_payload_as(out, "", tag, value))
    }

    /// Writes one element (tag, key, payload) with the tag taken from the value.
    pub fn write_element(&self, out: &mut Writer, key: &str, value: &Value) -> Result<(), EncodeError> {
        let size = calculate_element_size(key, value);
        rollback_on_error(out, size, |out| write_element(out, key, value))
    }

    /// Writes one element under an explicit tag.
    ///
    /// A null value is always written with the null tag, whatever was requested.
    pub fn write_element_as(
        &self,
        out: &mut Writer,
        key: &str,
        tag: ElementType,
        value: &Value,
    ) -> Result<(), EncodeError> {
        if value.is_null() {
            return self.write_element(out, key, value);
        }
        let size = 1 + cstring_size(key) + calculate_size_as(key, tag, value)?;
        rollback_on_error(out, size, |out| {
            out.write_byte(tag.as_u8());
            write_key(out, key)?;
            write_payload_as(out, key, tag, value)
        })
    }

    /// Writes a null-terminated string with no length prefix.
    pub fn write_cstring(&self, out: &mut Writer, s: &str) -> Result<(), EncodeError> {
        write_checked_cstring(out, "cstring", s)
    }

    /// Writes a length-prefixed string.
    pub fn write_string(&self, out: &mut Writer, s: &str) {
        out.write_string(s);
    }

    fn check_document_size(&self, size: usize) -> Result<(), EncodeError> {
        let max = self.options.document_limit();
        if size >= max {
            return Err(EncodeError::DocumentTooLarge { size, max });
        }
        Ok(())
    }
}

/// Runs `write` and checks it produced `expected` bytes, discarding its output
/// on any failure.
fn rollback_on_error(
    out: &mut Writer,
    expected: usize,
    write: impl FnOnce(&mut Writer) -> Result<(), EncodeError>,
) -> Result<(), EncodeError> {
    if expected > MAX_WIRE_LENGTH {
        return Err(EncodeError::DocumentTooLarge {
            size: expected,
            max: MAX_WIRE_LENGTH,
        });
    }
    let start = out.len();
    let result = write(out).and_then(|()| {
        let actual = out.len() - start;
        if expected != actual {
            return Err(EncodeError::SizeMismatch { expected, actual });
        }
        Ok(())
    });
    if result.is_err() {
        out.truncate(start);
    }
    result
}

/// Reserves an int32 length prefix, returning its position.
fn begin_length(out: &mut Writer) -> usize {
    let pos = out.len();
    out.write_i32(0);
    pos
}

/// Fills the prefix at `pos` with the bytes written since it, itself included.
///
/// Every write is capped at [`MAX_WIRE_LENGTH`] up front, so the count fits.
fn end_length(out: &mut Writer, pos: usize) {
    out.patch_i32(pos, (out.len() - pos) as i32);
}

fn write_key(out: &mut Writer, key: &str) -> Result<(), EncodeError> {
    if key.as_bytes().contains(&0) {
        return Err(EncodeError::InvalidKey { key: key.to_string() });
    }
    out.write_cstring(key);
    Ok(())
}

fn write_checked_cstring(out: &mut Writer, context: &'static str, s: &str) -> Result<(), EncodeError> {
    if s.as_bytes().contains(&0) {
        return Err(EncodeError::InvalidCString {
            context,
            value: s.to_string(),
        });
    }
    out.write_cstring(s);
    Ok(())
}

fn write_document_body(out: &mut Writer, doc: &Document) -> Result<(), EncodeError> {
    let pos = begin_length(out);
    for (key, value) in doc {
        write_element(out, key, value)?;
    }
    out.write_byte(0);
    end_length(out, pos);
    Ok(())
}

fn write_element(out: &mut Writer, key: &str, value: &Value) -> Result<(), EncodeError> {
    out.write_byte(value.element_type().as_u8());
    write_key(out, key)?;
    write_payload(out, value)
}

fn write_payload(out: &mut Writer, value: &Value) -> Result<(), EncodeError> {
    match value {
        Value::Double(n) => out.write_f64(*n),
        Value::String(s) | Value::Symbol(s) | Value::Code(s) => out.write_string(s),
        Value::Document(doc) | Value::Array(doc) => write_document_body(out, doc)?,
        Value::Binary(bin) => write_binary(out, bin),
        Value::ObjectId(id) => out.write_object_id(id),
        Value::Boolean(b) => out.write_byte(u8::from(*b)),
        Value::DateTime(millis) => out.write_i64(*millis),
        Value::Null | Value::MinKey | Value::MaxKey => {}
        Value::Regex { pattern, options } => {
            write_checked_cstring(out, "regex pattern", pattern)?;
            write_checked_cstring(out, "regex options", options)?;
        }
        Value::CodeWithScope { code, scope } => {
            let pos = begin_length(out);
            out.write_string(code);
            write_document_body(out, scope)?;
            end_length(out, pos);
        }
        Value::Int32(n) => out.write_i32(*n),
        Value::Timestamp { increment, time } => {
            out.write_u32(*increment);
            out.write_u32(*time);
        }
        Value::Int64(n) => out.write_i64(*n),
    }
    Ok(())
}

fn write_binary(out: &mut Writer, bin: &Binary) {
    if bin.subtype == BinarySubtype::BinaryOld {
        out.write_i32((bin.bytes.len() + 4) as i32);
        out.write_byte(bin.subtype.as_u8());
        out.write_i32(bin.bytes.len() as i32);
    } else {
        out.write_i32(bin.bytes.len() as i32);
        out.write_byte(bin.subtype.as_u8());
    }
    out.write_bytes(&bin.bytes);
}

/// Mirrors [`calculate_size_as`].
fn write_payload_as(
    out: &mut Writer,
    key: &str,
    tag: ElementType,
    value: &Value,
) -> Result<(), EncodeError> {
    if tag == value.element_type() {
        return write_payload(out, value);
    }
    match (tag, value) {
        (ElementType::Document | ElementType::Array, Value::Document(doc) | Value::Array(doc)) => {
            write_document_body(out, doc)
        }
        (ElementType::Int64, Value::Int32(n)) => {
            out.write_i64(i64::from(*n));
            Ok(())
        }
        (ElementType::Double, Value::Int32(n)) => {
            out.write_f64(f64::from(*n));
            Ok(())
        }
        (ElementType::Double, Value::Int64(n)) => {
            out.write_f64(*n as f64);
            Ok(())
        }
        (
            ElementType::String | ElementType::Symbol | ElementType::Code,
            Value::String(s) | Value::Symbol(s) | Value::Code(s),
        ) => {
            out.write_string(s);
            Ok(())
        }
        _ => Err(unsupported(key, tag, value)),
    }
}

// =============================================================================
// SINKS
// =============================================================================

/// Encodes a document with the default limits.
pub fn encode_document(doc: &Document) -> Result<Vec<u8>, EncodeError> {
    encode_document_with_options(doc, EncodeOptions::default())
}

/// Encodes a document with explicit limits.
pub fn encode_document_with_options(
    doc: &Document,
    options: EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    let mut out = Writer::with_capacity(calculate_document_size(doc));
    BsonWriter::new(options).write_document(&mut out, doc)?;
    Ok(out.into_bytes())
}

/// Encodes a document and hands the bytes to `sink` once complete.
///
/// Nothing reaches the sink if encoding fails. Returns the number of bytes written.
pub fn write_document_to<W: Write>(
    sink: &mut W,
    doc: &Document,
    options: EncodeOptions,
) -> Result<usize, EncodeError> {
    let bytes = encode_document_with_options(doc, options)?;
    sink.write_all(&bytes)?;
    Ok(bytes.len())
}
