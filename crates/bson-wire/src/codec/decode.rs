//! Document decoding.
//!
//! The decoder is iterative: nested documents and arrays are tracked on an
//! explicit frame stack, so hostile nesting is bounded by `max_depth` rather
//! than by the call stack. What the decoded structure becomes is decided by
//! an [`ObjectBuilder`].

use std::io::Read;

use crate::builder::{BsonObject, DocumentBuilder, HandlerRegistry, ObjectBuilder, TypedBuilder};
use crate::codec::options::DecodeOptions;
use crate::codec::primitives::Reader;
use crate::error::DecodeError;
use crate::limits::MIN_DOCUMENT_SIZE;
use crate::model::{Binary, BinarySubtype, DefaultDocumentFactory, Document, ElementType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Object,
    Array,
}

/// A document or array being decoded.
struct Frame<I> {
    instance: I,
    /// Offset of the terminating null byte.
    end: usize,
    kind: FrameKind,
    /// Key under which the finished container is stored in its parent.
    key: String,
}

/// Decodes documents from byte slices under the configured limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct BsonReader {
    options: DecodeOptions,
}

impl BsonReader {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decodes exactly one document occupying all of `input`.
    pub fn decode_document(&self, input: &[u8]) -> Result<Document, DecodeError> {
        let mut builder = DocumentBuilder::new(DefaultDocumentFactory);
        into_document(self.decode_with(input, &mut builder)?)
    }

    /// Decodes exactly one document occupying all of `input` through `builder`.
    pub fn decode_with<B: ObjectBuilder>(
        &self,
        input: &[u8],
        builder: &mut B,
    ) -> Result<B::Output, DecodeError> {
        let mut reader = Reader::new(input);
        let output = self.read_document(&mut reader, builder)?;
        if !reader.is_empty() {
            return Err(DecodeError::TrailingBytes {
                context: "document",
                count: reader.remaining_len(),
            });
        }
        Ok(output)
    }

    /// Decodes one document into a registered application type.
    pub fn decode_object<T: BsonObject>(
        &self,
        input: &[u8],
        registry: &HandlerRegistry,
    ) -> Result<T, DecodeError> {
        let mut builder = TypedBuilder::for_type::<T>(registry);
        self.decode_with(input, &mut builder)?
            .downcast::<T>()
            .map_err(|_| DecodeError::TargetMismatch {
                expected: std::any::type_name::<T>(),
            })
    }

    /// Reads one length-prefixed document from `source` and decodes it.
    pub fn read_document_from<R: Read>(&self, source: &mut R) -> Result<Document, DecodeError> {
        let mut prefix = [0u8; 4];
        source.read_exact(&mut prefix)?;
        let len = i32::from_le_bytes(prefix);
        let len = self.check_document_length(len)?;

        let mut bytes = vec![0u8; len];
        bytes[..4].copy_from_slice(&prefix);
        source.read_exact(&mut bytes[4..])?;
        self.decode_document(&bytes)
    }

    /// Decodes the document starting at the reader's position, leaving the
    /// reader just past its terminator.
    pub(crate) fn read_document<B: ObjectBuilder>(
        &self,
        reader: &mut Reader<'_>,
        builder: &mut B,
    ) -> Result<B::Output, DecodeError> {
        self.read_document_at_depth(reader, builder, 0)
    }

    fn read_document_at_depth<B: ObjectBuilder>(
        &self,
        reader: &mut Reader<'_>,
        builder: &mut B,
        base_depth: usize,
    ) -> Result<B::Output, DecodeError> {
        let end = self.read_document_header(reader, usize::MAX)?;
        let mut stack = vec![Frame {
            instance: builder.begin_object(),
            end,
            kind: FrameKind::Object,
            key: String::new(),
        }];

        loop {
            let depth = base_depth + stack.len();
            let Some(frame) = stack.last_mut() else {
                return Err(DecodeError::TargetMismatch { expected: "document" });
            };
            let frame_end = frame.end;

            let at_end = reader.position() == frame_end;
            let tag = reader.read_byte("element type")?;

            if tag == 0 {
                if !at_end {
                    return Err(DecodeError::MissingTerminator { context: "document" });
                }
                let Some(done) = stack.pop() else {
                    return Err(DecodeError::TargetMismatch { expected: "document" });
                };
                let output = match done.kind {
                    FrameKind::Object => builder.end_object(done.instance),
                    FrameKind::Array => builder.end_array(done.instance),
                };
                match stack.last_mut() {
                    None => return Ok(output),
                    Some(parent) => builder.end_property(&mut parent.instance, &done.key, output),
                }
                continue;
            }

            if at_end {
                return Err(DecodeError::MissingTerminator { context: "document" });
            }
            let key = reader.read_cstring("key")?;
            let element_type = ElementType::from_u8(tag).ok_or_else(|| DecodeError::InvalidTag {
                tag,
                key: key.to_string(),
            })?;
            if !element_type.is_supported() {
                return Err(DecodeError::UnsupportedTag {
                    element_type,
                    key: key.to_string(),
                });
            }

            match element_type {
                ElementType::Document | ElementType::Array => {
                    if depth >= self.options.max_depth {
                        return Err(DecodeError::DepthExceeded {
                            max: self.options.max_depth,
                        });
                    }
                    let end = self.read_document_header(reader, frame_end)?;
                    builder.begin_property(&mut frame.instance, key);
                    let (instance, kind) = if element_type == ElementType::Document {
                        (builder.begin_object(), FrameKind::Object)
                    } else {
                        (builder.begin_array(), FrameKind::Array)
                    };
                    stack.push(Frame {
                        instance,
                        end,
                        kind,
                        key: key.to_string(),
                    });
                }
                _ => {
                    let value = self.read_scalar(reader, element_type, depth)?;
                    if reader.position() > frame_end {
                        return Err(DecodeError::InvalidLength {
                            context: "document",
                            len: (frame_end + 1) as i64,
                        });
                    }
                    builder.begin_property(&mut frame.instance, key);
                    let output = builder.scalar(value);
                    builder.end_property(&mut frame.instance, key, output);
                }
            }
        }
    }

    /// Reads and validates a document length, returning the terminator offset.
    ///
    /// `limit` is the offset of the enclosing document's terminator, which the
    /// new document must end before.
    fn read_document_header(&self, reader: &mut Reader<'_>, limit: usize) -> Result<usize, DecodeError> {
        let start = reader.position();
        let len = self.check_document_length(reader.read_i32("document length")?)?;
        let end = start + len - 1;
        if len - 4 > reader.remaining_len() || end >= limit {
            return Err(DecodeError::InvalidLength {
                context: "document",
                len: len as i64,
            });
        }
        Ok(end)
    }

    fn check_document_length(&self, len: i32) -> Result<usize, DecodeError> {
        if len < MIN_DOCUMENT_SIZE as i32 {
            return Err(DecodeError::InvalidLength {
                context: "document",
                len: len as i64,
            });
        }
        let len = len as usize;
        if len > self.options.max_document_size {
            return Err(DecodeError::LengthExceedsLimit {
                field: "document",
                len,
                max: self.options.max_document_size,
            });
        }
        Ok(len)
    }

    fn read_scalar(
        &self,
        reader: &mut Reader<'_>,
        element_type: ElementType,
        depth: usize,
    ) -> Result<Value, DecodeError> {
        let value = match element_type {
            ElementType::Double => Value::Double(reader.read_f64("double")?),
            ElementType::String => Value::String(reader.read_string("string")?),
            ElementType::Binary => Value::Binary(read_binary(reader)?),
            ElementType::ObjectId => Value::ObjectId(reader.read_object_id("object id")?),
            ElementType::Boolean => match reader.read_byte("boolean")? {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                value => return Err(DecodeError::InvalidBool { value }),
            },
            ElementType::DateTime => Value::DateTime(reader.read_i64("datetime")?),
            ElementType::Null => Value::Null,
            ElementType::Regex => Value::Regex {
                pattern: reader.read_cstring("regex pattern")?.to_string(),
                options: reader.read_cstring("regex options")?.to_string(),
            },
            ElementType::Code => Value::Code(reader.read_string("code")?),
            ElementType::Symbol => Value::Symbol(reader.read_string("symbol")?),
            ElementType::CodeWithScope => self.read_code_with_scope(reader, depth)?,
            ElementType::Int32 => Value::Int32(reader.read_i32("int32")?),
            ElementType::Timestamp => Value::Timestamp {
                increment: reader.read_u32("timestamp")?,
                time: reader.read_u32("timestamp")?,
            },
            ElementType::Int64 => Value::Int64(reader.read_i64("int64")?),
            ElementType::MinKey => Value::MinKey,
            ElementType::MaxKey => Value::MaxKey,
            ElementType::Document
            | ElementType::Array
            | ElementType::Undefined
            | ElementType::DbPointer
            | ElementType::Decimal128 => {
                return Err(DecodeError::UnsupportedTag {
                    element_type,
                    key: String::new(),
                });
            }
        };
        Ok(value)
    }

    fn read_code_with_scope(&self, reader: &mut Reader<'_>, depth: usize) -> Result<Value, DecodeError> {
        if depth >= self.options.max_depth {
            return Err(DecodeError::DepthExceeded {
                max: self.options.max_depth,
            });
        }
        let start = reader.position();
        let total = reader.read_i32("code with scope")?;
        // int32 total + smallest string + smallest document
        if total < 4 + 5 + MIN_DOCUMENT_SIZE as i32 || total as usize - 4 > reader.remaining_len() {
            return Err(DecodeError::InvalidLength {
                context: "code with scope",
                len: total as i64,
            });
        }
        let code = reader.read_string("code")?;
        let mut scope_builder = DocumentBuilder::new(DefaultDocumentFactory);
        let scope = into_document(self.read_document_at_depth(reader, &mut scope_builder, depth)?)?;
        let consumed = reader.position() - start;
        if consumed != total as usize {
            return Err(DecodeError::InvalidLength {
                context: "code with scope",
                len: total as i64,
            });
        }
        Ok(Value::CodeWithScope { code, scope })
    }
}

fn read_binary(reader: &mut Reader<'_>) -> Result<Binary, DecodeError> {
    let len = reader.read_i32("binary length")?;
    if len < 0 {
        return Err(DecodeError::InvalidLength {
            context: "binary",
            len: len as i64,
        });
    }
    let subtype = BinarySubtype::from_u8(reader.read_byte("binary subtype")?);
    let mut len = len as usize;
    if subtype == BinarySubtype::BinaryOld {
        let inner = reader.read_i32("binary length")?;
        if inner < 0 || inner as usize + 4 != len {
            return Err(DecodeError::InvalidLength {
                context: "binary",
                len: inner as i64,
            });
        }
        len = inner as usize;
    }
    let bytes = reader.read_bytes(len, "binary")?;
    Ok(Binary::with_subtype(subtype, bytes))
}

fn into_document(value: Value) -> Result<Document, DecodeError> {
    match value {
        Value::Document(doc) => Ok(doc),
        _ => Err(DecodeError::TargetMismatch { expected: "document" }),
    }
}

/// Decodes one document with the default limits.
pub fn decode_document(input: &[u8]) -> Result<Document, DecodeError> {
    BsonReader::default().decode_document(input)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::codec::encode::encode_document;
    use crate::model::{ComparerDocumentFactory, ObjectId};

    fn golden(hex_str: &str) -> Vec<u8> {
        hex::decode(hex_str).unwrap()
    }

    fn elements(body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 5) as i32).to_le_bytes().to_vec();
        out.extend_from_slice(body);
        out.push(0);
        out
    }

    #[test]
    fn test_decode_golden_string() {
        let doc = decode_document(&golden("1400000002746573740005000000746573740000")).unwrap();
        assert_eq!(doc, Document::new().append("test", "test"));
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode_document(&[5, 0, 0, 0, 0]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_every_scalar() {
        let id = ObjectId::from_bytes([3; 12]);
        let doc = Document::new()
            .append("d", 2.5)
            .append("s", "\u{20ac}")
            .append("bin", Binary::with_subtype(BinarySubtype::Md5, vec![1, 2]))
            .append("old", Binary::with_subtype(BinarySubtype::BinaryOld, vec![4, 5, 6]))
            .append("id", id)
            .append("t", true)
            .append("dt", Value::DateTime(1_700_000_000_000))
            .append("n", Value::Null)
            .append(
                "re",
                Value::Regex {
                    pattern: "^a".into(),
                    options: "im".into(),
                },
            )
            .append("code", Value::Code("f()".into()))
            .append("sym", Value::Symbol("s".into()))
            .append("i", 7)
            .append("ts", Value::Timestamp { increment: 9, time: 10 })
            .append("l", 1i64 << 40)
            .append("min", Value::MinKey)
            .append("max", Value::MaxKey);
        let decoded = decode_document(&encode_document(&doc).unwrap()).unwrap();
        assert_eq!(decoded, doc);
        let keys: Vec<&str> = decoded.keys().collect();
        assert_eq!(keys.first(), Some(&"d"));
        assert_eq!(keys.last(), Some(&"max"));
    }

    #[test]
    fn test_decode_nested_array_and_scope() {
        let doc = Document::new()
            .append("list", Value::array([Value::from(1), Value::from("two")]))
            .append(
                "fn",
                Value::CodeWithScope {
                    code: "x + y".into(),
                    scope: Document::new().append("x", 1).append("y", 2),
                },
            )
            .append("sub", Document::new().append("deeper", Document::new()));
        let decoded = decode_document(&encode_document(&doc).unwrap()).unwrap();
        assert_eq!(decoded, doc);
        assert!(matches!(decoded.get("list"), Some(Value::Array(_))));
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let mut body = vec![0x10, b'a', 0];
        body.extend_from_slice(&1i32.to_le_bytes());
        body.extend_from_slice(&[0x10, b'a', 0]);
        body.extend_from_slice(&2i32.to_le_bytes());
        let doc = decode_document(&elements(&body)).unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.get("a"), Some(&Value::Int32(2)));
    }

    #[test]
    fn test_factory_orders_decoded_objects() {
        let factory = ComparerDocumentFactory::new(Arc::new(|a: &str, b: &str| a.cmp(b)));
        let doc = Document::new().append("b", 1).append("a", 2);
        let bytes = encode_document(&doc).unwrap();

        let mut builder = DocumentBuilder::new(factory);
        let value = BsonReader::default().decode_with(&bytes, &mut builder).unwrap();
        let decoded = value.as_document().unwrap();
        let keys: Vec<&str> = decoded.keys().collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn test_unknown_tag() {
        let bytes = elements(&[0x42, b'k', 0]);
        assert!(matches!(
            decode_document(&bytes),
            Err(DecodeError::InvalidTag { tag: 0x42, .. })
        ));
    }

    #[test]
    fn test_unsupported_tags() {
        for tag in [0x06u8, 0x0C, 0x13] {
            let bytes = elements(&[tag, b'k', 0]);
            let err = decode_document(&bytes).unwrap_err();
            assert!(matches!(err, DecodeError::UnsupportedTag { .. }), "tag {tag:#x}");
            assert_eq!(err.kind(), crate::error::ErrorKind::MalformedInput);
        }
    }

    #[test]
    fn test_bad_lengths() {
        assert!(matches!(
            decode_document(&[4, 0, 0, 0]),
            Err(DecodeError::InvalidLength { len: 4, .. })
        ));
        assert!(matches!(
            decode_document(&[9, 0, 0, 0, 0]),
            Err(DecodeError::InvalidLength { len: 9, .. })
        ));
        assert!(matches!(
            decode_document(&[5, 0]),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_length_over_limit() {
        let reader = BsonReader::new(DecodeOptions::new().with_max_document_size(8));
        let bytes = encode_document(&Document::new().append("a", 1)).unwrap();
        assert!(matches!(
            reader.decode_document(&bytes),
            Err(DecodeError::LengthExceedsLimit { len: 12, max: 8, .. })
        ));
    }

    #[test]
    fn test_missing_terminator() {
        let mut bytes = encode_document(&Document::new().append("a", 1)).unwrap();
        let last = bytes.len() - 1;
        bytes[last] = 0x10;
        assert!(decode_document(&bytes).is_err());

        // declared length ends before the last element does
        let mut bytes = encode_document(&Document::new().append("a", 1)).unwrap();
        bytes[0] -= 2;
        bytes.truncate(bytes.len() - 2);
        assert!(decode_document(&bytes).is_err());
    }

    #[test]
    fn test_invalid_bool() {
        let bytes = elements(&[0x08, b'b', 0, 2]);
        assert!(matches!(
            decode_document(&bytes),
            Err(DecodeError::InvalidBool { value: 2 })
        ));
    }

    #[test]
    fn test_invalid_utf8_key() {
        let body = [0x0A, 0xFF, 0xFE, 0];
        assert!(matches!(
            decode_document(&elements(&body)),
            Err(DecodeError::InvalidUtf8 { field: "key" })
        ));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = encode_document(&Document::new()).unwrap();
        bytes.push(0);
        assert!(matches!(
            decode_document(&bytes),
            Err(DecodeError::TrailingBytes { count: 1, .. })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let mut doc = Document::new();
        for _ in 0..10 {
            doc = Document::new().append("x", doc);
        }
        let bytes = encode_document(&doc).unwrap();

        let shallow = BsonReader::new(DecodeOptions::new().with_max_depth(5));
        assert!(matches!(
            shallow.decode_document(&bytes),
            Err(DecodeError::DepthExceeded { max: 5 })
        ));
        assert!(BsonReader::default().decode_document(&bytes).is_ok());
    }

    #[test]
    fn test_code_with_scope_size_mismatch() {
        let value = Value::CodeWithScope {
            code: "c".into(),
            scope: Document::new(),
        };
        let mut bytes = encode_document(&Document::new().append("f", value)).unwrap();
        // total size sits right after tag and key
        bytes[7] += 1;
        assert!(decode_document(&bytes).is_err());
    }

    #[test]
    fn test_nested_length_escapes_parent() {
        let inner = encode_document(&Document::new().append("a", 1)).unwrap();
        let mut body = vec![0x03, b's', 0];
        body.extend_from_slice(&inner);
        let mut bytes = elements(&body);
        // inflate the nested length past its parent
        bytes[7] += 1;
        assert!(decode_document(&bytes).is_err());
    }

    #[test]
    fn test_read_from_source() {
        let first = Document::new().append("n", 1);
        let second = Document::new().append("n", 2);
        let mut stream = encode_document(&first).unwrap();
        stream.extend(encode_document(&second).unwrap());

        let mut source = std::io::Cursor::new(stream);
        let reader = BsonReader::default();
        assert_eq!(reader.read_document_from(&mut source).unwrap(), first);
        assert_eq!(reader.read_document_from(&mut source).unwrap(), second);
        assert!(matches!(
            reader.read_document_from(&mut source),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }
}
