//! OP_REPLY parsing.

use std::io::Read;

use tracing::{debug, warn};

use crate::builder::{
    BsonObject, Built, DocumentBuilder, HandlerRegistry, ObjectBuilder, TypedBuilder,
};
use crate::codec::{BsonReader, DecodeOptions, Reader};
use crate::error::DecodeError;
use crate::limits::{HEADER_SIZE, REPLY_PREFIX_SIZE};
use crate::model::{DefaultDocumentFactory, Document, Value};
use crate::protocol::flags::ResponseFlags;
use crate::protocol::header::{MessageHeader, OpCode};

/// A server reply with its documents.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyMessage<T = Document> {
    pub header: MessageHeader,
    pub response_flags: ResponseFlags,
    /// Zero when the cursor is exhausted.
    pub cursor_id: i64,
    pub starting_from: i32,
    pub number_returned: i32,
    pub documents: Vec<T>,
}

impl ReplyMessage<Document> {
    /// Reads one reply frame from `source` and decodes its documents.
    pub fn read_from<R: Read>(source: &mut R, options: DecodeOptions) -> Result<Self, DecodeError> {
        let frame = read_frame(source, options)?;
        Self::decode(&frame, options)
    }

    /// Decodes a complete reply frame.
    pub fn decode(frame: &[u8], options: DecodeOptions) -> Result<Self, DecodeError> {
        let mut builder = DocumentBuilder::new(DefaultDocumentFactory);
        ReplyMessage::<Value>::decode_with(frame, options, &mut builder)?.try_map(|value| match value {
            Value::Document(doc) => Ok(doc),
            _ => Err(DecodeError::TargetMismatch { expected: "document" }),
        })
    }
}

impl<T> ReplyMessage<T> {
    /// Decodes a complete reply frame, building each document with `builder`.
    pub fn decode_with<B>(frame: &[u8], options: DecodeOptions, builder: &mut B) -> Result<Self, DecodeError>
    where
        B: ObjectBuilder<Output = T>,
    {
        let mut reader = Reader::new(frame);
        let header = MessageHeader::read(&mut reader)?;
        if header.op_code != OpCode::Reply {
            return Err(DecodeError::UnexpectedOpCode {
                op_code: OpCode::Reply.as_i32(),
                found: header.op_code.as_i32(),
            });
        }
        check_message_length(header.message_length, options)?;
        if header.message_length as usize != frame.len() {
            return Err(DecodeError::InvalidLength {
                context: "message",
                len: header.message_length as i64,
            });
        }

        let response_flags = ResponseFlags::from_bits(reader.read_i32("response flags")?);
        let cursor_id = reader.read_i64("cursor id")?;
        let starting_from = reader.read_i32("starting from")?;
        let number_returned = reader.read_i32("number returned")?;
        if number_returned < 0 {
            return Err(DecodeError::InvalidLength {
                context: "number returned",
                len: number_returned as i64,
            });
        }

        let bson = BsonReader::new(options);
        // every document takes at least 5 bytes
        let mut documents = Vec::with_capacity((number_returned as usize).min(reader.remaining_len() / 5));
        while !reader.is_empty() {
            documents.push(bson.read_document(&mut reader, builder)?);
        }
        if documents.len() != number_returned as usize {
            return Err(DecodeError::MismatchedDocumentCount {
                declared: number_returned as usize,
                actual: documents.len(),
            });
        }

        debug!(
            request_id = header.request_id,
            response_to = header.response_to,
            documents = documents.len(),
            cursor_id,
            "parsed reply"
        );
        Ok(Self {
            header,
            response_flags,
            cursor_id,
            starting_from,
            number_returned,
            documents,
        })
    }

    /// Converts every document, stopping at the first failure.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<ReplyMessage<U>, E> {
        Ok(ReplyMessage {
            header: self.header,
            response_flags: self.response_flags,
            cursor_id: self.cursor_id,
            starting_from: self.starting_from,
            number_returned: self.number_returned,
            documents: self.documents.into_iter().map(f).collect::<Result<_, E>>()?,
        })
    }
}

impl<T: BsonObject> ReplyMessage<T> {
    /// Decodes a complete reply frame into registered application types.
    pub fn decode_objects(
        frame: &[u8],
        options: DecodeOptions,
        registry: &HandlerRegistry,
    ) -> Result<Self, DecodeError> {
        let mut builder = TypedBuilder::for_type::<T>(registry);
        ReplyMessage::<Built>::decode_with(frame, options, &mut builder)?.try_map(|built| {
            built.downcast::<T>().map_err(|_| DecodeError::TargetMismatch {
                expected: std::any::type_name::<T>(),
            })
        })
    }
}

fn check_message_length(len: i32, options: DecodeOptions) -> Result<usize, DecodeError> {
    if len < (HEADER_SIZE + REPLY_PREFIX_SIZE) as i32 {
        return Err(DecodeError::InvalidLength {
            context: "message",
            len: len as i64,
        });
    }
    let len = len as usize;
    if len > options.max_message_size {
        warn!(size = len, max = options.max_message_size, "reply exceeds maximum size");
        return Err(DecodeError::LengthExceedsLimit {
            field: "message",
            len,
            max: options.max_message_size,
        });
    }
    Ok(len)
}

/// Reads one length-prefixed reply frame, header included.
fn read_frame<R: Read>(source: &mut R, options: DecodeOptions) -> Result<Vec<u8>, DecodeError> {
    let mut header = [0u8; HEADER_SIZE];
    source.read_exact(&mut header)?;
    let parsed = MessageHeader::read(&mut Reader::new(&header))?;
    let len = check_message_length(parsed.message_length, options)?;

    let mut frame = vec![0u8; len];
    frame[..HEADER_SIZE].copy_from_slice(&header);
    source.read_exact(&mut frame[HEADER_SIZE..])?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Shape;
    use crate::codec::{encode_document, Writer};

    fn reply_frame(response_to: i32, cursor_id: i64, docs: &[Document], declared: i32) -> Vec<u8> {
        let mut body = Writer::new();
        body.write_i32(ResponseFlags::AWAIT_CAPABLE.bits());
        body.write_i64(cursor_id);
        body.write_i32(0);
        body.write_i32(declared);
        for doc in docs {
            body.write_bytes(&encode_document(doc).unwrap());
        }

        let mut out = Writer::new();
        MessageHeader {
            message_length: (HEADER_SIZE + body.len()) as i32,
            request_id: 99,
            response_to,
            op_code: OpCode::Reply,
        }
        .write(&mut out);
        out.write_bytes(body.as_bytes());
        out.into_bytes()
    }

    #[test]
    fn test_decode_reply() {
        let docs = [Document::new().append("a", 1), Document::new().append("b", "x")];
        let frame = reply_frame(7, 42, &docs, 2);

        let reply = ReplyMessage::decode(&frame, DecodeOptions::default()).unwrap();
        assert_eq!(reply.header.response_to, 7);
        assert_eq!(reply.cursor_id, 42);
        assert!(reply.response_flags.contains(ResponseFlags::AWAIT_CAPABLE));
        assert_eq!(reply.documents, docs);
    }

    #[test]
    fn test_read_from_stream() {
        let mut stream = reply_frame(1, 0, &[Document::new()], 1);
        stream.extend(reply_frame(2, 0, &[], 0));
        let mut source = std::io::Cursor::new(stream);

        let first = ReplyMessage::read_from(&mut source, DecodeOptions::default()).unwrap();
        assert_eq!(first.documents.len(), 1);
        let second = ReplyMessage::read_from(&mut source, DecodeOptions::default()).unwrap();
        assert_eq!(second.header.response_to, 2);
        assert!(second.documents.is_empty());
    }

    #[test]
    fn test_document_count_mismatch() {
        let frame = reply_frame(1, 0, &[Document::new()], 3);
        assert!(matches!(
            ReplyMessage::decode(&frame, DecodeOptions::default()),
            Err(DecodeError::MismatchedDocumentCount { declared: 3, actual: 1 })
        ));
    }

    #[test]
    fn test_length_checks() {
        let mut frame = reply_frame(1, 0, &[], 0);
        frame[0] = 20;
        assert!(matches!(
            ReplyMessage::decode(&frame, DecodeOptions::default()),
            Err(DecodeError::InvalidLength { len: 20, .. })
        ));

        let frame = reply_frame(1, 0, &[Document::new().append("a", 1)], 1);
        let options = DecodeOptions::new().with_max_message_size(40);
        assert!(matches!(
            ReplyMessage::decode(&frame, options),
            Err(DecodeError::LengthExceedsLimit { field: "message", .. })
        ));
    }

    #[test]
    fn test_wrong_op_code() {
        let mut frame = reply_frame(1, 0, &[], 0);
        frame[12..16].copy_from_slice(&OpCode::Query.as_i32().to_le_bytes());
        assert!(matches!(
            ReplyMessage::decode(&frame, DecodeOptions::default()),
            Err(DecodeError::UnexpectedOpCode { op_code: 1, found: 2004 })
        ));
    }

    #[derive(Debug, Default, PartialEq)]
    struct Count {
        n: i32,
    }

    impl BsonObject for Count {
        fn property_shape(&self, _name: &str) -> Shape {
            Shape::Scalar
        }

        fn set_property(&mut self, name: &str, value: Built) -> Result<(), Built> {
            match (name, value) {
                ("n", Built::Value(Value::Int32(n))) => self.n = n,
                (_, other) => return Err(other),
            }
            Ok(())
        }
    }

    #[test]
    fn test_typed_reply() {
        let docs = [Document::new().append("n", 3).append("ok", 1.0)];
        let frame = reply_frame(1, 0, &docs, 1);
        let mut registry = HandlerRegistry::new();
        registry.register::<Count>();

        let reply = ReplyMessage::<Count>::decode_objects(&frame, DecodeOptions::default(), &registry).unwrap();
        assert_eq!(reply.documents, vec![Count { n: 3 }]);
    }
}
