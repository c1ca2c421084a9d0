//! Request messages.
//!
//! Every request is a [`MessageHeader`] followed by an op-specific body. A
//! message is framed in two passes: the body size is computed first, the total
//! is checked against the message limit, and only then is the message
//! serialized into a buffer of exactly that size and handed to the sink.

use std::io::Write;

use tracing::{debug, warn};

use crate::codec::{calculate_document_size, cstring_size, BsonWriter, EncodeOptions, Writer};
use crate::error::EncodeError;
use crate::limits::HEADER_SIZE;
use crate::model::Document;
use crate::protocol::flags::{DeleteFlags, InsertFlags, QueryFlags, UpdateFlags};
use crate::protocol::header::{next_request_id, MessageHeader, OpCode};
use crate::validate::{validate_keys, KeyPolicy};

// =============================================================================
// FRAMING
// =============================================================================

/// The op-specific part of a request.
pub trait RequestBody {
    fn op_code(&self) -> OpCode;

    /// Exact number of bytes [`write_body`](Self::write_body) produces.
    fn calculate_body_size(&self) -> usize;

    fn write_body(&self, writer: &BsonWriter, out: &mut Writer) -> Result<(), EncodeError>;
}

/// A header and body ready to be framed.
#[derive(Debug, Clone)]
pub struct RequestMessage<B> {
    pub header: MessageHeader,
    pub body: B,
}

impl<B: RequestBody> RequestMessage<B> {
    /// Wraps `body` with a fresh request id.
    pub fn new(body: B) -> Self {
        Self::with_request_id(next_request_id(), body)
    }

    pub fn with_request_id(request_id: i32, body: B) -> Self {
        Self {
            header: MessageHeader::new(request_id, body.op_code()),
            body,
        }
    }

    /// Serializes the whole message.
    ///
    /// On success `header.message_length` holds the framed size.
    pub fn encode(&mut self, options: EncodeOptions) -> Result<Vec<u8>, EncodeError> {
        let total = HEADER_SIZE + self.body.calculate_body_size();
        let max = options.message_limit();
        if total > max {
            warn!(
                op_code = ?self.header.op_code,
                size = total,
                max,
                "message exceeds maximum size"
            );
            return Err(EncodeError::MessageTooLarge { size: total, max });
        }

        let mut out = Writer::with_capacity(total);
        let header = MessageHeader {
            message_length: total as i32,
            ..self.header
        };
        header.write(&mut out);
        self.body.write_body(&BsonWriter::new(options), &mut out)?;
        if out.len() != total {
            return Err(EncodeError::SizeMismatch {
                expected: total,
                actual: out.len(),
            });
        }

        self.header = header;
        debug!(
            request_id = header.request_id,
            op_code = ?header.op_code,
            size = total,
            "framed request"
        );
        Ok(out.into_bytes())
    }

    /// Frames the message and writes it to `sink`.
    ///
    /// Nothing reaches the sink unless the whole message was framed.
    pub fn write<W: Write>(&mut self, sink: &mut W, options: EncodeOptions) -> Result<usize, EncodeError> {
        let bytes = self.encode(options)?;
        sink.write_all(&bytes)?;
        Ok(bytes.len())
    }
}

fn documents_size<'a>(docs: impl IntoIterator<Item = &'a Document>) -> usize {
    docs.into_iter().map(calculate_document_size).sum()
}

// =============================================================================
// BODIES
// =============================================================================

/// OP_INSERT: flags, collection, documents.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertBody {
    pub flags: InsertFlags,
    /// Full collection name, `database.collection`.
    pub collection: String,
    pub documents: Vec<Document>,
}

impl InsertBody {
    pub fn new(collection: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            flags: InsertFlags::NONE,
            collection: collection.into(),
            documents,
        }
    }

    /// Like [`new`](Self::new), rejecting documents whose keys can't be stored.
    pub fn validated(collection: impl Into<String>, documents: Vec<Document>) -> Result<Self, EncodeError> {
        for doc in &documents {
            validate_keys(doc, KeyPolicy::Storage)?;
        }
        Ok(Self::new(collection, documents))
    }

    /// Splits a batch into inserts that each fit the message limit.
    ///
    /// Document order is preserved. A document that reaches the document limit,
    /// or can't fit a message on its own, fails the whole split.
    pub fn split(
        collection: impl Into<String>,
        documents: Vec<Document>,
        options: EncodeOptions,
    ) -> Result<Vec<InsertBody>, EncodeError> {
        let collection = collection.into();
        let base = HEADER_SIZE + 4 + cstring_size(&collection);

        let mut batches = Vec::new();
        let mut current = Vec::new();
        let mut current_size = base;
        let max_document = options.document_limit();
        let max_message = options.message_limit();
        for doc in documents {
            let size = calculate_document_size(&doc);
            if size >= max_document {
                return Err(EncodeError::DocumentTooLarge {
                    size,
                    max: max_document,
                });
            }
            if base + size > max_message {
                return Err(EncodeError::MessageTooLarge {
                    size: base + size,
                    max: max_message,
                });
            }
            if current_size + size > max_message {
                batches.push(InsertBody::new(collection.clone(), std::mem::take(&mut current)));
                current_size = base;
            }
            current_size += size;
            current.push(doc);
        }
        if !current.is_empty() {
            batches.push(InsertBody::new(collection, current));
        }

        debug!(batches = batches.len(), "split insert batch");
        Ok(batches)
    }
}

impl RequestBody for InsertBody {
    fn op_code(&self) -> OpCode {
        OpCode::Insert
    }

    fn calculate_body_size(&self) -> usize {
        4 + cstring_size(&self.collection) + documents_size(&self.documents)
    }

    fn write_body(&self, writer: &BsonWriter, out: &mut Writer) -> Result<(), EncodeError> {
        out.write_i32(self.flags.bits());
        writer.write_cstring(out, &self.collection)?;
        for doc in &self.documents {
            writer.write_document(out, doc)?;
        }
        Ok(())
    }
}

/// OP_UPDATE: reserved zero, collection, flags, selector, update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateBody {
    pub collection: String,
    pub flags: UpdateFlags,
    pub selector: Document,
    pub update: Document,
}

impl UpdateBody {
    pub fn new(collection: impl Into<String>, selector: Document, update: Document) -> Self {
        Self {
            collection: collection.into(),
            flags: UpdateFlags::NONE,
            selector,
            update,
        }
    }

    pub fn with_flags(mut self, flags: UpdateFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl RequestBody for UpdateBody {
    fn op_code(&self) -> OpCode {
        OpCode::Update
    }

    fn calculate_body_size(&self) -> usize {
        4 + cstring_size(&self.collection)
            + 4
            + documents_size([&self.selector, &self.update])
    }

    fn write_body(&self, writer: &BsonWriter, out: &mut Writer) -> Result<(), EncodeError> {
        out.write_i32(0);
        writer.write_cstring(out, &self.collection)?;
        out.write_i32(self.flags.bits());
        writer.write_document(out, &self.selector)?;
        writer.write_document(out, &self.update)
    }
}

/// OP_DELETE: reserved zero, collection, flags, selector.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteBody {
    pub collection: String,
    pub flags: DeleteFlags,
    pub selector: Document,
}

impl DeleteBody {
    pub fn new(collection: impl Into<String>, selector: Document) -> Self {
        Self {
            collection: collection.into(),
            flags: DeleteFlags::NONE,
            selector,
        }
    }

    pub fn with_flags(mut self, flags: DeleteFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl RequestBody for DeleteBody {
    fn op_code(&self) -> OpCode {
        OpCode::Delete
    }

    fn calculate_body_size(&self) -> usize {
        4 + cstring_size(&self.collection) + 4 + calculate_document_size(&self.selector)
    }

    fn write_body(&self, writer: &BsonWriter, out: &mut Writer) -> Result<(), EncodeError> {
        out.write_i32(0);
        writer.write_cstring(out, &self.collection)?;
        out.write_i32(self.flags.bits());
        writer.write_document(out, &self.selector)
    }
}

/// OP_QUERY: flags, collection, skip, limit, selector, optional projection.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBody {
    pub flags: QueryFlags,
    pub collection: String,
    pub skip: i32,
    /// Batch size requested; negative closes the cursor after one batch.
    pub limit: i32,
    pub selector: Document,
    pub projection: Option<Document>,
}

impl QueryBody {
    pub fn new(collection: impl Into<String>, selector: Document) -> Self {
        Self {
            flags: QueryFlags::NONE,
            collection: collection.into(),
            skip: 0,
            limit: 0,
            selector,
            projection: None,
        }
    }

    pub fn with_flags(mut self, flags: QueryFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_skip(mut self, skip: i32) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }
}

impl RequestBody for QueryBody {
    fn op_code(&self) -> OpCode {
        OpCode::Query
    }

    fn calculate_body_size(&self) -> usize {
        4 + cstring_size(&self.collection)
            + 4
            + 4
            + calculate_document_size(&self.selector)
            + documents_size(&self.projection)
    }

    fn write_body(&self, writer: &BsonWriter, out: &mut Writer) -> Result<(), EncodeError> {
        out.write_i32(self.flags.bits());
        writer.write_cstring(out, &self.collection)?;
        out.write_i32(self.skip);
        out.write_i32(self.limit);
        writer.write_document(out, &self.selector)?;
        if let Some(projection) = &self.projection {
            writer.write_document(out, projection)?;
        }
        Ok(())
    }
}

/// OP_GET_MORE: reserved zero, collection, limit, cursor id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetMoreBody {
    pub collection: String,
    pub limit: i32,
    pub cursor_id: i64,
}

impl GetMoreBody {
    pub fn new(collection: impl Into<String>, limit: i32, cursor_id: i64) -> Self {
        Self {
            collection: collection.into(),
            limit,
            cursor_id,
        }
    }
}

impl RequestBody for GetMoreBody {
    fn op_code(&self) -> OpCode {
        OpCode::GetMore
    }

    fn calculate_body_size(&self) -> usize {
        4 + cstring_size(&self.collection) + 4 + 8
    }

    fn write_body(&self, writer: &BsonWriter, out: &mut Writer) -> Result<(), EncodeError> {
        out.write_i32(0);
        writer.write_cstring(out, &self.collection)?;
        out.write_i32(self.limit);
        out.write_i64(self.cursor_id);
        Ok(())
    }
}

/// OP_KILL_CURSORS: reserved zero, count, cursor ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillCursorsBody {
    pub cursor_ids: Vec<i64>,
}

impl KillCursorsBody {
    pub fn new(cursor_ids: Vec<i64>) -> Self {
        Self { cursor_ids }
    }
}

impl RequestBody for KillCursorsBody {
    fn op_code(&self) -> OpCode {
        OpCode::KillCursors
    }

    fn calculate_body_size(&self) -> usize {
        4 + 4 + 8 * self.cursor_ids.len()
    }

    fn write_body(&self, _writer: &BsonWriter, out: &mut Writer) -> Result<(), EncodeError> {
        out.write_i32(0);
        out.write_i32(self.cursor_ids.len() as i32);
        for id in &self.cursor_ids {
            out.write_i64(*id);
        }
        Ok(())
    }
}
