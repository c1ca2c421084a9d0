//! bson-wire: BSON codec and wire-protocol framing for document database drivers.
//!
//! This crate converts an ordered, dynamically typed document model to and
//! from BSON, and wraps encoded documents in the length-prefixed messages of
//! the legacy wire protocol.
//!
//! # Overview
//!
//! - **Byte-exact**: little-endian integers, UTF-8 strings with byte-counted
//!   lengths, every document prefixed with its own total length
//! - **Two-pass encoding**: sizes are computed before any byte is written, so
//!   oversized documents and messages are rejected without touching the sink
//! - **Builder-driven decoding**: the decoder reports structure to an
//!   [`ObjectBuilder`], which produces either dynamic documents or
//!   application types
//!
//! # Quick Start
//!
//! ```rust
//! use bson_wire::{decode_document, encode_document, Document, Value};
//! use bson_wire::protocol::{InsertBody, RequestMessage};
//! use bson_wire::EncodeOptions;
//!
//! let doc = Document::new()
//!     .append("name", "Alice")
//!     .append("age", 30)
//!     .append("tags", Value::array(["admin", "ops"]));
//!
//! // Encode to BSON
//! let bytes = encode_document(&doc).unwrap();
//! assert_eq!(&bytes[0..4], &(bytes.len() as i32).to_le_bytes());
//!
//! // Decode back
//! let decoded = decode_document(&bytes).unwrap();
//! assert_eq!(decoded, doc);
//!
//! // Frame as an insert
//! let mut message = RequestMessage::new(InsertBody::new("app.users", vec![doc]));
//! let mut sink = Vec::new();
//! let written = message.write(&mut sink, EncodeOptions::default()).unwrap();
//! assert_eq!(written, sink.len());
//! assert_eq!(message.header.message_length as usize, written);
//! ```
//!
//! # Modules
//!
//! - [`model`]: Documents, values, object ids and the element type registry
//! - [`codec`]: BSON encoding and decoding
//! - [`builder`]: Builders the decoder drives (dynamic and typed)
//! - [`protocol`]: Message header, requests, replies, compression
//! - [`validate`]: Key rules for stored documents
//! - [`error`]: Error types
//! - [`limits`]: Size limits and wire constants
//!
//! # Security
//!
//! The decoder is designed to handle untrusted input:
//! - Declared lengths are checked against the remaining input and the
//!   configured limits before anything is allocated
//! - Nesting depth is bounded and decoding never recurses per level
//! - Invalid data is rejected with descriptive errors

pub mod builder;
pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod protocol;
pub mod validate;

// Re-export commonly used types at crate root
pub use builder::{BsonObject, Built, DocumentBuilder, HandlerRegistry, ObjectBuilder, Shape, TypedBuilder};
pub use codec::{
    calculate_document_size, calculate_size, decode_document, encode_document, BsonReader,
    BsonWriter, DecodeOptions, EncodeOptions,
};
pub use error::{DecodeError, EncodeError, ErrorKind};
pub use model::{
    ensure_id, Binary, BinarySubtype, ComparerDocumentFactory, DefaultDocumentFactory,
    DefaultObjectIdGenerator, Document, DocumentFactory, ElementType, ObjectId, ObjectIdGenerator,
    Symbol, Value,
};
pub use validate::{validate_keys, KeyPolicy};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
