//! Data model types for BSON.
//!
//! This module contains the in-memory representation exchanged with the codec:
//! - Documents (ordered key/value containers)
//! - Values (the closed set of BSON value shapes)
//! - Object ids
//! - Element type tags and their registry

pub mod document;
pub mod element;
pub mod oid;
pub mod value;

pub use document::{
    ComparerDocumentFactory, DefaultDocumentFactory, Document, DocumentFactory, KeyComparer,
};
pub use element::{ElementType, TagDescriptor};
pub use oid::{ensure_id, DefaultObjectIdGenerator, ObjectId, ObjectIdGenerator};
pub use value::{Binary, BinarySubtype, Symbol, Value};
