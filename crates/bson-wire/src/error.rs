//! Error types for BSON encoding/decoding and message framing.

use thiserror::Error;

use crate::model::ElementType;

/// Broad error categories reported to the surrounding driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value has no wire mapping for the requested tag.
    UnsupportedType,
    /// A document's encoded size reached the per-document limit.
    DocumentTooLarge,
    /// A full message exceeded the per-message limit.
    MessageTooLarge,
    /// Input bytes are not valid BSON or not a valid frame.
    MalformedInput,
    /// The sink or source failed. Connection-fatal.
    Io,
    /// Computed and written sizes disagreed. Connection-fatal.
    Internal,
}

impl ErrorKind {
    /// Returns true if the connection that produced this error must be dropped.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, ErrorKind::Io | ErrorKind::Internal)
    }
}

/// Error during binary encoding or message framing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("unsupported type: cannot write {value_type} value for key {key:?} as {requested:?}")]
    UnsupportedType {
        key: String,
        value_type: &'static str,
        requested: ElementType,
    },

    #[error("document size {size} reaches maximum document size {max}")]
    DocumentTooLarge { size: usize, max: usize },

    #[error("message size {size} exceeds maximum message size {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("key {key:?} contains a null byte")]
    InvalidKey { key: String },

    #[error("{context} {value:?} contains a null byte")]
    InvalidCString { context: &'static str, value: String },

    #[error("key {key:?} is not allowed: {reason}")]
    InvalidKeyName { key: String, reason: &'static str },

    #[error("computed size {expected} does not match written size {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("zstd compression failed: {0}")]
    CompressionFailed(String),

    #[error("sink write failed: {0}")]
    Io(String),
}

impl EncodeError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EncodeError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            EncodeError::DocumentTooLarge { .. } => ErrorKind::DocumentTooLarge,
            EncodeError::MessageTooLarge { .. } => ErrorKind::MessageTooLarge,
            EncodeError::Io(_) => ErrorKind::Io,
            EncodeError::SizeMismatch { .. } | EncodeError::CompressionFailed(_) => {
                ErrorKind::Internal
            }
            EncodeError::InvalidKey { .. }
            | EncodeError::InvalidCString { .. }
            | EncodeError::InvalidKeyName { .. } => ErrorKind::UnsupportedType,
        }
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(err: std::io::Error) -> Self {
        EncodeError::Io(err.to_string())
    }
}

/// Error during binary decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("invalid element tag 0x{tag:02x} for key {key:?}")]
    InvalidTag { tag: u8, key: String },

    #[error("element tag {element_type:?} for key {key:?} is not supported")]
    UnsupportedTag { element_type: ElementType, key: String },

    #[error("invalid {context} length {len}")]
    InvalidLength { context: &'static str, len: i64 },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("missing null terminator in {context}")]
    MissingTerminator { context: &'static str },

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("invalid boolean byte {value} (expected 0x00 or 0x01)")]
    InvalidBool { value: u8 },

    #[error("nesting depth exceeds maximum {max}")]
    DepthExceeded { max: usize },

    #[error("{count} trailing bytes after {context}")]
    TrailingBytes { context: &'static str, count: usize },

    #[error("invalid op code {op_code}")]
    InvalidOpCode { op_code: i32 },

    #[error("expected {op_code} reply, found op code {found}")]
    UnexpectedOpCode { op_code: i32, found: i32 },

    #[error("reply declared {declared} documents but contained {actual}")]
    MismatchedDocumentCount { declared: usize, actual: usize },

    #[error("builder expected {expected} at the root")]
    TargetMismatch { expected: &'static str },

    #[error("zstd decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("decompressed size {actual} doesn't match declared {declared}")]
    UncompressedSizeMismatch { declared: usize, actual: usize },

    #[error("unsupported compressor id {id}")]
    UnsupportedCompressor { id: u8 },

    #[error("source read failed: {0}")]
    Io(String),
}

impl DecodeError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::Io(_) => ErrorKind::Io,
            DecodeError::UnsupportedCompressor { .. } => ErrorKind::UnsupportedType,
            _ => ErrorKind::MalformedInput,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            DecodeError::UnexpectedEof { context: "source" }
        } else {
            DecodeError::Io(err.to_string())
        }
    }
}
