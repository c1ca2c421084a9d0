//! Wire-format constants and default size limits.

/// Default maximum encoded size of a single document (4 MiB).
///
/// A document whose encoded size reaches this value is rejected.
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 4 * 1024 * 1024;

/// Default maximum size of a full wire message, header included (4 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Largest length an int32 length prefix can carry.
///
/// Configured limits above this are clamped to it.
pub const MAX_WIRE_LENGTH: usize = i32::MAX as usize;

/// Maximum nesting depth of documents, arrays and scopes accepted by the decoder.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Size of the fixed message header: length, request id, response-to, op code.
pub const HEADER_SIZE: usize = 16;

/// Smallest possible encoded document: length prefix plus terminator.
pub const MIN_DOCUMENT_SIZE: usize = 5;

/// Size of an object id on the wire.
pub const OBJECT_ID_LEN: usize = 12;

/// Fixed part of an OP_REPLY body: flags, cursor id, starting-from, number-returned.
pub const REPLY_PREFIX_SIZE: usize = 20;

/// Fixed part of an OP_COMPRESSED body: original op code, uncompressed size, compressor id.
pub const COMPRESSED_PREFIX_SIZE: usize = 9;
