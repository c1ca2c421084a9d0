//! Size limits consumed by the encoder, decoder and framing layer.

use crate::limits::{
    DEFAULT_MAX_DOCUMENT_SIZE, DEFAULT_MAX_MESSAGE_SIZE, MAX_NESTING_DEPTH, MAX_WIRE_LENGTH,
};

/// Options for encoding documents and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// A top-level document whose encoded size reaches this value is rejected.
    pub max_document_size: usize,
    /// A framed message larger than this is rejected.
    pub max_message_size: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl EncodeOptions {
    /// Creates options with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_document_size(mut self, max: usize) -> Self {
        self.max_document_size = max;
        self
    }

    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    /// Document limit actually enforced, clamped so every accepted size fits
    /// an int32 length prefix.
    pub fn document_limit(&self) -> usize {
        self.max_document_size.min(MAX_WIRE_LENGTH)
    }

    /// Message limit actually enforced, clamped like [`Self::document_limit`].
    pub fn message_limit(&self) -> usize {
        self.max_message_size.min(MAX_WIRE_LENGTH)
    }
}

/// Options for decoding documents and replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Declared document lengths above this are rejected before reading.
    pub max_document_size: usize,
    /// Declared message lengths above this are rejected before reading.
    pub max_message_size: usize,
    /// Maximum nesting of documents, arrays and scopes.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_depth: MAX_NESTING_DEPTH,
        }
    }
}

impl DecodeOptions {
    /// Creates options with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_document_size(mut self, max: usize) -> Self {
        self.max_document_size = max;
        self
    }

    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }
}
