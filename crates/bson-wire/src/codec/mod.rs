//! Binary encoding/decoding for BSON documents.

pub mod decode;
pub mod encode;
pub mod options;
pub mod primitives;

pub use decode::{decode_document, BsonReader};
pub use encode::{
    calculate_document_size, calculate_element_size, calculate_size, encode_document,
    encode_document_with_options, write_document_to, BsonWriter,
};
pub use options::{DecodeOptions, EncodeOptions};
pub use primitives::{cstring_size, string_size, Reader, Writer};
