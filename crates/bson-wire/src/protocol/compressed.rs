//! OP_COMPRESSED wrapping of framed messages.
//!
//! A compressed message keeps the original request id and response-to, and
//! carries the original op code, the uncompressed body size and a compressor
//! id in front of the compressed body.

use std::io::Read;

use tracing::debug;

use crate::codec::{DecodeOptions, EncodeOptions, Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{COMPRESSED_PREFIX_SIZE, HEADER_SIZE};
use crate::protocol::header::{MessageHeader, OpCode};

/// Compression algorithm of an OP_COMPRESSED body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Compressor {
    Noop = 0,
    Zstd = 3,
}

impl Compressor {
    pub fn from_u8(id: u8) -> Option<Compressor> {
        match id {
            0 => Some(Compressor::Noop),
            3 => Some(Compressor::Zstd),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Wraps a framed message in OP_COMPRESSED.
///
/// `level` is the zstd compression level and is ignored by `Noop`.
pub fn compress_message(
    frame: &[u8],
    compressor: Compressor,
    level: i32,
    options: EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    let (header, body) = split_own_frame(frame)?;

    let data = match compressor {
        Compressor::Noop => body.to_vec(),
        Compressor::Zstd => {
            zstd::encode_all(body, level).map_err(|e| EncodeError::CompressionFailed(e.to_string()))?
        }
    };

    let total = HEADER_SIZE + COMPRESSED_PREFIX_SIZE + data.len();
    let max = options.message_limit();
    if total > max {
        return Err(EncodeError::MessageTooLarge { size: total, max });
    }

    let mut out = Writer::with_capacity(total);
    MessageHeader {
        message_length: total as i32,
        op_code: OpCode::Compressed,
        ..header
    }
    .write(&mut out);
    out.write_i32(header.op_code.as_i32());
    out.write_i32(body.len() as i32);
    out.write_byte(compressor.id());
    out.write_bytes(&data);

    debug!(
        request_id = header.request_id,
        ?compressor,
        uncompressed = body.len(),
        compressed = data.len(),
        "compressed message"
    );
    Ok(out.into_bytes())
}

/// Splits a frame produced by this crate into its header and body.
fn split_own_frame(frame: &[u8]) -> Result<(MessageHeader, &[u8]), EncodeError> {
    let mismatch = |expected: usize| EncodeError::SizeMismatch {
        expected,
        actual: frame.len(),
    };
    let mut reader = Reader::new(frame);
    let header = MessageHeader::read(&mut reader).map_err(|_| mismatch(HEADER_SIZE))?;
    if header.message_length as usize != frame.len() {
        return Err(mismatch(header.message_length as usize));
    }
    Ok((header, reader.remaining()))
}

/// Restores the original message from an OP_COMPRESSED frame.
pub fn decompress_message(frame: &[u8], options: DecodeOptions) -> Result<Vec<u8>, DecodeError> {
    let mut reader = Reader::new(frame);
    let header = MessageHeader::read(&mut reader)?;
    if header.op_code != OpCode::Compressed {
        return Err(DecodeError::UnexpectedOpCode {
            op_code: OpCode::Compressed.as_i32(),
            found: header.op_code.as_i32(),
        });
    }
    if header.message_length as usize != frame.len()
        || frame.len() < HEADER_SIZE + COMPRESSED_PREFIX_SIZE
    {
        return Err(DecodeError::InvalidLength {
            context: "message",
            len: header.message_length as i64,
        });
    }

    let original = reader.read_i32("original op code")?;
    let original = OpCode::from_i32(original).ok_or(DecodeError::InvalidOpCode { op_code: original })?;
    let declared = reader.read_i32("uncompressed size")?;
    if declared < 0 {
        return Err(DecodeError::InvalidLength {
            context: "uncompressed size",
            len: declared as i64,
        });
    }
    let declared = declared as usize;
    if HEADER_SIZE + declared > options.max_message_size {
        return Err(DecodeError::LengthExceedsLimit {
            field: "uncompressed size",
            len: HEADER_SIZE + declared,
            max: options.max_message_size,
        });
    }
    let id = reader.read_byte("compressor")?;
    let compressor = Compressor::from_u8(id).ok_or(DecodeError::UnsupportedCompressor { id })?;
    let data = reader.remaining();

    let body = match compressor {
        Compressor::Noop => data.to_vec(),
        Compressor::Zstd => {
            let decoder =
                zstd::Decoder::new(data).map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;
            let mut body = Vec::with_capacity(declared);
            // one extra byte so an oversized body is detected without reading it all
            decoder
                .take(declared as u64 + 1)
                .read_to_end(&mut body)
                .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;
            body
        }
    };
    if body.len() != declared {
        return Err(DecodeError::UncompressedSizeMismatch {
            declared,
            actual: body.len(),
        });
    }

    let total = HEADER_SIZE + declared;
    let mut out = Writer::with_capacity(total);
    MessageHeader {
        message_length: total as i32,
        op_code: original,
        ..header
    }
    .write(&mut out);
    out.write_bytes(&body);
    Ok(out.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;
    use crate::protocol::reply::ReplyMessage;
    use crate::protocol::request::{InsertBody, RequestMessage};

    fn insert_frame() -> Vec<u8> {
        let docs = (0..20)
            .map(|i| Document::new().append("i", i).append("text", "lorem ipsum dolor"))
            .collect();
        RequestMessage::with_request_id(5, InsertBody::new("db.c", docs))
            .encode(EncodeOptions::default())
            .unwrap()
    }

    #[test]
    fn test_zstd_restores_original() {
        let frame = insert_frame();
        let compressed = compress_message(&frame, Compressor::Zstd, 3, EncodeOptions::default()).unwrap();
        assert!(compressed.len() < frame.len());

        let header = MessageHeader::read(&mut Reader::new(&compressed)).unwrap();
        assert_eq!(header.op_code, OpCode::Compressed);
        assert_eq!(header.request_id, 5);

        let restored = decompress_message(&compressed, DecodeOptions::default()).unwrap();
        assert_eq!(restored, frame);
    }

    #[test]
    fn test_noop_layout() {
        let frame = insert_frame();
        let wrapped = compress_message(&frame, Compressor::Noop, 0, EncodeOptions::default()).unwrap();
        assert_eq!(wrapped.len(), frame.len() + COMPRESSED_PREFIX_SIZE);
        assert_eq!(&wrapped[16..20], &OpCode::Insert.as_i32().to_le_bytes());
        assert_eq!(&wrapped[20..24], &((frame.len() - HEADER_SIZE) as i32).to_le_bytes());
        assert_eq!(wrapped[24], 0);
        assert_eq!(&wrapped[25..], &frame[HEADER_SIZE..]);
    }

    #[test]
    fn test_unsupported_compressor() {
        let frame = insert_frame();
        let mut wrapped = compress_message(&frame, Compressor::Noop, 0, EncodeOptions::default()).unwrap();
        wrapped[24] = 2;
        let err = decompress_message(&wrapped, DecodeOptions::default()).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedCompressor { id: 2 });
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedType);
    }

    #[test]
    fn test_declared_size_mismatch() {
        let frame = insert_frame();
        let mut wrapped = compress_message(&frame, Compressor::Zstd, 1, EncodeOptions::default()).unwrap();
        let declared = (frame.len() - HEADER_SIZE - 1) as i32;
        wrapped[20..24].copy_from_slice(&declared.to_le_bytes());
        assert!(matches!(
            decompress_message(&wrapped, DecodeOptions::default()),
            Err(DecodeError::UncompressedSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_compressed_reply_decodes() {
        let mut body = Writer::new();
        body.write_i32(0);
        body.write_i64(0);
        body.write_i32(0);
        body.write_i32(1);
        body.write_bytes(&crate::codec::encode_document(&Document::new().append("ok", 1)).unwrap());
        let mut frame = Writer::new();
        MessageHeader {
            message_length: (HEADER_SIZE + body.len()) as i32,
            request_id: 1,
            response_to: 5,
            op_code: OpCode::Reply,
        }
        .write(&mut frame);
        frame.write_bytes(body.as_bytes());

        let wrapped =
            compress_message(frame.as_bytes(), Compressor::Zstd, 3, EncodeOptions::default()).unwrap();
        let restored = decompress_message(&wrapped, DecodeOptions::default()).unwrap();
        let reply = ReplyMessage::decode(&restored, DecodeOptions::default()).unwrap();
        assert_eq!(reply.header.response_to, 5);
        assert_eq!(reply.documents.len(), 1);
    }
}
