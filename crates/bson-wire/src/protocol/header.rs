//! Standard message header shared by every request and reply.

use std::io::Read;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::codec::{Reader, Writer};
use crate::error::DecodeError;
use crate::limits::HEADER_SIZE;

/// Message kind carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OpCode {
    Reply = 1,
    Update = 2001,
    Insert = 2002,
    Query = 2004,
    GetMore = 2005,
    Delete = 2006,
    KillCursors = 2007,
    Compressed = 2012,
}

impl OpCode {
    pub fn from_i32(v: i32) -> Option<OpCode> {
        match v {
            1 => Some(OpCode::Reply),
            2001 => Some(OpCode::Update),
            2002 => Some(OpCode::Insert),
            2004 => Some(OpCode::Query),
            2005 => Some(OpCode::GetMore),
            2006 => Some(OpCode::Delete),
            2007 => Some(OpCode::KillCursors),
            2012 => Some(OpCode::Compressed),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

static NEXT_REQUEST_ID: AtomicI32 = AtomicI32::new(1);

/// Returns a process-wide unique request id.
pub fn next_request_id() -> i32 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// The 16-byte header preceding every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Total message size including the header. Set when the message is written.
    pub message_length: i32,
    pub request_id: i32,
    /// Request id this message answers; zero for requests.
    pub response_to: i32,
    pub op_code: OpCode,
}

impl MessageHeader {
    pub fn new(request_id: i32, op_code: OpCode) -> Self {
        Self {
            message_length: HEADER_SIZE as i32,
            request_id,
            response_to: 0,
            op_code,
        }
    }

    /// Header for a new request with a fresh request id.
    pub fn for_request(op_code: OpCode) -> Self {
        Self::new(next_request_id(), op_code)
    }

    pub fn write(&self, out: &mut Writer) {
        out.write_i32(self.message_length);
        out.write_i32(self.request_id);
        out.write_i32(self.response_to);
        out.write_i32(self.op_code.as_i32());
    }

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let message_length = reader.read_i32("message length")?;
        let request_id = reader.read_i32("request id")?;
        let response_to = reader.read_i32("response to")?;
        let op_code = reader.read_i32("op code")?;
        let op_code = OpCode::from_i32(op_code).ok_or(DecodeError::InvalidOpCode { op_code })?;
        Ok(Self {
            message_length,
            request_id,
            response_to,
            op_code,
        })
    }

    /// Reads a header from a stream.
    pub fn read_from<R: Read>(source: &mut R) -> Result<Self, DecodeError> {
        let mut bytes = [0u8; HEADER_SIZE];
        source.read_exact(&mut bytes)?;
        Self::read(&mut Reader::new(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = MessageHeader {
            message_length: 100,
            request_id: 7,
            response_to: 3,
            op_code: OpCode::Insert,
        };
        let mut out = Writer::new();
        header.write(&mut out);
        assert_eq!(hex::encode(out.as_bytes()), "640000000700000003000000d2070000");

        let parsed = MessageHeader::read(&mut Reader::new(out.as_bytes())).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_unknown_op_code() {
        let mut out = Writer::new();
        out.write_i32(16);
        out.write_i32(1);
        out.write_i32(0);
        out.write_i32(2003);
        assert!(matches!(
            MessageHeader::read(&mut Reader::new(out.as_bytes())),
            Err(DecodeError::InvalidOpCode { op_code: 2003 })
        ));
    }

    #[test]
    fn test_request_ids_increase() {
        let a = next_request_id();
        let b = next_request_id();
        assert!(b > a);
        assert_ne!(MessageHeader::for_request(OpCode::Query).request_id, a);
    }
}
