//! Legacy wire-protocol framing.
//!
//! Every message is a 16-byte [`MessageHeader`] followed by a body:
//! - requests implement [`RequestBody`] and are framed by [`RequestMessage`]
//! - replies are parsed by [`ReplyMessage`]
//! - either may be wrapped in OP_COMPRESSED with [`compress_message`]
//!
//! Transport is not handled here. Requests are written to any
//! [`std::io::Write`] sink and replies read from any [`std::io::Read`] source.

pub mod compressed;
pub mod flags;
pub mod header;
pub mod reply;
pub mod request;

pub use compressed::{compress_message, decompress_message, Compressor};
pub use flags::{DeleteFlags, InsertFlags, QueryFlags, ResponseFlags, UpdateFlags};
pub use header::{next_request_id, MessageHeader, OpCode};
pub use reply::ReplyMessage;
pub use request::{
    DeleteBody, GetMoreBody, InsertBody, KillCursorsBody, QueryBody, RequestBody, RequestMessage,
    UpdateBody,
};
