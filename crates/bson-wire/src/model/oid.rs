//! 12-byte object identifiers.
//!
//! Layout: 4-byte big-endian seconds since the epoch, 3-byte machine hash,
//! 2-byte process id, 3-byte big-endian counter.
//!
//! Generating ids is the caller's policy. The codec only needs the bytes; the
//! [`ObjectIdGenerator`] trait is the seam where a driver plugs its generator
//! in, and [`DefaultObjectIdGenerator`] is a ready-made one.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use sha2::{Digest, Sha256};

use crate::limits::OBJECT_ID_LEN;
use crate::model::{Document, Value};

/// A 12-byte object identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId([u8; OBJECT_ID_LEN]);

impl ObjectId {
    pub const fn from_bytes(bytes: [u8; OBJECT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; OBJECT_ID_LEN] {
        self.0
    }

    /// Seconds since the Unix epoch encoded in the first four bytes.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Parses a 24-character hex string.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != OBJECT_ID_LEN * 2 {
            return None;
        }
        let mut out = [0u8; OBJECT_ID_LEN];
        for (i, chunk) in bytes.chunks_exact(2).enumerate() {
            let hi = hex_digit(chunk[0])?;
            let lo = hex_digit(chunk[1])?;
            out[i] = (hi << 4) | lo;
        }
        Some(Self(out))
    }

    /// Formats as 24 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(OBJECT_ID_LEN * 2);
        for b in self.0 {
            s.push(HEX_CHARS[(b >> 4) as usize] as char);
            s.push(HEX_CHARS[(b & 0x0F) as usize] as char);
        }
        s
    }
}

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

/// Source of fresh object ids.
pub trait ObjectIdGenerator {
    fn generate(&self) -> ObjectId;
}

lazy_static! {
    static ref MACHINE_HASH: [u8; 3] = machine_hash();
    static ref COUNTER: AtomicU32 = AtomicU32::new(initial_counter());
}

/// Derives the 3-byte machine part from the host name.
fn machine_hash() -> [u8; 3] {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string());
    let hash = Sha256::digest(host.as_bytes());
    [hash[0], hash[1], hash[2]]
}

fn initial_counter() -> u32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    nanos & 0x00FF_FFFF
}

/// Generator using the standard timestamp/machine/pid/counter layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultObjectIdGenerator;

impl ObjectIdGenerator for DefaultObjectIdGenerator {
    fn generate(&self) -> ObjectId {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let pid = (std::process::id() & 0xFFFF) as u16;
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF;

        let mut bytes = [0u8; OBJECT_ID_LEN];
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..7].copy_from_slice(&*MACHINE_HASH);
        bytes[7..9].copy_from_slice(&pid.to_be_bytes());
        bytes[9..12].copy_from_slice(&count.to_be_bytes()[1..]);
        ObjectId(bytes)
    }
}

/// Assigns a generated `_id` to a document that has none.
///
/// The new id is placed first. Returns the document's id, generated or not.
pub fn ensure_id(doc: &mut Document, generator: &dyn ObjectIdGenerator) -> Value {
    if let Some(id) = doc.get("_id") {
        return id.clone();
    }
    let id = Value::ObjectId(generator.generate());
    doc.prepend("_id", id.clone());
    id
}
