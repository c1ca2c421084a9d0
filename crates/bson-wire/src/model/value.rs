//! The dynamically-typed BSON value.

use crate::model::{Document, ElementType, ObjectId};

/// Binary sub-types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinarySubtype {
    Generic,
    Function,
    /// Legacy generic binary. Carries an extra inner int32 length on the wire.
    BinaryOld,
    UuidOld,
    Uuid,
    Md5,
    /// 0x80..=0xFF
    UserDefined(u8),
    /// Any other byte, preserved as-is.
    Reserved(u8),
}

impl BinarySubtype {
    /// Creates a BinarySubtype from its wire representation.
    pub fn from_u8(v: u8) -> BinarySubtype {
        match v {
            0x00 => BinarySubtype::Generic,
            0x01 => BinarySubtype::Function,
            0x02 => BinarySubtype::BinaryOld,
            0x03 => BinarySubtype::UuidOld,
            0x04 => BinarySubtype::Uuid,
            0x05 => BinarySubtype::Md5,
            0x80..=0xFF => BinarySubtype::UserDefined(v),
            _ => BinarySubtype::Reserved(v),
        }
    }

    /// Returns the wire byte.
    pub fn as_u8(self) -> u8 {
        match self {
            BinarySubtype::Generic => 0x00,
            BinarySubtype::Function => 0x01,
            BinarySubtype::BinaryOld => 0x02,
            BinarySubtype::UuidOld => 0x03,
            BinarySubtype::Uuid => 0x04,
            BinarySubtype::Md5 => 0x05,
            BinarySubtype::UserDefined(v) | BinarySubtype::Reserved(v) => v,
        }
    }
}

/// A binary blob with its sub-type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    pub subtype: BinarySubtype,
    pub bytes: Vec<u8>,
}

impl Binary {
    /// Creates a generic (subtype 0x00) binary.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype: BinarySubtype::Generic,
            bytes: bytes.into(),
        }
    }

    /// Creates a binary with an explicit subtype.
    pub fn with_subtype(subtype: BinarySubtype, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype,
            bytes: bytes.into(),
        }
    }
}

/// Marker for text that should be written with the symbol tag instead of the
/// string tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(pub String);

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol(s.to_string())
    }
}

/// A BSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit IEEE 754 float. Single-precision inputs are widened into this.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Embedded document.
    Document(Document),
    /// Array, stored as a document keyed "0", "1", ...
    Array(Document),
    /// Binary blob.
    Binary(Binary),
    Boolean(bool),
    /// UTC datetime in milliseconds since the Unix epoch.
    DateTime(i64),
    Null,
    Regex { pattern: String, options: String },
    /// Symbol: same bytes as a string, different tag.
    Symbol(String),
    /// JavaScript source.
    Code(String),
    /// JavaScript source with a scope of bound variables.
    CodeWithScope { code: String, scope: Document },
    Int32(i32),
    /// Server-internal timestamp: increment in the low word, seconds in the high word.
    Timestamp { increment: u32, time: u32 },
    Int64(i64),
    MinKey,
    MaxKey,
    ObjectId(ObjectId),
}

impl Value {
    /// Returns the wire tag for this value.
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Double(_) => ElementType::Double,
            Value::String(_) => ElementType::String,
            Value::Document(_) => ElementType::Document,
            Value::Array(_) => ElementType::Array,
            Value::Binary(_) => ElementType::Binary,
            Value::Boolean(_) => ElementType::Boolean,
            Value::DateTime(_) => ElementType::DateTime,
            Value::Null => ElementType::Null,
            Value::Regex { .. } => ElementType::Regex,
            Value::Symbol(_) => ElementType::Symbol,
            Value::Code(_) => ElementType::Code,
            Value::CodeWithScope { .. } => ElementType::CodeWithScope,
            Value::Int32(_) => ElementType::Int32,
            Value::Timestamp { .. } => ElementType::Timestamp,
            Value::Int64(_) => ElementType::Int64,
            Value::MinKey => ElementType::MinKey,
            Value::MaxKey => ElementType::MaxKey,
            Value::ObjectId(_) => ElementType::ObjectId,
        }
    }

    /// Returns the registry name of this value's type.
    pub fn type_name(&self) -> &'static str {
        self.element_type().descriptor().name
    }

    /// Builds an array value from a sequence of values.
    pub fn array<I, V>(items: I) -> Value
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Array(Document::from_values(items))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Document> {
        match self {
            Value::Array(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as i64, widening Int32.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(n) => Some(*n as i64),
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as f64, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            Value::Int32(n) => Some(*n as f64),
            Value::Int64(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Value::ObjectId(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

/// There is no 32-bit float tag; single precision widens to double.
impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(v as f64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Symbol> for Value {
    fn from(v: Symbol) -> Self {
        Value::Symbol(v.0)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl From<Binary> for Value {
    fn from(v: Binary) -> Self {
        Value::Binary(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::ObjectId(v)
    }
}

/// UUIDs are stored as binary subtype 0x04 in RFC 4122 byte order.
impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Binary(Binary::with_subtype(BinarySubtype::Uuid, v.as_bytes().to_vec()))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl Binary {
    /// Interprets a 16-byte UUID binary (subtype 0x03 or 0x04) as a UUID.
    pub fn as_uuid(&self) -> Option<uuid::Uuid> {
        match self.subtype {
            BinarySubtype::Uuid | BinarySubtype::UuidOld => uuid::Uuid::from_slice(&self.bytes).ok(),
            _ => None,
        }
    }
}
