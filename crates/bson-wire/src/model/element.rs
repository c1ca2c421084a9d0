//! Element type tags and the process-wide tag registry.
//!
//! Every [`Value`](crate::model::Value) variant maps to exactly one tag via
//! [`Value::element_type`](crate::model::Value::element_type). The inverse
//! direction, from a tag byte read off the wire to a decode strategy, goes
//! through [`ElementType::from_u8`] and the [`descriptor`] table.

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

/// BSON element type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    /// Deprecated; recognised but not modelled.
    Undefined = 0x06,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    Regex = 0x0B,
    /// Deprecated; recognised but not modelled.
    DbPointer = 0x0C,
    Code = 0x0D,
    Symbol = 0x0E,
    CodeWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    /// Recognised but not modelled.
    Decimal128 = 0x13,
    MinKey = 0xFF,
    MaxKey = 0x7F,
}

impl ElementType {
    /// Creates an ElementType from its wire representation.
    pub fn from_u8(v: u8) -> Option<ElementType> {
        match v {
            0x01 => Some(ElementType::Double),
            0x02 => Some(ElementType::String),
            0x03 => Some(ElementType::Document),
            0x04 => Some(ElementType::Array),
            0x05 => Some(ElementType::Binary),
            0x06 => Some(ElementType::Undefined),
            0x07 => Some(ElementType::ObjectId),
            0x08 => Some(ElementType::Boolean),
            0x09 => Some(ElementType::DateTime),
            0x0A => Some(ElementType::Null),
            0x0B => Some(ElementType::Regex),
            0x0C => Some(ElementType::DbPointer),
            0x0D => Some(ElementType::Code),
            0x0E => Some(ElementType::Symbol),
            0x0F => Some(ElementType::CodeWithScope),
            0x10 => Some(ElementType::Int32),
            0x11 => Some(ElementType::Timestamp),
            0x12 => Some(ElementType::Int64),
            0x13 => Some(ElementType::Decimal128),
            0xFF => Some(ElementType::MinKey),
            0x7F => Some(ElementType::MaxKey),
            _ => None,
        }
    }

    /// Returns the tag byte.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns the registry entry for this tag.
    pub fn descriptor(self) -> &'static TagDescriptor {
        // Every variant is registered below.
        &REGISTRY[&self.as_u8()]
    }

    /// Returns true if the codec can read and write values with this tag.
    pub fn is_supported(self) -> bool {
        self.descriptor().supported
    }
}

/// Static facts about a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagDescriptor {
    pub element_type: ElementType,
    /// Human-readable name used in error messages.
    pub name: &'static str,
    /// Payload width in bytes when it doesn't depend on the value.
    pub fixed_size: Option<usize>,
    /// False for tags that are recognised on the wire but have no value mapping.
    pub supported: bool,
}

const fn entry(
    element_type: ElementType,
    name: &'static str,
    fixed_size: Option<usize>,
    supported: bool,
) -> TagDescriptor {
    TagDescriptor {
        element_type,
        name,
        fixed_size,
        supported,
    }
}

const ENTRIES: [TagDescriptor; 21] = [
    entry(ElementType::Double, "double", Some(8), true),
    entry(ElementType::String, "string", None, true),
    entry(ElementType::Document, "document", None, true),
    entry(ElementType::Array, "array", None, true),
    entry(ElementType::Binary, "binary", None, true),
    entry(ElementType::Undefined, "undefined", Some(0), false),
    entry(ElementType::ObjectId, "objectId", Some(12), true),
    entry(ElementType::Boolean, "bool", Some(1), true),
    entry(ElementType::DateTime, "date", Some(8), true),
    entry(ElementType::Null, "null", Some(0), true),
    entry(ElementType::Regex, "regex", None, true),
    entry(ElementType::DbPointer, "dbPointer", None, false),
    entry(ElementType::Code, "javascript", None, true),
    entry(ElementType::Symbol, "symbol", None, true),
    entry(ElementType::CodeWithScope, "javascriptWithScope", None, true),
    entry(ElementType::Int32, "int", Some(4), true),
    entry(ElementType::Timestamp, "timestamp", Some(8), true),
    entry(ElementType::Int64, "long", Some(8), true),
    entry(ElementType::Decimal128, "decimal", Some(16), false),
    entry(ElementType::MinKey, "minKey", Some(0), true),
    entry(ElementType::MaxKey, "maxKey", Some(0), true),
];

lazy_static! {
    /// Tag byte to descriptor. Built once and never mutated afterwards.
    static ref REGISTRY: FxHashMap<u8, TagDescriptor> = ENTRIES
        .iter()
        .map(|d| (d.element_type.as_u8(), *d))
        .collect();
}

/// Looks up the descriptor for a raw tag byte.
pub fn descriptor(tag: u8) -> Option<&'static TagDescriptor> {
    REGISTRY.get(&tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_roundtrip() {
        for d in ENTRIES.iter() {
            let tag = d.element_type.as_u8();
            assert_eq!(ElementType::from_u8(tag), Some(d.element_type));
            assert_eq!(descriptor(tag).map(|d| d.element_type), Some(d.element_type));
        }
    }

    #[test]
    fn test_registry_is_injective() {
        assert_eq!(REGISTRY.len(), ENTRIES.len());
    }

    #[test]
    fn test_unknown_tags() {
        for tag in [0x00u8, 0x14, 0x20, 0x80, 0xFE] {
            assert!(ElementType::from_u8(tag).is_none(), "tag 0x{tag:02x}");
            assert!(descriptor(tag).is_none());
        }
    }

    #[test]
    fn test_unmodelled_tags_are_unsupported() {
        assert!(!ElementType::Undefined.is_supported());
        assert!(!ElementType::DbPointer.is_supported());
        assert!(!ElementType::Decimal128.is_supported());
        assert!(ElementType::Symbol.is_supported());
        assert_eq!(ElementType::Int64.descriptor().fixed_size, Some(8));
        assert_eq!(ElementType::Code.descriptor().name, "javascript");
    }
}
