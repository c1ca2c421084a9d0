//! Key validation for documents about to be sent.
//!
//! Structural checks (lengths, terminators, null bytes in keys) happen while
//! encoding. The checks here depend on what the document is for: a stored
//! document may not use operator or dotted keys, a query selector may.

use crate::error::EncodeError;
use crate::model::{Document, Value};

/// Which key rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Documents being stored: keys must be non-empty, must not start with
    /// `$` and must not contain `.`.
    Storage,
    /// Selectors and update specifications: operators and dotted paths are
    /// allowed; only null bytes are rejected.
    Query,
}

/// Validates every key of `doc`, including keys of nested documents and arrays.
pub fn validate_keys(doc: &Document, policy: KeyPolicy) -> Result<(), EncodeError> {
    let mut pending = vec![doc];
    while let Some(doc) = pending.pop() {
        for (key, value) in doc {
            check_key(key, policy)?;
            match value {
                Value::Document(nested) | Value::Array(nested) => pending.push(nested),
                _ => {}
            }
        }
    }
    Ok(())
}

fn check_key(key: &str, policy: KeyPolicy) -> Result<(), EncodeError> {
    if key.as_bytes().contains(&0) {
        return Err(EncodeError::InvalidKey {
            key: key.to_string(),
        });
    }
    if policy == KeyPolicy::Query {
        return Ok(());
    }
    let reason = if key.is_empty() {
        "empty key"
    } else if key.starts_with('$') {
        "key starts with '$'"
    } else if key.contains('.') {
        "key contains '.'"
    } else {
        return Ok(());
    };
    Err(EncodeError::InvalidKeyName {
        key: key.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_rejects_operator_keys() {
        let doc = Document::new().append("$set", 1);
        assert!(matches!(
            validate_keys(&doc, KeyPolicy::Storage),
            Err(EncodeError::InvalidKeyName { reason: "key starts with '$'", .. })
        ));
        assert!(validate_keys(&doc, KeyPolicy::Query).is_ok());
    }

    #[test]
    fn test_storage_checks_nested_keys() {
        let doc = Document::new().append(
            "outer",
            Value::array([Document::new().append("a.b", 1)]),
        );
        let err = validate_keys(&doc, KeyPolicy::Storage).unwrap_err();
        assert_eq!(
            err,
            EncodeError::InvalidKeyName {
                key: "a.b".to_string(),
                reason: "key contains '.'",
            }
        );
    }

    #[test]
    fn test_empty_and_nul_keys() {
        let empty = Document::new().append("", 1);
        assert!(validate_keys(&empty, KeyPolicy::Storage).is_err());
        assert!(validate_keys(&empty, KeyPolicy::Query).is_ok());

        let nul = Document::new().append("a\0", 1);
        assert!(matches!(
            validate_keys(&nul, KeyPolicy::Query),
            Err(EncodeError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_plain_document_passes() {
        let doc = Document::new()
            .append("name", "x")
            .append("tags", Value::array(["a", "b"]))
            .append("meta", Document::new().append("n", 1));
        assert!(validate_keys(&doc, KeyPolicy::Storage).is_ok());
    }
}
