//! Ordered document: the in-memory unit exchanged with the codec.
//!
//! Entries keep insertion order unless the document was created with a key
//! comparer, in which case they are kept sorted by it. Either way, keys are
//! unique and setting an existing key overwrites its value in place.
//!
//! ```rust
//! use bson_wire::{Document, Value};
//!
//! let mut doc = Document::new().append("b", 1).append("a", "x");
//! doc.set("b", 2);
//!
//! let keys: Vec<&str> = doc.keys().collect();
//! assert_eq!(keys, ["b", "a"]);
//! assert_eq!(doc.get("b"), Some(&Value::Int32(2)));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::model::Value;

/// Comparer used to order keys in a sorted document.
pub type KeyComparer = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

/// An ordered mapping of string keys to values.
#[derive(Clone, Default)]
pub struct Document {
    entries: Vec<(String, Value)>,
    index: FxHashMap<String, usize>,
    comparer: Option<KeyComparer>,
}

impl Document {
    /// Creates an empty insertion-ordered document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty insertion-ordered document with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            comparer: None,
        }
    }

    /// Creates an empty document whose entries are kept sorted by `comparer`.
    pub fn with_comparer(comparer: KeyComparer) -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
            comparer: Some(comparer),
        }
    }

    /// Builds an array-shaped document keyed "0", "1", ... in iteration order.
    pub fn from_values<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let iter = items.into_iter();
        let mut doc = Document::with_capacity(iter.size_hint().0);
        for (i, item) in iter.enumerate() {
            doc.set(i.to_string(), item.into());
        }
        doc
    }

    /// Returns the comparer this document was created with, if any.
    pub fn comparer(&self) -> Option<&KeyComparer> {
        self.comparer.as_ref()
    }

    /// Inserts or overwrites a value, returning the previous one.
    ///
    /// An overwritten key keeps its position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();

        if let Some(&pos) = self.index.get(&key) {
            return Some(std::mem::replace(&mut self.entries[pos].1, value));
        }

        match &self.comparer {
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
            Some(cmp) => {
                let pos = self
                    .entries
                    .partition_point(|(k, _)| cmp(k, &key) != Ordering::Greater);
                self.entries.insert(pos, (key, value));
                self.reindex_from(pos);
            }
        }
        None
    }

    /// Fluent form of [`set`](Self::set).
    pub fn append(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Inserts or moves `key` to the front of an insertion-ordered document.
    ///
    /// Sorted documents ignore the position and behave like [`set`](Self::set).
    pub fn prepend(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        if self.comparer.is_some() {
            return self.set(key, value);
        }
        let key = key.into();
        let previous = self.remove(&key);
        self.entries.insert(0, (key, value.into()));
        self.reindex_from(0);
        previous
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self.index.get(key) {
            Some(&pos) => Some(&mut self.entries[pos].1),
            None => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.index.remove(key)?;
        let (_, value) = self.entries.remove(pos);
        self.reindex_from(pos);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in document order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Returns the values of an array-shaped document ordered by numeric key.
    ///
    /// Keys that are not decimal indices are skipped.
    pub fn array_values(&self) -> Vec<&Value> {
        let mut indexed: Vec<(usize, &Value)> = self
            .entries
            .iter()
            .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v)))
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, v)| v).collect()
    }

    fn reindex_from(&mut self, start: usize) {
        for (pos, (key, _)) in self.entries.iter().enumerate().skip(start) {
            if let Some(slot) = self.index.get_mut(key.as_str()) {
                *slot = pos;
            } else {
                self.index.insert(key.clone(), pos);
            }
        }
    }
}

/// Order-insensitive: same keys, recursively equal values.
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

/// Iterator over `(key, value)` pairs.
pub struct Iter<'a> {
    inner: std::slice::Iter<'a, (String, Value)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k.as_str(), v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a str, &'a Value);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut doc = Document::new();
        doc.extend(iter);
        doc
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Document {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.set(k, v);
        }
    }
}

/// Creates the documents a decoder fills in.
pub trait DocumentFactory {
    fn create_document(&self) -> Document;
}

/// Produces insertion-ordered documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDocumentFactory;

impl DocumentFactory for DefaultDocumentFactory {
    fn create_document(&self) -> Document {
        Document::new()
    }
}

/// Produces documents sorted by a shared comparer.
#[derive(Clone)]
pub struct ComparerDocumentFactory {
    comparer: KeyComparer,
}

impl ComparerDocumentFactory {
    pub fn new(comparer: KeyComparer) -> Self {
        Self { comparer }
    }
}

impl DocumentFactory for ComparerDocumentFactory {
    fn create_document(&self) -> Document {
        Document::with_comparer(self.comparer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by_key() -> KeyComparer {
        Arc::new(|a: &str, b: &str| a.cmp(b))
    }

    #[test]
    fn test_insertion_order() {
        let doc = Document::new().append("z", 1).append("a", 2).append("m", 3);
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut doc = Document::new().append("a", 1).append("b", 2).append("c", 3);
        let previous = doc.set("a", "changed");
        assert_eq!(previous, Some(Value::Int32(1)));
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(doc.get("a"), Some(&Value::from("changed")));
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn test_remove_reindexes() {
        let mut doc = Document::new().append("a", 1).append("b", 2).append("c", 3);
        assert_eq!(doc.remove("a"), Some(Value::Int32(1)));
        assert_eq!(doc.get("c"), Some(&Value::Int32(3)));
        assert_eq!(doc.get("b"), Some(&Value::Int32(2)));
        assert!(doc.remove("missing").is_none());
        doc.set("a", 4);
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, ["b", "c", "a"]);
    }

    #[test]
    fn test_comparer_order() {
        let mut doc = Document::with_comparer(by_key());
        doc.set("m", 1);
        doc.set("z", 2);
        doc.set("a", 3);
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, ["a", "m", "z"]);
        assert_eq!(doc.get("z"), Some(&Value::Int32(2)));

        // overwrite doesn't duplicate or move
        doc.set("m", 10);
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.get("m"), Some(&Value::Int32(10)));
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = Document::new().append("x", 1).append("y", "two");
        let b = Document::new().append("y", "two").append("x", 1);
        assert_eq!(a, b);

        let c = Document::new().append("x", 1).append("y", "three");
        assert_ne!(a, c);

        let d = Document::new().append("x", 1);
        assert_ne!(a, d);
    }

    #[test]
    fn test_nested_equality() {
        let a = Document::new().append("sub", Document::new().append("p", 1).append("q", 2));
        let b = Document::new().append("sub", Document::new().append("q", 2).append("p", 1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_prepend_moves_to_front() {
        let mut doc = Document::new().append("a", 1).append("_id", 2).append("b", 3);
        doc.prepend("_id", 5);
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, ["_id", "a", "b"]);
        assert_eq!(doc.get("_id"), Some(&Value::Int32(5)));
        assert_eq!(doc.get("b"), Some(&Value::Int32(3)));
    }

    #[test]
    fn test_array_values() {
        let doc = Document::from_values(["a", "b", "c"]);
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, ["0", "1", "2"]);

        let mut shuffled = Document::new();
        shuffled.set("2", "c");
        shuffled.set("0", "a");
        shuffled.set("1", "b");
        let values: Vec<&Value> = shuffled.array_values();
        assert_eq!(values, [&Value::from("a"), &Value::from("b"), &Value::from("c")]);
    }

    #[test]
    fn test_factories() {
        let doc = DefaultDocumentFactory.create_document();
        assert!(doc.comparer().is_none());

        let factory = ComparerDocumentFactory::new(by_key());
        let mut doc = factory.create_document();
        doc.set("b", 1);
        doc.set("a", 1);
        assert_eq!(doc.keys().next(), Some("a"));
    }

    #[test]
    fn test_from_iterator() {
        let doc: Document = vec![("a", 1), ("b", 2), ("a", 3)].into_iter().collect();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get("a"), Some(&Value::Int32(3)));
    }
}
