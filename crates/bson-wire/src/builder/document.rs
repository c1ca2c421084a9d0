//! Builder producing dynamic documents.

use crate::builder::ObjectBuilder;
use crate::model::{DefaultDocumentFactory, Document, DocumentFactory, Value};

/// Builds [`Value`]s, creating every decoded object through a [`DocumentFactory`].
///
/// Arrays are always insertion-ordered; only objects use the factory.
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder<F = DefaultDocumentFactory> {
    factory: F,
}

impl<F: DocumentFactory> DocumentBuilder<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F: DocumentFactory> ObjectBuilder for DocumentBuilder<F> {
    type Instance = Document;
    type Output = Value;

    fn begin_object(&mut self) -> Document {
        self.factory.create_document()
    }

    fn begin_array(&mut self) -> Document {
        Document::new()
    }

    fn begin_property(&mut self, _instance: &mut Document, _name: &str) {}

    fn end_property(&mut self, instance: &mut Document, name: &str, value: Value) {
        instance.set(name, value);
    }

    fn end_object(&mut self, instance: Document) -> Value {
        Value::Document(instance)
    }

    fn end_array(&mut self, instance: Document) -> Value {
        Value::Array(instance)
    }

    fn scalar(&mut self, value: Value) -> Value {
        value
    }
}
