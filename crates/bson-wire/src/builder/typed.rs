//! Builder filling application types.
//!
//! Types opt in by implementing [`BsonObject`] and registering a constructor in
//! a [`HandlerRegistry`]. While decoding, the builder keeps a stack of
//! [`Shape`]s: the declared shape of every property currently being decoded.
//! When the decoder opens an object or array, the shape on top of the stack
//! decides what gets created.
//!
//! Decoding never fails because of a type mismatch at the property level:
//! - an object whose declared type is unknown becomes a dynamic [`Document`]
//! - a value the target refuses goes to its extra-elements document, if any
//! - otherwise the value is dropped and a debug event is logged

use std::any::{Any, TypeId};
use std::fmt;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::builder::ObjectBuilder;
use crate::model::{Document, Value};

/// Declared shape of a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// Anything; objects and arrays become dynamic documents.
    Dynamic,
    /// A scalar. An object or array arriving here is decoded dynamically.
    Scalar,
    /// A dynamic document.
    Document,
    /// An application type registered in the [`HandlerRegistry`].
    Object(TypeId),
    /// An array whose elements have the given shape.
    Array(Box<Shape>),
}

impl Shape {
    pub fn object<T: BsonObject>() -> Shape {
        Shape::Object(TypeId::of::<T>())
    }

    pub fn array_of(element: Shape) -> Shape {
        Shape::Array(Box::new(element))
    }
}

/// A value produced by [`TypedBuilder`].
pub enum Built {
    Value(Value),
    Object(Box<dyn Any + Send>),
    /// A typed array; dynamic arrays arrive as `Value(Value::Array(..))`.
    Array(Vec<Built>),
}

impl Built {
    /// Converts to a dynamic value, failing if any typed object is inside.
    pub fn into_value(self) -> Result<Value, Built> {
        if !self.is_dynamic() {
            return Err(self);
        }
        match self {
            Built::Value(value) => Ok(value),
            Built::Array(items) => Ok(Value::Array(Document::from_values(
                items.into_iter().filter_map(|item| item.into_value().ok()),
            ))),
            Built::Object(_) => Err(self),
        }
    }

    /// Takes the typed object out if it is a `T`.
    pub fn downcast<T: 'static>(self) -> Result<T, Built> {
        match self {
            Built::Object(object) => object.downcast::<T>().map(|t| *t).map_err(Built::Object),
            other => Err(other),
        }
    }

    /// Takes a typed array out if every element is a `T`.
    pub fn into_vec<T: 'static>(self) -> Result<Vec<T>, Built> {
        match self {
            Built::Array(items)
                if items
                    .iter()
                    .all(|item| matches!(item, Built::Object(o) if o.is::<T>())) =>
            {
                Ok(items.into_iter().filter_map(|item| item.downcast::<T>().ok()).collect())
            }
            other => Err(other),
        }
    }

    /// Splits a typed array into its `T` elements and everything else.
    ///
    /// The remainder keeps the other elements in order and is empty when every
    /// element was a `T`.
    pub fn partition_vec<T: 'static>(self) -> Result<(Vec<T>, Vec<Built>), Built> {
        match self {
            Built::Array(items) => {
                let mut typed = Vec::with_capacity(items.len());
                let mut rest = Vec::new();
                for item in items {
                    match item.downcast::<T>() {
                        Ok(t) => typed.push(t),
                        Err(other) => rest.push(other),
                    }
                }
                Ok((typed, rest))
            }
            other => Err(other),
        }
    }

    /// Converts to a dynamic value, leaving typed objects out.
    ///
    /// Arrays keep their dynamic elements in order, renumbered from zero.
    /// Returns `None` for a typed object.
    pub fn into_dynamic(self) -> Option<Value> {
        match self {
            Built::Value(value) => Some(value),
            Built::Object(_) => None,
            Built::Array(items) => Some(Value::Array(Document::from_values(
                items.into_iter().filter_map(Built::into_dynamic),
            ))),
        }
    }

    fn is_dynamic(&self) -> bool {
        match self {
            Built::Value(_) => true,
            Built::Object(_) => false,
            Built::Array(items) => items.iter().all(Built::is_dynamic),
        }
    }
}

impl fmt::Debug for Built {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Built::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Built::Object(_) => f.write_str("Object(..)"),
            Built::Array(items) => f.debug_tuple("Array").field(items).finish(),
        }
    }
}

/// Converts a boxed object into `Box<dyn Any>`. Implemented for every type.
pub trait IntoAny {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Any + Send> IntoAny for T {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// An application type the decoder can fill property by property.
pub trait BsonObject: IntoAny + Send + 'static {
    /// Declared shape of a property, used to decode nested values.
    fn property_shape(&self, name: &str) -> Shape;

    /// Stores a decoded property, handing back whatever part doesn't fit.
    fn set_property(&mut self, name: &str, value: Built) -> Result<(), Built>;

    /// Catch-all document for properties the type refused.
    fn extra_elements(&mut self) -> Option<&mut Document> {
        None
    }
}

struct Handler {
    name: &'static str,
    create: fn() -> Box<dyn BsonObject>,
}

fn create_default<T: BsonObject + Default>() -> Box<dyn BsonObject> {
    Box::new(T::default())
}

/// Constructors for the application types a [`TypedBuilder`] may create.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: FxHashMap<TypeId, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`, constructed with `T::default()` before its properties are set.
    pub fn register<T: BsonObject + Default>(&mut self) -> &mut Self {
        self.handlers.insert(
            TypeId::of::<T>(),
            Handler {
                name: std::any::type_name::<T>(),
                create: create_default::<T>,
            },
        );
        self
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.handlers.contains_key(&type_id)
    }

    /// Name of a registered type, for diagnostics.
    pub fn type_name(&self, type_id: TypeId) -> Option<&'static str> {
        self.handlers.get(&type_id).map(|h| h.name)
    }

    fn create(&self, type_id: TypeId) -> Option<Box<dyn BsonObject>> {
        self.handlers.get(&type_id).map(|h| (h.create)())
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.values().map(|h| h.name))
            .finish()
    }
}

/// A container under construction by [`TypedBuilder`].
pub enum TypedInstance {
    Object(Box<dyn BsonObject>),
    Document(Document),
    Array { element: Shape, items: Vec<Built> },
    DynamicArray(Document),
}

/// Builder producing [`Built`] values for registered application types.
#[derive(Debug)]
pub struct TypedBuilder<'r> {
    registry: &'r HandlerRegistry,
    shapes: Vec<Shape>,
}

impl<'r> TypedBuilder<'r> {
    /// Creates a builder whose root object has the given shape.
    pub fn new(registry: &'r HandlerRegistry, root: Shape) -> Self {
        Self {
            registry,
            shapes: vec![root],
        }
    }

    pub fn for_type<T: BsonObject>(registry: &'r HandlerRegistry) -> Self {
        Self::new(registry, Shape::object::<T>())
    }

    fn current(&self) -> Shape {
        self.shapes.last().cloned().unwrap_or(Shape::Dynamic)
    }
}

impl ObjectBuilder for TypedBuilder<'_> {
    type Instance = TypedInstance;
    type Output = Built;

    fn begin_object(&mut self) -> TypedInstance {
        match self.current() {
            Shape::Object(type_id) => match self.registry.create(type_id) {
                Some(object) => TypedInstance::Object(object),
                None => {
                    debug!(?type_id, "no handler registered, decoding as document");
                    TypedInstance::Document(Document::new())
                }
            },
            Shape::Dynamic | Shape::Document => TypedInstance::Document(Document::new()),
            shape => {
                debug!(?shape, "object where a different shape was declared");
                TypedInstance::Document(Document::new())
            }
        }
    }

    fn begin_array(&mut self) -> TypedInstance {
        match self.current() {
            Shape::Array(element) => TypedInstance::Array {
                element: *element,
                items: Vec::new(),
            },
            Shape::Dynamic => TypedInstance::DynamicArray(Document::new()),
            shape => {
                debug!(?shape, "array where a different shape was declared");
                TypedInstance::DynamicArray(Document::new())
            }
        }
    }

    fn begin_property(&mut self, instance: &mut TypedInstance, name: &str) {
        let shape = match instance {
            TypedInstance::Object(object) => object.property_shape(name),
            TypedInstance::Array { element, .. } => element.clone(),
            TypedInstance::Document(_) | TypedInstance::DynamicArray(_) => Shape::Dynamic,
        };
        self.shapes.push(shape);
    }

    fn end_property(&mut self, instance: &mut TypedInstance, name: &str, value: Built) {
        self.shapes.pop();
        match instance {
            TypedInstance::Object(object) => {
                if let Err(refused) = object.set_property(name, value) {
                    store_extra(object.as_mut(), name, refused);
                }
            }
            TypedInstance::Array { items, .. } => items.push(value),
            TypedInstance::Document(doc) | TypedInstance::DynamicArray(doc) => {
                match value.into_dynamic() {
                    Some(value) => {
                        doc.set(name, value);
                    }
                    None => debug!(property = name, "typed value in a dynamic document dropped"),
                }
            }
        }
    }

    fn end_object(&mut self, instance: TypedInstance) -> Built {
        finish(instance)
    }

    fn end_array(&mut self, instance: TypedInstance) -> Built {
        finish(instance)
    }

    fn scalar(&mut self, value: Value) -> Built {
        Built::Value(value)
    }
}

fn finish(instance: TypedInstance) -> Built {
    match instance {
        TypedInstance::Object(object) => Built::Object(IntoAny::into_any(object)),
        TypedInstance::Document(doc) => Built::Value(Value::Document(doc)),
        TypedInstance::Array { items, .. } => Built::Array(items),
        TypedInstance::DynamicArray(doc) => Built::Value(Value::Array(doc)),
    }
}

fn store_extra(object: &mut dyn BsonObject, name: &str, refused: Built) {
    let partial = !refused.is_dynamic();
    match (object.extra_elements(), refused.into_dynamic()) {
        (Some(extra), Some(value)) => {
            if partial {
                debug!(property = name, "typed objects left out of extra elements");
            }
            extra.set(name, value);
        }
        _ => debug!(property = name, "property refused by target and dropped"),
    }
}
