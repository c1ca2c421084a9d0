//! Object builders driven by the decoder.
//!
//! The decoder does not produce values itself. It walks the input and reports
//! structure to an [`ObjectBuilder`]: objects and arrays opening and closing,
//! properties starting and finishing, scalars being read. The builder decides
//! what those become:
//! - [`DocumentBuilder`] produces [`Value`]s and [`Document`](crate::Document)s
//! - [`TypedBuilder`] fills application types implementing [`BsonObject`]
//!
//! Calls arrive in document order. For every property the decoder calls
//! `begin_property`, then either `scalar` or a nested `begin_*`/`end_*` pair,
//! then `end_property` with the finished value.

pub mod document;
pub mod typed;

pub use document::DocumentBuilder;
pub use typed::{BsonObject, Built, HandlerRegistry, IntoAny, Shape, TypedBuilder, TypedInstance};

use crate::model::Value;

/// Receives decode events and assembles the decoded object graph.
pub trait ObjectBuilder {
    /// A container under construction.
    type Instance;
    /// A finished value: a closed container or a lifted scalar.
    type Output;

    fn begin_object(&mut self) -> Self::Instance;

    fn begin_array(&mut self) -> Self::Instance;

    /// Announces that the value of `name` is about to be decoded into `instance`.
    fn begin_property(&mut self, instance: &mut Self::Instance, name: &str);

    /// Stores the decoded value of `name`.
    fn end_property(&mut self, instance: &mut Self::Instance, name: &str, value: Self::Output);

    fn end_object(&mut self, instance: Self::Instance) -> Self::Output;

    fn end_array(&mut self, instance: Self::Instance) -> Self::Output;

    /// Lifts a decoded scalar into the output type.
    fn scalar(&mut self, value: Value) -> Self::Output;
}
