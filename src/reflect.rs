//! Reflection surface the conversion engine works through.
//!
//! The decoder and encoder never touch record storage directly; they only call
//! the methods below. [`DynamicRecord`](crate::record::DynamicRecord) is the
//! implementation shipped with this crate, but any schema-described record type
//! that can answer these questions can be converted.

use crate::schema::{FieldDescriptor, MessageDescriptor};
use crate::value::Value;

pub trait Reflect: Sized {
    fn descriptor(&self) -> &MessageDescriptor;

    /// Fields that are present: singular fields that have been set, repeated and
    /// map fields with at least one element. Extensions included.
    fn list_fields(&self) -> Vec<FieldDescriptor>;

    fn has_field(&self, field: &FieldDescriptor) -> bool;

    /// Number of elements of a repeated or map field; 0 for singular fields.
    fn field_len(&self, field: &FieldDescriptor) -> usize;

    fn get(&self, field: &FieldDescriptor) -> Option<&Value>;

    fn get_repeated(&self, field: &FieldDescriptor, index: usize) -> Option<&Value>;

    /// Assign a singular scalar field, marking it present.
    fn set(&mut self, field: &FieldDescriptor, value: Value);

    /// Append to a repeated scalar field.
    fn add(&mut self, field: &FieldDescriptor, value: Value);

    fn message(&self, field: &FieldDescriptor) -> Option<&Self>;

    fn repeated_message(&self, field: &FieldDescriptor, index: usize) -> Option<&Self>;

    /// Singular message field, allocated (and marked present) if absent.
    /// `None` if the field is not a singular message field.
    fn mutable_message(&mut self, field: &FieldDescriptor) -> Option<&mut Self>;

    /// Append a freshly allocated element to a repeated message or map field.
    /// `None` if the field is not a repeated message or map field.
    fn add_message(&mut self, field: &FieldDescriptor) -> Option<&mut Self>;
}
