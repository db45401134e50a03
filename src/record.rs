//! Dynamic record: a schema-typed value whose layout comes from a [`MessageDescriptor`].

use crate::reflect::Reflect;
use crate::schema::{Cardinality, FieldDescriptor, Kind, MessageDescriptor};
use crate::value::Value;
use std::collections::BTreeMap;

/// A record instance. Fields are stored by number, so [`Reflect::list_fields`]
/// yields them in ascending field-number order.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicRecord {
    descriptor: MessageDescriptor,
    fields: BTreeMap<u32, FieldEntry>,
}

#[derive(Debug, Clone, PartialEq)]
struct FieldEntry {
    field: FieldDescriptor,
    slot: Slot,
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Value(Value),
    Values(Vec<Value>),
    Message(Box<DynamicRecord>),
    Messages(Vec<DynamicRecord>),
}

impl Slot {
    fn is_present(&self) -> bool {
        match self {
            Slot::Value(_) | Slot::Message(_) => true,
            Slot::Values(v) => !v.is_empty(),
            Slot::Messages(m) => !m.is_empty(),
        }
    }
}

impl DynamicRecord {
    /// Allocate an empty record of the given type.
    pub fn new(descriptor: MessageDescriptor) -> Self {
        DynamicRecord {
            descriptor,
            fields: BTreeMap::new(),
        }
    }

    pub fn clear_field(&mut self, field: &FieldDescriptor) {
        self.fields.remove(&field.number());
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn is_empty(&self) -> bool {
        !self.fields.values().any(|e| e.slot.is_present())
    }

    /// Setting one member of a oneof clears the others.
    fn clear_oneof_siblings(&mut self, field: &FieldDescriptor) {
        if let Some(group) = field.oneof_index() {
            let number = field.number();
            self.fields
                .retain(|&n, e| n == number || e.field.oneof_index() != Some(group));
        }
    }

    fn slot(&self, field: &FieldDescriptor) -> Option<&Slot> {
        self.fields
            .get(&field.number())
            .filter(|e| e.field == *field)
            .map(|e| &e.slot)
    }

    /// Slot for `field`, replaced by `init()` when missing or of the wrong shape.
    fn slot_mut(
        &mut self,
        field: &FieldDescriptor,
        fits: fn(&Slot) -> bool,
        init: impl FnOnce() -> Slot,
    ) -> &mut Slot {
        let entry = self
            .fields
            .entry(field.number())
            .or_insert_with(|| FieldEntry {
                field: field.clone(),
                slot: Slot::Values(Vec::new()),
            });
        if entry.field != *field || !fits(&entry.slot) {
            *entry = FieldEntry {
                field: field.clone(),
                slot: init(),
            };
        }
        &mut entry.slot
    }

    /// Elements of a repeated scalar field.
    pub fn values(&self, field: &FieldDescriptor) -> &[Value] {
        match self.slot(field) {
            Some(Slot::Values(v)) => v,
            _ => &[],
        }
    }

    /// Elements of a repeated message field or entries of a map field.
    pub fn messages(&self, field: &FieldDescriptor) -> &[DynamicRecord] {
        match self.slot(field) {
            Some(Slot::Messages(m)) => m,
            _ => &[],
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let field = self.descriptor.field_by_name(name)?;
        self.get(&field)
    }

    pub fn message_by_name(&self, name: &str) -> Option<&DynamicRecord> {
        let field = self.descriptor.field_by_name(name)?;
        self.message(&field)
    }

    pub fn values_by_name(&self, name: &str) -> &[Value] {
        match self.descriptor.field_by_name(name) {
            Some(field) => self.values(&field),
            None => &[],
        }
    }

    pub fn messages_by_name(&self, name: &str) -> &[DynamicRecord] {
        match self.descriptor.field_by_name(name) {
            Some(field) => self.messages(&field),
            None => &[],
        }
    }

    fn map_entry(&self, field: &FieldDescriptor, key: &Value) -> Option<&DynamicRecord> {
        let key_field = field.message_type()?.map_key()?;
        // Later entries shadow earlier ones with the same key.
        self.messages(field)
            .iter()
            .rev()
            .find(|entry| entry.get(&key_field) == Some(key))
    }

    /// Scalar value stored under `key` in a map field.
    pub fn map_get(&self, field: &FieldDescriptor, key: &Value) -> Option<&Value> {
        let value_field = field.message_type()?.map_value()?;
        self.map_entry(field, key)?.get(&value_field)
    }

    /// Message value stored under `key` in a map field.
    pub fn map_message(&self, field: &FieldDescriptor, key: &Value) -> Option<&DynamicRecord> {
        let value_field = field.message_type()?.map_value()?;
        self.map_entry(field, key)?.message(&value_field)
    }

    /// Append a map entry with `key` set and return it so the value can be filled in.
    pub fn map_entry_mut(&mut self, field: &FieldDescriptor, key: Value) -> Option<&mut DynamicRecord> {
        let key_field = field.message_type()?.map_key()?;
        if field.cardinality() != Cardinality::Map {
            return None;
        }
        let entry = self.add_message(field)?;
        entry.set(&key_field, key);
        Some(entry)
    }
}

impl Reflect for DynamicRecord {
    fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    fn list_fields(&self) -> Vec<FieldDescriptor> {
        self.fields
            .values()
            .filter(|e| e.slot.is_present())
            .map(|e| e.field.clone())
            .collect()
    }

    fn has_field(&self, field: &FieldDescriptor) -> bool {
        self.slot(field).map(Slot::is_present).unwrap_or(false)
    }

    fn field_len(&self, field: &FieldDescriptor) -> usize {
        match self.slot(field) {
            Some(Slot::Values(v)) => v.len(),
            Some(Slot::Messages(m)) => m.len(),
            _ => 0,
        }
    }

    fn get(&self, field: &FieldDescriptor) -> Option<&Value> {
        match self.slot(field) {
            Some(Slot::Value(v)) => Some(v),
            _ => None,
        }
    }

    fn get_repeated(&self, field: &FieldDescriptor, index: usize) -> Option<&Value> {
        self.values(field).get(index)
    }

    fn set(&mut self, field: &FieldDescriptor, value: Value) {
        self.clear_oneof_siblings(field);
        self.fields.insert(
            field.number(),
            FieldEntry {
                field: field.clone(),
                slot: Slot::Value(value),
            },
        );
    }

    fn add(&mut self, field: &FieldDescriptor, value: Value) {
        let slot = self.slot_mut(
            field,
            |s| matches!(s, Slot::Values(_)),
            || Slot::Values(Vec::new()),
        );
        if let Slot::Values(values) = slot {
            values.push(value);
        }
    }

    fn message(&self, field: &FieldDescriptor) -> Option<&Self> {
        match self.slot(field) {
            Some(Slot::Message(m)) => Some(&**m),
            _ => None,
        }
    }

    fn repeated_message(&self, field: &FieldDescriptor, index: usize) -> Option<&Self> {
        self.messages(field).get(index)
    }

    fn mutable_message(&mut self, field: &FieldDescriptor) -> Option<&mut Self> {
        if field.kind() != Kind::Message || field.is_list() {
            return None;
        }
        let descriptor = field.message_type()?;
        self.clear_oneof_siblings(field);
        let slot = self.slot_mut(
            field,
            |s| matches!(s, Slot::Message(_)),
            || Slot::Message(Box::new(DynamicRecord::new(descriptor))),
        );
        match slot {
            Slot::Message(m) => Some(&mut **m),
            _ => None,
        }
    }

    fn add_message(&mut self, field: &FieldDescriptor) -> Option<&mut Self> {
        if field.kind() != Kind::Message || !field.is_list() {
            return None;
        }
        let descriptor = field.message_type()?;
        let slot = self.slot_mut(
            field,
            |s| matches!(s, Slot::Messages(_)),
            || Slot::Messages(Vec::new()),
        );
        match slot {
            Slot::Messages(list) => {
                list.push(DynamicRecord::new(descriptor));
                list.last_mut()
            }
            _ => None,
        }
    }
}
