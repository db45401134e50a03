//! Resolved schema: message, field and enum descriptors.
//!
//! A [`Schema`] is built from a parsed [`SchemaFile`](crate::ast::SchemaFile): every
//! type reference is resolved with protobuf scoping rules (innermost scope first, a
//! leading `.` means fully qualified), every `map<K, V>` field gets a synthetic
//! `<Name>Entry` message with `key = 1` and `value = 2`, and every `extend` block is
//! attached to its extendee under the extension's full name.
//!
//! Descriptors are cheap handles (`Arc` + index) and are immutable once built, so
//! they can be shared freely across threads and conversions.

use crate::ast::{
    ExtendDef, FieldDef, Label, MessageDef, NumberRange, ScalarType, SchemaFile, TypeSpec,
};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("{0}")]
    Parse(String),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Duplicate name: {0}")]
    DuplicateName(String),
    #[error("{message}: duplicate field name {name}")]
    DuplicateFieldName { message: String, name: String },
    #[error("{message}: field number {number} used by both {first} and {second}")]
    DuplicateFieldNumber {
        message: String,
        number: u32,
        first: String,
        second: String,
    },
    #[error("{scope}: unresolved type {name}")]
    UnresolvedType { scope: String, name: String },
    #[error("{field}: invalid map key type {key}")]
    InvalidMapKey { field: String, key: Kind },
    #[error("{field}: map value cannot itself be a map")]
    InvalidMapValue { field: String },
    #[error("{message}: field {field} uses reserved {reserved}")]
    ReservedField {
        message: String,
        field: String,
        reserved: String,
    },
    #[error("{extendee}: extension {field} number {number} is outside the declared extension ranges")]
    ExtensionOutOfRange {
        extendee: String,
        field: String,
        number: u32,
    },
    #[error("extension {field}: {reason}")]
    InvalidExtension { field: String, reason: String },
}

/// Value kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Double,
    Float,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Bool,
    String,
    Bytes,
    Enum,
    Message,
}

impl Kind {
    fn from_scalar(scalar: ScalarType) -> Self {
        match scalar {
            ScalarType::Double => Kind::Double,
            ScalarType::Float => Kind::Float,
            ScalarType::Int32 | ScalarType::SInt32 | ScalarType::SFixed32 => Kind::Int32,
            ScalarType::Int64 | ScalarType::SInt64 | ScalarType::SFixed64 => Kind::Int64,
            ScalarType::UInt32 | ScalarType::Fixed32 => Kind::UInt32,
            ScalarType::UInt64 | ScalarType::Fixed64 => Kind::UInt64,
            ScalarType::Bool => Kind::Bool,
            ScalarType::String => Kind::String,
            ScalarType::Bytes => Kind::Bytes,
        }
    }

    /// Kinds a map key may have (integers, bool, string).
    pub fn is_valid_map_key(self) -> bool {
        matches!(
            self,
            Kind::Int32 | Kind::Int64 | Kind::UInt32 | Kind::UInt64 | Kind::Bool | Kind::String
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::Double => "double",
            Kind::Float => "float",
            Kind::Int32 => "int32",
            Kind::Int64 => "int64",
            Kind::UInt32 => "uint32",
            Kind::UInt64 => "uint64",
            Kind::Bool => "bool",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::Enum => "enum",
            Kind::Message => "message",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Singular,
    Repeated,
    /// Repeated synthetic entries with `key` at index 0 and `value` at index 1.
    Map,
}

#[derive(Debug)]
struct SchemaInner {
    package: String,
    messages: Vec<MessageData>,
    fields: Vec<FieldData>,
    enums: Vec<EnumData>,
    messages_by_name: HashMap<String, usize>,
    enums_by_name: HashMap<String, usize>,
}

#[derive(Debug)]
struct MessageData {
    name: String,
    full_name: String,
    fields: Vec<usize>,
    fields_by_name: HashMap<String, usize>,
    /// Own fields and extensions share one number space.
    fields_by_number: HashMap<u32, usize>,
    extensions: Vec<usize>,
    extensions_by_name: HashMap<String, usize>,
    oneofs: Vec<String>,
    extension_ranges: Vec<NumberRange>,
    is_map_entry: bool,
}

#[derive(Debug)]
struct FieldData {
    name: String,
    full_name: String,
    number: u32,
    kind: Kind,
    cardinality: Cardinality,
    /// Message index for `Kind::Message`, enum index for `Kind::Enum`.
    type_index: Option<usize>,
    containing: usize,
    is_extension: bool,
    oneof: Option<usize>,
}

#[derive(Debug)]
struct EnumData {
    name: String,
    full_name: String,
    values: Vec<(String, i32)>,
    by_name: HashMap<String, usize>,
    /// First declared value wins for aliased numbers.
    by_number: HashMap<i32, usize>,
}

/// A resolved set of message and enum types.
#[derive(Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

impl Schema {
    /// Parse and resolve schema source.
    pub fn parse(source: &str) -> Result<Self, SchemaError> {
        let file = crate::parser::parse(source).map_err(SchemaError::Parse)?;
        Self::from_ast(&file)
    }

    /// Read, parse and resolve a schema file. Imports are recorded but not followed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source)
    }

    pub fn from_ast(file: &SchemaFile) -> Result<Self, SchemaError> {
        let package = file.package.clone().unwrap_or_default();
        let mut builder = Builder {
            messages: Vec::new(),
            fields: Vec::new(),
            enums: Vec::new(),
            messages_by_name: HashMap::new(),
            enums_by_name: HashMap::new(),
        };
        for e in &file.enums {
            builder.declare_enum(&e.name, &e.values, &package)?;
        }
        for m in &file.messages {
            builder.declare_message(m, &package)?;
        }
        for m in &file.messages {
            builder.define_message(m, &package)?;
        }
        builder.define_extends(&file.extends, &package)?;
        for m in &file.messages {
            builder.define_nested_extends(m, &package)?;
        }
        Ok(Schema {
            inner: Arc::new(SchemaInner {
                package,
                messages: builder.messages,
                fields: builder.fields,
                enums: builder.enums,
                messages_by_name: builder.messages_by_name,
                enums_by_name: builder.enums_by_name,
            }),
        })
    }

    pub fn package(&self) -> &str {
        &self.inner.package
    }

    /// Look up a message by full name, or by name relative to the schema's package.
    pub fn message(&self, name: &str) -> Option<MessageDescriptor> {
        lookup_in(&self.inner.messages_by_name, &self.inner.package, name).map(|index| MessageDescriptor {
            schema: self.inner.clone(),
            index,
        })
    }

    pub fn enum_type(&self, name: &str) -> Option<EnumDescriptor> {
        lookup_in(&self.inner.enums_by_name, &self.inner.package, name).map(|index| EnumDescriptor {
            schema: self.inner.clone(),
            index,
        })
    }

    /// All message types, map entries included, in declaration order.
    pub fn messages(&self) -> impl Iterator<Item = MessageDescriptor> + '_ {
        (0..self.inner.messages.len()).map(move |index| MessageDescriptor {
            schema: self.inner.clone(),
            index,
        })
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("package", &self.inner.package)
            .field("messages", &self.inner.messages.len())
            .field("enums", &self.inner.enums.len())
            .finish()
    }
}

fn lookup_in(map: &HashMap<String, usize>, package: &str, name: &str) -> Option<usize> {
    let name = name.strip_prefix('.').unwrap_or(name);
    map.get(name)
        .or_else(|| {
            if package.is_empty() {
                None
            } else {
                map.get(&qualify(package, name))
            }
        })
        .copied()
}

/// Describes a message type.
#[derive(Clone)]
pub struct MessageDescriptor {
    schema: Arc<SchemaInner>,
    index: usize,
}

impl MessageDescriptor {
    fn data(&self) -> &MessageData {
        &self.schema.messages[self.index]
    }

    fn field_handle(&self, index: usize) -> FieldDescriptor {
        FieldDescriptor {
            schema: self.schema.clone(),
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn full_name(&self) -> &str {
        &self.data().full_name
    }

    /// Own fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.data().fields.iter().map(move |&i| self.field_handle(i))
    }

    /// Own field at declaration position `index`.
    pub fn field(&self, index: usize) -> Option<FieldDescriptor> {
        self.data().fields.get(index).map(|&i| self.field_handle(i))
    }

    pub fn field_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        self.data().fields_by_name.get(name).map(|&i| self.field_handle(i))
    }

    /// Own field or extension with this number.
    pub fn field_by_number(&self, number: u32) -> Option<FieldDescriptor> {
        self.data().fields_by_number.get(&number).map(|&i| self.field_handle(i))
    }

    /// Extension of this message by full name (e.g. `pkg.priority`).
    pub fn extension_by_name(&self, full_name: &str) -> Option<FieldDescriptor> {
        let full_name = full_name.strip_prefix('.').unwrap_or(full_name);
        self.data()
            .extensions_by_name
            .get(full_name)
            .map(|&i| self.field_handle(i))
    }

    pub fn extensions(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.data().extensions.iter().map(move |&i| self.field_handle(i))
    }

    pub fn oneof_names(&self) -> &[String] {
        &self.data().oneofs
    }

    pub fn is_map_entry(&self) -> bool {
        self.data().is_map_entry
    }

    /// Key field of a map entry message (index 0).
    pub fn map_key(&self) -> Option<FieldDescriptor> {
        if self.is_map_entry() {
            self.field(0)
        } else {
            None
        }
    }

    /// Value field of a map entry message (index 1).
    pub fn map_value(&self) -> Option<FieldDescriptor> {
        if self.is_map_entry() {
            self.field(1)
        } else {
            None
        }
    }
}

impl PartialEq for MessageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema) && self.index == other.index
    }
}

impl Eq for MessageDescriptor {}

impl fmt::Debug for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageDescriptor({})", self.full_name())
    }
}

/// Describes a field or an extension.
#[derive(Clone)]
pub struct FieldDescriptor {
    schema: Arc<SchemaInner>,
    index: usize,
}

impl FieldDescriptor {
    fn data(&self) -> &FieldData {
        &self.schema.fields[self.index]
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    /// Fully qualified name; for extensions this is the key used in documents.
    pub fn full_name(&self) -> &str {
        &self.data().full_name
    }

    pub fn number(&self) -> u32 {
        self.data().number
    }

    pub fn kind(&self) -> Kind {
        self.data().kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.data().cardinality
    }

    /// Repeated or map.
    pub fn is_list(&self) -> bool {
        self.cardinality() != Cardinality::Singular
    }

    pub fn is_map(&self) -> bool {
        self.cardinality() == Cardinality::Map
    }

    pub fn is_extension(&self) -> bool {
        self.data().is_extension
    }

    /// Message type for `Kind::Message` fields; the entry type for map fields.
    pub fn message_type(&self) -> Option<MessageDescriptor> {
        match (self.kind(), self.data().type_index) {
            (Kind::Message, Some(index)) => Some(MessageDescriptor {
                schema: self.schema.clone(),
                index,
            }),
            _ => None,
        }
    }

    pub fn enum_type(&self) -> Option<EnumDescriptor> {
        match (self.kind(), self.data().type_index) {
            (Kind::Enum, Some(index)) => Some(EnumDescriptor {
                schema: self.schema.clone(),
                index,
            }),
            _ => None,
        }
    }

    /// The message this field belongs to (the extendee, for extensions).
    pub fn containing_message(&self) -> MessageDescriptor {
        MessageDescriptor {
            schema: self.schema.clone(),
            index: self.data().containing,
        }
    }

    pub fn oneof_index(&self) -> Option<usize> {
        self.data().oneof
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema) && self.index == other.index
    }
}

impl Eq for FieldDescriptor {}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldDescriptor({} = {})", self.full_name(), self.number())
    }
}

/// Describes an enum: a two-way table between numbers and names.
#[derive(Clone)]
pub struct EnumDescriptor {
    schema: Arc<SchemaInner>,
    index: usize,
}

impl EnumDescriptor {
    fn data(&self) -> &EnumData {
        &self.schema.enums[self.index]
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn full_name(&self) -> &str {
        &self.data().full_name
    }

    pub fn name_of(&self, number: i32) -> Option<&str> {
        let data = self.data();
        data.by_number.get(&number).map(|&i| data.values[i].0.as_str())
    }

    pub fn number_of(&self, name: &str) -> Option<i32> {
        let data = self.data();
        data.by_name.get(name).map(|&i| data.values[i].1)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, i32)> {
        self.data().values.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

impl PartialEq for EnumDescriptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema) && self.index == other.index
    }
}

impl Eq for EnumDescriptor {}

impl fmt::Debug for EnumDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnumDescriptor({})", self.full_name())
    }
}

// ==================== Resolution ====================

enum TypeRef {
    Message(usize),
    Enum(usize),
}

struct Builder {
    messages: Vec<MessageData>,
    fields: Vec<FieldData>,
    enums: Vec<EnumData>,
    messages_by_name: HashMap<String, usize>,
    enums_by_name: HashMap<String, usize>,
}

impl Builder {
    fn check_unique(&self, full_name: &str) -> Result<(), SchemaError> {
        if self.messages_by_name.contains_key(full_name) || self.enums_by_name.contains_key(full_name) {
            return Err(SchemaError::DuplicateName(full_name.to_string()));
        }
        Ok(())
    }

    fn register_message(
        &mut self,
        name: &str,
        scope: &str,
        def: Option<&MessageDef>,
    ) -> Result<(), SchemaError> {
        let full_name = qualify(scope, name);
        self.check_unique(&full_name)?;
        self.messages_by_name.insert(full_name.clone(), self.messages.len());
        self.messages.push(MessageData {
            name: name.to_string(),
            full_name,
            fields: Vec::new(),
            fields_by_name: HashMap::new(),
            fields_by_number: HashMap::new(),
            extensions: Vec::new(),
            extensions_by_name: HashMap::new(),
            oneofs: def.map(|d| d.oneofs.clone()).unwrap_or_default(),
            extension_ranges: def.map(|d| d.extension_ranges.clone()).unwrap_or_default(),
            is_map_entry: def.is_none(),
        });
        Ok(())
    }

    fn declare_message(&mut self, def: &MessageDef, scope: &str) -> Result<(), SchemaError> {
        self.register_message(&def.name, scope, Some(def))?;
        let full_name = qualify(scope, &def.name);
        for field in &def.fields {
            if let TypeSpec::Map(..) = field.type_spec {
                self.register_message(&map_entry_name(&field.name), &full_name, None)?;
            }
        }
        for e in &def.enums {
            self.declare_enum(&e.name, &e.values, &full_name)?;
        }
        for nested in &def.messages {
            self.declare_message(nested, &full_name)?;
        }
        Ok(())
    }

    fn declare_enum(
        &mut self,
        name: &str,
        values: &[crate::ast::EnumValueDef],
        scope: &str,
    ) -> Result<(), SchemaError> {
        let full_name = qualify(scope, name);
        self.check_unique(&full_name)?;
        let mut data = EnumData {
            name: name.to_string(),
            full_name: full_name.clone(),
            values: Vec::with_capacity(values.len()),
            by_name: HashMap::new(),
            by_number: HashMap::new(),
        };
        for (i, v) in values.iter().enumerate() {
            if data.by_name.insert(v.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateName(qualify(&full_name, &v.name)));
            }
            data.by_number.entry(v.number).or_insert(i);
            data.values.push((v.name.clone(), v.number));
        }
        self.enums_by_name.insert(full_name, self.enums.len());
        self.enums.push(data);
        Ok(())
    }

    fn message_index(&self, full_name: &str) -> Result<usize, SchemaError> {
        self.messages_by_name
            .get(full_name)
            .copied()
            .ok_or_else(|| SchemaError::UnresolvedType {
                scope: String::new(),
                name: full_name.to_string(),
            })
    }

    fn define_message(&mut self, def: &MessageDef, scope: &str) -> Result<(), SchemaError> {
        let full_name = qualify(scope, &def.name);
        let index = self.message_index(&full_name)?;
        for field in &def.fields {
            check_reserved(def, &full_name, field)?;
            let field_full_name = qualify(&full_name, &field.name);
            match &field.type_spec {
                TypeSpec::Map(key, value) => {
                    let entry_full_name = qualify(&full_name, &map_entry_name(&field.name));
                    let entry = self.message_index(&entry_full_name)?;
                    let (key_kind, key_type) = self.resolve_type(key, &full_name, &field_full_name)?;
                    if !key_kind.is_valid_map_key() {
                        return Err(SchemaError::InvalidMapKey {
                            field: field_full_name,
                            key: key_kind,
                        });
                    }
                    let (value_kind, value_type) = self.resolve_type(value, &full_name, &field_full_name)?;
                    self.push_field(FieldData {
                        name: "key".to_string(),
                        full_name: qualify(&entry_full_name, "key"),
                        number: 1,
                        kind: key_kind,
                        cardinality: Cardinality::Singular,
                        type_index: key_type,
                        containing: entry,
                        is_extension: false,
                        oneof: None,
                    })?;
                    self.push_field(FieldData {
                        name: "value".to_string(),
                        full_name: qualify(&entry_full_name, "value"),
                        number: 2,
                        kind: value_kind,
                        cardinality: Cardinality::Singular,
                        type_index: value_type,
                        containing: entry,
                        is_extension: false,
                        oneof: None,
                    })?;
                    self.push_field(FieldData {
                        name: field.name.clone(),
                        full_name: field_full_name,
                        number: field.number,
                        kind: Kind::Message,
                        cardinality: Cardinality::Map,
                        type_index: Some(entry),
                        containing: index,
                        is_extension: false,
                        oneof: None,
                    })?;
                }
                spec => {
                    let (kind, type_index) = self.resolve_type(spec, &full_name, &field_full_name)?;
                    self.push_field(FieldData {
                        name: field.name.clone(),
                        full_name: field_full_name,
                        number: field.number,
                        kind,
                        cardinality: cardinality_of(field.label),
                        type_index,
                        containing: index,
                        is_extension: false,
                        oneof: field.oneof,
                    })?;
                }
            }
        }
        for nested in &def.messages {
            self.define_message(nested, &full_name)?;
        }
        Ok(())
    }

    fn define_nested_extends(&mut self, def: &MessageDef, scope: &str) -> Result<(), SchemaError> {
        let full_name = qualify(scope, &def.name);
        self.define_extends(&def.extends, &full_name)?;
        for nested in &def.messages {
            self.define_nested_extends(nested, &full_name)?;
        }
        Ok(())
    }

    fn define_extends(&mut self, extends: &[ExtendDef], scope: &str) -> Result<(), SchemaError> {
        for ext in extends {
            let extendee = match self.resolve_named(&ext.extendee, scope) {
                Some(TypeRef::Message(i)) => i,
                Some(TypeRef::Enum(_)) => {
                    return Err(SchemaError::InvalidExtension {
                        field: ext.extendee.clone(),
                        reason: "extendee is an enum".to_string(),
                    })
                }
                None => {
                    return Err(SchemaError::UnresolvedType {
                        scope: scope.to_string(),
                        name: ext.extendee.clone(),
                    })
                }
            };
            for field in &ext.fields {
                let full_name = qualify(scope, &field.name);
                if matches!(field.type_spec, TypeSpec::Map(..)) {
                    return Err(SchemaError::InvalidExtension {
                        field: full_name,
                        reason: "extensions cannot be maps".to_string(),
                    });
                }
                let target = &self.messages[extendee];
                if !target.extension_ranges.iter().any(|r| r.contains(field.number)) {
                    return Err(SchemaError::ExtensionOutOfRange {
                        extendee: target.full_name.clone(),
                        field: full_name,
                        number: field.number,
                    });
                }
                let (kind, type_index) = self.resolve_type(&field.type_spec, scope, &full_name)?;
                self.push_field(FieldData {
                    name: field.name.clone(),
                    full_name,
                    number: field.number,
                    kind,
                    cardinality: cardinality_of(field.label),
                    type_index,
                    containing: extendee,
                    is_extension: true,
                    oneof: None,
                })?;
            }
        }
        Ok(())
    }

    fn push_field(&mut self, data: FieldData) -> Result<(), SchemaError> {
        let index = self.fields.len();
        let message = &mut self.messages[data.containing];
        if let Some(&existing) = message.fields_by_number.get(&data.number) {
            return Err(SchemaError::DuplicateFieldNumber {
                message: message.full_name.clone(),
                number: data.number,
                first: self.fields[existing].full_name.clone(),
                second: data.full_name,
            });
        }
        if data.is_extension {
            if message.extensions_by_name.contains_key(&data.full_name) {
                return Err(SchemaError::DuplicateName(data.full_name));
            }
            message.extensions_by_name.insert(data.full_name.clone(), index);
            message.extensions.push(index);
        } else {
            if message.fields_by_name.contains_key(&data.name) {
                return Err(SchemaError::DuplicateFieldName {
                    message: message.full_name.clone(),
                    name: data.name,
                });
            }
            message.fields_by_name.insert(data.name.clone(), index);
            message.fields.push(index);
        }
        message.fields_by_number.insert(data.number, index);
        self.fields.push(data);
        Ok(())
    }

    fn resolve_type(
        &self,
        spec: &TypeSpec,
        scope: &str,
        field: &str,
    ) -> Result<(Kind, Option<usize>), SchemaError> {
        match spec {
            TypeSpec::Scalar(s) => Ok((Kind::from_scalar(*s), None)),
            TypeSpec::Named(name) => match self.resolve_named(name, scope) {
                Some(TypeRef::Message(i)) => Ok((Kind::Message, Some(i))),
                Some(TypeRef::Enum(i)) => Ok((Kind::Enum, Some(i))),
                None => Err(SchemaError::UnresolvedType {
                    scope: scope.to_string(),
                    name: name.clone(),
                }),
            },
            TypeSpec::Map(..) => Err(SchemaError::InvalidMapValue {
                field: field.to_string(),
            }),
        }
    }

    fn lookup(&self, full_name: &str) -> Option<TypeRef> {
        if let Some(&i) = self.messages_by_name.get(full_name) {
            return Some(TypeRef::Message(i));
        }
        self.enums_by_name.get(full_name).map(|&i| TypeRef::Enum(i))
    }

    /// Innermost scope first, then each enclosing scope, then the root.
    fn resolve_named(&self, name: &str, scope: &str) -> Option<TypeRef> {
        if let Some(absolute) = name.strip_prefix('.') {
            return self.lookup(absolute);
        }
        let mut scope = scope;
        loop {
            if let Some(found) = self.lookup(&qualify(scope, name)) {
                return Some(found);
            }
            if scope.is_empty() {
                return None;
            }
            scope = match scope.rfind('.') {
                Some(i) => &scope[..i],
                None => "",
            };
        }
    }
}

fn check_reserved(def: &MessageDef, message: &str, field: &FieldDef) -> Result<(), SchemaError> {
    if let Some(range) = def.reserved_numbers.iter().find(|r| r.contains(field.number)) {
        return Err(SchemaError::ReservedField {
            message: message.to_string(),
            field: field.name.clone(),
            reserved: if range.start == range.end {
                format!("number {}", range.start)
            } else {
                format!("numbers {} to {}", range.start, range.end)
            },
        });
    }
    if def.reserved_names.iter().any(|n| *n == field.name) {
        return Err(SchemaError::ReservedField {
            message: message.to_string(),
            field: field.name.clone(),
            reserved: format!("name {}", field.name),
        });
    }
    Ok(())
}

fn cardinality_of(label: Label) -> Cardinality {
    match label {
        Label::Repeated => Cardinality::Repeated,
        Label::None | Label::Optional | Label::Required => Cardinality::Singular,
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

/// `processor_map` -> `ProcessorMapEntry`.
fn map_entry_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 5);
    let mut upper = true;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out.push_str("Entry");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r#"
package media;

enum Level { LOW = 0; HIGH = 1; }

message Outer {
  message Inner {
    Level level = 1;
  }
  Inner inner = 1;
  map<string, Inner> by_name = 2;
  repeated .media.Outer.Inner all = 3;
}
"#;

    #[test]
    fn resolves_nested_and_qualified_types() {
        let schema = Schema::parse(NESTED).unwrap();
        let outer = schema.message("media.Outer").unwrap();
        assert_eq!(schema.message("Outer"), Some(outer.clone()));
        let inner = outer.field_by_name("inner").unwrap();
        assert_eq!(inner.kind(), Kind::Message);
        assert_eq!(inner.message_type().unwrap().full_name(), "media.Outer.Inner");
        let all = outer.field_by_name("all").unwrap();
        assert_eq!(all.cardinality(), Cardinality::Repeated);
        assert_eq!(all.message_type(), inner.message_type());
        let level = inner.message_type().unwrap().field_by_name("level").unwrap();
        assert_eq!(level.enum_type().unwrap().full_name(), "media.Level");
    }

    #[test]
    fn synthesizes_map_entry() {
        let schema = Schema::parse(NESTED).unwrap();
        let field = schema.message("media.Outer").unwrap().field_by_name("by_name").unwrap();
        assert_eq!(field.cardinality(), Cardinality::Map);
        let entry = field.message_type().unwrap();
        assert!(entry.is_map_entry());
        assert_eq!(entry.full_name(), "media.Outer.ByNameEntry");
        let key = entry.map_key().unwrap();
        let value = entry.map_value().unwrap();
        assert_eq!((key.name(), key.number(), key.kind()), ("key", 1, Kind::String));
        assert_eq!((value.name(), value.number(), value.kind()), ("value", 2, Kind::Message));
    }

    #[test]
    fn map_entry_names() {
        assert_eq!(map_entry_name("info"), "InfoEntry");
        assert_eq!(map_entry_name("processor_map"), "ProcessorMapEntry");
    }

    #[test]
    fn enum_lookup_both_ways_with_alias() {
        let schema = Schema::parse("enum E { A = 0; B = 1; ALSO_B = 1; }").unwrap();
        let e = schema.enum_type("E").unwrap();
        assert_eq!(e.name_of(1), Some("B"));
        assert_eq!(e.number_of("ALSO_B"), Some(1));
        assert_eq!(e.name_of(7), None);
        assert_eq!(e.number_of("C"), None);
    }

    #[test]
    fn unresolved_type() {
        let err = Schema::parse("message M { Missing m = 1; }").unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedType { ref name, .. } if name == "Missing"));
    }

    #[test]
    fn duplicate_field_number() {
        let err = Schema::parse("message M { int32 a = 1; int32 b = 1; }").unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateFieldNumber { number: 1, .. }));
    }

    #[test]
    fn float_map_key_rejected() {
        let err = Schema::parse("message M { map<double, string> m = 1; }").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidMapKey { key: Kind::Double, .. }));
    }

    #[test]
    fn extension_attached_by_full_name() {
        let src = r#"
package app;
message Base { int32 id = 1; extensions 100 to 199; }
extend Base { string note = 100; }
message Holder { extend Base { repeated int32 tags = 101; } }
"#;
        let schema = Schema::parse(src).unwrap();
        let base = schema.message("app.Base").unwrap();
        let note = base.extension_by_name("app.note").unwrap();
        assert!(note.is_extension());
        assert_eq!(note.containing_message(), base);
        let tags = base.extension_by_name("app.Holder.tags").unwrap();
        assert_eq!(tags.cardinality(), Cardinality::Repeated);
        assert!(base.field_by_name("note").is_none());
        assert_eq!(base.field_by_number(101), Some(tags));
    }

    #[test]
    fn extension_outside_range() {
        let src = "message Base { extensions 100 to 199; } extend Base { int32 x = 5; }";
        assert!(matches!(
            Schema::parse(src).unwrap_err(),
            SchemaError::ExtensionOutOfRange { number: 5, .. }
        ));
    }

    #[test]
    fn reserved_number_and_name() {
        let err = Schema::parse("message M { reserved 2 to 4; int32 a = 3; }").unwrap_err();
        assert!(matches!(err, SchemaError::ReservedField { .. }));
        let err = Schema::parse("message M { reserved \"a\"; int32 a = 1; }").unwrap_err();
        assert!(matches!(err, SchemaError::ReservedField { .. }));
    }
}
