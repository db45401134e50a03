//! Abstract Syntax Tree for the schema language.

/// Root of a parsed schema source: package, top-level messages, enums and extends.
#[derive(Debug, Clone, Default)]
pub struct SchemaFile {
    pub syntax: Option<String>,
    pub package: Option<String>,
    pub imports: Vec<String>,
    pub messages: Vec<MessageDef>,
    pub enums: Vec<EnumDef>,
    pub extends: Vec<ExtendDef>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    /// Names of the oneof groups, indexed by [`FieldDef::oneof`].
    pub oneofs: Vec<String>,
    pub messages: Vec<MessageDef>,
    pub enums: Vec<EnumDef>,
    pub extends: Vec<ExtendDef>,
    pub reserved_numbers: Vec<NumberRange>,
    pub reserved_names: Vec<String>,
    pub extension_ranges: Vec<NumberRange>,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub label: Label,
    pub type_spec: TypeSpec,
    pub number: u32,
    pub oneof: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Label {
    /// No label (proto3 implicit presence).
    #[default]
    None,
    Optional,
    Required,
    Repeated,
}

/// Field type as written in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Scalar(ScalarType),
    /// Reference to a message or enum, possibly qualified or with a leading `.`.
    Named(String),
    Map(Box<TypeSpec>, Box<TypeSpec>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Fixed32,
    Fixed64,
    SFixed32,
    SFixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    pub fn from_keyword(s: &str) -> Option<Self> {
        Some(match s {
            "double" => ScalarType::Double,
            "float" => ScalarType::Float,
            "int32" => ScalarType::Int32,
            "int64" => ScalarType::Int64,
            "uint32" => ScalarType::UInt32,
            "uint64" => ScalarType::UInt64,
            "sint32" => ScalarType::SInt32,
            "sint64" => ScalarType::SInt64,
            "fixed32" => ScalarType::Fixed32,
            "fixed64" => ScalarType::Fixed64,
            "sfixed32" => ScalarType::SFixed32,
            "sfixed64" => ScalarType::SFixed64,
            "bool" => ScalarType::Bool,
            "string" => ScalarType::String,
            "bytes" => ScalarType::Bytes,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<EnumValueDef>,
}

#[derive(Debug, Clone)]
pub struct EnumValueDef {
    pub name: String,
    pub number: i32,
}

#[derive(Debug, Clone)]
pub struct ExtendDef {
    pub extendee: String,
    pub fields: Vec<FieldDef>,
}

/// Inclusive range of field numbers (`reserved 4 to 6;`, `extensions 100 to max;`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberRange {
    pub start: u32,
    pub end: u32,
}

impl NumberRange {
    pub fn contains(&self, number: u32) -> bool {
        self.start <= number && number <= self.end
    }
}
