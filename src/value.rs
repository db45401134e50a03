//! Runtime scalar values stored in records.

use crate::schema::Kind;

/// A single scalar field value. Message values live in the record itself
/// (see [`Reflect`](crate::reflect::Reflect)).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Enum values are stored by number.
    EnumNumber(i32),
}

impl Value {
    /// Zero value of a scalar kind; `None` for `Kind::Message`.
    pub fn default_for(kind: Kind) -> Option<Value> {
        Some(match kind {
            Kind::Double => Value::F64(0.0),
            Kind::Float => Value::F32(0.0),
            Kind::Int32 => Value::I32(0),
            Kind::Int64 => Value::I64(0),
            Kind::UInt32 => Value::U32(0),
            Kind::UInt64 => Value::U64(0),
            Kind::Bool => Value::Bool(false),
            Kind::String => Value::String(String::new()),
            Kind::Bytes => Value::Bytes(Vec::new()),
            Kind::Enum => Value::EnumNumber(0),
            Kind::Message => return None,
        })
    }

    /// Whether this value can be stored in a field of `kind`.
    pub fn is_valid_for(&self, kind: Kind) -> bool {
        matches!(
            (self, kind),
            (Value::Bool(_), Kind::Bool)
                | (Value::I32(_), Kind::Int32)
                | (Value::I64(_), Kind::Int64)
                | (Value::U32(_), Kind::UInt32)
                | (Value::U64(_), Kind::UInt64)
                | (Value::F32(_), Kind::Float)
                | (Value::F64(_), Kind::Double)
                | (Value::String(_), Kind::String)
                | (Value::Bytes(_), Kind::Bytes)
                | (Value::EnumNumber(_), Kind::Enum)
        )
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U32(x) => Some(*x as u64),
            Value::U64(x) => Some(*x),
            Value::I32(x) => (*x).try_into().ok(),
            Value::I64(x) => (*x).try_into().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I32(x) => Some(*x as i64),
            Value::I64(x) => Some(*x),
            Value::U32(x) => Some(*x as i64),
            Value::U64(x) => (*x).try_into().ok(),
            Value::EnumNumber(x) => Some(*x as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(x) => Some(*x as f64),
            Value::F64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_enum_number(&self) -> Option<i32> {
        match self {
            Value::EnumNumber(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
