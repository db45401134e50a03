//! Scalar codec: single YAML scalars to and from field values.
//!
//! Numbers, booleans and strings are interchangeable as far as the document allows:
//! `"42"` fills an `int32`, `42` fills a `string`, `yes` fills a `bool`. Bytes travel
//! as standard padded base64, enums as their symbolic name (a number is accepted on
//! decode).

use crate::error::{CodecError, FieldPath};
use crate::schema::{FieldDescriptor, Kind};
use crate::value::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_yaml::Value as Node;

/// Encode bytes as standard padded base64.
pub fn bytes_to_text(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard padded base64.
pub fn text_to_bytes(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}

/// Tags are ignored; look through to the tagged value.
pub(crate) fn untag(node: &Node) -> &Node {
    match node {
        Node::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

pub(crate) fn describe(node: &Node) -> &'static str {
    match untag(node) {
        Node::Null => "null",
        Node::Bool(_) => "bool",
        Node::Number(_) => "number",
        Node::String(_) => "string",
        Node::Sequence(_) => "sequence",
        Node::Mapping(_) => "mapping",
        Node::Tagged(_) => "tagged value",
    }
}

/// Text of a scalar node; `None` for null, sequences and mappings. Parsed text
/// holds every scalar as a string already; `Bool` and `Number` only appear in
/// trees built by the caller.
pub(crate) fn scalar_text(node: &Node) -> Option<String> {
    match untag(node) {
        Node::Bool(b) => Some(b.to_string()),
        Node::Number(n) => Some(n.to_string()),
        Node::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Integer literal: optional sign, optional `0x`/`0o`/`0b` prefix.
fn parse_integer(text: &str) -> Option<i128> {
    let (negative, rest) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = if let Some(d) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (16, d)
    } else if let Some(d) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        (8, d)
    } else if let Some(d) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        (2, d)
    } else {
        (10, rest)
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = i128::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn integer_of(node: &Node) -> Option<i128> {
    match untag(node) {
        Node::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        Node::String(s) => parse_integer(s),
        _ => None,
    }
}

fn float_of(node: &Node) -> Option<f64> {
    match untag(node) {
        Node::Number(n) => n.as_f64(),
        Node::String(s) => match s.to_ascii_lowercase().as_str() {
            ".inf" | "+.inf" => Some(f64::INFINITY),
            "-.inf" => Some(f64::NEG_INFINITY),
            ".nan" => Some(f64::NAN),
            _ => s.parse().ok().or_else(|| parse_integer(s).map(|v| v as f64)),
        },
        _ => None,
    }
}

fn bool_of(node: &Node) -> Option<bool> {
    match untag(node) {
        Node::Bool(b) => Some(*b),
        Node::String(s) => match s.as_str() {
            "y" | "Y" | "yes" | "Yes" | "YES" | "true" | "True" | "TRUE" | "on" | "On" | "ON" => {
                Some(true)
            }
            "n" | "N" | "no" | "No" | "NO" | "false" | "False" | "FALSE" | "off" | "Off"
            | "OFF" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn mismatch(field: &FieldDescriptor, node: &Node, path: &FieldPath) -> CodecError {
    let found = match scalar_text(node) {
        Some(text) => format!("{} {:?}", describe(node), text),
        None => describe(node).to_string(),
    };
    CodecError::TypeMismatch {
        path: path.to_string(),
        detail: format!("expected {}, found {}", field.kind(), found),
    }
}

fn integer<T: TryFrom<i128>>(field: &FieldDescriptor, node: &Node, path: &FieldPath) -> Result<T, CodecError> {
    integer_of(node)
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| mismatch(field, node, path))
}

/// Decode one scalar node into a value of `field`'s kind.
pub(crate) fn decode_scalar(field: &FieldDescriptor, node: &Node, path: &FieldPath) -> Result<Value, CodecError> {
    let value = match field.kind() {
        Kind::Double => Value::F64(float_of(node).ok_or_else(|| mismatch(field, node, path))?),
        Kind::Float => {
            let wide = float_of(node).ok_or_else(|| mismatch(field, node, path))?;
            let narrow = wide as f32;
            if wide.is_finite() && narrow.is_infinite() {
                return Err(mismatch(field, node, path));
            }
            Value::F32(narrow)
        }
        Kind::Int32 => Value::I32(integer(field, node, path)?),
        Kind::Int64 => Value::I64(integer(field, node, path)?),
        Kind::UInt32 => Value::U32(integer(field, node, path)?),
        Kind::UInt64 => Value::U64(integer(field, node, path)?),
        Kind::Bool => Value::Bool(bool_of(node).ok_or_else(|| mismatch(field, node, path))?),
        Kind::String => Value::String(scalar_text(node).ok_or_else(|| mismatch(field, node, path))?),
        Kind::Bytes => {
            let text = scalar_text(node).ok_or_else(|| mismatch(field, node, path))?;
            let bytes = text_to_bytes(&text).map_err(|source| CodecError::InvalidByteEncoding {
                path: path.to_string(),
                source,
            })?;
            Value::Bytes(bytes)
        }
        Kind::Enum => {
            let enum_type = field.enum_type().ok_or_else(|| CodecError::UnsupportedFieldKind {
                path: path.to_string(),
                detail: format!("{} has no enum type", field.full_name()),
            })?;
            let text = scalar_text(node).ok_or_else(|| mismatch(field, node, path))?;
            let by_code = integer_of(node)
                .and_then(|v| i32::try_from(v).ok())
                .filter(|&code| enum_type.name_of(code).is_some());
            match by_code.or_else(|| enum_type.number_of(&text)) {
                Some(code) => Value::EnumNumber(code),
                None => {
                    return Err(CodecError::InvalidEnumValue {
                        path: path.to_string(),
                        value: text,
                    })
                }
            }
        }
        Kind::Message => {
            return Err(CodecError::UnsupportedFieldKind {
                path: path.to_string(),
                detail: format!("{} is a message field, not a scalar", field.full_name()),
            })
        }
    };
    Ok(value)
}

/// Encode a stored value of `field` as a scalar node.
pub(crate) fn encode_scalar(field: &FieldDescriptor, value: &Value, path: &FieldPath) -> Result<Node, CodecError> {
    let node = match (field.kind(), value) {
        (Kind::Double, Value::F64(x)) => Node::Number((*x).into()),
        (Kind::Float, Value::F32(x)) => Node::Number(f64::from(*x).into()),
        (Kind::Int32, Value::I32(x)) => Node::Number(i64::from(*x).into()),
        (Kind::Int64, Value::I64(x)) => Node::Number((*x).into()),
        (Kind::UInt32, Value::U32(x)) => Node::Number(u64::from(*x).into()),
        (Kind::UInt64, Value::U64(x)) => Node::Number((*x).into()),
        (Kind::Bool, Value::Bool(b)) => Node::Bool(*b),
        (Kind::String, Value::String(s)) => Node::String(s.clone()),
        (Kind::Bytes, Value::Bytes(b)) => Node::String(bytes_to_text(b)),
        (Kind::Enum, Value::EnumNumber(code)) => {
            let name = field.enum_type().and_then(|e| e.name_of(*code).map(str::to_string));
            match name {
                Some(name) => Node::String(name),
                None => {
                    return Err(CodecError::UnsupportedFieldKind {
                        path: path.to_string(),
                        detail: format!("enum code {} has no name in {}", code, field.full_name()),
                    })
                }
            }
        }
        (kind, value) => {
            return Err(CodecError::UnsupportedFieldKind {
                path: path.to_string(),
                detail: format!("{} field holds {:?}", kind, value),
            })
        }
    };
    Ok(node)
}
