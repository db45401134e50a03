//! Record to tree: reads present fields through [`Reflect`] and builds a YAML mapping.

use crate::codec::CodecOptions;
use crate::error::{CodecError, FieldPath};
use crate::reflect::Reflect;
use crate::scalar::encode_scalar;
use crate::schema::{Cardinality, FieldDescriptor, Kind};
use crate::value::Value;
use serde_yaml::{Mapping, Value as Node};
use tracing::trace;

pub(crate) struct EncodeContext {
    pub(crate) path: FieldPath,
    depth: usize,
    max_depth: Option<usize>,
}

impl EncodeContext {
    pub(crate) fn new(options: &CodecOptions) -> Self {
        EncodeContext {
            path: FieldPath::new(),
            depth: 0,
            max_depth: options.max_depth,
        }
    }

    fn unsupported(&self, detail: String) -> CodecError {
        CodecError::UnsupportedFieldKind {
            path: self.path.to_string(),
            detail,
        }
    }
}

/// Present fields in storage order; extensions keyed by full name.
pub(crate) fn encode_record<R: Reflect>(record: &R, ctx: &mut EncodeContext) -> Result<Mapping, CodecError> {
    let mut out = Mapping::new();
    for field in record.list_fields() {
        let key = if field.is_extension() {
            field.full_name()
        } else {
            field.name()
        };
        trace!(field = field.full_name(), kind = %field.kind(), "encode field");
        ctx.path.push_field(key);
        let node = match field.cardinality() {
            Cardinality::Map => encode_map(record, &field, ctx)?,
            Cardinality::Repeated => {
                let len = record.field_len(&field);
                let mut items = Vec::with_capacity(len);
                for i in 0..len {
                    ctx.path.push_index(i);
                    items.push(encode_element(record, &field, i, ctx)?);
                    ctx.path.pop();
                }
                Node::Sequence(items)
            }
            Cardinality::Singular => encode_singular(record, &field, ctx)?,
        };
        ctx.path.pop();
        out.insert(Node::String(key.to_string()), node);
    }
    Ok(out)
}

fn encode_singular<R: Reflect>(record: &R, field: &FieldDescriptor, ctx: &mut EncodeContext) -> Result<Node, CodecError> {
    if field.kind() == Kind::Message {
        let child = record
            .message(field)
            .ok_or_else(|| ctx.unsupported(format!("{} has no record", field.full_name())))?;
        encode_nested(child, ctx)
    } else {
        let value = record
            .get(field)
            .ok_or_else(|| ctx.unsupported(format!("{} has no value", field.full_name())))?;
        encode_scalar(field, value, &ctx.path)
    }
}

fn encode_element<R: Reflect>(
    record: &R,
    field: &FieldDescriptor,
    index: usize,
    ctx: &mut EncodeContext,
) -> Result<Node, CodecError> {
    if field.kind() == Kind::Message {
        let child = record
            .repeated_message(field, index)
            .ok_or_else(|| ctx.unsupported(format!("{} has no record", field.full_name())))?;
        encode_nested(child, ctx)
    } else {
        let value = record
            .get_repeated(field, index)
            .ok_or_else(|| ctx.unsupported(format!("{} has no value", field.full_name())))?;
        encode_scalar(field, value, &ctx.path)
    }
}

/// Only string keys are written; a later entry replaces an earlier one with the same key.
fn encode_map<R: Reflect>(record: &R, field: &FieldDescriptor, ctx: &mut EncodeContext) -> Result<Node, CodecError> {
    let entry_type = field
        .message_type()
        .ok_or_else(|| ctx.unsupported(format!("{} has no entry type", field.full_name())))?;
    let (key_field, value_field) = match (entry_type.map_key(), entry_type.map_value()) {
        (Some(k), Some(v)) => (k, v),
        _ => return Err(ctx.unsupported(format!("{} is not a map entry", entry_type.full_name()))),
    };
    if key_field.kind() != Kind::String {
        return Err(CodecError::UnsupportedMapKeyType {
            path: ctx.path.to_string(),
            kind: key_field.kind(),
        });
    }
    let mut out = Mapping::new();
    for i in 0..record.field_len(field) {
        let entry = record
            .repeated_message(field, i)
            .ok_or_else(|| ctx.unsupported(format!("{} has no entry {}", field.full_name(), i)))?;
        let key = match entry.get(&key_field) {
            Some(Value::String(s)) => s.clone(),
            None => String::new(),
            Some(other) => return Err(ctx.unsupported(format!("map key holds {:?}", other))),
        };
        ctx.path.push_key(&key);
        let value = if value_field.kind() == Kind::Message {
            match entry.message(&value_field) {
                Some(child) => encode_nested(child, ctx)?,
                None => Node::Mapping(Mapping::new()),
            }
        } else {
            match entry.get(&value_field) {
                Some(v) => encode_scalar(&value_field, v, &ctx.path)?,
                None => default_node(&value_field, ctx)?,
            }
        };
        ctx.path.pop();
        out.insert(Node::String(key), value);
    }
    Ok(Node::Mapping(out))
}

/// Zero value of a scalar field; enums default to their first declared value.
fn default_node(field: &FieldDescriptor, ctx: &EncodeContext) -> Result<Node, CodecError> {
    if field.kind() == Kind::Enum {
        return field
            .enum_type()
            .and_then(|e| e.values().next().map(|(name, _)| Node::String(name.to_string())))
            .ok_or_else(|| ctx.unsupported(format!("{} has no enum values", field.full_name())));
    }
    let value = Value::default_for(field.kind())
        .ok_or_else(|| ctx.unsupported(format!("{} has no scalar default", field.full_name())))?;
    encode_scalar(field, &value, &ctx.path)
}

fn encode_nested<R: Reflect>(child: &R, ctx: &mut EncodeContext) -> Result<Node, CodecError> {
    if let Some(limit) = ctx.max_depth {
        if ctx.depth >= limit {
            return Err(CodecError::DepthExceeded {
                path: ctx.path.to_string(),
                limit,
            });
        }
    }
    ctx.depth += 1;
    let map = encode_record(child, ctx)?;
    ctx.depth -= 1;
    Ok(Node::Mapping(map))
}
