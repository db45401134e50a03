//! Tree to record: walks a YAML mapping and fills a record through [`Reflect`].

use crate::codec::CodecOptions;
use crate::error::{CodecError, FieldPath};
use crate::reflect::Reflect;
use crate::scalar::{decode_scalar, describe, scalar_text, untag};
use crate::schema::{Cardinality, FieldDescriptor, Kind};
use serde_yaml::{Mapping, Value as Node};
use tracing::trace;

pub(crate) struct DecodeContext {
    pub(crate) path: FieldPath,
    depth: usize,
    max_depth: Option<usize>,
}

impl DecodeContext {
    pub(crate) fn new(options: &CodecOptions) -> Self {
        DecodeContext {
            path: FieldPath::new(),
            depth: 0,
            max_depth: options.max_depth,
        }
    }

    fn enter(&mut self) -> Result<(), CodecError> {
        if let Some(limit) = self.max_depth {
            if self.depth >= limit {
                return Err(CodecError::DepthExceeded {
                    path: self.path.to_string(),
                    limit,
                });
            }
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn mismatch(&self, detail: String) -> CodecError {
        CodecError::TypeMismatch {
            path: self.path.to_string(),
            detail,
        }
    }

    fn unsupported(&self, field: &FieldDescriptor) -> CodecError {
        CodecError::UnsupportedFieldKind {
            path: self.path.to_string(),
            detail: format!("{} cannot hold a nested record", field.full_name()),
        }
    }
}

/// Decode every entry of `map` into `record`. Entries are applied in document
/// order; on error, entries already applied stay applied.
pub(crate) fn decode_mapping<R: Reflect>(
    record: &mut R,
    map: &Mapping,
    ctx: &mut DecodeContext,
) -> Result<(), CodecError> {
    let descriptor = record.descriptor().clone();
    for (key, node) in map {
        let name = scalar_text(key).ok_or_else(|| {
            ctx.mismatch(format!("field name must be a scalar, found {}", describe(key)))
        })?;
        let field = descriptor
            .field_by_name(&name)
            .or_else(|| descriptor.extension_by_name(&name))
            .ok_or_else(|| CodecError::UnknownField {
                path: ctx.path.to_string(),
                name: name.clone(),
            })?;
        trace!(field = field.full_name(), kind = %field.kind(), "decode field");
        ctx.path.push_field(&name);
        decode_field(record, &field, node, ctx)?;
        ctx.path.pop();
    }
    Ok(())
}

fn decode_field<R: Reflect>(
    record: &mut R,
    field: &FieldDescriptor,
    node: &Node,
    ctx: &mut DecodeContext,
) -> Result<(), CodecError> {
    match field.cardinality() {
        Cardinality::Map => decode_map(record, field, node, ctx),
        Cardinality::Repeated => {
            let items = match untag(node) {
                Node::Sequence(items) => items,
                other => {
                    return Err(ctx.mismatch(format!(
                        "invalid array: expected a sequence, found {}",
                        describe(other)
                    )))
                }
            };
            for (i, item) in items.iter().enumerate() {
                ctx.path.push_index(i);
                if field.kind() == Kind::Message {
                    let map = expect_mapping(item, ctx)?;
                    let child = record.add_message(field).ok_or_else(|| ctx.unsupported(field))?;
                    decode_nested(child, map, ctx)?;
                } else {
                    let value = decode_scalar(field, item, &ctx.path)?;
                    record.add(field, value);
                }
                ctx.path.pop();
            }
            Ok(())
        }
        Cardinality::Singular => decode_singular(record, field, node, ctx),
    }
}

fn decode_map<R: Reflect>(
    record: &mut R,
    field: &FieldDescriptor,
    node: &Node,
    ctx: &mut DecodeContext,
) -> Result<(), CodecError> {
    let entries = match untag(node) {
        Node::Mapping(entries) => entries,
        other => {
            return Err(ctx.mismatch(format!(
                "invalid map: expected a mapping, found {}",
                describe(other)
            )))
        }
    };
    let entry_type = field.message_type().ok_or_else(|| ctx.unsupported(field))?;
    let (key_field, value_field) = match (entry_type.map_key(), entry_type.map_value()) {
        (Some(k), Some(v)) => (k, v),
        _ => return Err(ctx.unsupported(field)),
    };
    for (key_node, value_node) in entries {
        let label = scalar_text(key_node).unwrap_or_else(|| describe(key_node).to_string());
        ctx.path.push_key(&label);
        let key = decode_scalar(&key_field, key_node, &ctx.path)?;
        let entry = record.add_message(field).ok_or_else(|| ctx.unsupported(field))?;
        entry.set(&key_field, key);
        decode_singular(entry, &value_field, value_node, ctx)?;
        ctx.path.pop();
    }
    Ok(())
}

fn decode_singular<R: Reflect>(
    record: &mut R,
    field: &FieldDescriptor,
    node: &Node,
    ctx: &mut DecodeContext,
) -> Result<(), CodecError> {
    if field.kind() == Kind::Message {
        let map = expect_mapping(node, ctx)?;
        let child = record.mutable_message(field).ok_or_else(|| ctx.unsupported(field))?;
        decode_nested(child, map, ctx)
    } else {
        let value = decode_scalar(field, node, &ctx.path)?;
        record.set(field, value);
        Ok(())
    }
}

fn expect_mapping<'a>(node: &'a Node, ctx: &DecodeContext) -> Result<&'a Mapping, CodecError> {
    match untag(node) {
        Node::Mapping(map) => Ok(map),
        other => Err(ctx.mismatch(format!(
            "expected a mapping for a message, found {}",
            describe(other)
        ))),
    }
}

fn decode_nested<R: Reflect>(child: &mut R, map: &Mapping, ctx: &mut DecodeContext) -> Result<(), CodecError> {
    ctx.enter()?;
    decode_mapping(child, map, ctx)?;
    ctx.leave();
    Ok(())
}
