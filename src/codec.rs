//! Convert YAML text to records and back.
//!
//! [`Codec`] holds the conversion options; the free functions [`crate::decode`] and
//! [`crate::encode`] use `Codec::default()`.

use crate::decode::{decode_mapping, DecodeContext};
use crate::document;
use crate::encode::{encode_record, EncodeContext};
use crate::error::CodecError;
use crate::reflect::Reflect;
use crate::scalar::{describe, untag};
use serde_yaml::Value as Node;
use tracing::debug;

/// Message nesting allowed by default before [`CodecError::DepthExceeded`].
pub const DEFAULT_MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Deepest message nesting below the root; `None` disables the check.
    pub max_depth: Option<usize>,
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions {
            max_depth: Some(DEFAULT_MAX_DEPTH),
        }
    }
}

impl CodecOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.max_depth = None;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Codec {
    options: CodecOptions,
}

impl Codec {
    pub fn new(options: CodecOptions) -> Self {
        Codec { options }
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Parse `text` as YAML and decode it into `record`. Scalars reach the
    /// fields with their text as written, so `version: 1.10` fills a string
    /// field with `"1.10"`.
    pub fn decode_str<R: Reflect>(&self, record: &mut R, text: &str) -> Result<(), CodecError> {
        let root = document::parse(text).map_err(|e| {
            debug!(type_name = record.descriptor().full_name(), error = %e, "yaml parse failed");
            CodecError::Parse(e)
        })?;
        self.decode_value(record, &root)
    }

    /// Decode a parsed document into `record`. The root must be a mapping.
    ///
    /// Numbers and booleans in a tree built by `serde_yaml` have already lost their
    /// source text; a string field receives their canonical rendering.
    ///
    /// Decoding is not transactional: fields assigned before an error stay assigned.
    pub fn decode_value<R: Reflect>(&self, record: &mut R, root: &Node) -> Result<(), CodecError> {
        let type_name = record.descriptor().full_name().to_string();
        let map = match untag(root) {
            Node::Mapping(map) => map,
            other => {
                let err = CodecError::InvalidRoot {
                    found: describe(other),
                };
                debug!(type_name = %type_name, error = %err, "decode failed");
                return Err(err);
            }
        };
        debug!(type_name = %type_name, entries = map.len(), "decode start");
        let mut ctx = DecodeContext::new(&self.options);
        match decode_mapping(record, map, &mut ctx) {
            Ok(()) => {
                debug!(type_name = %type_name, present = record.list_fields().len(), "decode done");
                Ok(())
            }
            Err(err) => {
                debug!(type_name = %type_name, error = %err, "decode failed");
                Err(err)
            }
        }
    }

    /// Encode `record` as a YAML mapping node.
    pub fn encode_value<R: Reflect>(&self, record: &R) -> Result<Node, CodecError> {
        let type_name = record.descriptor().full_name();
        debug!(type_name, present = record.list_fields().len(), "encode start");
        let mut ctx = EncodeContext::new(&self.options);
        match encode_record(record, &mut ctx) {
            Ok(map) => {
                debug!(type_name, entries = map.len(), "encode done");
                Ok(Node::Mapping(map))
            }
            Err(err) => {
                debug!(type_name, error = %err, "encode failed");
                Err(err)
            }
        }
    }

    /// Encode `record` and render it as YAML text.
    pub fn encode_string<R: Reflect>(&self, record: &R) -> Result<String, CodecError> {
        let node = self.encode_value(record)?;
        serde_yaml::to_string(&node).map_err(CodecError::Render)
    }
}
