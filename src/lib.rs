//! # protoyaml — schema-driven YAML ⇄ record conversion
//!
//! Loads human-written YAML into records whose shape comes from a protobuf-style
//! schema, and dumps records back into YAML.
//!
//! ## Schema language
//!
//! A subset of `.proto`: `package`, `message` (nested), `enum`, `oneof`,
//! `map<K, V>`, `repeated`, `reserved`, `extensions` / `extend`. Options and
//! imports are accepted and ignored.
//!
//! ```text
//! package media;
//!
//! message Processor {
//!   enum ProcessMediaType { video = 0; audio = 1; }
//!   string name = 1;
//!   ProcessMediaType type = 2;
//!   map<string, string> labels = 3;
//! }
//! ```
//!
//! ## Conversion rules
//!
//! - Mapping keys are field names; extensions use their full name (`pkg.ext`).
//! - Repeated fields are sequences, map fields are mappings, messages are mappings.
//! - Numbers and booleans may be written as strings (`"42"`, `0x2A`, `yes`).
//! - String fields take a scalar's text as written: `1.10` stays `"1.10"`.
//! - Enums are written by name; a number is accepted on input.
//! - Bytes are standard base64.
//! - Only `map<string, V>` fields can be encoded; other key types decode but do not encode.
//!
//! ## Usage
//!
//! ```no_run
//! use protoyaml::{DynamicRecord, Schema};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Schema::from_file("sample.proto")?;
//! let mut record = DynamicRecord::new(schema.message("Sample").ok_or("no Sample")?);
//! protoyaml::decode(&mut record, "name: recorder_sample\n")?;
//! print!("{}", protoyaml::encode(&record)?);
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod codec;
mod decode;
mod document;
mod encode;
pub mod error;
pub mod parser;
pub mod record;
pub mod reflect;
pub mod scalar;
pub mod schema;
pub mod value;

pub use codec::{Codec, CodecOptions, DEFAULT_MAX_DEPTH};
pub use error::{CodecError, ErrorKind, FieldPath};
pub use record::DynamicRecord;
pub use reflect::Reflect;
pub use scalar::{bytes_to_text, text_to_bytes};
pub use schema::{
    Cardinality, EnumDescriptor, FieldDescriptor, Kind, MessageDescriptor, Schema, SchemaError,
};
pub use value::Value;

/// Decode YAML `text` into `record` with default options.
pub fn decode<R: Reflect>(record: &mut R, text: &str) -> Result<(), CodecError> {
    Codec::default().decode_str(record, text)
}

/// Encode `record` as YAML text with default options.
pub fn encode<R: Reflect>(record: &R) -> Result<String, CodecError> {
    Codec::default().encode_string(record)
}
