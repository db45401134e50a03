//! Conversion errors and the field path they are reported against.

use crate::schema::Kind;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("YAML parse error: {0}")]
    Parse(#[source] serde_yaml::Error),
    #[error("Invalid root: expected a mapping, found {found}")]
    InvalidRoot { found: &'static str },
    #[error("{path}: unknown field {name}")]
    UnknownField { path: String, name: String },
    #[error("{path}: type mismatch: {detail}")]
    TypeMismatch { path: String, detail: String },
    #[error("{path}: invalid enum value {value}")]
    InvalidEnumValue { path: String, value: String },
    #[error("{path}: invalid base64: {source}")]
    InvalidByteEncoding {
        path: String,
        #[source]
        source: base64::DecodeError,
    },
    #[error("{path}: unsupported map key type {kind}")]
    UnsupportedMapKeyType { path: String, kind: Kind },
    #[error("{path}: unsupported field kind: {detail}")]
    UnsupportedFieldKind { path: String, detail: String },
    #[error("{path}: nesting deeper than {limit} messages")]
    DepthExceeded { path: String, limit: usize },
    #[error("YAML render error: {0}")]
    Render(#[source] serde_yaml::Error),
}

/// Discriminant of [`CodecError`], for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    InvalidRoot,
    UnknownField,
    TypeMismatch,
    InvalidEnumValue,
    InvalidByteEncoding,
    UnsupportedMapKeyType,
    UnsupportedFieldKind,
    DepthExceeded,
    Render,
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::Parse(_) => ErrorKind::Parse,
            CodecError::InvalidRoot { .. } => ErrorKind::InvalidRoot,
            CodecError::UnknownField { .. } => ErrorKind::UnknownField,
            CodecError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            CodecError::InvalidEnumValue { .. } => ErrorKind::InvalidEnumValue,
            CodecError::InvalidByteEncoding { .. } => ErrorKind::InvalidByteEncoding,
            CodecError::UnsupportedMapKeyType { .. } => ErrorKind::UnsupportedMapKeyType,
            CodecError::UnsupportedFieldKind { .. } => ErrorKind::UnsupportedFieldKind,
            CodecError::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            CodecError::Render(_) => ErrorKind::Render,
        }
    }

    /// Field path the error was detected at, if it happened inside a record.
    pub fn path(&self) -> Option<&str> {
        match self {
            CodecError::UnknownField { path, .. }
            | CodecError::TypeMismatch { path, .. }
            | CodecError::InvalidEnumValue { path, .. }
            | CodecError::InvalidByteEncoding { path, .. }
            | CodecError::UnsupportedMapKeyType { path, .. }
            | CodecError::UnsupportedFieldKind { path, .. }
            | CodecError::DepthExceeded { path, .. } => Some(path),
            CodecError::Parse(_) | CodecError::InvalidRoot { .. } | CodecError::Render(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(usize),
    Key(String),
}

/// Location inside a document, e.g. `sources[0].processors[1]` or `metadata.info["my_key"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_field(&mut self, name: &str) {
        self.segments.push(Segment::Field(name.to_string()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.segments.push(Segment::Index(index));
    }

    pub fn push_key(&mut self, key: &str) {
        self.segments.push(Segment::Key(key.to_string()));
    }

    pub fn pop(&mut self) {
        self.segments.pop();
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => f.write_str(name)?,
                Segment::Field(name) => write!(f, ".{}", name)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
                Segment::Key(key) => write!(f, "[{:?}]", key)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_rendering() {
        let mut path = FieldPath::new();
        assert!(path.is_root());
        assert_eq!(path.to_string(), "<root>");
        path.push_field("sources");
        assert!(!path.is_root());
        path.push_index(0);
        path.push_field("processors");
        path.push_index(1);
        assert_eq!(path.to_string(), "sources[0].processors[1]");
        path.pop();
        path.pop();
        path.pop();
        path.pop();
        path.push_field("metadata");
        path.push_field("info");
        path.push_key("my_key");
        assert_eq!(path.to_string(), "metadata.info[\"my_key\"]");
    }

    #[test]
    fn kind_and_path() {
        let err = CodecError::UnknownField {
            path: "<root>".into(),
            name: "bogus".into(),
        };
        assert_eq!(err.kind(), ErrorKind::UnknownField);
        assert_eq!(err.path(), Some("<root>"));
        assert_eq!(err.to_string(), "<root>: unknown field bogus");
        let err = CodecError::InvalidRoot { found: "sequence" };
        assert_eq!(err.path(), None);
    }
}
