//! YAML text to a node tree that keeps every scalar's source text.
//!
//! `serde_yaml::Value` resolves plain scalars while loading, so `1.10` arrives as
//! the float `1.1`, `0x1F` as `31` and `True` as `true`. Here the document is read
//! twice: once for its layout, then again with that layout steering the
//! deserializer so each scalar is requested as a string. Scalars come out as
//! `Node::String` holding the text as written, nulls as `Node::Null`. Tags are
//! dropped.

use serde::de::{
    self, DeserializeSeed, Deserializer, EnumAccess, IgnoredAny, MapAccess, SeqAccess, VariantAccess,
    Visitor,
};
use serde::Deserialize;
use serde_yaml::{Mapping, Value as Node};
use std::fmt;

/// Parse a single YAML document, keeping scalar text verbatim.
pub(crate) fn parse(text: &str) -> Result<Node, serde_yaml::Error> {
    let layout: Layout = serde_yaml::from_str(text)?;
    Verbatim(&layout).deserialize(serde_yaml::Deserializer::from_str(text))
}

/// Node layout of a document without scalar values.
enum Layout {
    Null,
    Scalar,
    Sequence(Vec<Layout>),
    Mapping(Vec<(Layout, Layout)>),
}

impl<'de> Deserialize<'de> for Layout {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LayoutVisitor)
    }
}

struct LayoutVisitor;

impl<'de> Visitor<'de> for LayoutVisitor {
    type Value = Layout;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a YAML node")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Layout, E> {
        Ok(Layout::Scalar)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Layout, E> {
        Ok(Layout::Scalar)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Layout, E> {
        Ok(Layout::Scalar)
    }

    // Integer literals wider than 64 bits are still scalars.
    fn visit_i128<E: de::Error>(self, _: i128) -> Result<Layout, E> {
        Ok(Layout::Scalar)
    }

    fn visit_u128<E: de::Error>(self, _: u128) -> Result<Layout, E> {
        Ok(Layout::Scalar)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Layout, E> {
        Ok(Layout::Scalar)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Layout, E> {
        Ok(Layout::Scalar)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Layout, E> {
        Ok(Layout::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Layout, E> {
        Ok(Layout::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Layout, D::Error> {
        Layout::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Layout, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Layout::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Layout, A::Error> {
        let mut entries = Vec::new();
        while let Some(entry) = map.next_entry()? {
            entries.push(entry);
        }
        Ok(Layout::Mapping(entries))
    }

    // A tagged node: skip the tag, keep the layout of what it tags.
    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Layout, A::Error> {
        let (_, content): (IgnoredAny, _) = data.variant()?;
        content.newtype_variant()
    }
}

/// Second pass: reads the node described by the layout, scalars as strings.
struct Verbatim<'a>(&'a Layout);

impl<'de, 'a> DeserializeSeed<'de> for Verbatim<'a> {
    type Value = Node;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Node, D::Error> {
        match self.0 {
            Layout::Null => {
                IgnoredAny::deserialize(deserializer)?;
                Ok(Node::Null)
            }
            Layout::Scalar => String::deserialize(deserializer).map(Node::String),
            Layout::Sequence(items) => deserializer.deserialize_seq(SequenceVisitor(items)),
            Layout::Mapping(entries) => deserializer.deserialize_map(MappingVisitor(entries)),
        }
    }
}

struct SequenceVisitor<'a>(&'a [Layout]);

impl<'de, 'a> Visitor<'de> for SequenceVisitor<'a> {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a sequence of {} items", self.0.len())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut items = Vec::with_capacity(self.0.len());
        for layout in self.0 {
            match seq.next_element_seed(Verbatim(layout))? {
                Some(item) => items.push(item),
                None => return Err(de::Error::invalid_length(items.len(), &self)),
            }
        }
        Ok(Node::Sequence(items))
    }
}

struct MappingVisitor<'a>(&'a [(Layout, Layout)]);

impl<'de, 'a> Visitor<'de> for MappingVisitor<'a> {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a mapping of {} entries", self.0.len())
    }

    // Keys equal by text collapse into one entry holding the later value.
    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut entries = Mapping::with_capacity(self.0.len());
        for (position, (key, value)) in self.0.iter().enumerate() {
            let key = match map.next_key_seed(Verbatim(key))? {
                Some(key) => key,
                None => return Err(de::Error::invalid_length(position, &self)),
            };
            let value = map.next_value_seed(Verbatim(value))?;
            entries.insert(key, value);
        }
        Ok(Node::Mapping(entries))
    }
}
