//! Associative tag structure exchanged with the host's persistence codec and
//! with the network layer.
//!
//! A [`TagCompound`] is an ordered map from string keys to [`TagValue`]s.
//! Ordering is by key, so encoding the same compound twice yields the same
//! bytes; unresolved part blobs rely on that to be echoed unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single tag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagValue {
    Byte(i8),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    ByteArray(Vec<u8>),
    List(Vec<TagValue>),
    Compound(TagCompound),
}

impl From<i8> for TagValue {
    fn from(v: i8) -> Self {
        TagValue::Byte(v)
    }
}

impl From<i32> for TagValue {
    fn from(v: i32) -> Self {
        TagValue::Int(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Long(v)
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Double(v)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Byte(i8::from(v))
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::String(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::String(v.to_string())
    }
}

impl From<Vec<u8>> for TagValue {
    fn from(v: Vec<u8>) -> Self {
        TagValue::ByteArray(v)
    }
}

impl From<TagCompound> for TagValue {
    fn from(v: TagCompound) -> Self {
        TagValue::Compound(v)
    }
}

/// An ordered string-keyed map of tag values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TagCompound {
    entries: BTreeMap<String, TagValue>,
}

impl TagCompound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TagValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<TagValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.entries.get(key) {
            Some(TagValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_long(&self, key: &str) -> Option<i64> {
        match self.entries.get(key) {
            Some(TagValue::Long(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.entries.get(key) {
            Some(TagValue::Byte(v)) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(TagValue::String(v)) => Some(v),
            _ => None,
        }
    }

    pub fn get_compound(&self, key: &str) -> Option<&TagCompound> {
        match self.entries.get(key) {
            Some(TagValue::Compound(v)) => Some(v),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
