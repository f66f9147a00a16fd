//! Packet metadata and broker header values.
//!
//! Headers travel alongside every published frame, so the value space is
//! restricted to scalars every broker client can represent: strings,
//! integers and booleans. The bag keeps insertion order, which keeps the
//! encoded header layout deterministic for a given publish sequence.

use serde::{Deserialize, Serialize};

/// Header key carrying the sender identity.
pub const AUTHOR_KEY: &str = "author";

/// A wire-safe scalar header value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    /// UTF-8 string.
    Str(String),
    /// Signed 64-bit integer.
    Int(i64),
    /// Boolean flag.
    Bool(bool),
}

impl MetaValue {
    /// Returns the string content, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, if this value is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean content, if this value is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for MetaValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl std::fmt::Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// An ordered key/value bag of scalar metadata.
///
/// Used both for per-packet metadata and for broker-level headers. Keys
/// are unique: [`Metadata::set`] replaces an existing entry in place and
/// appends otherwise, so the last write for a key wins while the position
/// of first insertion is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    entries: Vec<(String, MetaValue)>,
}

impl Metadata {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the string value for `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetaValue::as_str)
    }

    /// Removes the entry for `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Copies every entry of `other` into this bag via [`Metadata::set`].
    pub fn merge(&mut self, other: &Metadata) {
        for (key, value) in &other.entries {
            self.set(key.clone(), value.clone());
        }
    }

    /// Iterates over the entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the bag holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut meta = Metadata::new();
        meta.set("author", "svc-a");
        meta.set("attempt", 3);
        meta.set("urgent", true);

        assert_eq!(meta.get_str("author"), Some("svc-a"));
        assert_eq!(meta.get("attempt").and_then(MetaValue::as_int), Some(3));
        assert_eq!(meta.get("urgent").and_then(MetaValue::as_bool), Some(true));
        assert!(meta.get("missing").is_none());
    }

    #[test]
    fn set_replaces_in_place() {
        let mut meta = Metadata::new();
        meta.set("a", 1);
        meta.set("b", 2);
        meta.set("a", 10);

        let keys: Vec<_> = meta.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(meta.get("a").and_then(MetaValue::as_int), Some(10));
        assert_eq!(meta.len(), 2);
    }

    #[test]
    fn merge_overwrites_and_appends() {
        let mut base = Metadata::new();
        base.set("author", "svc-a");
        base.set("kept", "yes");

        let mut extra = Metadata::new();
        extra.set("author", "spoofed");
        extra.set("added", 7);

        base.merge(&extra);
        assert_eq!(base.get_str("author"), Some("spoofed"));
        assert_eq!(base.get_str("kept"), Some("yes"));
        assert_eq!(base.get("added").and_then(MetaValue::as_int), Some(7));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn remove_entry() {
        let mut meta = Metadata::new();
        meta.set("a", 1);
        assert_eq!(meta.remove("a"), Some(MetaValue::Int(1)));
        assert!(meta.remove("a").is_none());
        assert!(meta.is_empty());
    }

    #[test]
    fn scalar_values_serialize_untagged() {
        let json = serde_json::to_string(&MetaValue::Str("x".into())).unwrap();
        assert_eq!(json, "\"x\"");
        let json = serde_json::to_string(&MetaValue::Int(42)).unwrap();
        assert_eq!(json, "42");
        let json = serde_json::to_string(&MetaValue::Bool(false)).unwrap();
        assert_eq!(json, "false");
    }
}
