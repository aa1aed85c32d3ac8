//! The structural value model that session state is built from.
//!
//! Modeled as an explicit sum type rather than leaning on `serde_json::Value`
//! directly so that binary blobs are a first-class variant instead of a
//! runtime-detected shape — revival (see `authvault_codec`) switches on this
//! type's variants, not on reflection over a dynamically typed tree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A structurally-serializable value: the universal shape that credentials,
/// key records, and app-state entries are expressed in.
///
/// `Map` uses a `BTreeMap` deliberately: lexicographic key order falls out of
/// the type itself, so the codec's canonical-ordering requirement needs no
/// separate sort pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// The absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A numeric value. Stored as `f64` to accept both integers and floats
    /// from loosely-typed callers; integer-valued numbers round-trip exactly
    /// up to 2^53.
    Num(f64),
    /// A UTF-8 string.
    Str(String),
    /// A binary blob. Tagged as `{"type":"Buffer","data":[...]}` in the
    /// canonical JSON textual form; native here.
    Bytes(Vec<u8>),
    /// An ordered sequence of values.
    Seq(Vec<Value>),
    /// A mapping from string keys to values, in lexicographic key order.
    Map(BTreeMap<String, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    /// Construct a map value from an iterator of key/value pairs.
    pub fn map(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Value::Map(entries.into_iter().collect())
    }

    /// Borrow this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow this value as a byte slice, if it is one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// True if this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_preserves_lexicographic_order() {
        let v = Value::map([
            ("zeta".to_string(), Value::Num(1.0)),
            ("alpha".to_string(), Value::Num(2.0)),
        ]);
        let keys: Vec<_> = v.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn bytes_roundtrip_equality() {
        let a = Value::Bytes(vec![1, 2, 3]);
        let b = Value::Bytes(vec![1, 2, 3]);
        assert_eq!(a, b);
    }
}
