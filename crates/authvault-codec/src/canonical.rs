//! Canonical textual form (spec.md §4.1): `Value` <-> JSON, with binary blobs
//! represented as the tagged sum `{"type":"Buffer","data":[...]}` and map
//! keys in lexicographic order.
//!
//! `serde_json::Map` is BTreeMap-backed by default (the `preserve_order`
//! cargo feature is not enabled anywhere in this workspace), so serializing
//! through `serde_json::Value::Object` already gives the required key
//! ordering for free; the only hand-written logic here is the Buffer tag.

use authvault_types::Value;
use serde_json::{Map, Number};

const BUFFER_TYPE_TAG: &str = "Buffer";

/// Convert a domain `Value` into its canonical JSON form.
pub fn to_canonical_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Num(n) => Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(bytes) => {
            let mut obj = Map::new();
            obj.insert(
                "type".to_string(),
                serde_json::Value::String(BUFFER_TYPE_TAG.to_string()),
            );
            obj.insert(
                "data".to_string(),
                serde_json::Value::Array(
                    bytes
                        .iter()
                        .map(|b| serde_json::Value::Number((*b as u64).into()))
                        .collect(),
                ),
            );
            serde_json::Value::Object(obj)
        }
        Value::Seq(items) => {
            serde_json::Value::Array(items.iter().map(to_canonical_json).collect())
        }
        Value::Map(entries) => {
            let mut obj = Map::new();
            for (k, v) in entries {
                obj.insert(k.clone(), to_canonical_json(v));
            }
            serde_json::Value::Object(obj)
        }
    }
}

/// Inverse of [`to_canonical_json`]: parse canonical JSON back into a
/// `Value`, reviving any node matching the Buffer tagged sum into
/// `Value::Bytes`, recursively, at every nesting depth.
///
/// Mirrors spec.md §4.1's "Why this is subtle" note: a shallow, top-level-only
/// revival pass would silently leave nested tagged sums un-revived inside key
/// records that nest a Buffer two or three levels deep.
pub fn from_canonical_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Num(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => {
            Value::Seq(items.iter().map(from_canonical_json).collect())
        }
        serde_json::Value::Object(obj) => {
            if let Some(bytes) = revive_buffer_tag(obj) {
                Value::Bytes(bytes)
            } else {
                let mut map = std::collections::BTreeMap::new();
                for (k, v) in obj {
                    map.insert(k.clone(), from_canonical_json(v));
                }
                Value::Map(map)
            }
        }
    }
}

/// Recognize `{"type":"Buffer","data":[...]}` and extract its bytes. Any
/// object with extra keys, a non-"Buffer" type, or non-byte data elements is
/// left intact as a regular map (spec.md: "Non-'plain' object shapes... are
/// left intact" is mirrored here the other direction: only exact matches are
/// revived).
fn revive_buffer_tag(obj: &Map<String, serde_json::Value>) -> Option<Vec<u8>> {
    if obj.len() != 2 {
        return None;
    }
    let ty = obj.get("type")?.as_str()?;
    if ty != BUFFER_TYPE_TAG {
        return None;
    }
    let data = obj.get("data")?.as_array()?;
    let mut bytes = Vec::with_capacity(data.len());
    for el in data {
        bytes.push(el.as_u64()?.try_into().ok()?);
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keys_are_lexicographically_ordered_in_output() {
        let v = Value::map([
            ("zeta".to_string(), Value::Num(1.0)),
            ("alpha".to_string(), Value::Num(2.0)),
        ]);
        let json = to_canonical_json(&v);
        let text = serde_json::to_string(&json).unwrap();
        assert!(text.find("alpha").unwrap() < text.find("zeta").unwrap());
    }

    #[test]
    fn nested_bytes_revive_at_every_depth() {
        let v = Value::map([(
            "outer".to_string(),
            Value::map([(
                "inner".to_string(),
                Value::Seq(vec![Value::Bytes(vec![1, 2, 3])]),
            )]),
        )]);
        let json = to_canonical_json(&v);
        let revived = from_canonical_json(&json);
        assert_eq!(revived, v);
    }

    #[test]
    fn buffer_tag_round_trips_through_json_text() {
        let v = Value::Bytes(vec![9, 8, 7, 255]);
        let json = to_canonical_json(&v);
        let text = serde_json::to_string(&json).unwrap();
        assert!(text.contains("\"Buffer\""));
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(from_canonical_json(&parsed), v);
    }

    #[test]
    fn object_with_extra_keys_is_not_mistaken_for_a_buffer() {
        let mut obj = Map::new();
        obj.insert(
            "type".to_string(),
            serde_json::Value::String("Buffer".to_string()),
        );
        obj.insert("data".to_string(), serde_json::Value::Array(vec![]));
        obj.insert("extra".to_string(), serde_json::Value::Bool(true));
        let json = serde_json::Value::Object(obj);
        let revived = from_canonical_json(&json);
        assert!(matches!(revived, Value::Map(_)));
    }
}
