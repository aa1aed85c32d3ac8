//! Hot-tier key layout (spec.md §4.3, §6 "Hot-tier key layout") and the
//! composite "keys" field shape that folds `appState` in alongside `keys`
//! while keeping exactly three on-wire keys per session.

use authvault_types::{app_state_to_value, keys_to_value, value_to_app_state, value_to_keys, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default key prefix (spec.md §4.3 "Default prefix: `baileys:auth`").
pub const DEFAULT_PREFIX: &str = "baileys:auth";

/// `{prefix}:{sessionId}:creds`
pub fn creds_key(prefix: &str, session_id: &str) -> String {
    format!("{prefix}:{session_id}:creds")
}

/// `{prefix}:{sessionId}:keys`
pub fn keys_key(prefix: &str, session_id: &str) -> String {
    format!("{prefix}:{session_id}:keys")
}

/// `{prefix}:{sessionId}:meta`
pub fn meta_key(prefix: &str, session_id: &str) -> String {
    format!("{prefix}:{session_id}:meta")
}

/// Plain (unencrypted) meta record: `{"version": n, "updatedAt": "<ISO-8601>"}`
/// (spec.md §6 "Hot-tier key layout").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaRecord {
    pub version: u64,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Fold `keys` and `appState` into the single `Value` the `…:keys` slot
/// stores, so the three-key layout from spec.md §4.3 holds even though
/// `AuthSnapshot` has two logically distinct fields beyond `creds`.
pub fn pack_keys_slot(
    keys: &BTreeMap<String, BTreeMap<String, Value>>,
    app_state: &Option<BTreeMap<String, Value>>,
) -> Value {
    Value::map([
        ("keys".to_string(), keys_to_value(keys)),
        ("appState".to_string(), app_state_to_value(app_state)),
    ])
}

/// Inverse of [`pack_keys_slot`].
pub fn unpack_keys_slot(
    value: &Value,
) -> (
    BTreeMap<String, BTreeMap<String, Value>>,
    Option<BTreeMap<String, Value>>,
) {
    match value.as_map() {
        Some(m) => {
            let keys = m.get("keys").map(value_to_keys).unwrap_or_default();
            let app_state = m.get("appState").and_then(value_to_app_state);
            (keys, app_state)
        }
        None => (BTreeMap::new(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_matches_spec_shape() {
        assert_eq!(creds_key("baileys:auth", "s1"), "baileys:auth:s1:creds");
        assert_eq!(keys_key("baileys:auth", "s1"), "baileys:auth:s1:keys");
        assert_eq!(meta_key("baileys:auth", "s1"), "baileys:auth:s1:meta");
    }

    #[test]
    fn pack_unpack_round_trips() {
        let mut keys = BTreeMap::new();
        keys.insert(
            "app-state-sync-key".to_string(),
            BTreeMap::from([("k1".to_string(), Value::Bytes(vec![1, 2, 3]))]),
        );
        let app_state = Some(BTreeMap::from([("x".to_string(), Value::Num(1.0))]));
        let packed = pack_keys_slot(&keys, &app_state);
        let (back_keys, back_app_state) = unpack_keys_slot(&packed);
        assert_eq!(back_keys, keys);
        assert_eq!(back_app_state, app_state);
    }
}
