//! The session-state snapshot/patch model (spec.md §3.1, invariants 1–3).

use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from key-id to a per-record value, for one key-type tag.
pub type KeyTypeMap = BTreeMap<String, Value>;

/// The full logical session state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    /// Opaque credentials blob, replaced wholesale by a `set` carrying `creds`.
    pub creds: Value,
    /// `{key-type tag -> {key-id -> record}}`. Grows unboundedly; id set order
    /// is not significant.
    pub keys: BTreeMap<String, KeyTypeMap>,
    /// Optional app-state map, merged by whole-field replacement.
    pub app_state: Option<BTreeMap<String, Value>>,
}

impl AuthSnapshot {
    /// The default snapshot a `get` auto-initializes when no session exists.
    pub fn new_default() -> Self {
        Self {
            creds: Value::map([]),
            keys: BTreeMap::new(),
            app_state: None,
        }
    }
}

/// A partial update over `AuthSnapshot` (spec.md §3.1 `AuthPatch`).
///
/// `keys` uses `Option<Value>` per key-id: `None` (serialized as JSON `null`
/// or simply absent from the map on the Rust side — callers construct with
/// `None`) means "remove this id under this type" (invariant 2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthPatch {
    /// When present, replaces `creds` wholesale (invariant 3).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creds: Option<Value>,
    /// When present, an incremental merge per spec.md §4.6.1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<BTreeMap<String, BTreeMap<String, Option<Value>>>>,
    /// When present, replaces `app_state` wholesale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_state: Option<BTreeMap<String, Value>>,
}

impl AuthPatch {
    /// A patch that only replaces `creds`.
    pub fn creds(creds: Value) -> Self {
        Self {
            creds: Some(creds),
            keys: None,
            app_state: None,
        }
    }

    /// A patch that only merges `keys`.
    pub fn keys(keys: BTreeMap<String, BTreeMap<String, Option<Value>>>) -> Self {
        Self {
            creds: None,
            keys: Some(keys),
            app_state: None,
        }
    }

    /// Whether this patch carries no changes at all.
    pub fn is_empty(&self) -> bool {
        self.creds.is_none() && self.keys.is_none() && self.app_state.is_none()
    }
}

/// A value annotated with the monotonic per-session version it was written
/// (or read) at, plus a wall-clock timestamp for diagnostics only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The payload.
    pub data: T,
    /// Monotonic per-session counter (invariant 1).
    pub version: u64,
    /// Wall-clock time of the write. Diagnostic only; never used for ordering.
    pub updated_at: DateTime<Utc>,
}

impl<T> Versioned<T> {
    /// Construct a new versioned value.
    pub fn new(data: T, version: u64, updated_at: DateTime<Utc>) -> Self {
        Self {
            data,
            version,
            updated_at,
        }
    }

    /// Map the payload, keeping version and timestamp.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Versioned<U> {
        Versioned {
            data: f(self.data),
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

/// Convert `{type -> {id -> value}}` into the generic `Value` tree tier
/// adapters encode/encrypt as a single field.
pub fn keys_to_value(keys: &BTreeMap<String, KeyTypeMap>) -> Value {
    Value::Map(
        keys.iter()
            .map(|(k, v)| (k.clone(), Value::Map(v.clone())))
            .collect(),
    )
}

/// Inverse of [`keys_to_value`]. Non-map shapes at any level are treated as
/// empty rather than erroring — a tier adapter that hits this is already
/// treating a decode failure as a miss (spec.md §4.3 "Read miss semantics").
pub fn value_to_keys(value: &Value) -> BTreeMap<String, KeyTypeMap> {
    match value {
        Value::Map(outer) => outer
            .iter()
            .map(|(k, v)| {
                let inner = match v {
                    Value::Map(m) => m.clone(),
                    _ => KeyTypeMap::new(),
                };
                (k.clone(), inner)
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Convert an optional app-state map into `Value`, `Value::Null` when absent.
pub fn app_state_to_value(app_state: &Option<BTreeMap<String, Value>>) -> Value {
    match app_state {
        Some(m) => Value::Map(m.clone()),
        None => Value::Null,
    }
}

/// Inverse of [`app_state_to_value`].
pub fn value_to_app_state(value: &Value) -> Option<BTreeMap<String, Value>> {
    match value {
        Value::Map(m) => Some(m.clone()),
        _ => None,
    }
}

/// Convert an `AuthPatch` into a `Value` tree so it can pass through the same
/// encode/encrypt pipeline as a snapshot field (used by the outbox ledger,
/// which stores a patch as a single `EncryptedEnvelope`).
pub fn patch_to_value(patch: &AuthPatch) -> Value {
    let mut fields = BTreeMap::new();
    if let Some(creds) = &patch.creds {
        fields.insert("creds".to_string(), creds.clone());
    }
    if let Some(keys) = &patch.keys {
        let keys_value = Value::Map(
            keys.iter()
                .map(|(ty, ids)| {
                    let inner = Value::Map(
                        ids.iter()
                            .map(|(id, v)| {
                                (id.clone(), v.clone().unwrap_or(Value::Null))
                            })
                            .collect(),
                    );
                    (ty.clone(), inner)
                })
                .collect(),
        );
        fields.insert("keys".to_string(), keys_value);
    }
    if let Some(app_state) = &patch.app_state {
        fields.insert("appState".to_string(), Value::Map(app_state.clone()));
    }
    Value::Map(fields)
}

/// Inverse of [`patch_to_value`]. A `keys` id whose value is `Value::Null` is
/// treated as a deletion (mirrors the wire convention in spec.md §4.6.1).
pub fn value_to_patch(value: &Value) -> AuthPatch {
    let fields = match value {
        Value::Map(m) => m,
        _ => return AuthPatch::default(),
    };
    let creds = fields.get("creds").cloned();
    let keys = fields.get("keys").map(|v| match v {
        Value::Map(outer) => outer
            .iter()
            .map(|(ty, inner)| {
                let ids = match inner {
                    Value::Map(m) => m
                        .iter()
                        .map(|(id, v)| {
                            let v = if matches!(v, Value::Null) {
                                None
                            } else {
                                Some(v.clone())
                            };
                            (id.clone(), v)
                        })
                        .collect(),
                    _ => BTreeMap::new(),
                };
                (ty.clone(), ids)
            })
            .collect(),
        _ => BTreeMap::new(),
    });
    let app_state = fields.get("appState").and_then(|v| match v {
        Value::Map(m) => Some(m.clone()),
        _ => None,
    });
    AuthPatch {
        creds,
        keys,
        app_state,
    }
}

/// Apply the incremental key-map merge rule (spec.md §4.6.1) to `current` in
/// place, given a patch's `keys` field.
///
/// ```text
/// for each (type, kMap) in patch.keys:
///   cur = current[type] ?? {}
///   for each (id, v) in kMap:
///     if v is null: delete cur[id]
///     else:          cur[id] = v
///   current[type] = cur
/// # Types not present in patch.keys are untouched.
/// ```
pub fn merge_keys(
    current: &mut BTreeMap<String, KeyTypeMap>,
    patch_keys: &BTreeMap<String, BTreeMap<String, Option<Value>>>,
) {
    for (key_type, id_map) in patch_keys {
        let entry = current.entry(key_type.clone()).or_default();
        for (id, value) in id_map {
            match value {
                Some(v) => {
                    entry.insert(id.clone(), v.clone());
                }
                None => {
                    entry.remove(id);
                }
            }
        }
    }
}
