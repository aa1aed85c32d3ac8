//! Normalization rule (spec.md §4.2.1): binary fields arriving from the cold
//! tier may be a native blob, a tagged sum, or base64 text. `normalize_bytes`
//! accepts any of those shapes and returns raw bytes.

use authvault_types::envelope::{EncryptedEnvelope, KEY_ID_NONE, SCHEMA_VERSION_CURRENT};
use authvault_types::{AuthVaultError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;

/// Accept a `Vec<u8>` verbatim, a base64 `&str`, or a JSON tagged sum
/// `{"type":"Buffer","data":[...]}` and return raw bytes. `field_name` is
/// used only in the error message, never the value itself (spec.md §7: no
/// sensitive data in error messages).
pub fn normalize_bytes(value: &serde_json::Value, field_name: &str) -> Result<Vec<u8>> {
    match value {
        serde_json::Value::String(s) => BASE64
            .decode(s.as_bytes())
            .map_err(|_| AuthVaultError::encryption(format!("{field_name}: invalid base64"))),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| {
                        AuthVaultError::encryption(format!("{field_name}: non-byte array element"))
                    })
            })
            .collect(),
        serde_json::Value::Object(obj) => {
            let ty = obj.get("type").and_then(|v| v.as_str());
            let data = obj.get("data").and_then(|v| v.as_array());
            match (ty, data) {
                (Some("Buffer"), Some(items)) => items
                    .iter()
                    .map(|v| {
                        v.as_u64().and_then(|n| u8::try_from(n).ok()).ok_or_else(|| {
                            AuthVaultError::encryption(format!(
                                "{field_name}: non-byte tagged-sum element"
                            ))
                        })
                    })
                    .collect(),
                _ => Err(AuthVaultError::encryption(format!(
                    "{field_name}: unrecognized binary shape"
                ))),
            }
        }
        _ => Err(AuthVaultError::encryption(format!(
            "{field_name}: expected binary data"
        ))),
    }
}

/// Parse an envelope from a stored record whose `ciphertext`/`nonce` fields
/// may be in any shape `normalize_bytes` accepts, not just the base64-string
/// form `EncryptedEnvelope`'s own strict `Deserialize` impl requires. This is
/// the actual runtime boundary spec.md §4.2.1 describes: a tier adapter that
/// reads raw JSON text back (`authvault-hot`'s Redis-backed store) falls back
/// to this when the strict parse fails, so a record a legacy writer stored
/// with a tagged-sum or raw-array binary shape still decrypts.
pub fn envelope_from_loose_json(value: &serde_json::Value) -> Result<EncryptedEnvelope> {
    let obj = value
        .as_object()
        .ok_or_else(|| AuthVaultError::encryption("envelope: expected a JSON object"))?;

    let ciphertext = normalize_bytes(
        obj.get("ciphertext")
            .ok_or_else(|| AuthVaultError::encryption("envelope: missing ciphertext"))?,
        "ciphertext",
    )?;
    let nonce = normalize_bytes(
        obj.get("nonce")
            .ok_or_else(|| AuthVaultError::encryption("envelope: missing nonce"))?,
        "nonce",
    )?;
    let key_id = obj
        .get("keyId")
        .and_then(|v| v.as_str())
        .unwrap_or(KEY_ID_NONE)
        .to_string();
    let schema_version = obj
        .get("schemaVersion")
        .and_then(|v| v.as_u64())
        .map(|v| v as u32)
        .unwrap_or(SCHEMA_VERSION_CURRENT);
    let timestamp = obj
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Ok(EncryptedEnvelope {
        ciphertext,
        nonce,
        key_id,
        schema_version,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_base64_string() {
        let encoded = BASE64.encode([1, 2, 3]);
        let out = normalize_bytes(&json!(encoded), "nonce").unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn accepts_raw_array() {
        let out = normalize_bytes(&json!([9, 8, 7]), "nonce").unwrap();
        assert_eq!(out, vec![9, 8, 7]);
    }

    #[test]
    fn accepts_tagged_buffer_sum() {
        let out = normalize_bytes(
            &json!({"type": "Buffer", "data": [5, 6, 7]}),
            "ciphertext",
        )
        .unwrap();
        assert_eq!(out, vec![5, 6, 7]);
    }

    #[test]
    fn rejects_unrelated_shapes() {
        assert!(normalize_bytes(&json!(42), "nonce").is_err());
        assert!(normalize_bytes(&json!({"foo": "bar"}), "nonce").is_err());
    }

    #[test]
    fn loose_envelope_accepts_tagged_sum_binary_fields() {
        let value = json!({
            "ciphertext": {"type": "Buffer", "data": [1, 2, 3, 4]},
            "nonce": {"type": "Buffer", "data": [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]},
            "keyId": "abcdef0123456789",
            "schemaVersion": 1,
            "timestamp": "2024-01-01T00:00:00Z",
        });
        let env = envelope_from_loose_json(&value).unwrap();
        assert_eq!(env.ciphertext, vec![1, 2, 3, 4]);
        assert_eq!(env.nonce.len(), 12);
        assert_eq!(env.key_id, "abcdef0123456789");
    }

    #[test]
    fn loose_envelope_defaults_missing_metadata() {
        let value = json!({
            "ciphertext": BASE64.encode([9, 9]),
            "nonce": BASE64.encode([0u8; 12]),
        });
        let env = envelope_from_loose_json(&value).unwrap();
        assert_eq!(env.key_id, KEY_ID_NONE);
        assert_eq!(env.schema_version, SCHEMA_VERSION_CURRENT);
    }

    #[test]
    fn loose_envelope_rejects_non_object() {
        assert!(envelope_from_loose_json(&json!([1, 2, 3])).is_err());
    }
}
