//! The on-wire encrypted envelope shape (spec.md §3.1, §6).
//!
//! Grounded on `aura-core::envelope::AuraEnvelope`'s role (a self-describing
//! wrapper kept as a structured record rather than raw bytes, so storage
//! tiers that need to index on metadata can). The wire shape here is fixed by
//! spec.md §6 rather than left to bincode, since both tiers store it as
//! self-describing JSON for operator inspection (spec.md §4.3 "On-wire value").

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Schema version carried on every encrypted record. Constant per build.
pub const SCHEMA_VERSION_CURRENT: u32 = 1;

/// Sentinel `keyId` meaning "no encryption, plaintext carried verbatim".
pub const KEY_ID_NONE: &str = "none";

/// Legacy sentinel `keyId` meaning "substitute the currently active key".
pub const KEY_ID_AUTO: &str = "auto";

fn to_base64<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&BASE64.encode(bytes))
}

fn from_base64<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(d)?;
    BASE64
        .decode(s.as_bytes())
        .map_err(serde::de::Error::custom)
}

/// The serialized, encrypted, metadata-bearing unit written to storage.
///
/// JSON shape (spec.md §6):
/// `{"ciphertext": "<base64>", "nonce": "<base64>", "keyId": "<16 hex>|none|auto",
///   "schemaVersion": 1, "timestamp": "<ISO-8601>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    /// Ciphertext, including the appended 16-byte authentication tag.
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub ciphertext: Vec<u8>,
    /// 12-byte AES-GCM nonce. Zeroed when encryption is disabled.
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub nonce: Vec<u8>,
    /// 16 hex chars, or the sentinels `"none"`/`"auto"`.
    pub key_id: String,
    /// Monotonic schema version carried on encrypted records.
    pub schema_version: u32,
    /// ISO-8601 timestamp the envelope was produced, the wire-normative form
    /// (spec.md §6). Serialized via `chrono`'s rfc3339 support.
    pub timestamp: DateTime<Utc>,
}

impl EncryptedEnvelope {
    /// True if this envelope carries plaintext verbatim (encryption disabled).
    pub fn is_plaintext(&self) -> bool {
        self.key_id == KEY_ID_NONE
    }
}

/// Lifecycle state of a write-behind outbox entry (spec.md §3.1, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Queued, not yet claimed by a reconciler sweep.
    Pending,
    /// Claimed by a reconciler sweep; invisible to other sweeps until the
    /// visibility timeout elapses.
    InFlight,
    /// Durably applied to the cold tier. Terminal.
    Succeeded,
    /// Exhausted its retry budget. Terminal; requires operator attention.
    Failed,
}

/// A queued write-behind job: apply `patch` to the cold tier for `session_id`
/// no earlier than `not_before_version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Entry identity, assigned at enqueue time.
    pub entry_id: String,
    /// Which session this entry targets.
    pub session_id: String,
    /// Encrypted payload to apply to the cold tier.
    pub envelope: EncryptedEnvelope,
    /// The hot-tier version this entry was derived from. The reconciler drops
    /// an entry whose `expected_version` is already behind the cold tier's
    /// current version (a newer entry superseded it).
    pub expected_version: u64,
    pub status: OutboxStatus,
    /// Attempts made so far. Compared against a configured retry budget.
    pub attempts: u32,
    /// When a claimed entry's lease expires and it becomes visible again.
    pub visible_after: Option<DateTime<Utc>>,
    pub enqueued_at: DateTime<Utc>,
}

impl OutboxEntry {
    /// Whether this entry is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OutboxStatus::Succeeded | OutboxStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip_preserves_fields() {
        let env = EncryptedEnvelope {
            ciphertext: vec![1, 2, 3, 4],
            nonce: vec![0u8; 12],
            key_id: "abcdef0123456789".to_string(),
            schema_version: SCHEMA_VERSION_CURRENT,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"keyId\""));
        assert!(json.contains("\"schemaVersion\""));
        let back: EncryptedEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ciphertext, env.ciphertext);
        assert_eq!(back.nonce, env.nonce);
        assert_eq!(back.key_id, env.key_id);
    }

    #[test]
    fn plaintext_sentinel() {
        let env = EncryptedEnvelope {
            ciphertext: vec![9],
            nonce: vec![0u8; 12],
            key_id: KEY_ID_NONE.to_string(),
            schema_version: 1,
            timestamp: Utc::now(),
        };
        assert!(env.is_plaintext());
    }
}
