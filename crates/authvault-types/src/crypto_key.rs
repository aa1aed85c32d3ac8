//! Key material records for the crypto key registry (spec.md §4.2, §6).
//!
//! Key bytes are wrapped in `Zeroizing` so that ordinary drops (rotation,
//! cleanup, scope exit) scrub memory rather than leaving material for a
//! heap scan, the same discipline `aura-crypto`'s key material follows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// One AES-256-GCM key and its lifecycle metadata.
///
/// Not `Serialize`/`Deserialize` over `material` directly: the registry
/// persists records through a dedicated encode path that never lets raw key
/// bytes enter a generic serde tree.
#[derive(Debug, Clone)]
pub struct CryptoKeyRecord {
    /// 16 lowercase hex chars, `sha256(material)[..8]` hex-encoded.
    pub key_id: String,
    /// Raw 32-byte AES-256 key.
    pub material: Zeroizing<[u8; 32]>,
    pub created_at: DateTime<Utc>,
    /// `spec.md` §3.1 `expiresAt?`. A key past this time is still usable for
    /// decrypting old data but is reclaimed by `cleanup_expired_keys` once
    /// retired.
    pub expires_at: Option<DateTime<Utc>>,
    /// Set once a newer key supersedes this one; `None` means active.
    pub retired_at: Option<DateTime<Utc>>,
}

impl CryptoKeyRecord {
    /// Whether this key may still be used to encrypt new data. Retired keys
    /// remain usable for decryption until `cleanup_expired_keys` evicts them.
    pub fn is_active(&self) -> bool {
        self.retired_at.is_none()
    }

    /// Whether this key's `expires_at` has passed, judged against `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|e| e <= now)
    }
}

/// Serializable key metadata, omitting raw material, for status/observability
/// surfaces (`key_stats`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoKeyStats {
    pub key_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub retired_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl From<&CryptoKeyRecord> for CryptoKeyStats {
    fn from(r: &CryptoKeyRecord) -> Self {
        Self {
            key_id: r.key_id.clone(),
            created_at: r.created_at,
            expires_at: r.expires_at,
            retired_at: r.retired_at,
            is_active: r.is_active(),
        }
    }
}
