//! Pure key state: the set of keys known to this process and which one is
//! active. Mutated only by [`CryptoProvider`](crate::provider::CryptoProvider)
//! through `initialize`/`rotate_key`/`cleanup_expired_keys`, following the
//! teacher's `KeyVersionTracker` split between state and coordinator.

use authvault_types::crypto_key::{CryptoKeyRecord, CryptoKeyStats};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use zeroize::Zeroizing;

/// Derive the 16-hex-char key id from key material: `sha256(material)[..8]`
/// hex-encoded (spec.md §4.2 "Key ID", invariant 8: deterministic, so two
/// identical materials share an id).
pub fn key_id_for(material: &[u8]) -> String {
    let digest = Sha256::digest(material);
    hex::encode(&digest[..8])
}

/// Expand input key material to 32 bytes: used verbatim if already 32 bytes,
/// otherwise SHA-256-derived (spec.md §4.2 `initialize`).
pub fn derive_material(input: &[u8]) -> Zeroizing<[u8; 32]> {
    if input.len() == 32 {
        let mut out = [0u8; 32];
        out.copy_from_slice(input);
        Zeroizing::new(out)
    } else {
        let digest = Sha256::digest(input);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Zeroizing::new(out)
    }
}

/// The set of keys known to this process, keyed by `key_id`. At most one is
/// active at a time (invariant on `CryptoKeyRecord::is_active`).
#[derive(Debug, Default)]
pub struct CryptoKeyRegistry {
    keys: BTreeMap<String, CryptoKeyRecord>,
    active_id: Option<String>,
}

impl CryptoKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `record` as the (sole) active key, retiring whatever was
    /// active before.
    pub fn set_active(&mut self, record: CryptoKeyRecord) {
        if let Some(prev_id) = self.active_id.take() {
            if let Some(prev) = self.keys.get_mut(&prev_id) {
                prev.retired_at = Some(Utc::now());
            }
        }
        self.active_id = Some(record.key_id.clone());
        self.keys.insert(record.key_id.clone(), record);
    }

    pub fn active(&self) -> Option<&CryptoKeyRecord> {
        self.active_id.as_ref().and_then(|id| self.keys.get(id))
    }

    pub fn active_key_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn get(&self, key_id: &str) -> Option<&CryptoKeyRecord> {
        self.keys.get(key_id)
    }

    /// Remove expired, non-active keys. Returns the count reclaimed
    /// (spec.md §4.2 `cleanupExpiredKeys`).
    pub fn cleanup_expired(&mut self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .keys
            .values()
            .filter(|k| !k.is_active() && k.is_expired(now))
            .map(|k| k.key_id.clone())
            .collect();
        for id in &expired {
            self.keys.remove(id);
        }
        expired.len()
    }

    /// True iff an active, non-expired key exists (spec.md §4.2 `isHealthy`).
    pub fn is_healthy(&self) -> bool {
        self.active()
            .is_some_and(|k| k.is_active() && !k.is_expired(Utc::now()))
    }

    /// Totals, active id, expired count (spec.md §4.2 `keyStats`).
    pub fn stats(&self) -> KeyRegistryStats {
        let now = Utc::now();
        KeyRegistryStats {
            total_keys: self.keys.len(),
            active_key_id: self.active_id.clone(),
            expired_count: self.keys.values().filter(|k| k.is_expired(now)).count(),
            keys: self.keys.values().map(CryptoKeyStats::from).collect(),
        }
    }
}

/// Diagnostic snapshot returned by `CryptoProvider::key_stats`.
#[derive(Debug, Clone)]
pub struct KeyRegistryStats {
    pub total_keys: usize,
    pub active_key_id: Option<String>,
    pub expired_count: usize,
    pub keys: Vec<CryptoKeyStats>,
}
