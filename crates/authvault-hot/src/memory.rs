//! `InMemoryHotStore`: a `DashMap`-backed TTL-aware hot tier.
//!
//! Used by `authvault-testkit` and every unit/property test in this
//! workspace; grounded on the `ruts` layered-store example's use of
//! `dashmap` for exactly this kind of session-field cache.

use crate::store::{HotSetResult, HotStore, HotStoreConfig};
use crate::wire::{creds_key, keys_key, meta_key, pack_keys_slot, unpack_keys_slot, MetaRecord};
use authvault_crypto::CryptoProvider;
use authvault_codec::Codec;
use authvault_types::{merge_keys, AuthPatch, AuthSnapshot, Result, SessionId, Versioned};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct StoredEntry {
    json: String,
    expires_at: Option<Instant>,
}

/// In-memory hot tier. Not backed by Redis; suitable for tests and as the
/// default `authvault-testkit` fixture.
pub struct InMemoryHotStore {
    codec: Arc<Codec>,
    crypto: Arc<CryptoProvider>,
    config: HotStoreConfig,
    data: DashMap<String, StoredEntry>,
}

impl InMemoryHotStore {
    pub fn new(codec: Arc<Codec>, crypto: Arc<CryptoProvider>, config: HotStoreConfig) -> Self {
        Self {
            codec,
            crypto,
            config,
            data: DashMap::new(),
        }
    }

    fn put(&self, key: String, json: String, ttl_secs: Option<u64>) {
        let ttl = ttl_secs.unwrap_or(self.config.default_ttl_secs);
        let expires_at = if ttl == 0 {
            None
        } else {
            Some(Instant::now() + Duration::from_secs(ttl))
        };
        self.data.insert(key, StoredEntry { json, expires_at });
    }

    /// Read a live (non-expired) entry, lazily evicting if it has aged out.
    fn get_live(&self, key: &str) -> Option<String> {
        let expired = match self.data.get(key) {
            Some(entry) => entry.expires_at.is_some_and(|e| Instant::now() >= e),
            None => return None,
        };
        if expired {
            self.data.remove(key);
            return None;
        }
        self.data.get(key).map(|e| e.json.clone())
    }

    fn read_keys_slot(&self, session_id: &SessionId) -> authvault_types::Value {
        let key = keys_key(&self.config.key_prefix, session_id.as_str());
        self.get_live(&key)
            .and_then(|json| self.decode_envelope(&json))
            .unwrap_or(authvault_types::Value::Null)
    }

    /// Decode a stored envelope, falling back to loose-shape binary field
    /// parsing (spec.md §4.2.1) when the strict typed parse fails — a record
    /// a legacy writer stored with `ciphertext`/`nonce` as a tagged sum or raw
    /// byte array rather than a base64 string.
    fn decode_envelope(&self, json: &str) -> Option<authvault_types::Value> {
        let envelope = match serde_json::from_str::<authvault_types::envelope::EncryptedEnvelope>(json) {
            Ok(env) => env,
            Err(_) => {
                let value: serde_json::Value = serde_json::from_str(json).ok()?;
                authvault_crypto::envelope_from_loose_json(&value).ok()?
            }
        };
        authvault_crypto::open(&self.codec, &self.crypto, &envelope).ok()
    }
}

#[async_trait::async_trait]
impl HotStore for InMemoryHotStore {
    async fn get(&self, session_id: &SessionId) -> Result<Option<Versioned<AuthSnapshot>>> {
        let meta_json = self.get_live(&meta_key(&self.config.key_prefix, session_id.as_str()));
        let creds_json = self.get_live(&creds_key(&self.config.key_prefix, session_id.as_str()));
        let keys_json = self.get_live(&keys_key(&self.config.key_prefix, session_id.as_str()));

        let (creds_json, keys_json) = match (creds_json, keys_json) {
            (Some(c), Some(k)) => (c, k),
            _ => return Ok(None),
        };

        let creds_value = match self.decode_envelope(&creds_json) {
            Some(v) => v,
            None => return Ok(None),
        };
        let keys_value = match self.decode_envelope(&keys_json) {
            Some(v) => v,
            None => return Ok(None),
        };
        let (keys, app_state) = unpack_keys_slot(&keys_value);

        let meta: Option<MetaRecord> = meta_json.as_deref().and_then(|j| serde_json::from_str(j).ok());
        let version = meta.as_ref().map(|m| m.version).unwrap_or(1);
        let updated_at = meta.as_ref().map(|m| m.updated_at).unwrap_or_else(Utc::now);

        Ok(Some(Versioned::new(
            AuthSnapshot {
                creds: creds_value,
                keys,
                app_state,
            },
            version,
            updated_at,
        )))
    }

    async fn set(
        &self,
        session_id: &SessionId,
        patch: &AuthPatch,
        expected_version: Option<u64>,
    ) -> Result<HotSetResult> {
        let new_version = expected_version.unwrap_or(0) + 1;
        let updated_at = Utc::now();

        if let Some(creds) = &patch.creds {
            let envelope = authvault_crypto::seal_value(&self.codec, &self.crypto, creds)?;
            let json = serde_json::to_string(&envelope)?;
            self.put(
                creds_key(&self.config.key_prefix, session_id.as_str()),
                json,
                Some(self.config.default_ttl_secs),
            );
        }

        if patch.keys.is_some() || patch.app_state.is_some() {
            let (mut current_keys, mut current_app_state) = {
                let current = self.read_keys_slot(session_id);
                unpack_keys_slot(&current)
            };
            if let Some(patch_keys) = &patch.keys {
                merge_keys(&mut current_keys, patch_keys);
            }
            if let Some(app_state) = &patch.app_state {
                current_app_state = Some(app_state.clone());
            }
            let packed = pack_keys_slot(&current_keys, &current_app_state);
            let envelope = authvault_crypto::seal_value(&self.codec, &self.crypto, &packed)?;
            let json = serde_json::to_string(&envelope)?;
            self.put(
                keys_key(&self.config.key_prefix, session_id.as_str()),
                json,
                Some(self.config.default_ttl_secs),
            );
        }

        let meta = MetaRecord {
            version: new_version,
            updated_at,
        };
        let meta_json = serde_json::to_string(&meta)?;
        self.put(
            meta_key(&self.config.key_prefix, session_id.as_str()),
            meta_json,
            Some(self.config.default_ttl_secs),
        );

        Ok(HotSetResult {
            version: new_version,
            updated_at,
            success: true,
        })
    }

    async fn delete(&self, session_id: &SessionId) -> Result<()> {
        self.data.remove(&creds_key(&self.config.key_prefix, session_id.as_str()));
        self.data.remove(&keys_key(&self.config.key_prefix, session_id.as_str()));
        self.data.remove(&meta_key(&self.config.key_prefix, session_id.as_str()));
        Ok(())
    }

    async fn touch(&self, session_id: &SessionId, ttl_secs: Option<u64>) -> Result<()> {
        let ttl = ttl_secs.unwrap_or(self.config.default_ttl_secs);
        let new_expiry = Some(Instant::now() + Duration::from_secs(ttl));
        for key in [
            creds_key(&self.config.key_prefix, session_id.as_str()),
            keys_key(&self.config.key_prefix, session_id.as_str()),
            meta_key(&self.config.key_prefix, session_id.as_str()),
        ] {
            if let Some(mut entry) = self.data.get_mut(&key) {
                entry.expires_at = new_expiry;
            }
        }
        Ok(())
    }

    async fn exists(&self, session_id: &SessionId) -> Result<bool> {
        Ok(self
            .get_live(&creds_key(&self.config.key_prefix, session_id.as_str()))
            .is_some())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authvault_types::config::{CompressionAlgorithm, Environment, SecurityConfig};
    use authvault_types::Value;

    fn store() -> InMemoryHotStore {
        let codec = Arc::new(Codec::new(CompressionAlgorithm::None, true));
        let sec_config = SecurityConfig {
            environment: Environment::Development,
            ..SecurityConfig::default()
        };
        let crypto = Arc::new(CryptoProvider::new(&sec_config, Some(&[1u8; 32])).unwrap());
        InMemoryHotStore::new(codec, crypto, HotStoreConfig::default())
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let store = store();
        let id = SessionId::new("s1").unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_state_is_not_a_valid_snapshot() {
        let store = store();
        let id = SessionId::new("s1").unwrap();
        store
            .set(&id, &AuthPatch::creds(Value::map([])), None)
            .await
            .unwrap();
        // creds exists but keys was never written -> still a miss.
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = store();
        let id = SessionId::new("s1").unwrap();
        store
            .set(
                &id,
                &AuthPatch {
                    creds: Some(Value::map([("regId".to_string(), Value::Num(42.0))])),
                    keys: Some(Default::default()),
                    app_state: None,
                },
                None,
            )
            .await
            .unwrap();
        let snap = store.get(&id).await.unwrap().unwrap();
        assert_eq!(snap.version, 1);
        assert_eq!(
            snap.data.creds.as_map().unwrap().get("regId"),
            Some(&Value::Num(42.0))
        );
    }

    #[tokio::test]
    async fn version_increments_by_one_per_set() {
        let store = store();
        let id = SessionId::new("s1").unwrap();
        let r1 = store
            .set(&id, &AuthPatch::creds(Value::map([])), None)
            .await
            .unwrap();
        store.set(&id, &AuthPatch::keys(Default::default()), Some(r1.version)).await.unwrap();
        let r2 = store
            .set(&id, &AuthPatch::keys(Default::default()), Some(r1.version))
            .await
            .unwrap();
        assert_eq!(r1.version, 1);
        assert_eq!(r2.version, 2);
    }

    #[tokio::test]
    async fn decode_envelope_falls_back_to_legacy_tagged_sum_binary_fields() {
        let store = store();
        let value = Value::map([("a".to_string(), Value::Num(1.0))]);
        let bytes = store.codec.encode(&value).unwrap();
        let envelope = store.crypto.encrypt(&bytes).unwrap();
        let legacy_json = serde_json::json!({
            "ciphertext": {"type": "Buffer", "data": envelope.ciphertext},
            "nonce": {"type": "Buffer", "data": envelope.nonce},
            "keyId": envelope.key_id,
            "schemaVersion": envelope.schema_version,
            "timestamp": envelope.timestamp.to_rfc3339(),
        })
        .to_string();
        let decoded = store.decode_envelope(&legacy_json).unwrap();
        assert_eq!(decoded, value);
    }

    #[tokio::test]
    async fn delete_removes_all_three_keys() {
        let store = store();
        let id = SessionId::new("s1").unwrap();
        store
            .set(
                &id,
                &AuthPatch {
                    creds: Some(Value::map([])),
                    keys: Some(Default::default()),
                    app_state: None,
                },
                None,
            )
            .await
            .unwrap();
        store.delete(&id).await.unwrap();
        assert!(!store.exists(&id).await.unwrap());
        assert!(store.get(&id).await.unwrap().is_none());
    }
}
