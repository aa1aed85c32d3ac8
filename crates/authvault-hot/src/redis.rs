//! `RedisHotStore`: the `fred`-backed hot tier (feature `redis-backend`).
//!
//! Grounded on the `ruts` layered-store example's `redis-store` feature and
//! its `fred` dependency — the closest corpus precedent for a Redis-backed
//! session tier. Same three-key layout and merge logic as
//! [`crate::memory::InMemoryHotStore`]; the only difference is where bytes
//! live.

use crate::retry::retry_strategy;
use crate::store::{HotSetResult, HotStore, HotStoreConfig};
use crate::wire::{creds_key, keys_key, meta_key, pack_keys_slot, unpack_keys_slot, MetaRecord};
use authvault_codec::Codec;
use authvault_crypto::CryptoProvider;
use authvault_types::envelope::EncryptedEnvelope;
use authvault_types::{merge_keys, AuthPatch, AuthVaultError, AuthSnapshot, Result, SessionId, Tier, Versioned};
use chrono::Utc;
use fred::prelude::*;
use std::sync::Arc;

/// Hot tier backed by a pooled `fred::prelude::RedisClient`.
pub struct RedisHotStore {
    client: RedisClient,
    codec: Arc<Codec>,
    crypto: Arc<CryptoProvider>,
    config: HotStoreConfig,
}

impl RedisHotStore {
    /// Build against an already-constructed client. Call [`HotStore::connect`]
    /// before first use.
    pub fn new(client: RedisClient, codec: Arc<Codec>, crypto: Arc<CryptoProvider>, config: HotStoreConfig) -> Self {
        Self {
            client,
            codec,
            crypto,
            config,
        }
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        self.client
            .get(key)
            .await
            .map_err(|e| AuthVaultError::storage(Tier::Hot, e.to_string()))
    }

    async fn setex_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        self.client
            .set::<(), _, _>(key, value, Some(Expiration::EX(ttl_secs as i64)), None, false)
            .await
            .map_err(|e| AuthVaultError::storage(Tier::Hot, e.to_string()))
    }

    /// Decode a stored envelope, falling back to loose-shape binary field
    /// parsing (spec.md §4.2.1) when the strict typed parse fails — a record
    /// a legacy writer stored with `ciphertext`/`nonce` as a tagged sum or raw
    /// byte array rather than a base64 string.
    fn decode_envelope(&self, json: &str) -> Option<authvault_types::Value> {
        let envelope = match serde_json::from_str::<EncryptedEnvelope>(json) {
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
impl HotStore for RedisHotStore {
    async fn get(&self, session_id: &SessionId) -> Result<Option<Versioned<AuthSnapshot>>> {
        let prefix = &self.config.key_prefix;
        let (meta_json, creds_json, keys_json) = tokio::try_join!(
            self.get_raw(&meta_key(prefix, session_id.as_str())),
            self.get_raw(&creds_key(prefix, session_id.as_str())),
            self.get_raw(&keys_key(prefix, session_id.as_str())),
        )?;

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
        let prefix = &self.config.key_prefix;
        let ttl = self.config.default_ttl_secs;

        if let Some(creds) = &patch.creds {
            let envelope = authvault_crypto::seal_value(&self.codec, &self.crypto, creds)?;
            let json = serde_json::to_string(&envelope)?;
            self.setex_raw(&creds_key(prefix, session_id.as_str()), json, ttl).await?;
        }

        if patch.keys.is_some() || patch.app_state.is_some() {
            let current_json = self.get_raw(&keys_key(prefix, session_id.as_str())).await?;
            let (mut current_keys, mut current_app_state) = current_json
                .as_deref()
                .and_then(|j| self.decode_envelope(j))
                .map(|v| unpack_keys_slot(&v))
                .unwrap_or_default();
            if let Some(patch_keys) = &patch.keys {
                merge_keys(&mut current_keys, patch_keys);
            }
            if let Some(app_state) = &patch.app_state {
                current_app_state = Some(app_state.clone());
            }
            let packed = pack_keys_slot(&current_keys, &current_app_state);
            let envelope = authvault_crypto::seal_value(&self.codec, &self.crypto, &packed)?;
            let json = serde_json::to_string(&envelope)?;
            self.setex_raw(&keys_key(prefix, session_id.as_str()), json, ttl).await?;
        }

        let meta = MetaRecord {
            version: new_version,
            updated_at,
        };
        let meta_json = serde_json::to_string(&meta)?;
        self.setex_raw(&meta_key(prefix, session_id.as_str()), meta_json, ttl)
            .await?;

        Ok(HotSetResult {
            version: new_version,
            updated_at,
            success: true,
        })
    }

    async fn delete(&self, session_id: &SessionId) -> Result<()> {
        let prefix = &self.config.key_prefix;
        self.client
            .del::<i64, _>(vec![
                creds_key(prefix, session_id.as_str()),
                keys_key(prefix, session_id.as_str()),
                meta_key(prefix, session_id.as_str()),
            ])
            .await
            .map_err(|e| AuthVaultError::storage(Tier::Hot, e.to_string()))?;
        Ok(())
    }

    async fn touch(&self, session_id: &SessionId, ttl_secs: Option<u64>) -> Result<()> {
        let ttl = ttl_secs.unwrap_or(self.config.default_ttl_secs) as i64;
        let prefix = &self.config.key_prefix;
        for key in [
            creds_key(prefix, session_id.as_str()),
            keys_key(prefix, session_id.as_str()),
            meta_key(prefix, session_id.as_str()),
        ] {
            self.client
                .expire::<i64, _>(key, ttl, None)
                .await
                .map_err(|e| AuthVaultError::storage(Tier::Hot, e.to_string()))?;
        }
        Ok(())
    }

    async fn exists(&self, session_id: &SessionId) -> Result<bool> {
        let count: i64 = self
            .client
            .exists(creds_key(&self.config.key_prefix, session_id.as_str()))
            .await
            .map_err(|e| AuthVaultError::storage(Tier::Hot, e.to_string()))?;
        Ok(count > 0)
    }

    async fn is_healthy(&self) -> bool {
        self.client.ping::<String>(None).await.is_ok()
    }

    async fn connect(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.client.init().await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    let delay = retry_strategy(
                        attempt,
                        self.config.retry_base_delay_ms,
                        self.config.retry_multiplier,
                        self.config.max_retries,
                    );
                    match delay {
                        Some(ms) => {
                            tracing::warn!(attempt, error = %e, "hot tier connect failed, retrying");
                            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
                            attempt += 1;
                        }
                        None => return Err(AuthVaultError::storage(Tier::Hot, e.to_string())),
                    }
                }
            }
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.client
            .quit()
            .await
            .map_err(|e| AuthVaultError::storage(Tier::Hot, e.to_string()))?;
        Ok(())
    }
}
