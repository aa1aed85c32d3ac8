//! `CryptoProvider`: the coordinator over [`CryptoKeyRegistry`] that
//! implements spec.md §4.2's `initialize`/`encrypt`/`decrypt`/`rotateKey`/
//! `cleanupExpiredKeys`/`keyStats`/`isHealthy` contract.

use crate::registry::{derive_material, key_id_for, CryptoKeyRegistry, KeyRegistryStats};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use authvault_types::config::{Environment, SecurityConfig};
use authvault_types::crypto_key::CryptoKeyRecord;
use authvault_types::envelope::{EncryptedEnvelope, KEY_ID_AUTO, KEY_ID_NONE, SCHEMA_VERSION_CURRENT};
use authvault_types::{AuthVaultError, Result};
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use rand::RngCore;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Symmetric-encryption coordinator. AES-256-GCM is the only algorithm
/// implemented; `"secretbox"` in config is accepted as an alias (spec.md
/// §4.2 "Algorithm") rather than wired to a distinct cipher.
pub struct CryptoProvider {
    registry: RwLock<CryptoKeyRegistry>,
    enabled: bool,
    key_rotation_days: u32,
}

impl CryptoProvider {
    /// Build a provider per spec.md §4.2 "Production safety": encryption
    /// enabled + `environment == production` + no master key supplied is a
    /// hard construction failure; `development` falls back to a randomly
    /// generated key with a prominent warning.
    pub fn new(config: &SecurityConfig, master_key: Option<&[u8]>) -> Result<Self> {
        let registry = RwLock::new(CryptoKeyRegistry::new());
        let provider = Self {
            registry,
            enabled: config.enable_encryption,
            key_rotation_days: config.key_rotation_days,
        };

        if !config.enable_encryption {
            return Ok(provider);
        }

        match master_key {
            Some(material) => {
                provider.initialize(material);
            }
            None => match config.environment {
                Environment::Production => {
                    return Err(AuthVaultError::invalid(
                        "encryption enabled in production with no master key supplied",
                    ));
                }
                Environment::Development | Environment::Testing => {
                    let mut generated = [0u8; 32];
                    rand::thread_rng().fill_bytes(&mut generated);
                    tracing::warn!(
                        "no master key supplied outside production; generating an ephemeral key \
                         (state encrypted with it will be unreadable after this process exits)"
                    );
                    provider.initialize(&generated);
                }
            },
        }

        Ok(provider)
    }

    /// Register a first/rotated active key (spec.md §4.2 `initialize`).
    pub fn initialize(&self, master_key: &[u8]) {
        let material = derive_material(master_key);
        let key_id = key_id_for(material.as_slice());
        let now = Utc::now();
        let record = CryptoKeyRecord {
            key_id,
            material,
            created_at: now,
            expires_at: Some(now + Duration::days(self.key_rotation_days as i64)),
            retired_at: None,
        };
        self.registry.write().set_active(record);
    }

    /// Add a new active key, retiring the previous one (spec.md §4.2 `rotateKey`).
    pub fn rotate_key(&self, new_master: &[u8]) {
        self.initialize(new_master);
    }

    /// Remove expired, non-active keys; return the count reclaimed.
    pub fn cleanup_expired_keys(&self) -> usize {
        self.registry.write().cleanup_expired()
    }

    /// True iff an active, non-expired key exists, or encryption is disabled
    /// (nothing to be unhealthy about).
    pub fn is_healthy(&self) -> bool {
        if !self.enabled {
            return true;
        }
        self.registry.read().is_healthy()
    }

    /// Totals, active id, expired count (spec.md §4.2 `keyStats`).
    pub fn key_stats(&self) -> KeyRegistryStats {
        self.registry.read().stats()
    }

    /// Encrypt `plaintext` under the active key (spec.md §4.2 `encrypt`).
    ///
    /// When encryption is disabled, returns a zero-nonce envelope carrying
    /// the plaintext verbatim under the `"none"` sentinel `keyId` — still
    /// round-trippable through `decrypt`, just unencrypted.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope> {
        if !self.enabled {
            return Ok(EncryptedEnvelope {
                ciphertext: plaintext.to_vec(),
                nonce: vec![0u8; NONCE_LEN],
                key_id: KEY_ID_NONE.to_string(),
                schema_version: SCHEMA_VERSION_CURRENT,
                timestamp: Utc::now(),
            });
        }

        let registry = self.registry.read();
        let active = registry
            .active()
            .ok_or_else(|| AuthVaultError::encryption("no active key"))?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(active.material.as_slice()));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| AuthVaultError::encryption("AES-GCM encryption failed"))?;

        Ok(EncryptedEnvelope {
            ciphertext,
            nonce: nonce_bytes.to_vec(),
            key_id: active.key_id.clone(),
            schema_version: SCHEMA_VERSION_CURRENT,
            timestamp: Utc::now(),
        })
    }

    /// Decrypt `envelope` (spec.md §4.2 `decrypt`, steps 1-6). Nonce and
    /// ciphertext are already raw bytes by the time they reach this type —
    /// shape normalization (§4.2.1) happens one layer down, when a tier
    /// adapter deserializes an arbitrary stored document into
    /// `EncryptedEnvelope` (see `authvault_crypto::normalize_bytes`).
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
        if envelope.key_id == KEY_ID_NONE || !self.enabled {
            return Ok(envelope.ciphertext.clone());
        }

        let registry = self.registry.read();
        let key_id = if envelope.key_id == KEY_ID_AUTO {
            registry
                .active_key_id()
                .ok_or_else(|| AuthVaultError::encryption("no active key for 'auto' envelope"))?
                .to_string()
        } else {
            envelope.key_id.clone()
        };

        let record = registry
            .get(&key_id)
            .ok_or_else(|| AuthVaultError::encryption("key not found"))?;

        if record.is_expired(Utc::now()) {
            tracing::warn!(key_id = %key_id, "decrypting with an expired key");
        }

        if envelope.nonce.len() != NONCE_LEN {
            return Err(AuthVaultError::encryption("invalid nonce length"));
        }
        if envelope.ciphertext.len() < TAG_LEN {
            return Err(AuthVaultError::encryption("ciphertext shorter than auth tag"));
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(record.material.as_slice()));
        let nonce = Nonce::from_slice(&envelope.nonce);
        cipher
            .decrypt(nonce, envelope.ciphertext.as_slice())
            .map_err(|_| AuthVaultError::encryption("authentication failed"))
    }
}
