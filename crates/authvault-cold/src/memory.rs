//! `InMemoryColdStore`: an `RwLock`-guarded document map with version-tagged
//! optimistic writes, for tests (spec.md §4.4 steps 1-8 without a live Mongo).

use crate::document::ColdDocument;
use crate::store::{ColdSetResult, ColdStore};
use authvault_codec::Codec;
use authvault_crypto::CryptoProvider;
use authvault_types::{
    merge_keys, AuthPatch, AuthSnapshot, AuthVaultError, Result, SessionId, Tier, Versioned,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// In-memory cold tier. Not backed by MongoDB; suitable for tests and as the
/// default `authvault-testkit` fixture.
pub struct InMemoryColdStore {
    codec: Arc<Codec>,
    crypto: Arc<CryptoProvider>,
    documents: RwLock<BTreeMap<String, ColdDocument>>,
}

impl InMemoryColdStore {
    pub fn new(codec: Arc<Codec>, crypto: Arc<CryptoProvider>) -> Self {
        Self {
            codec,
            crypto,
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    fn decode_snapshot(&self, doc: &ColdDocument) -> Result<AuthSnapshot> {
        let creds = authvault_crypto::open(&self.codec, &self.crypto, &doc.creds)?;
        let keys_value = authvault_crypto::open(&self.codec, &self.crypto, &doc.keys)?;
        let keys = authvault_types::value_to_keys(&keys_value);
        let app_state = match &doc.app_state {
            Some(env) => authvault_types::value_to_app_state(&authvault_crypto::open(
                &self.codec,
                &self.crypto,
                env,
            )?),
            None => None,
        };
        Ok(AuthSnapshot {
            creds,
            keys,
            app_state,
        })
    }

    /// Merge `patch` on top of `current` (if any) and seal the result into a
    /// fresh document at `new_version`. Mirrors spec.md §4.4 steps 3-5.
    fn build_document(
        &self,
        session_id: &SessionId,
        current: Option<&ColdDocument>,
        patch: &AuthPatch,
        new_version: u64,
        updated_at: chrono::DateTime<Utc>,
    ) -> Result<ColdDocument> {
        let (current_creds, mut current_keys, mut current_app_state) = match current {
            Some(doc) => {
                let snapshot = self.decode_snapshot(doc)?;
                (Some(snapshot.creds), snapshot.keys, snapshot.app_state)
            }
            None => (None, BTreeMap::new(), None),
        };

        let creds_value = patch
            .creds
            .clone()
            .or(current_creds)
            .unwrap_or_else(|| AuthSnapshot::new_default().creds);
        let creds = authvault_crypto::seal_value(&self.codec, &self.crypto, &creds_value)?;

        if let Some(patch_keys) = &patch.keys {
            merge_keys(&mut current_keys, patch_keys);
        }
        let keys_value = authvault_types::keys_to_value(&current_keys);
        let keys = authvault_crypto::seal_value(&self.codec, &self.crypto, &keys_value)?;

        if let Some(app_state) = &patch.app_state {
            current_app_state = Some(app_state.clone());
        }
        let app_state = current_app_state
            .map(|state| {
                let value = authvault_types::app_state_to_value(&Some(state));
                authvault_crypto::seal_value(&self.codec, &self.crypto, &value)
            })
            .transpose()?;

        Ok(ColdDocument {
            session_id: session_id.as_str().to_string(),
            version: new_version,
            updated_at,
            creds,
            keys,
            app_state,
        })
    }
}

#[async_trait::async_trait]
impl ColdStore for InMemoryColdStore {
    async fn get(&self, session_id: &SessionId) -> Result<Option<Versioned<AuthSnapshot>>> {
        let doc = {
            let documents = self
                .documents
                .read()
                .map_err(|_| AuthVaultError::storage(Tier::Cold, "lock poisoned"))?;
            match documents.get(session_id.as_str()) {
                Some(doc) => doc.clone(),
                None => return Ok(None),
            }
        };
        let snapshot = self.decode_snapshot(&doc)?;
        Ok(Some(Versioned::new(snapshot, doc.version, doc.updated_at)))
    }

    async fn set(
        &self,
        session_id: &SessionId,
        patch: &AuthPatch,
        expected_version: Option<u64>,
    ) -> Result<ColdSetResult> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| AuthVaultError::storage(Tier::Cold, "lock poisoned"))?;

        let current = documents.get(session_id.as_str());
        let new_version = match (current, expected_version) {
            (None, _) => expected_version.unwrap_or(0) + 1,
            (Some(doc), Some(expected)) if doc.version != expected => {
                return Err(AuthVaultError::version_mismatch(expected, doc.version));
            }
            (Some(doc), _) => doc.version + 1,
        };
        let updated_at = Utc::now();
        let new_doc = self.build_document(session_id, current, patch, new_version, updated_at)?;
        documents.insert(session_id.as_str().to_string(), new_doc);

        Ok(ColdSetResult {
            version: new_version,
            updated_at,
            success: true,
        })
    }

    async fn delete(&self, session_id: &SessionId) -> Result<()> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| AuthVaultError::storage(Tier::Cold, "lock poisoned"))?;
        documents.remove(session_id.as_str());
        Ok(())
    }

    async fn touch(&self, session_id: &SessionId) -> Result<()> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| AuthVaultError::storage(Tier::Cold, "lock poisoned"))?;
        if let Some(doc) = documents.get_mut(session_id.as_str()) {
            doc.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn exists(&self, session_id: &SessionId) -> Result<bool> {
        let documents = self
            .documents
            .read()
            .map_err(|_| AuthVaultError::storage(Tier::Cold, "lock poisoned"))?;
        Ok(documents.contains_key(session_id.as_str()))
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

    fn store() -> InMemoryColdStore {
        let codec = Arc::new(Codec::new(CompressionAlgorithm::None, true));
        let sec_config = SecurityConfig {
            environment: Environment::Development,
            ..SecurityConfig::default()
        };
        let crypto = Arc::new(CryptoProvider::new(&sec_config, Some(&[2u8; 32])).unwrap());
        InMemoryColdStore::new(codec, crypto)
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let store = store();
        let id = SessionId::new("s1").unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_write_creates_version_one() {
        let store = store();
        let id = SessionId::new("s1").unwrap();
        let result = store
            .set(&id, &AuthPatch::creds(Value::map([])), None)
            .await
            .unwrap();
        assert_eq!(result.version, 1);
    }

    #[tokio::test]
    async fn version_mismatch_on_stale_expected_version() {
        let store = store();
        let id = SessionId::new("s1").unwrap();
        store
            .set(&id, &AuthPatch::creds(Value::map([])), None)
            .await
            .unwrap();
        let err = store
            .set(&id, &AuthPatch::creds(Value::map([])), Some(99))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthVaultError::VersionMismatch { .. }));
    }

    #[tokio::test]
    async fn matching_expected_version_succeeds_and_increments() {
        let store = store();
        let id = SessionId::new("s1").unwrap();
        let r1 = store
            .set(&id, &AuthPatch::creds(Value::map([])), None)
            .await
            .unwrap();
        let r2 = store
            .set(&id, &AuthPatch::creds(Value::map([])), Some(r1.version))
            .await
            .unwrap();
        assert_eq!(r2.version, 2);
    }

    #[tokio::test]
    async fn incremental_keys_are_preserved_across_writes() {
        let store = store();
        let id = SessionId::new("s1").unwrap();
        let mut first_keys = BTreeMap::new();
        let mut first_type = BTreeMap::new();
        first_type.insert("id-1".to_string(), Value::Num(1.0));
        first_keys.insert("preKeys".to_string(), first_type);

        let r1 = store
            .set(&id, &AuthPatch::keys(first_keys), None)
            .await
            .unwrap();

        let mut second_keys = BTreeMap::new();
        let mut second_type = BTreeMap::new();
        second_type.insert("id-2".to_string(), Value::Num(2.0));
        second_keys.insert("preKeys".to_string(), second_type);
        store
            .set(&id, &AuthPatch::keys(second_keys), Some(r1.version))
            .await
            .unwrap();

        let snap = store.get(&id).await.unwrap().unwrap();
        let pre_keys = snap.data.keys.get("preKeys").unwrap();
        assert_eq!(pre_keys.get("id-1"), Some(&Value::Num(1.0)));
        assert_eq!(pre_keys.get("id-2"), Some(&Value::Num(2.0)));
    }

    #[tokio::test]
    async fn delete_removes_the_document() {
        let store = store();
        let id = SessionId::new("s1").unwrap();
        store
            .set(&id, &AuthPatch::creds(Value::map([])), None)
            .await
            .unwrap();
        store.delete(&id).await.unwrap();
        assert!(!store.exists(&id).await.unwrap());
    }
}
