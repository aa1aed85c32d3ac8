//! `MongoColdStore`: the official `mongodb` driver-backed cold tier (feature
//! `mongo-backend`).
//!
//! The upsert/retry algorithm in spec.md §4.4 steps 1-8 is MongoDB's own
//! conditional-upsert idiom almost verbatim: a filter that matches either the
//! expected version or a brand-new document, a duplicate-key error on the
//! race where two writers both observe "no document yet", and a narrowed
//! retry filter that distinguishes "someone else already created it" (version
//! mismatch) from "we can just write" (duplicate key, safe to retry).

use crate::document::ColdDocument;
use crate::store::{ColdSetResult, ColdStore};
use authvault_codec::Codec;
use authvault_crypto::CryptoProvider;
use authvault_types::{
    merge_keys, AuthPatch, AuthSnapshot, AuthVaultError, Result, SessionId, Tier, Versioned,
};
use chrono::Utc;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::Collection;
use std::sync::Arc;
use std::time::Duration;

const MAX_UPSERT_ATTEMPTS: u32 = 3;
const BACKOFF_SCHEDULE_MS: [u64; 3] = [50, 100, 200];

/// Cold tier backed by a MongoDB collection of [`ColdDocument`]s.
pub struct MongoColdStore {
    collection: Collection<ColdDocument>,
    codec: Arc<Codec>,
    crypto: Arc<CryptoProvider>,
}

impl MongoColdStore {
    pub fn new(collection: Collection<ColdDocument>, codec: Arc<Codec>, crypto: Arc<CryptoProvider>) -> Self {
        Self {
            collection,
            codec,
            crypto,
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
            None => (None, Default::default(), None),
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

    /// `{ _id: sessionId, $or: [ { version: {$exists:false} }, { version: expectedVersion } ] }`
    /// (spec.md §4.4 step 6), the single combined filter: one round trip
    /// matches either "brand new, nobody's written yet" or "exactly the
    /// version the caller expects", so a racing concurrent creator is caught
    /// by the unique index (duplicate key) rather than this filter silently
    /// picking the wrong branch.
    fn conditional_filter(session_id: &SessionId, expected_version: Option<u64>) -> Document {
        let not_yet_created = doc! { "version": { "$exists": false } };
        let or_clause = match expected_version {
            Some(v) => vec![not_yet_created, doc! { "version": v as i64 }],
            None => vec![not_yet_created],
        };
        doc! { "_id": session_id.as_str(), "$or": or_clause }
    }
}

#[async_trait::async_trait]
impl ColdStore for MongoColdStore {
    async fn get(&self, session_id: &SessionId) -> Result<Option<Versioned<AuthSnapshot>>> {
        let found = self
            .collection
            .find_one(doc! { "_id": session_id.as_str() }, None)
            .await
            .map_err(|e| AuthVaultError::storage(Tier::Cold, e.to_string()))?;
        let doc = match found {
            Some(doc) => doc,
            None => return Ok(None),
        };
        let snapshot = self.decode_snapshot(&doc)?;
        Ok(Some(Versioned::new(snapshot, doc.version, doc.updated_at)))
    }

    /// Steps 1-8 of spec.md §4.4: load the current document (if `get` was
    /// already called by the orchestrator this is a second read, accepted as
    /// the cost of keeping writes atomic), merge, attempt a conditional
    /// upsert, and on a duplicate-key race narrow the filter to `_id` only and
    /// retry up to [`MAX_UPSERT_ATTEMPTS`] with the fixed backoff schedule.
    async fn set(
        &self,
        session_id: &SessionId,
        patch: &AuthPatch,
        expected_version: Option<u64>,
    ) -> Result<ColdSetResult> {
        let mut attempt = 0u32;
        let mut current = self
            .collection
            .find_one(doc! { "_id": session_id.as_str() }, None)
            .await
            .map_err(|e| AuthVaultError::storage(Tier::Cold, e.to_string()))?;

        loop {
            // The expectedVersion fencing check applies only to the first
            // attempt. A duplicate-key retry (below) has already re-read the
            // document the winner committed, so it merges and commits on top
            // of that unconditionally rather than re-judging it against the
            // caller's now-stale expectation (spec.md §4.4 step 7 — "we've
            // committed to the sessionId; we're racing concurrent writes, not
            // competing with a different document").
            if attempt == 0 {
                if let (Some(doc), Some(expected)) = (&current, expected_version) {
                    if doc.version != expected {
                        return Err(AuthVaultError::version_mismatch(expected, doc.version));
                    }
                }
            }

            let new_version = current
                .as_ref()
                .map(|d| d.version)
                .unwrap_or_else(|| expected_version.unwrap_or(0))
                + 1;
            let updated_at = Utc::now();
            let new_doc = self.build_document(session_id, current.as_ref(), patch, new_version, updated_at)?;
            let new_doc_bson = mongodb::bson::to_document(&new_doc)
                .map_err(|e| AuthVaultError::storage(Tier::Cold, e.to_string()))?;
            let update = doc! { "$set": new_doc_bson };

            // Step 6 on the first attempt; step 7 narrows to `_id` alone on a
            // retry, dropping the `$or` clause entirely.
            let filter = if attempt == 0 {
                Self::conditional_filter(session_id, expected_version)
            } else {
                doc! { "_id": session_id.as_str() }
            };
            let options = FindOneAndUpdateOptions::builder()
                .upsert(true)
                .return_document(ReturnDocument::After)
                .build();

            match self.collection.find_one_and_update(filter, update, options).await {
                Ok(Some(_)) => {
                    return Ok(ColdSetResult {
                        version: new_version,
                        updated_at,
                        success: true,
                    })
                }
                Ok(None) => {
                    // Step 8: the combined filter matched neither branch —
                    // the document exists at a version other than what the
                    // caller expected, and nobody raced the upsert itself.
                    let observed = self
                        .collection
                        .find_one(doc! { "_id": session_id.as_str() }, None)
                        .await
                        .map_err(|e| AuthVaultError::storage(Tier::Cold, e.to_string()))?
                        .map(|d| d.version)
                        .unwrap_or(0);
                    return Err(AuthVaultError::version_mismatch(
                        expected_version.unwrap_or(0),
                        observed,
                    ));
                }
                Err(e) if e.to_string().contains("E11000") => {
                    attempt += 1;
                    if attempt >= MAX_UPSERT_ATTEMPTS {
                        return Err(AuthVaultError::storage(
                            Tier::Cold,
                            "duplicate-key race exhausted retry budget",
                        ));
                    }
                    let delay = BACKOFF_SCHEDULE_MS[(attempt - 1) as usize];
                    tracing::warn!(attempt, delay_ms = delay, "cold tier upsert race, retrying");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    // Step 7: re-read the document the winner committed so
                    // this retry's merge and `newVersion` build on top of it,
                    // not our stale pre-race read (spec.md §8.2 S4: "reads
                    // the current version (now 1), merges on top, and
                    // commits version 2").
                    current = self
                        .collection
                        .find_one(doc! { "_id": session_id.as_str() }, None)
                        .await
                        .map_err(|e| AuthVaultError::storage(Tier::Cold, e.to_string()))?;
                }
                Err(e) => return Err(AuthVaultError::storage(Tier::Cold, e.to_string())),
            }
        }
    }

    async fn delete(&self, session_id: &SessionId) -> Result<()> {
        self.collection
            .delete_one(doc! { "_id": session_id.as_str() }, None)
            .await
            .map_err(|e| AuthVaultError::storage(Tier::Cold, e.to_string()))?;
        Ok(())
    }

    async fn touch(&self, session_id: &SessionId) -> Result<()> {
        self.collection
            .update_one(
                doc! { "_id": session_id.as_str() },
                doc! { "$set": { "updatedAt": mongodb::bson::DateTime::from_chrono(Utc::now()) } },
                None,
            )
            .await
            .map_err(|e| AuthVaultError::storage(Tier::Cold, e.to_string()))?;
        Ok(())
    }

    async fn exists(&self, session_id: &SessionId) -> Result<bool> {
        let count = self
            .collection
            .count_documents(doc! { "_id": session_id.as_str() }, None)
            .await
            .map_err(|e| AuthVaultError::storage(Tier::Cold, e.to_string()))?;
        Ok(count > 0)
    }

    async fn is_healthy(&self) -> bool {
        self.collection
            .find_one(doc! {}, None)
            .await
            .is_ok()
    }
}
