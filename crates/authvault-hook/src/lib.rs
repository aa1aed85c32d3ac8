//! `authvault-hook`: the thin adapter a messaging client's event loop plugs
//! into (spec.md §6 "Hook adapter surface").
//!
//! This is deliberately the thinnest crate in the workspace: one struct, four
//! methods, no merge logic, no retry logic, no caching of its own — all of
//! that lives in `authvault-core::AuthStore`. The one piece of genuine logic
//! here is the per-type "reviver" dispatch for `"app-state-sync-key"` records,
//! and the rule that a lookup failure for one id is swallowed rather than
//! failing the whole batch.

use authvault_core::AuthStore;
use authvault_hot::HotSetResult;
use authvault_metrics::RequestContext;
use authvault_types::{AuthPatch, Result, SessionId, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The key-type tag that requires reviver dispatch before a record is handed
/// back to the caller (spec.md §6).
pub const APP_STATE_SYNC_KEY: &str = "app-state-sync-key";

/// Per-id reviver for `"app-state-sync-key"` records: the messaging client's
/// own proto constructor. An `Err` from this callback is swallowed per id
/// (spec.md §6 "Lookup errors within a single id are swallowed; the id is
/// omitted from the result"), never propagated out of `get_keys`.
pub type Reviver = dyn Fn(&Value) -> Result<Value> + Send + Sync;

/// Wraps one session's worth of `AuthStore` access behind the
/// `{state, saveCreds, store}` surface a messaging client's auth hook expects.
pub struct AuthHook {
    store: Arc<AuthStore>,
    session_id: SessionId,
}

impl AuthHook {
    pub fn new(store: Arc<AuthStore>, session_id: SessionId) -> Self {
        Self { store, session_id }
    }

    /// Direct access to the underlying orchestrator, per spec.md §6's
    /// `{..., store}` field — callers that need `exists`/`touch`/batch
    /// operations reach past the hook surface for those.
    pub fn store(&self) -> &Arc<AuthStore> {
        &self.store
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// `state.creds`: the decoded credentials value, defaulted if no snapshot
    /// exists yet (`AuthStore::get` already auto-initializes on a double miss).
    pub async fn creds(&self, ctx: &RequestContext) -> Result<Value> {
        Ok(self.store.get(ctx, &self.session_id).await?.data.creds)
    }

    /// `state.keys.get(type, ids)`: looks up each requested id under `type`
    /// in the current snapshot. `"app-state-sync-key"` records are passed
    /// through `reviver` first; other types pass through unchanged. A missing
    /// id, or a reviver that errors on an id, is simply omitted from the
    /// result rather than failing the whole call.
    pub async fn get_keys(
        &self,
        ctx: &RequestContext,
        key_type: &str,
        ids: &[String],
        reviver: Option<&Reviver>,
    ) -> Result<BTreeMap<String, Value>> {
        let snapshot = self.store.get(ctx, &self.session_id).await?;
        let Some(records) = snapshot.data.keys.get(key_type) else {
            return Ok(BTreeMap::new());
        };

        let mut out = BTreeMap::new();
        for id in ids {
            let Some(value) = records.get(id) else {
                continue;
            };
            let revived = if key_type == APP_STATE_SYNC_KEY {
                match reviver {
                    Some(revive) => match revive(value) {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!(
                                correlation_id = %ctx.correlation_id(),
                                session_id = %self.session_id.as_str(),
                                key_type,
                                id,
                                error = %e,
                                "reviver failed for key record, omitting from result"
                            );
                            continue;
                        }
                    },
                    None => value.clone(),
                }
            } else {
                value.clone()
            };
            out.insert(id.clone(), revived);
        }
        Ok(out)
    }

    /// `state.keys.set(data)`: reads the current version, then applies an
    /// incremental merge patch over `keys` at that version (spec.md §4.6.1).
    pub async fn set_keys(
        &self,
        ctx: &RequestContext,
        data: BTreeMap<String, BTreeMap<String, Option<Value>>>,
    ) -> Result<HotSetResult> {
        let current_version = self.store.get(ctx, &self.session_id).await?.version;
        self.store
            .set(ctx, &self.session_id, &AuthPatch::keys(data), Some(current_version))
            .await
    }

    /// `saveCreds()`: reads the current version, then wholesale-replaces
    /// `creds` at that version. The caller passes the (already-mutated)
    /// in-memory credentials value; this crate holds no mutable state of its
    /// own to read it back from.
    pub async fn save_creds(&self, ctx: &RequestContext, creds: Value) -> Result<HotSetResult> {
        let current_version = self.store.get(ctx, &self.session_id).await?.version;
        self.store
            .set(ctx, &self.session_id, &AuthPatch::creds(creds), Some(current_version))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authvault_codec::Codec;
    use authvault_cold::InMemoryColdStore;
    use authvault_core::AuthStoreConfig;
    use authvault_crypto::CryptoProvider;
    use authvault_hot::{HotStoreConfig, InMemoryHotStore};
    use authvault_metrics::Metrics;
    use authvault_types::config::{CompressionAlgorithm, Environment, SecurityConfig};

    fn hook() -> AuthHook {
        let codec = Arc::new(Codec::new(CompressionAlgorithm::None, true));
        let sec_config = SecurityConfig {
            environment: Environment::Development,
            ..SecurityConfig::default()
        };
        let crypto = Arc::new(CryptoProvider::new(&sec_config, Some(&[9u8; 32])).unwrap());
        let hot: Arc<dyn authvault_hot::HotStore> = Arc::new(InMemoryHotStore::new(
            codec.clone(),
            crypto.clone(),
            HotStoreConfig::default(),
        ));
        let cold: Arc<dyn authvault_cold::ColdStore> =
            Arc::new(InMemoryColdStore::new(codec.clone(), crypto.clone()));
        let store = Arc::new(AuthStore::new(
            hot,
            cold,
            None,
            codec,
            crypto,
            Arc::new(Metrics::new()),
            AuthStoreConfig::default(),
        ));
        AuthHook::new(store, SessionId::new("s1").unwrap())
    }

    fn ctx() -> RequestContext {
        RequestContext::new("test")
    }

    #[tokio::test]
    async fn creds_defaults_to_empty_map_on_a_fresh_session() {
        let hook = hook();
        let creds = hook.creds(&ctx()).await.unwrap();
        assert_eq!(creds, Value::map([]));
    }

    #[tokio::test]
    async fn save_creds_then_creds_round_trips() {
        let hook = hook();
        hook.save_creds(&ctx(), Value::map([("regId".to_string(), Value::Num(5.0))]))
            .await
            .unwrap();
        let creds = hook.creds(&ctx()).await.unwrap();
        assert_eq!(creds.as_map().unwrap().get("regId"), Some(&Value::Num(5.0)));
    }

    #[tokio::test]
    async fn get_keys_passes_through_non_sync_key_types_without_a_reviver() {
        let hook = hook();
        let mut data = BTreeMap::new();
        data.insert(
            "pre-key".to_string(),
            BTreeMap::from([("p1".to_string(), Some(Value::Bytes(vec![1, 2, 3])))]),
        );
        hook.set_keys(&ctx(), data).await.unwrap();

        let result = hook
            .get_keys(&ctx(), "pre-key", &["p1".to_string()], None)
            .await
            .unwrap();
        assert_eq!(result.get("p1"), Some(&Value::Bytes(vec![1, 2, 3])));
    }

    #[tokio::test]
    async fn get_keys_runs_app_state_sync_key_records_through_the_reviver() {
        let hook = hook();
        let mut data = BTreeMap::new();
        data.insert(
            APP_STATE_SYNC_KEY.to_string(),
            BTreeMap::from([("k1".to_string(), Some(Value::Bytes(vec![4, 5, 6])))]),
        );
        hook.set_keys(&ctx(), data).await.unwrap();

        let reviver: &Reviver = &|v: &Value| {
            let bytes = v.as_bytes().unwrap().to_vec();
            Ok(Value::map([("revived".to_string(), Value::Bytes(bytes))]))
        };
        let result = hook
            .get_keys(&ctx(), APP_STATE_SYNC_KEY, &["k1".to_string()], Some(reviver))
            .await
            .unwrap();
        let revived = result.get("k1").unwrap().as_map().unwrap();
        assert_eq!(revived.get("revived"), Some(&Value::Bytes(vec![4, 5, 6])));
    }

    #[tokio::test]
    async fn get_keys_omits_ids_the_reviver_fails_on() {
        let hook = hook();
        let mut data = BTreeMap::new();
        data.insert(
            APP_STATE_SYNC_KEY.to_string(),
            BTreeMap::from([
                ("good".to_string(), Some(Value::Bytes(vec![1]))),
                ("bad".to_string(), Some(Value::Bytes(vec![2]))),
            ]),
        );
        hook.set_keys(&ctx(), data).await.unwrap();

        let reviver: &Reviver = &|v: &Value| {
            if v.as_bytes() == Some(&[2][..]) {
                return Err(authvault_types::AuthVaultError::invalid("bad record"));
            }
            Ok(v.clone())
        };
        let result = hook
            .get_keys(
                &ctx(),
                APP_STATE_SYNC_KEY,
                &["good".to_string(), "bad".to_string()],
                Some(reviver),
            )
            .await
            .unwrap();
        assert!(result.contains_key("good"));
        assert!(!result.contains_key("bad"));
    }

    #[tokio::test]
    async fn get_keys_on_missing_id_is_simply_omitted() {
        let hook = hook();
        let result = hook
            .get_keys(&ctx(), "pre-key", &["missing".to_string()], None)
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
