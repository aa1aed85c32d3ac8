//! The `HotStore` trait (spec.md §4.3 "Public operations").

use authvault_types::{AuthPatch, Result, SessionId, Versioned};
use chrono::{DateTime, Utc};

/// Configuration for any `HotStore` implementation.
#[derive(Debug, Clone)]
pub struct HotStoreConfig {
    pub key_prefix: String,
    pub default_ttl_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_multiplier: f64,
}

impl Default for HotStoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: crate::wire::DEFAULT_PREFIX.to_string(),
            default_ttl_secs: 7 * 24 * 3600,
            max_retries: 3,
            retry_base_delay_ms: 50,
            retry_multiplier: 2.0,
        }
    }
}

/// Result of a successful `set` (spec.md §6).
#[derive(Debug, Clone, PartialEq)]
pub struct HotSetResult {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub success: bool,
}

/// Session-scoped hot-tier adapter. Grounded on
/// `aura-core::effects::storage::StorageEffects`'s shape: one async trait,
/// a handful of verbs, a dedicated (here: shared) error type.
#[async_trait::async_trait]
pub trait HotStore: Send + Sync {
    /// Parallel read of `meta`, `creds`, `keys`; `None` if either `creds` or
    /// `keys` is missing (spec.md §4.3 `get`).
    async fn get(&self, session_id: &SessionId) -> Result<Option<Versioned<authvault_types::AuthSnapshot>>>;

    /// `newVersion = (expectedVersion ?? 0) + 1`; merges `patch.keys`/`patch.appState`
    /// against the current stored value before writing (spec.md §4.3 `set`).
    async fn set(
        &self,
        session_id: &SessionId,
        patch: &AuthPatch,
        expected_version: Option<u64>,
    ) -> Result<HotSetResult>;

    /// Multi-delete across the three keys.
    async fn delete(&self, session_id: &SessionId) -> Result<()>;

    /// Reset TTL on all three keys.
    async fn touch(&self, session_id: &SessionId, ttl_secs: Option<u64>) -> Result<()>;

    /// Existence of the `creds` key.
    async fn exists(&self, session_id: &SessionId) -> Result<bool>;

    async fn is_healthy(&self) -> bool;

    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}
