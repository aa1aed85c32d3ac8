//! Tier fakes that always fail, for scenario tests that need to trip the
//! orchestrator's circuit breaker organically rather than poking its
//! internals (spec.md §8.2 S5).

use async_trait::async_trait;
use authvault_cold::{ColdSetResult, ColdStore};
use authvault_types::error::Tier;
use authvault_types::{AuthPatch, AuthSnapshot, AuthVaultError, Result, SessionId, Versioned};

/// A cold tier that errors on every read and write, as if the backing store
/// were unreachable.
pub struct AlwaysFailingColdStore;

#[async_trait]
impl ColdStore for AlwaysFailingColdStore {
    async fn get(&self, _session_id: &SessionId) -> Result<Option<Versioned<AuthSnapshot>>> {
        Err(AuthVaultError::storage(Tier::Cold, "connection refused"))
    }

    async fn set(
        &self,
        _session_id: &SessionId,
        _patch: &AuthPatch,
        _expected_version: Option<u64>,
    ) -> Result<ColdSetResult> {
        Err(AuthVaultError::storage(Tier::Cold, "connection refused"))
    }

    async fn delete(&self, _session_id: &SessionId) -> Result<()> {
        Err(AuthVaultError::storage(Tier::Cold, "connection refused"))
    }

    async fn touch(&self, _session_id: &SessionId) -> Result<()> {
        Err(AuthVaultError::storage(Tier::Cold, "connection refused"))
    }

    async fn exists(&self, _session_id: &SessionId) -> Result<bool> {
        Err(AuthVaultError::storage(Tier::Cold, "connection refused"))
    }

    async fn is_healthy(&self) -> bool {
        false
    }
}
