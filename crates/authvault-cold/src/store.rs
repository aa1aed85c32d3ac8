//! The `ColdStore` trait (spec.md §4.4 "Operations").

use authvault_types::{AuthPatch, AuthSnapshot, Result, SessionId, Versioned};
use chrono::{DateTime, Utc};

/// Result of a successful `set`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColdSetResult {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub success: bool,
}

/// Durable, versioned, single-document-per-session tier.
#[async_trait::async_trait]
pub trait ColdStore: Send + Sync {
    async fn get(&self, session_id: &SessionId) -> Result<Option<Versioned<AuthSnapshot>>>;

    /// Implements the conditional-upsert algorithm in spec.md §4.4 steps 1-8:
    /// load, merge, compute `newVersion`, encode+encrypt, conditional upsert,
    /// duplicate-key retry, or `VersionMismatchError` on a real conflict.
    async fn set(
        &self,
        session_id: &SessionId,
        patch: &AuthPatch,
        expected_version: Option<u64>,
    ) -> Result<ColdSetResult>;

    async fn delete(&self, session_id: &SessionId) -> Result<()>;

    /// Reset `updatedAt` to extend the TTL index (spec.md §9 Open Question,
    /// resolved in DESIGN.md: yes, `touch` refreshes the cold-tier TTL).
    async fn touch(&self, session_id: &SessionId) -> Result<()>;

    async fn exists(&self, session_id: &SessionId) -> Result<bool>;

    async fn is_healthy(&self) -> bool;

    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}
