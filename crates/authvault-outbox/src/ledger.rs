//! The `Ledger` trait: storage for [`OutboxEntry`] records, independent of
//! which tier eventually backs it (spec.md §9 Open Question — resolved in
//! `DESIGN.md`: this workspace keeps a dedicated local ledger rather than
//! smuggling outbox rows into the hot or cold tier's own keyspace).

use authvault_types::envelope::{EncryptedEnvelope, OutboxEntry, OutboxStatus};
use authvault_types::{AuthVaultError, Result, Tier};
use chrono::Utc;
use dashmap::DashMap;
use std::time::Duration;
use uuid::Uuid;

/// Aggregate counts, exposed through `authvault-metrics`' `outboxReconciler*`
/// series by the reconciler loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub pending: usize,
    pub in_flight: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Queue a write-behind job. Returns the assigned entry id.
    async fn enqueue(
        &self,
        session_id: &str,
        envelope: EncryptedEnvelope,
        expected_version: u64,
    ) -> Result<String>;

    /// Reclaim any `InFlight` entry whose visibility lease has expired back
    /// to `Pending`, then claim up to `batch_size` `Pending` entries as
    /// `InFlight` with a fresh lease of `visibility_timeout`.
    async fn claim_batch(&self, batch_size: usize, visibility_timeout: Duration) -> Result<Vec<OutboxEntry>>;

    /// Mark an entry durably applied. Terminal.
    async fn mark_succeeded(&self, entry_id: &str) -> Result<()>;

    /// Record a publish failure. Requeues as `Pending` if `attempts` after
    /// this failure is still under `max_attempts`; otherwise moves to the
    /// terminal `Failed` state.
    async fn mark_failed(&self, entry_id: &str, max_attempts: u32) -> Result<()>;

    async fn stats(&self) -> LedgerStats;
}

/// `DashMap`-backed ledger for tests and as the default `authvault-testkit`
/// fixture. Grounded on the same `dashmap`-as-concurrent-map idiom as
/// `authvault-hot::InMemoryHotStore`.
#[derive(Default)]
pub struct InMemoryLedger {
    entries: DashMap<String, OutboxEntry>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Ledger for InMemoryLedger {
    async fn enqueue(
        &self,
        session_id: &str,
        envelope: EncryptedEnvelope,
        expected_version: u64,
    ) -> Result<String> {
        let entry_id = Uuid::new_v4().to_string();
        let entry = OutboxEntry {
            entry_id: entry_id.clone(),
            session_id: session_id.to_string(),
            envelope,
            expected_version,
            status: OutboxStatus::Pending,
            attempts: 0,
            visible_after: None,
            enqueued_at: Utc::now(),
        };
        self.entries.insert(entry_id.clone(), entry);
        Ok(entry_id)
    }

    async fn claim_batch(&self, batch_size: usize, visibility_timeout: Duration) -> Result<Vec<OutboxEntry>> {
        let now = Utc::now();
        for mut entry in self.entries.iter_mut() {
            if entry.status == OutboxStatus::InFlight
                && entry.visible_after.is_some_and(|deadline| deadline <= now)
            {
                entry.status = OutboxStatus::Pending;
                entry.visible_after = None;
            }
        }

        let lease = chrono::Duration::from_std(visibility_timeout)
            .map_err(|e| AuthVaultError::storage(Tier::Outbox, e.to_string()))?;

        let mut claimed = Vec::new();
        for mut entry in self.entries.iter_mut() {
            if claimed.len() >= batch_size {
                break;
            }
            if entry.status == OutboxStatus::Pending {
                entry.status = OutboxStatus::InFlight;
                entry.visible_after = Some(now + lease);
                claimed.push(entry.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_succeeded(&self, entry_id: &str) -> Result<()> {
        if let Some(mut entry) = self.entries.get_mut(entry_id) {
            entry.status = OutboxStatus::Succeeded;
            entry.visible_after = None;
        }
        Ok(())
    }

    async fn mark_failed(&self, entry_id: &str, max_attempts: u32) -> Result<()> {
        if let Some(mut entry) = self.entries.get_mut(entry_id) {
            entry.attempts += 1;
            if entry.attempts >= max_attempts {
                entry.status = OutboxStatus::Failed;
                entry.visible_after = None;
            } else {
                entry.status = OutboxStatus::Pending;
                entry.visible_after = None;
            }
        }
        Ok(())
    }

    async fn stats(&self) -> LedgerStats {
        let mut stats = LedgerStats::default();
        for entry in self.entries.iter() {
            match entry.status {
                OutboxStatus::Pending => stats.pending += 1,
                OutboxStatus::InFlight => stats.in_flight += 1,
                OutboxStatus::Succeeded => stats.succeeded += 1,
                OutboxStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}
