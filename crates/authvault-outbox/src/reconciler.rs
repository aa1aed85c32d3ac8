//! The reconciler: a `tokio::task` loop draining the [`Ledger`] into the cold
//! tier (spec.md §4.5).

use crate::ledger::Ledger;
use authvault_cold::ColdStore;
use authvault_codec::Codec;
use authvault_crypto::CryptoProvider;
use authvault_metrics::Metrics;
use authvault_types::{AuthPatch, Result, SessionId};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tunables for one reconciler loop.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Interval between sweeps.
    pub interval: Duration,
    /// Maximum entries claimed per sweep.
    pub batch_size: usize,
    /// How long a claimed entry stays invisible to other sweeps.
    pub visibility_timeout: Duration,
    /// Attempts before an entry is moved to `Failed`.
    pub max_attempts: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            batch_size: 50,
            visibility_timeout: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

/// Drains a [`Ledger`] into a [`ColdStore`] on a fixed interval.
///
/// This is the asynchronous half of the write-behind path: `Hybrid.set`
/// enqueues an entry and returns once the hot tier has it; this reconciler
/// applies it to the durable tier out of band, decoupling request latency
/// from cold-tier write latency (spec.md §2 "write-behind outbox"). Entries
/// are stored sealed the same way snapshot fields are, so a compromised
/// ledger backend learns nothing more than a compromised cold tier would.
pub struct Reconciler<L: Ledger, C: ColdStore> {
    ledger: Arc<L>,
    cold: Arc<C>,
    codec: Arc<Codec>,
    crypto: Arc<CryptoProvider>,
    metrics: Arc<Metrics>,
    config: ReconcilerConfig,
}

impl<L: Ledger + 'static, C: ColdStore + 'static> Reconciler<L, C> {
    pub fn new(
        ledger: Arc<L>,
        cold: Arc<C>,
        codec: Arc<Codec>,
        crypto: Arc<CryptoProvider>,
        metrics: Arc<Metrics>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            ledger,
            cold,
            codec,
            crypto,
            metrics,
            config,
        }
    }

    /// Run one sweep: claim a batch, apply each entry, mark the outcome.
    /// Exposed directly so tests can drive a single sweep deterministically
    /// instead of racing a background task against a sleep.
    pub async fn run_once(&self) {
        let start = Instant::now();
        let batch = match self
            .ledger
            .claim_batch(self.config.batch_size, self.config.visibility_timeout)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = %e, "outbox claim_batch failed");
                self.metrics
                    .outbox_reconciler_failures
                    .with_label_values(&["claim"])
                    .inc();
                return;
            }
        };

        for entry in batch {
            let session_id = match SessionId::new(entry.session_id.clone()) {
                Ok(id) => id,
                Err(_) => {
                    self.metrics
                        .outbox_reconciler_failures
                        .with_label_values(&["invalid_session_id"])
                        .inc();
                    let _ = self
                        .ledger
                        .mark_failed(&entry.entry_id, self.config.max_attempts)
                        .await;
                    continue;
                }
            };

            let patch = match self.decode_patch(&entry.envelope) {
                Ok(patch) => patch,
                Err(e) => {
                    tracing::warn!(entry_id = %entry.entry_id, error = %e, "outbox entry failed to decode");
                    self.metrics
                        .outbox_reconciler_failures
                        .with_label_values(&["decode"])
                        .inc();
                    let _ = self
                        .ledger
                        .mark_failed(&entry.entry_id, self.config.max_attempts)
                        .await;
                    continue;
                }
            };

            // `expected_version` on the entry is the hot-tier version the
            // write was derived from; the cold tier's own version is one
            // behind that until this apply succeeds.
            let expected_cold_version = entry.expected_version.checked_sub(1);
            let outcome = self.cold.set(&session_id, &patch, expected_cold_version).await;

            match outcome {
                Ok(_) => {
                    let _ = self.ledger.mark_succeeded(&entry.entry_id).await;
                }
                Err(e) => {
                    tracing::warn!(entry_id = %entry.entry_id, error = %e, "outbox entry publish failed");
                    self.metrics
                        .outbox_reconciler_failures
                        .with_label_values(&[e.category()])
                        .inc();
                    let _ = self
                        .ledger
                        .mark_failed(&entry.entry_id, self.config.max_attempts)
                        .await;
                }
            }
        }

        self.metrics
            .outbox_reconciler_latency
            .observe(start.elapsed().as_secs_f64());
    }

    fn decode_patch(&self, envelope: &authvault_types::envelope::EncryptedEnvelope) -> Result<AuthPatch> {
        let value = authvault_crypto::open(&self.codec, &self.crypto, envelope)?;
        Ok(authvault_types::value_to_patch(&value))
    }

    /// Spawn the sweep loop as a background task. Dropping the returned
    /// handle does not stop the loop; abort it explicitly if needed.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.config.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }
}
