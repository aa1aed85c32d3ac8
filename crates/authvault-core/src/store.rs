//! `AuthStore`: the public orchestrator surface (spec.md §4.6, §6).
//!
//! Grounded on the `ruts` layered-store example's cache-aside/write-through
//! shape (check the fast tier, fall through to the durable tier, warm the
//! fast tier on a miss) generalized with this domain's extra concerns: an
//! incremental key-map merge, a write-behind outbox, and a circuit breaker
//! scoped to the durable tier only.

use crate::{CircuitBreaker, CircuitState, SessionLocks};
use authvault_cold::ColdStore;
use authvault_codec::Codec;
use authvault_crypto::CryptoProvider;
use authvault_hot::{HotSetResult, HotStore};
use authvault_metrics::{Metrics, RequestContext};
use authvault_outbox::{Ledger, LedgerStats};
use authvault_types::config::HybridConfig;
use authvault_types::{AuthPatch, AuthSnapshot, AuthVaultError, Result, SessionId, Value, Versioned};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// One item of a `batch_set` call.
#[derive(Debug, Clone)]
pub struct BatchSetItem {
    pub session_id: SessionId,
    pub patch: AuthPatch,
    pub expected_version: Option<u64>,
}

/// Orchestrator-level configuration (spec.md §6 "hybrid" options).
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthStoreConfig {
    pub hybrid: HybridConfig,
}

/// The two-tier orchestrator. Hot and cold tiers, the outbox ledger, the
/// circuit breaker, and the per-session lock map are all held behind `Arc`
/// so `AuthStore` itself can be cloned cheaply and shared across tasks.
pub struct AuthStore {
    hot: Arc<dyn HotStore>,
    cold: Arc<dyn ColdStore>,
    ledger: Option<Arc<dyn Ledger>>,
    codec: Arc<Codec>,
    crypto: Arc<CryptoProvider>,
    metrics: Arc<Metrics>,
    breaker: CircuitBreaker,
    locks: SessionLocks,
    config: AuthStoreConfig,
}

impl AuthStore {
    pub fn new(
        hot: Arc<dyn HotStore>,
        cold: Arc<dyn ColdStore>,
        ledger: Option<Arc<dyn Ledger>>,
        codec: Arc<Codec>,
        crypto: Arc<CryptoProvider>,
        metrics: Arc<Metrics>,
        config: AuthStoreConfig,
    ) -> Self {
        Self {
            hot,
            cold,
            ledger,
            codec,
            crypto,
            metrics,
            breaker: CircuitBreaker::new(config.hybrid.circuit_breaker),
            locks: SessionLocks::new(),
            config,
        }
    }

    /// Read-through get (spec.md §4.6.2): hot hit returns directly; a hot
    /// miss falls through to the cold tier (guarded by the circuit breaker)
    /// and, on a cold hit, warms the hot tier before returning. A miss in
    /// both tiers auto-initializes a default snapshot at version 0 rather
    /// than erroring, mirroring `AuthSnapshot::new_default`'s role.
    pub async fn get(&self, ctx: &RequestContext, session_id: &SessionId) -> Result<Versioned<AuthSnapshot>> {
        let start = Instant::now();
        let result = self.get_inner(ctx, session_id).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        self.metrics
            .operation_latency
            .with_label_values(&["get", "hybrid", status])
            .observe(start.elapsed().as_secs_f64());
        result
    }

    async fn get_inner(&self, ctx: &RequestContext, session_id: &SessionId) -> Result<Versioned<AuthSnapshot>> {
        if ctx.is_expired() {
            self.metrics.operation_timeout.with_label_values(&["get"]).inc();
            return Err(AuthVaultError::timeout(ctx.elapsed().as_millis() as u64, 0));
        }

        let hot_outcome = self.hot.get(session_id).await;
        let hot_error = match &hot_outcome {
            Ok(Some(hit)) => {
                self.metrics.redis_hits.inc();
                return Ok(hit.clone());
            }
            Ok(None) => {
                self.metrics.redis_misses.inc();
                None
            }
            Err(e) => {
                self.metrics.redis_misses.inc();
                tracing::warn!(
                    correlation_id = %ctx.correlation_id(),
                    session_id = %session_id.as_str(),
                    error = %e,
                    "hot tier read failed, falling through to cold tier"
                );
                Some(e.clone())
            }
        };

        if !self.breaker_allow() {
            return match hot_error {
                Some(hot_err) => Err(AuthVaultError::BothTiersFailed {
                    hot_cause: hot_err.to_string(),
                    cold_cause: "circuit breaker open".to_string(),
                }),
                None => Ok(Versioned::new(AuthSnapshot::new_default(), 0, Utc::now())),
            };
        }

        let cold_result = self.cold.get(session_id).await;
        let cold_hit = match cold_result {
            Ok(hit) => {
                self.breaker_record_success();
                hit
            }
            Err(e) => {
                self.breaker_record_failure();
                tracing::warn!(
                    correlation_id = %ctx.correlation_id(),
                    session_id = %session_id.as_str(),
                    error = %e,
                    "cold tier read failed"
                );
                return match hot_error {
                    Some(hot_err) => Err(AuthVaultError::BothTiersFailed {
                        hot_cause: hot_err.to_string(),
                        cold_cause: e.to_string(),
                    }),
                    None => Ok(Versioned::new(AuthSnapshot::new_default(), 0, Utc::now())),
                };
            }
        };

        let Some(cold_hit) = cold_hit else {
            return Ok(Versioned::new(AuthSnapshot::new_default(), 0, Utc::now()));
        };
        self.metrics.mongo_fallbacks.inc();

        self.warm_hot_tier(ctx, session_id, &cold_hit).await;
        Ok(cold_hit)
    }

    /// Cache-warming race guard (spec.md §4.6.7): reread the hot tier's
    /// current version immediately before writing. If a concurrent reader
    /// already warmed a version at or ahead of ours, abort rather than
    /// clobber it with stale data.
    async fn warm_hot_tier(&self, ctx: &RequestContext, session_id: &SessionId, cold_hit: &Versioned<AuthSnapshot>) {
        match self.hot.get(session_id).await {
            Ok(Some(existing)) if existing.version >= cold_hit.version => {
                self.metrics.cache_warming.with_label_values(&["skipped"]).inc();
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    correlation_id = %ctx.correlation_id(),
                    session_id = %session_id.as_str(),
                    error = %e,
                    "hot tier reread before warming failed"
                );
            }
        }

        let patch = full_replacement_patch(&cold_hit.data);
        let expected = cold_hit.version.checked_sub(1);
        match self.hot.set(session_id, &patch, expected).await {
            Ok(_) => self.metrics.cache_warming.with_label_values(&["applied"]).inc(),
            Err(e) => {
                tracing::warn!(
                    correlation_id = %ctx.correlation_id(),
                    session_id = %session_id.as_str(),
                    error = %e,
                    "cache warming write failed"
                );
                self.metrics.cache_warming.with_label_values(&["failed"]).inc();
            }
        }
    }

    /// Current version for a session with no caller-supplied expected
    /// version (spec.md §4.6.3 step 2): the hot tier's if it has an entry,
    /// else the cold tier's, else `None` (a brand-new session, `newVersion`
    /// becomes 1). Read errors on either tier are treated the same as a miss
    /// — this is a best-effort hint, not a durability guarantee; the actual
    /// write still goes through the normal tier error paths below.
    async fn resolve_current_version(&self, session_id: &SessionId) -> Option<u64> {
        if let Ok(Some(hit)) = self.hot.get(session_id).await {
            return Some(hit.version);
        }
        match self.cold.get(session_id).await {
            Ok(Some(hit)) => Some(hit.version),
            _ => None,
        }
    }

    /// `set` (spec.md §4.6.3): serialized per session, the patch is cloned
    /// before fanning out so neither tier call can observe a partially
    /// consumed value (step 1, "the single most important correctness
    /// note"). The hot tier is always written synchronously; the cold tier
    /// is written synchronously when write-behind is disabled and the
    /// circuit is closed, otherwise the write is queued to the outbox.
    pub async fn set(
        &self,
        ctx: &RequestContext,
        session_id: &SessionId,
        patch: &AuthPatch,
        expected_version: Option<u64>,
    ) -> Result<HotSetResult> {
        let start = Instant::now();
        let result = self.set_inner(ctx, session_id, patch, expected_version).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        self.metrics
            .operation_latency
            .with_label_values(&["set", "hybrid", status])
            .observe(start.elapsed().as_secs_f64());
        result
    }

    async fn set_inner(
        &self,
        ctx: &RequestContext,
        session_id: &SessionId,
        patch: &AuthPatch,
        expected_version: Option<u64>,
    ) -> Result<HotSetResult> {
        if ctx.is_expired() {
            self.metrics.operation_timeout.with_label_values(&["set"]).inc();
            return Err(AuthVaultError::timeout(ctx.elapsed().as_millis() as u64, 0));
        }

        let _guard = self.locks.acquire(session_id).await;

        // spec.md §4.6.3 step 2: when the caller doesn't pin an expected
        // version, resolve the session's current one (hot tier first, then
        // cold) so `newVersion = current + 1` actually increments instead of
        // resetting to 1 on every unpinned `set` against an existing session.
        let resolved_expected_version = match expected_version {
            Some(v) => Some(v),
            None => self.resolve_current_version(session_id).await,
        };

        let hot_patch = patch.clone();
        let cold_patch = patch.clone();

        let hot_result = self.hot.set(session_id, &hot_patch, resolved_expected_version).await?;

        if self.config.hybrid.enable_write_behind || !self.breaker_allow() {
            self.enqueue_cold_write(ctx, session_id, &cold_patch, hot_result.version).await;
        } else {
            match self.cold.set(session_id, &cold_patch, resolved_expected_version).await {
                Ok(_) => {
                    self.breaker_record_success();
                    self.metrics.direct_writes.inc();
                }
                // A version mismatch means the cold document has already moved
                // past what this writer expected; resubmitting the identical
                // patch through the outbox would just repeat the same
                // mismatch, so propagate it directly per spec.md §4.4 step 8
                // / §4.7 "the caller is expected to re-read and re-issue" —
                // this isn't a connectivity failure, so the breaker is untouched.
                Err(e @ AuthVaultError::VersionMismatch { .. }) => {
                    self.metrics.version_conflict.inc();
                    return Err(e);
                }
                Err(e) => {
                    self.breaker_record_failure();
                    tracing::warn!(
                        correlation_id = %ctx.correlation_id(),
                        session_id = %session_id.as_str(),
                        error = %e,
                        "direct cold write failed, falling back to outbox"
                    );
                    self.enqueue_cold_write(ctx, session_id, &cold_patch, hot_result.version).await;
                }
            }
        }

        Ok(hot_result)
    }

    /// Wraps `CircuitBreaker::allow_request`, recording both a transition (if
    /// the probe itself flipped `Open` -> `HalfOpen`) and, per spec.md
    /// §4.6.2 step 2 ("return null with circuitBreakerOpen++"), one
    /// `circuit_breaker_open` increment for every call actually rejected.
    fn breaker_allow(&self) -> bool {
        let before = self.breaker.state();
        let allowed = self.breaker.allow_request();
        let after = self.breaker.state();
        if before != after {
            self.record_breaker_transition(after);
        }
        if !allowed {
            self.metrics.circuit_breaker_open.inc();
        }
        allowed
    }

    fn breaker_record_success(&self) {
        let before = self.breaker.state();
        self.breaker.record_success();
        let after = self.breaker.state();
        if before != after {
            self.record_breaker_transition(after);
        }
    }

    fn breaker_record_failure(&self) {
        let before = self.breaker.state();
        self.breaker.record_failure();
        let after = self.breaker.state();
        if before != after {
            self.record_breaker_transition(after);
        }
    }

    /// spec.md §4.6.6 "Each transition records circuitBreakerStateGauge":
    /// bump the matching named transition counter and set the gauge to the
    /// new state.
    fn record_breaker_transition(&self, new_state: CircuitState) {
        match new_state {
            CircuitState::Open => self.metrics.circuit_breaker_open.inc(),
            CircuitState::Closed => self.metrics.circuit_breaker_close.inc(),
            CircuitState::HalfOpen => self.metrics.circuit_breaker_half_open.inc(),
        }
        self.metrics.circuit_breaker_state_gauge.set(match new_state {
            CircuitState::Closed => 0,
            CircuitState::HalfOpen => 1,
            CircuitState::Open => 2,
        });
    }

    async fn enqueue_cold_write(&self, ctx: &RequestContext, session_id: &SessionId, patch: &AuthPatch, hot_version: u64) {
        let Some(ledger) = &self.ledger else {
            tracing::warn!(
                correlation_id = %ctx.correlation_id(),
                session_id = %session_id.as_str(),
                "write-behind requested but no outbox ledger is configured; cold tier will lag"
            );
            return;
        };

        let value = authvault_types::patch_to_value(patch);
        let envelope = match authvault_crypto::seal_value(&self.codec, &self.crypto, &value) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(
                    correlation_id = %ctx.correlation_id(),
                    session_id = %session_id.as_str(),
                    error = %e,
                    "failed to seal outbox entry"
                );
                self.metrics.queue_failures.inc();
                return;
            }
        };

        match ledger.enqueue(session_id.as_str(), envelope, hot_version).await {
            Ok(_) => self.metrics.queue_publishes.inc(),
            Err(e) => {
                tracing::warn!(
                    correlation_id = %ctx.correlation_id(),
                    session_id = %session_id.as_str(),
                    error = %e,
                    "failed to enqueue outbox entry"
                );
                self.metrics.queue_failures.inc();
            }
        }
    }

    /// `delete` (spec.md §4.6.4): the hot tier must succeed. The cold tier
    /// is best-effort, guarded by the circuit breaker: a failure there is
    /// logged and counted but does not fail the overall call, since the hot
    /// tier (the tier callers actually read from next) is already consistent
    /// and a stale cold document is reclaimed by its own TTL index.
    pub async fn delete(&self, ctx: &RequestContext, session_id: &SessionId) -> Result<()> {
        let start = Instant::now();
        let result = self.delete_inner(ctx, session_id).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        self.metrics
            .operation_latency
            .with_label_values(&["delete", "hybrid", status])
            .observe(start.elapsed().as_secs_f64());
        result
    }

    async fn delete_inner(&self, ctx: &RequestContext, session_id: &SessionId) -> Result<()> {
        if ctx.is_expired() {
            self.metrics.operation_timeout.with_label_values(&["delete"]).inc();
            return Err(AuthVaultError::timeout(ctx.elapsed().as_millis() as u64, 0));
        }

        let _guard = self.locks.acquire(session_id).await;

        self.hot.delete(session_id).await?;

        if self.breaker_allow() {
            match self.cold.delete(session_id).await {
                Ok(()) => self.breaker_record_success(),
                Err(e) => {
                    self.breaker_record_failure();
                    tracing::warn!(
                        correlation_id = %ctx.correlation_id(),
                        session_id = %session_id.as_str(),
                        error = %e,
                        "cold tier delete failed; hot tier delete still applied"
                    );
                }
            }
        }
        Ok(())
    }

    /// `touch` (spec.md §4.6.4): reset TTL on both tiers. Best-effort on the
    /// cold tier, same rationale as `delete`.
    pub async fn touch(&self, ctx: &RequestContext, session_id: &SessionId) -> Result<()> {
        let start = Instant::now();
        let result = self.touch_inner(ctx, session_id).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        self.metrics
            .operation_latency
            .with_label_values(&["touch", "hybrid", status])
            .observe(start.elapsed().as_secs_f64());
        result
    }

    async fn touch_inner(&self, ctx: &RequestContext, session_id: &SessionId) -> Result<()> {
        if ctx.is_expired() {
            self.metrics.operation_timeout.with_label_values(&["touch"]).inc();
            return Err(AuthVaultError::timeout(ctx.elapsed().as_millis() as u64, 0));
        }

        let _guard = self.locks.acquire(session_id).await;

        self.hot.touch(session_id, None).await?;

        if self.breaker_allow() {
            match self.cold.touch(session_id).await {
                Ok(()) => self.breaker_record_success(),
                Err(e) => {
                    self.breaker_record_failure();
                    tracing::warn!(
                        correlation_id = %ctx.correlation_id(),
                        session_id = %session_id.as_str(),
                        error = %e,
                        "cold tier touch failed"
                    );
                }
            }
        }
        Ok(())
    }

    /// `exists`: hot tier first, cold tier only if the hot tier misses.
    pub async fn exists(&self, ctx: &RequestContext, session_id: &SessionId) -> Result<bool> {
        if self.hot.exists(session_id).await? {
            return Ok(true);
        }
        if !self.breaker_allow() {
            return Ok(false);
        }
        match self.cold.exists(session_id).await {
            Ok(exists) => {
                self.breaker_record_success();
                Ok(exists)
            }
            Err(e) => {
                self.breaker_record_failure();
                tracing::warn!(
                    correlation_id = %ctx.correlation_id(),
                    session_id = %session_id.as_str(),
                    error = %e,
                    "cold tier exists check failed"
                );
                Ok(false)
            }
        }
    }

    /// Healthy iff the hot tier is reachable; the cold tier's health is
    /// reported through the circuit breaker's own state, not required here.
    pub async fn is_healthy(&self) -> bool {
        self.hot.is_healthy().await
    }

    /// Each session gets its own child context (spec.md §5 "nested contexts
    /// isolate their metadata but inherit the correlation id"), so a single
    /// batch call still traces as one correlated operation per fanned-out item.
    pub async fn batch_get(&self, ctx: &RequestContext, session_ids: &[SessionId]) -> Vec<Result<Versioned<AuthSnapshot>>> {
        self.metrics.batch_operations.with_label_values(&["get"]).inc();
        let futures = session_ids.iter().map(|id| self.get(&ctx.child(), id));
        futures::future::join_all(futures).await
    }

    pub async fn batch_delete(&self, ctx: &RequestContext, session_ids: &[SessionId]) -> Vec<Result<()>> {
        self.metrics.batch_operations.with_label_values(&["delete"]).inc();
        let futures = session_ids.iter().map(|id| self.delete(&ctx.child(), id));
        futures::future::join_all(futures).await
    }

    pub async fn batch_set(&self, ctx: &RequestContext, items: &[BatchSetItem]) -> Vec<Result<HotSetResult>> {
        self.metrics.batch_operations.with_label_values(&["set"]).inc();
        let futures = items
            .iter()
            .map(|item| self.set(&ctx.child(), &item.session_id, &item.patch, item.expected_version));
        futures::future::join_all(futures).await
    }

    /// spec.md §6 "Circuit-breaker inspection": `isMongoCircuitBreakerOpen()`.
    pub fn is_cold_circuit_breaker_open(&self) -> bool {
        self.breaker.state() == CircuitState::Open
    }

    /// spec.md §6 `getCircuitBreakerStats()`.
    pub fn circuit_breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// spec.md §6 `getMetricsText()`: Prometheus text exposition.
    pub fn metrics_text(&self) -> String {
        self.metrics.text()
    }

    /// spec.md §6 `getOutboxStats()`. Zeroed when no ledger is configured
    /// (direct-write-only mode).
    pub async fn outbox_stats(&self) -> LedgerStats {
        match &self.ledger {
            Some(ledger) => ledger.stats().await,
            None => LedgerStats::default(),
        }
    }
}

/// Build an `AuthPatch` that wholesale-replaces every field of `snapshot`,
/// for cache-warming writes into an empty hot tier.
fn full_replacement_patch(snapshot: &AuthSnapshot) -> AuthPatch {
    let mut keys: BTreeMap<String, BTreeMap<String, Option<Value>>> = BTreeMap::new();
    for (ty, ids) in &snapshot.keys {
        let ids = ids.iter().map(|(id, v)| (id.clone(), Some(v.clone()))).collect();
        keys.insert(ty.clone(), ids);
    }
    AuthPatch {
        creds: Some(snapshot.creds.clone()),
        keys: Some(keys),
        app_state: snapshot.app_state.clone(),
    }
}
