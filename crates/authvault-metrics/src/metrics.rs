//! `Metrics`: the Prometheus counter/histogram/gauge set named by spec.md §6.
//!
//! Grounded on the `other_examples` Harman reconciliation-metrics module: a
//! plain struct holding a `Registry` plus named collector fields, constructed
//! once via `Metrics::new`, registered eagerly, and shared via `Arc`.
//! `getMetricsText()` (spec.md §6) is `Registry::gather()` through
//! `TextEncoder` — the exposition endpoint itself stays a caller concern.

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// The full named metric surface from spec.md §6.
pub struct Metrics {
    registry: Registry,
    pub redis_hits: IntCounter,
    pub redis_misses: IntCounter,
    pub mongo_fallbacks: IntCounter,
    pub queue_publishes: IntCounter,
    pub queue_failures: IntCounter,
    pub direct_writes: IntCounter,
    pub circuit_breaker_open: IntCounter,
    pub circuit_breaker_close: IntCounter,
    pub circuit_breaker_half_open: IntCounter,
    pub circuit_breaker_state_gauge: IntGauge,
    pub outbox_reconciler_latency: Histogram,
    pub outbox_reconciler_failures: IntCounterVec,
    pub operation_latency: HistogramVec,
    pub batch_operations: IntCounterVec,
    pub version_conflict: IntCounter,
    pub cache_warming: IntCounterVec,
    pub operation_timeout: IntCounterVec,
}

impl Metrics {
    /// Build and register every collector against a fresh registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Build and register every collector against a caller-supplied registry
    /// (useful when the host process already exposes one shared registry).
    pub fn with_registry(registry: Registry) -> Self {
        let redis_hits =
            IntCounter::new("redis_hits_total", "Hot-tier read hits").expect("valid metric");
        let redis_misses =
            IntCounter::new("redis_misses_total", "Hot-tier read misses").expect("valid metric");
        let mongo_fallbacks = IntCounter::new(
            "mongo_fallbacks_total",
            "Reads that fell through to the cold tier",
        )
        .expect("valid metric");
        let queue_publishes = IntCounter::new(
            "queue_publishes_total",
            "Outbox entries successfully published",
        )
        .expect("valid metric");
        let queue_failures =
            IntCounter::new("queue_failures_total", "Outbox publish failures").expect("valid metric");
        let direct_writes = IntCounter::new(
            "direct_writes_total",
            "Cold-tier writes committed synchronously (write-behind disabled)",
        )
        .expect("valid metric");
        let circuit_breaker_open = IntCounter::new(
            "circuit_breaker_open_total",
            "Cold-tier circuit breaker transitions to open",
        )
        .expect("valid metric");
        let circuit_breaker_close = IntCounter::new(
            "circuit_breaker_close_total",
            "Cold-tier circuit breaker transitions to closed",
        )
        .expect("valid metric");
        let circuit_breaker_half_open = IntCounter::new(
            "circuit_breaker_half_open_total",
            "Cold-tier circuit breaker transitions to half-open",
        )
        .expect("valid metric");
        let circuit_breaker_state_gauge = IntGauge::new(
            "circuit_breaker_state",
            "Current cold-tier circuit breaker state (0=closed,1=half-open,2=open)",
        )
        .expect("valid metric");
        let outbox_reconciler_latency = Histogram::with_opts(
            HistogramOpts::new(
                "outbox_reconciler_latency_seconds",
                "Duration of one reconciler sweep",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        )
        .expect("valid metric");
        let outbox_reconciler_failures = IntCounterVec::new(
            Opts::new(
                "outbox_reconciler_failures_total",
                "Reconciler publish failures by error type",
            ),
            &["error_type"],
        )
        .expect("valid metric");
        let operation_latency = HistogramVec::new(
            HistogramOpts::new("operation_latency_seconds", "Per-operation latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation", "layer", "status"],
        )
        .expect("valid metric");
        let batch_operations = IntCounterVec::new(
            Opts::new("batch_operations_total", "Batch operation invocations"),
            &["operation"],
        )
        .expect("valid metric");
        let version_conflict = IntCounter::new(
            "version_conflict_total",
            "Optimistic-concurrency version mismatches observed",
        )
        .expect("valid metric");
        let cache_warming = IntCounterVec::new(
            Opts::new("cache_warming_total", "Cache-warming attempts by outcome"),
            &["outcome"],
        )
        .expect("valid metric");
        let operation_timeout = IntCounterVec::new(
            Opts::new("operation_timeout_total", "Operations that exceeded their deadline"),
            &["operation"],
        )
        .expect("valid metric");

        macro_rules! register_all {
            ($($m:expr),* $(,)?) => {
                $(registry.register(Box::new($m.clone())).expect("duplicate metric registration");)*
            };
        }
        register_all!(
            redis_hits,
            redis_misses,
            mongo_fallbacks,
            queue_publishes,
            queue_failures,
            direct_writes,
            circuit_breaker_open,
            circuit_breaker_close,
            circuit_breaker_half_open,
            circuit_breaker_state_gauge,
            outbox_reconciler_latency,
            outbox_reconciler_failures,
            operation_latency,
            batch_operations,
            version_conflict,
            cache_warming,
            operation_timeout,
        );

        Self {
            registry,
            redis_hits,
            redis_misses,
            mongo_fallbacks,
            queue_publishes,
            queue_failures,
            direct_writes,
            circuit_breaker_open,
            circuit_breaker_close,
            circuit_breaker_half_open,
            circuit_breaker_state_gauge,
            outbox_reconciler_latency,
            outbox_reconciler_failures,
            operation_latency,
            batch_operations,
            version_conflict,
            cache_warming,
            operation_timeout,
        }
    }

    /// Prometheus text exposition of every registered collector
    /// (spec.md §6 `getMetricsText()`).
    pub fn text(&self) -> String {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buf)
            .expect("prometheus text encoding never fails for valid collectors");
        String::from_utf8(buf).expect("prometheus text output is always valid utf-8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_exposition_contains_registered_names() {
        let metrics = Metrics::new();
        metrics.redis_hits.inc();
        metrics.cache_warming.with_label_values(&["applied"]).inc();
        let text = metrics.text();
        assert!(text.contains("redis_hits_total"));
        assert!(text.contains("cache_warming_total"));
    }

    #[test]
    fn operation_latency_accepts_labeled_observations() {
        let metrics = Metrics::new();
        metrics
            .operation_latency
            .with_label_values(&["set", "hot", "ok"])
            .observe(0.002);
        assert!(metrics.text().contains("operation_latency_seconds"));
    }
}
