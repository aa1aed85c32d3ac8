//! A fully-wired in-memory `AuthStore`, for scenario and integration tests
//! that need more than one bare tier fake (spec.md §8.2 "Scenarios").
//!
//! Mirrors the teacher's `aura-testkit` role: a crate every other crate's
//! test suite can depend on instead of re-deriving fixture wiring by hand.

use authvault_codec::Codec;
use authvault_cold::InMemoryColdStore;
use authvault_core::{AuthStore, AuthStoreConfig};
use authvault_crypto::CryptoProvider;
use authvault_hot::{HotStoreConfig, InMemoryHotStore};
use authvault_metrics::{Metrics, RequestContext};
use authvault_outbox::{InMemoryLedger, Ledger, Reconciler, ReconcilerConfig};
use authvault_types::config::{CompressionAlgorithm, Environment, HybridConfig, SecurityConfig};
use std::sync::Arc;

/// Everything a scenario test needs: the composed `AuthStore`, direct handles
/// to each tier fake (for preconditions and assertions that reach under the
/// orchestrator), and the outbox reconciler (for write-behind scenarios,
/// driven one sweep at a time rather than on its background interval).
pub struct TestHarness {
    pub store: Arc<AuthStore>,
    pub hot: Arc<InMemoryHotStore>,
    pub cold: Arc<InMemoryColdStore>,
    pub ledger: Arc<InMemoryLedger>,
    pub reconciler: Arc<Reconciler<InMemoryLedger, InMemoryColdStore>>,
    pub metrics: Arc<Metrics>,
}

impl TestHarness {
    /// Direct-write mode: `set` writes the cold tier synchronously.
    pub fn new() -> Self {
        Self::build(AuthStoreConfig::default())
    }

    /// Write-behind mode: `set` always queues to the outbox; call
    /// `reconcile_once` to drain it deterministically.
    pub fn with_write_behind() -> Self {
        Self::build(AuthStoreConfig {
            hybrid: HybridConfig {
                enable_write_behind: true,
                ..HybridConfig::default()
            },
        })
    }

    /// Build with an explicit circuit-breaker configuration, for tripping it
    /// deliberately (spec.md §8.2 S5).
    pub fn with_circuit_breaker(failure_threshold: u32, reset_timeout_ms: u64) -> Self {
        use authvault_types::config::CircuitBreakerConfig;
        Self::build(AuthStoreConfig {
            hybrid: HybridConfig {
                enable_write_behind: false,
                circuit_breaker: CircuitBreakerConfig {
                    failure_threshold,
                    reset_timeout_ms,
                },
            },
        })
    }

    fn build(config: AuthStoreConfig) -> Self {
        let codec = Arc::new(Codec::new(CompressionAlgorithm::None, true));
        let sec_config = SecurityConfig {
            environment: Environment::Testing,
            ..SecurityConfig::default()
        };
        let crypto = Arc::new(CryptoProvider::new(&sec_config, Some(&[42u8; 32])).unwrap());

        let hot = Arc::new(InMemoryHotStore::new(
            codec.clone(),
            crypto.clone(),
            HotStoreConfig::default(),
        ));
        let cold = Arc::new(InMemoryColdStore::new(codec.clone(), crypto.clone()));
        let ledger = Arc::new(InMemoryLedger::new());
        let metrics = Arc::new(Metrics::new());

        let reconciler = Arc::new(Reconciler::new(
            ledger.clone(),
            cold.clone(),
            codec.clone(),
            crypto.clone(),
            metrics.clone(),
            ReconcilerConfig::default(),
        ));

        let store = Arc::new(AuthStore::new(
            hot.clone(),
            cold.clone(),
            Some(ledger.clone() as Arc<dyn Ledger>),
            codec,
            crypto,
            metrics.clone(),
            config,
        ));

        Self {
            store,
            hot,
            cold,
            ledger,
            reconciler,
            metrics,
        }
    }

    /// Drive one outbox sweep synchronously, for tests that need the
    /// write-behind path applied deterministically rather than racing a
    /// background task.
    pub async fn reconcile_once(&self) {
        self.reconciler.run_once().await;
    }

    /// A fresh root request context, stamped `"testing"`.
    pub fn ctx(&self) -> RequestContext {
        RequestContext::new("testing")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
