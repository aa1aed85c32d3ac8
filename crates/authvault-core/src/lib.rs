//! `AuthStore`: the two-tier hot/cold orchestrator (spec.md §4.6 "Hybrid").

pub mod circuit_breaker;
pub mod locks;
pub mod store;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use locks::SessionLocks;
pub use store::{AuthStore, AuthStoreConfig, BatchSetItem};
