//! Session-scoped hot-tier adapter (spec.md §4.3): per-field get/set with
//! TTL, connection lifecycle, retry policy.

pub mod memory;
pub mod retry;
pub mod store;
pub mod wire;

#[cfg(feature = "redis-backend")]
pub mod redis;

pub use memory::InMemoryHotStore;
pub use store::{HotSetResult, HotStore, HotStoreConfig};

#[cfg(feature = "redis-backend")]
pub use redis::RedisHotStore;
