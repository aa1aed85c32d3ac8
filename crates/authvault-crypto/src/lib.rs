//! Symmetric authenticated encryption with keyed rotation (spec.md §4.2).
//!
//! [`registry`] holds the pure key state (grounded on the teacher's
//! `KeyVersionTracker`: plain data plus accessors, mutated only through a
//! coordinator); [`provider`] is that coordinator — `CryptoProvider` wraps a
//! registry and exposes `encrypt`/`decrypt`/`rotate_key`/`cleanup_expired_keys`.

pub mod normalize;
pub mod provider;
pub mod registry;
pub mod seal;

pub use normalize::{envelope_from_loose_json, normalize_bytes};
pub use provider::CryptoProvider;
pub use registry::CryptoKeyRegistry;
pub use seal::{open, seal as seal_value};
