//! Domain entities, error taxonomy, and configuration schemas shared by
//! every authvault crate.

pub mod config;
pub mod crypto_key;
pub mod envelope;
pub mod error;
pub mod identifiers;
pub mod snapshot;
pub mod value;

pub use config::{
    AuthVaultConfig, CompressionAlgorithm, ConfigValidationError, ConfigValidator,
    EncryptionAlgorithm, Environment, HybridConfig, ObservabilityConfig, ResilienceConfig,
    SecurityConfig, TtlConfig,
};
pub use crypto_key::{CryptoKeyRecord, CryptoKeyStats};
pub use envelope::{EncryptedEnvelope, OutboxEntry, OutboxStatus, KEY_ID_AUTO, KEY_ID_NONE, SCHEMA_VERSION_CURRENT};
pub use error::{AuthVaultError, Result, Tier};
pub use identifiers::SessionId;
pub use snapshot::{
    app_state_to_value, keys_to_value, merge_keys, patch_to_value, value_to_app_state,
    value_to_keys, value_to_patch, AuthPatch, AuthSnapshot, KeyTypeMap, Versioned,
};
pub use value::Value;
