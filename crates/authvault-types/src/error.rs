//! Unified error taxonomy for authvault.
//!
//! Following the teacher's single-enum-per-subsystem-family approach rather
//! than five unrelated error types: every variant below corresponds 1:1 to a
//! named error kind from the persistence spec (`EncryptionError`,
//! `CompressionError`, `StorageError{tier}`, `VersionMismatchError`,
//! `TimeoutError`), but all compose through one `?`-friendly type.

use serde::{Deserialize, Serialize};

/// Which tier a storage failure originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    /// The hot (cache) tier.
    Hot,
    /// The cold (durable document store) tier.
    Cold,
    /// The outbox ledger.
    Outbox,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hot => write!(f, "hot"),
            Self::Cold => write!(f, "cold"),
            Self::Outbox => write!(f, "outbox"),
        }
    }
}

/// Unified error type for all authvault operations.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AuthVaultError {
    /// Failure in the crypto component: missing key, normalization failure,
    /// nonce/tag length mismatch, authentication failure.
    #[error("Encryption error: {message}")]
    Encryption {
        /// Human-readable cause. Never contains plaintext, keys, nonces, or ciphertext.
        message: String,
    },

    /// Failure in the codec: encode, decode, or compression.
    #[error("Compression error: {message}")]
    Compression {
        /// Human-readable cause.
        message: String,
    },

    /// Failure in a tier adapter: connection, protocol, timeout, driver error.
    #[error("Storage error ({tier}): {message}")]
    Storage {
        /// Which tier failed.
        tier: Tier,
        /// Human-readable cause.
        message: String,
    },

    /// Optimistic-concurrency failure in the cold tier.
    #[error("Version mismatch: expected {expected}, observed {observed}")]
    VersionMismatch {
        /// The version the caller expected to be current.
        expected: u64,
        /// The version actually stored.
        observed: u64,
    },

    /// Operation exceeded the configured deadline.
    #[error("Operation timed out after {elapsed_ms}ms (deadline {deadline_ms}ms)")]
    Timeout {
        /// Elapsed milliseconds when the timeout fired.
        elapsed_ms: u64,
        /// Configured deadline in milliseconds.
        deadline_ms: u64,
    },

    /// Invalid input or configuration.
    #[error("Invalid: {message}")]
    Invalid {
        /// Description of the invalid input or configuration.
        message: String,
    },

    /// Both tiers failed on an operation where at least one succeeding is required.
    #[error("Both tiers failed: hot={hot_cause}, cold={cold_cause}")]
    BothTiersFailed {
        /// Hot-tier failure cause.
        hot_cause: String,
        /// Cold-tier failure cause.
        cold_cause: String,
    },

    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Description of what was not found.
        message: String,
    },
}

impl AuthVaultError {
    /// Create an encryption error.
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption {
            message: message.into(),
        }
    }

    /// Create a compression error.
    pub fn compression(message: impl Into<String>) -> Self {
        Self::Compression {
            message: message.into(),
        }
    }

    /// Create a storage error scoped to a tier.
    pub fn storage(tier: Tier, message: impl Into<String>) -> Self {
        Self::Storage {
            tier,
            message: message.into(),
        }
    }

    /// Create a version-mismatch error.
    pub fn version_mismatch(expected: u64, observed: u64) -> Self {
        Self::VersionMismatch { expected, observed }
    }

    /// Create a timeout error.
    pub fn timeout(elapsed_ms: u64, deadline_ms: u64) -> Self {
        Self::Timeout {
            elapsed_ms,
            deadline_ms,
        }
    }

    /// Create an invalid-input error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Whether this error is worth retrying without caller intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Timeout { .. })
    }

    /// Stable category label, used as a metrics/log field.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Encryption { .. } => "encryption",
            Self::Compression { .. } => "compression",
            Self::Storage { .. } => "storage",
            Self::VersionMismatch { .. } => "version_mismatch",
            Self::Timeout { .. } => "timeout",
            Self::Invalid { .. } => "invalid",
            Self::BothTiersFailed { .. } => "both_tiers_failed",
            Self::NotFound { .. } => "not_found",
        }
    }
}

/// Standard result type for authvault operations.
pub type Result<T> = std::result::Result<T, AuthVaultError>;

impl From<serde_json::Error> for AuthVaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::compression(err.to_string())
    }
}

impl From<toml::de::Error> for AuthVaultError {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid(err.to_string())
    }
}

impl From<std::io::Error> for AuthVaultError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            std::io::ErrorKind::TimedOut => Self::timeout(0, 0),
            _ => Self::storage(Tier::Cold, err.to_string()),
        }
    }
}
