//! Configuration schemas (spec.md §6 "Configuration options") and a
//! validation accumulator modeled on `aura-core::config::validation::ConfigValidator`:
//! collect every violation before failing, rather than bailing on the first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime environment. Governs whether debug logging is a no-op (spec.md §7
//  "Debug logging is a no-op outside `development`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Testing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncryptionAlgorithm {
    Aes256Gcm,
    Secretbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    None,
    Gzip,
    Snappy,
    Lz4,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    pub enable_encryption: bool,
    pub enable_compression: bool,
    pub encryption_algorithm: EncryptionAlgorithm,
    pub compression_algorithm: CompressionAlgorithm,
    pub key_rotation_days: u32,
    pub enable_debug_logging: bool,
    pub environment: Environment,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_encryption: true,
            enable_compression: true,
            encryption_algorithm: EncryptionAlgorithm::Aes256Gcm,
            compression_algorithm: CompressionAlgorithm::Gzip,
            key_rotation_days: 30,
            enable_debug_logging: false,
            environment: Environment::Production,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtlConfig {
    pub default_ttl: u64,
    pub creds_ttl: u64,
    pub keys_ttl: u64,
    pub lock_ttl: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            default_ttl: 7 * 24 * 3600,
            creds_ttl: 7 * 24 * 3600,
            keys_ttl: 7 * 24 * 3600,
            lock_ttl: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResilienceConfig {
    pub operation_timeout: u64,
    pub max_retries: u32,
    pub retry_base_delay: u64,
    pub retry_multiplier: f64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            operation_timeout: 5_000,
            max_retries: 3,
            retry_base_delay: 50,
            retry_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityConfig {
    pub enable_metrics: bool,
    pub enable_tracing: bool,
    pub enable_detailed_logs: bool,
    pub metrics_interval: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            enable_tracing: true,
            enable_detailed_logs: false,
            metrics_interval: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
        }
    }
}

/// Hybrid-orchestrator-specific options (spec.md §6). `queue` is represented
/// at this layer only as a presence flag: the concrete adapter is wired by
/// the caller, not deserialized from config.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridConfig {
    pub enable_write_behind: bool,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            enable_write_behind: false,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// The complete, composed configuration surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthVaultConfig {
    pub security: SecurityConfig,
    pub ttl: TtlConfig,
    pub resilience: ResilienceConfig,
    pub observability: ObservabilityConfig,
    pub hybrid: HybridConfig,
}

impl AuthVaultConfig {
    /// Parse from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Validate cross-field and range constraints, returning every violation
    /// found rather than stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<ConfigValidationError>> {
        let mut v = ConfigValidator::new();
        v.range(
            "resilience.maxRetries",
            self.resilience.max_retries as f64,
            Some(0.0),
            Some(10.0),
        );
        v.range(
            "resilience.retryMultiplier",
            self.resilience.retry_multiplier,
            Some(1.0),
            Some(10.0),
        );
        v.range(
            "security.keyRotationDays",
            self.security.key_rotation_days as f64,
            Some(1.0),
            None,
        );
        v.range(
            "ttl.lockTtl",
            self.ttl.lock_ttl as f64,
            Some(1.0),
            Some(self.ttl.default_ttl as f64),
        );
        v.custom(
            "hybrid.enableWriteBehind",
            !self.hybrid.enable_write_behind || self.observability.enable_metrics,
            "write-behind requires metrics enabled to observe reconciler health",
        );
        v.result()
    }
}

/// One validation failure.
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    OutOfRange {
        field: String,
        min: Option<f64>,
        max: Option<f64>,
        actual: f64,
    },
    Custom {
        field: String,
        message: String,
    },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                field,
                min,
                max,
                actual,
            } => write!(
                f,
                "field '{field}' out of range (min={min:?}, max={max:?}, actual={actual})"
            ),
            Self::Custom { field, message } => write!(f, "field '{field}': {message}"),
        }
    }
}

/// Accumulates configuration violations rather than failing fast, so a
/// single `validate()` call surfaces every problem in one pass.
pub struct ConfigValidator {
    errors: Vec<ConfigValidationError>,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn range(&mut self, field: &str, value: f64, min: Option<f64>, max: Option<f64>) -> &mut Self {
        let below = min.is_some_and(|m| value < m);
        let above = max.is_some_and(|m| value > m);
        if below || above {
            self.errors.push(ConfigValidationError::OutOfRange {
                field: field.to_string(),
                min,
                max,
                actual: value,
            });
        }
        self
    }

    pub fn custom(&mut self, field: &str, holds: bool, message: &str) -> &mut Self {
        if !holds {
            self.errors.push(ConfigValidationError::Custom {
                field: field.to_string(),
                message: message.to_string(),
            });
        }
        self
    }

    pub fn result(self) -> Result<(), Vec<ConfigValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
