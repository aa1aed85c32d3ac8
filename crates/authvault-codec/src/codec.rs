//! The `Codec` facade (spec.md §4.1): encode/decode plus diagnostics.

use crate::canonical::{from_canonical_json, to_canonical_json};
use crate::compressor::{resolve, Compressor};
use authvault_types::config::CompressionAlgorithm;
use authvault_types::{AuthVaultError, Result, Value};

/// Diagnostic snapshot of a codec's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecStats {
    pub compressor: &'static str,
    pub enabled: bool,
}

/// Encodes/decodes `Value` trees to bytes via canonical JSON plus optional
/// compression (spec.md §4.1 "two-step pipeline").
pub struct Codec {
    compressor: Box<dyn Compressor>,
    enabled: bool,
}

impl Codec {
    /// Build a codec for the given algorithm. `enabled` gates whether
    /// compression actually runs; when `false` the `None` backend's identity
    /// transform is used regardless of `algorithm` (mirrors
    /// `security.enableCompression` gating `security.compressionAlgorithm`).
    pub fn new(algorithm: CompressionAlgorithm, enabled: bool) -> Self {
        let compressor = if enabled {
            resolve(algorithm)
        } else {
            resolve(CompressionAlgorithm::None)
        };
        Self {
            compressor,
            enabled,
        }
    }

    /// Produce a self-delimiting byte sequence from `value` (spec.md §4.1 `encode`).
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let json = to_canonical_json(value);
        let text = serde_json::to_vec(&json)
            .map_err(|e| AuthVaultError::compression(e.to_string()))?;
        self.compressor.compress(&text)
    }

    /// Inverse of [`Codec::encode`] (spec.md §4.1 `decode`).
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let text = self.compressor.decompress(bytes)?;
        let json: serde_json::Value = serde_json::from_slice(&text)
            .map_err(|e| AuthVaultError::compression(e.to_string()))?;
        Ok(from_canonical_json(&json))
    }

    /// Diagnostic snapshot (spec.md §4.1 `stats()`).
    pub fn stats(&self) -> CodecStats {
        CodecStats {
            compressor: self.compressor.name(),
            enabled: self.enabled,
        }
    }

    /// Compressed-to-uncompressed size ratio for a sample payload, for
    /// operator diagnostics (spec.md §4.1 `testCompressionRatio`).
    pub fn test_compression_ratio(&self, sample: &[u8]) -> Result<f64> {
        if sample.is_empty() {
            return Ok(1.0);
        }
        let compressed = self.compressor.compress(sample)?;
        Ok(compressed.len() as f64 / sample.len() as f64)
    }
}
