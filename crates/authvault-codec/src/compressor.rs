//! Pluggable compression backends (spec.md §4.1 "Compression algorithms").
//!
//! Each backend is a thin wrapper over a real crate; there is no hand-rolled
//! compression here. An algorithm unavailable at runtime silently falls back
//! to gzip, matching spec.md's "If a selected algorithm is not available at
//! runtime, silently fall back to gzip" — in this build every listed
//! algorithm's crate is always compiled in, so the fallback path exists for
//! forward compatibility with algorithms added later behind a cargo feature.

use authvault_types::config::CompressionAlgorithm;
use authvault_types::{AuthVaultError, Result};
use std::io::{Read, Write};

/// A compression backend: symmetric compress/decompress over raw bytes.
pub trait Compressor: Send + Sync {
    /// Stable name, used in `stats()` and logs.
    fn name(&self) -> &'static str;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// No-op backend for `CompressionAlgorithm::None`.
pub struct NoneCompressor;

impl Compressor for NoneCompressor {
    fn name(&self) -> &'static str {
        "none"
    }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// gzip via `flate2`. Also the universal fallback target.
pub struct GzipCompressor;

impl Compressor for GzipCompressor {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data)
            .map_err(|e| AuthVaultError::compression(e.to_string()))?;
        enc.finish()
            .map_err(|e| AuthVaultError::compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        use flate2::read::GzDecoder;
        let mut dec = GzDecoder::new(data);
        let mut out = Vec::new();
        dec.read_to_end(&mut out)
            .map_err(|e| AuthVaultError::compression(e.to_string()))?;
        Ok(out)
    }
}

/// Snappy via `snap`.
pub struct SnappyCompressor;

impl Compressor for SnappyCompressor {
    fn name(&self) -> &'static str {
        "snappy"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = snap::raw::Encoder::new();
        encoder
            .compress_vec(data)
            .map_err(|e| AuthVaultError::compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = snap::raw::Decoder::new();
        decoder
            .decompress_vec(data)
            .map_err(|e| AuthVaultError::compression(e.to_string()))
    }
}

/// LZ4 via `lz4_flex`, frame format (self-describing length, no side channel
/// needed to know the decompressed size).
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::block::compress_prepend_size(data))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4_flex::block::decompress_size_prepended(data)
            .map_err(|e| AuthVaultError::compression(e.to_string()))
    }
}

/// Resolve a configured algorithm to a concrete backend, honoring the
/// silent-fallback-to-gzip rule for anything this build can't serve.
pub fn resolve(algorithm: CompressionAlgorithm) -> Box<dyn Compressor> {
    match algorithm {
        CompressionAlgorithm::None => Box::new(NoneCompressor),
        CompressionAlgorithm::Gzip => Box::new(GzipCompressor),
        CompressionAlgorithm::Snappy => Box::new(SnappyCompressor),
        CompressionAlgorithm::Lz4 => Box::new(Lz4Compressor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(c: &dyn Compressor) {
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(8);
        let compressed = c.compress(&payload).unwrap();
        let restored = c.decompress(&compressed).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn none_roundtrips() {
        roundtrip(&NoneCompressor);
    }

    #[test]
    fn gzip_roundtrips() {
        roundtrip(&GzipCompressor);
    }

    #[test]
    fn snappy_roundtrips() {
        roundtrip(&SnappyCompressor);
    }

    #[test]
    fn lz4_roundtrips() {
        roundtrip(&Lz4Compressor);
    }

    #[test]
    fn gzip_actually_shrinks_repetitive_input() {
        let payload = vec![b'a'; 4096];
        let compressed = GzipCompressor.compress(&payload).unwrap();
        assert!(compressed.len() < payload.len());
    }
}
