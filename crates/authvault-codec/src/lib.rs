//! Deterministic, self-delimiting value encoding with pluggable compression.
//!
//! See [`Codec`] for the encode/decode pipeline and [`canonical`] for the
//! canonical JSON form binary blobs are tagged under.

pub mod canonical;
pub mod codec;
pub mod compressor;

pub use codec::{Codec, CodecStats};
pub use compressor::{Compressor, GzipCompressor, Lz4Compressor, NoneCompressor, SnappyCompressor};
