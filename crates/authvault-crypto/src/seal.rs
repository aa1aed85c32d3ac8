//! Combine [`CryptoProvider`] and [`authvault_codec::Codec`] into the single
//! "seal"/"open" step every tier adapter needs: encode a structural `Value`,
//! encrypt the resulting bytes, or invert both in one call. Factored out here
//! rather than duplicated in `authvault-hot` and `authvault-cold`, since both
//! tiers apply exactly the same two-step pipeline to every stored field
//! (spec.md §4.3, §4.4).

use crate::CryptoProvider;
use authvault_codec::Codec;
use authvault_types::envelope::EncryptedEnvelope;
use authvault_types::{Result, Value};

/// Encode then encrypt: the inverse of [`open`].
pub fn seal(codec: &Codec, crypto: &CryptoProvider, value: &Value) -> Result<EncryptedEnvelope> {
    let bytes = codec.encode(value)?;
    crypto.encrypt(&bytes)
}

/// Decrypt then decode: the inverse of [`seal`].
pub fn open(codec: &Codec, crypto: &CryptoProvider, envelope: &EncryptedEnvelope) -> Result<Value> {
    let bytes = crypto.decrypt(envelope)?;
    codec.decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use authvault_types::config::{CompressionAlgorithm, Environment, SecurityConfig};

    #[test]
    fn seal_open_round_trips() {
        let codec = Codec::new(CompressionAlgorithm::Gzip, true);
        let config = SecurityConfig {
            environment: Environment::Development,
            ..SecurityConfig::default()
        };
        let crypto = CryptoProvider::new(&config, Some(&[3u8; 32])).unwrap();
        let value = Value::map([("a".to_string(), Value::Bytes(vec![1, 2, 3]))]);
        let envelope = seal(&codec, &crypto, &value).unwrap();
        let back = open(&codec, &crypto, &envelope).unwrap();
        assert_eq!(back, value);
    }
}
