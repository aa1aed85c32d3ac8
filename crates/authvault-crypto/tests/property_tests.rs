//! Universal property 2: `decrypt(encrypt(p)) == p` for arbitrary byte strings.

use authvault_crypto::CryptoProvider;
use authvault_types::config::{Environment, SecurityConfig};
use proptest::prelude::*;

fn provider() -> CryptoProvider {
    let config = SecurityConfig {
        environment: Environment::Development,
        ..SecurityConfig::default()
    };
    CryptoProvider::new(&config, Some(&[42u8; 32])).unwrap()
}

proptest! {
    #[test]
    fn encrypt_decrypt_round_trip(plaintext in prop::collection::vec(any::<u8>(), 0..512)) {
        let provider = provider();
        let envelope = provider.encrypt(&plaintext).unwrap();
        let decrypted = provider.decrypt(&envelope).unwrap();
        prop_assert_eq!(decrypted, plaintext);
    }
}
