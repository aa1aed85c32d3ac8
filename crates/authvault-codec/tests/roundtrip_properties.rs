//! Property-based coverage of the canonical encode/decode pipeline
//! (universal property 1: `decode(encode(v)) == v` structurally).

use authvault_codec::Codec;
use authvault_types::config::CompressionAlgorithm;
use authvault_types::Value;
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<f64>()
            .prop_filter("finite", |n| n.is_finite())
            .prop_map(Value::Num),
        ".*".prop_map(Value::Str),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Seq),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

proptest! {
    #[test]
    fn decode_encode_is_identity_uncompressed(v in arb_value()) {
        let codec = Codec::new(CompressionAlgorithm::None, true);
        let bytes = codec.encode(&v).unwrap();
        let back = codec.decode(&bytes).unwrap();
        prop_assert_eq!(back, v);
    }

    #[test]
    fn decode_encode_is_identity_gzip(v in arb_value()) {
        let codec = Codec::new(CompressionAlgorithm::Gzip, true);
        let bytes = codec.encode(&v).unwrap();
        let back = codec.decode(&bytes).unwrap();
        prop_assert_eq!(back, v);
    }

    #[test]
    fn decode_encode_is_identity_lz4(v in arb_value()) {
        let codec = Codec::new(CompressionAlgorithm::Lz4, true);
        let bytes = codec.encode(&v).unwrap();
        let back = codec.decode(&bytes).unwrap();
        prop_assert_eq!(back, v);
    }
}
