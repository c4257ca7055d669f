//! Property-based tests using proptest.
//!
//! These tests verify invariants that should hold for all inputs,
//! helping catch edge cases that unit tests might miss.

use nt_bridge::{
    decode, encode, ChangeForwarder, ChannelTransport, DecodeError, MemoryStore, TableStore,
    Value, WireMessage,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

// =============================================================================
// Strategies
// =============================================================================

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        // NaN never equals itself, so it cannot round-trip under PartialEq
        any::<f64>().prop_filter("not NaN", |f| !f.is_nan()).prop_map(Value::Double),
        ".{0,24}".prop_map(Value::String),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Raw),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(".{0,8}", inner, 0..6).prop_map(Value::Map),
        ]
    })
}

fn message() -> impl Strategy<Value = WireMessage> {
    prop_oneof![
        (".{0,32}", value(), any::<bool>())
            .prop_map(|(key, value, is_new)| WireMessage::ValueUpdate { key, value, is_new }),
        (any::<bool>(), proptest::option::of(".{0,32}")).prop_map(|(connected, remote_address)| {
            WireMessage::ConnectionStatus { connected, remote_address }
        }),
        ".{0,32}".prop_map(|address| WireMessage::ReconnectRequest { address }),
    ]
}

// =============================================================================
// Codec Properties
// =============================================================================

proptest! {
    /// decode(encode(m)) == m for every message
    #[test]
    fn codec_roundtrip(m in message()) {
        let frame = encode(&m).unwrap();
        prop_assert_eq!(decode(&frame).unwrap(), m);
    }

    /// Encoding is deterministic
    #[test]
    fn codec_encode_deterministic(m in message()) {
        prop_assert_eq!(encode(&m).unwrap(), encode(&m).unwrap());
    }

    /// The variant survives the trip, whatever the payload
    #[test]
    fn codec_preserves_variant(m in message()) {
        let decoded = decode(&encode(&m).unwrap()).unwrap();
        prop_assert_eq!(decoded.kind(), m.kind());
    }

    /// Arbitrary bytes never panic the decoder
    #[test]
    fn codec_decode_arbitrary_no_panic(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode(&data);
    }

    /// Any bytes appended to a valid frame are rejected
    #[test]
    fn codec_rejects_trailing_bytes(
        m in message(),
        extra in prop::collection::vec(any::<u8>(), 1..16),
    ) {
        let mut frame = encode(&m).unwrap();
        frame.extend_from_slice(&extra);
        prop_assert!(decode(&frame).is_err());
    }

    /// Every strict prefix of a valid frame is rejected
    #[test]
    fn codec_rejects_truncation(m in message(), cut in any::<prop::sample::Index>()) {
        let frame = encode(&m).unwrap();
        let len = cut.index(frame.len());
        let result = decode(&frame[..len]);
        prop_assert!(result.is_err());
        if len == 0 {
            prop_assert!(matches!(result, Err(DecodeError::Malformed(_))));
        }
    }
}

// =============================================================================
// Forwarding Properties
// =============================================================================

fn run<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    /// One ValueUpdate per mutation, same order, is_new exactly on first write
    #[test]
    fn forward_preserves_mutation_sequence(
        mutations in prop::collection::vec(("[a-d]", any::<i64>()), 0..40),
    ) {
        let store = Arc::new(MemoryStore::new());
        let (transport, mut rx) = ChannelTransport::pair();
        let forwarder = ChangeForwarder::new("prop-peer", Arc::clone(&store), Arc::new(transport));
        run(forwarder.open()).unwrap();
        while rx.try_recv().is_ok() {}

        let mut seen = HashSet::new();
        let mut expected = Vec::new();
        for (key, n) in &mutations {
            store.set_entry(key, Value::Integer(*n)).unwrap();
            expected.push(WireMessage::ValueUpdate {
                key: key.clone(),
                value: Value::Integer(*n),
                is_new: seen.insert(key.clone()),
            });
        }

        let mut sent = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            sent.push(decode(&frame).unwrap());
        }
        prop_assert_eq!(sent, expected);
    }

    /// Opening against N entries replays exactly those N entries
    #[test]
    fn forward_replay_is_full_state(entries in prop::collection::btree_map("[a-z]{1,6}", value(), 0..20)) {
        let store = Arc::new(MemoryStore::with_entries(entries.clone()));
        let (transport, mut rx) = ChannelTransport::pair();
        let forwarder = ChangeForwarder::new("prop-peer", store, Arc::new(transport));
        run(forwarder.open()).unwrap();

        let mut replayed = BTreeMap::new();
        while let Ok(frame) = rx.try_recv() {
            if let WireMessage::ValueUpdate { key, value, is_new } = decode(&frame).unwrap() {
                prop_assert!(is_new);
                replayed.insert(key, value);
            }
        }
        prop_assert_eq!(replayed, entries);
    }
}
