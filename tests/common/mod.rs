//! Shared test utilities for integration and chaos tests.
//!
//! This module provides:
//! - Recording MockStore with failure and delay injection
//! - RecordingTransport for outbound frame assertions
//! - Bridge and frame helpers

#![allow(dead_code)]

pub mod mock_store;
pub mod recording_transport;

pub use mock_store::*;
pub use recording_transport::*;

use nt_bridge::{encode, Bridge, BridgeConfig, Value, WireMessage};
use std::sync::Arc;

/// A bridge over a MockStore and RecordingTransport, not yet started.
pub fn test_bridge(store: MockStore) -> (Bridge<MockStore>, Arc<MockStore>, Arc<RecordingTransport>) {
    test_bridge_with(BridgeConfig::for_testing("test-peer"), store)
}

pub fn test_bridge_with(
    config: BridgeConfig,
    store: MockStore,
) -> (Bridge<MockStore>, Arc<MockStore>, Arc<RecordingTransport>) {
    let store = Arc::new(store);
    let transport = Arc::new(RecordingTransport::new());
    let bridge = Bridge::new(config, Arc::clone(&store), transport.clone()).unwrap();
    (bridge, store, transport)
}

pub fn value_frame(key: &str, value: impl Into<Value>) -> Vec<u8> {
    encode(&WireMessage::ValueUpdate {
        key: key.to_string(),
        value: value.into(),
        is_new: false,
    })
    .unwrap()
}

pub fn reconnect_frame(address: &str) -> Vec<u8> {
    encode(&WireMessage::ReconnectRequest {
        address: address.to_string(),
    })
    .unwrap()
}

/// True if no two shutdown/initialize calls overlap in the journal.
pub fn sequences_never_interleave(calls: &[StoreCall]) -> bool {
    let mut in_flight = false;
    for call in calls {
        match call {
            StoreCall::ShutdownStarted | StoreCall::InitializeStarted(_) => {
                if in_flight {
                    return false;
                }
                in_flight = true;
            }
            StoreCall::ShutdownFinished | StoreCall::InitializeFinished(_) => in_flight = false,
            _ => {}
        }
    }
    true
}
