// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Peer-side mirror of the bridged table.
//!
//! What a remote client (dashboard, serial co-processor) keeps on its side
//! of the transport: a cache of every value it has been sent, plus whether
//! the bridged store currently has an upstream link and to where.
//!
//! The mirror performs no I/O. Feed it received frames with
//! [`apply()`](PeerMirror::apply) and send the frames it builds with
//! [`put_value()`](PeerMirror::put_value) and
//! [`request_reconnect()`](PeerMirror::request_reconnect).

use crate::codec::{self, DecodeError, EncodeError, WireMessage};
use crate::value::Value;
use std::collections::BTreeMap;

/// What one received frame changed in the mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorEvent {
    /// An entry was added or overwritten.
    ValueChanged { key: String, is_new: bool },
    /// The bridged store's upstream link changed.
    UpstreamChanged {
        connected: bool,
        address: Option<String>,
    },
    /// Nothing to mirror (a `ReconnectRequest` travelling the wrong way).
    Ignored,
}

/// Peer-side cache of the bridged table.
#[derive(Debug, Default, Clone)]
pub struct PeerMirror {
    entries: BTreeMap<String, Value>,
    upstream_connected: bool,
    upstream_address: Option<String>,
}

impl PeerMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a frame from the bridge and fold it into the mirror.
    ///
    /// A frame that fails to decode leaves the mirror untouched.
    pub fn apply(&mut self, frame: &[u8]) -> Result<MirrorEvent, DecodeError> {
        match codec::decode(frame)? {
            WireMessage::ValueUpdate { key, value, is_new } => {
                self.entries.insert(key.clone(), value);
                Ok(MirrorEvent::ValueChanged { key, is_new })
            }
            WireMessage::ConnectionStatus {
                connected,
                remote_address,
            } => {
                self.upstream_connected = connected;
                self.upstream_address = remote_address.clone();
                Ok(MirrorEvent::UpstreamChanged {
                    connected,
                    address: remote_address,
                })
            }
            WireMessage::ReconnectRequest { .. } => Ok(MirrorEvent::Ignored),
        }
    }

    /// Build the frame that writes `value` into the bridged table.
    ///
    /// The mirror itself is not updated; the bridge echoes the write back.
    pub fn put_value(&self, key: &str, value: impl Into<Value>) -> Result<Vec<u8>, EncodeError> {
        codec::encode(&WireMessage::ValueUpdate {
            key: key.to_string(),
            value: value.into(),
            is_new: false,
        })
    }

    /// Build the frame that asks the bridge to rebind its store to `address`.
    pub fn request_reconnect(&self, address: &str) -> Result<Vec<u8>, EncodeError> {
        codec::encode(&WireMessage::ReconnectRequest {
            address: address.to_string(),
        })
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// The cached value, or `default` if the key has not been seen.
    pub fn value_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.entries.get(key).unwrap_or(default)
    }

    /// Cached keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_upstream_connected(&self) -> bool {
        self.upstream_connected
    }

    pub fn upstream_address(&self) -> Option<&str> {
        self.upstream_address.as_deref()
    }

    /// Forget everything. Call when the transport drops; the cache is no
    /// longer valid and a fresh replay follows the next connect.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.upstream_connected = false;
        self.upstream_address = None;
    }
}
