// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Change forwarder: local store events out to the peer.
//!
//! Registers a change listener and a connection listener with the store and
//! turns every notification into exactly one outbound frame. No batching,
//! no deduplication: frames leave in the order the store delivers them.
//!
//! # Subscription Lifecycle
//!
//! ```text
//! closed ──open()──→ open (SubscriptionHandle, generation n)
//!   ↑                  │
//!   └─────close()──────┘
//! ```
//!
//! `open()` on an open forwarder and `close()` on a closed one are no-ops.
//! Each successful `open()` makes the store replay its full contents, so a
//! peer that has just (re)connected converges without a snapshot protocol.

use crate::codec::{self, WireMessage};
use crate::error::{BridgeError, Result};
use crate::metrics;
use crate::store::{ConnectionListener, ListenerHandle, TableStore, ValueListener};
use crate::transport::Transport;
use crate::value::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

/// The pair of store registrations held while the forwarder is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle {
    value: ListenerHandle,
    connection: ListenerHandle,
    generation: u64,
}

impl SubscriptionHandle {
    /// Counts opens since the forwarder was created, starting at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn value_listener(&self) -> ListenerHandle {
        self.value
    }

    pub fn connection_listener(&self) -> ListenerHandle {
        self.connection
    }
}

/// Encodes and sends one message; shared with the store listeners.
#[derive(Clone)]
struct Outbound {
    peer_id: Arc<str>,
    transport: Arc<dyn Transport>,
}

impl Outbound {
    fn send(&self, message: &WireMessage) -> Result<()> {
        let kind = message.kind();
        let frame = codec::encode(message)?;
        let len = frame.len();

        match self.transport.send(frame) {
            Ok(()) => {
                metrics::record_frame_sent(&self.peer_id, kind, true);
                trace!(peer_id = %self.peer_id, kind, len, "Frame sent");
                Ok(())
            }
            Err(e) => {
                metrics::record_frame_sent(&self.peer_id, kind, false);
                warn!(peer_id = %self.peer_id, kind, error = %e, "Failed to send frame");
                Err(e.into())
            }
        }
    }
}

/// Mirrors local store changes onto the transport.
pub struct ChangeForwarder<S: TableStore> {
    store: Arc<S>,
    outbound: Outbound,
    /// Current registration (None while closed)
    subscription: Mutex<Option<SubscriptionHandle>>,
    generation: AtomicU64,
}

impl<S: TableStore> ChangeForwarder<S> {
    /// Create a closed forwarder.
    pub fn new(peer_id: impl Into<String>, store: Arc<S>, transport: Arc<dyn Transport>) -> Self {
        let peer_id: String = peer_id.into();
        Self {
            store,
            outbound: Outbound {
                peer_id: Arc::from(peer_id),
                transport,
            },
            subscription: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.outbound.peer_id
    }

    /// Forward one entry change as a `ValueUpdate`.
    pub fn on_value_changed(&self, key: &str, value: &Value, is_new: bool) -> Result<()> {
        self.outbound.send(&WireMessage::ValueUpdate {
            key: key.to_string(),
            value: value.clone(),
            is_new,
        })
    }

    /// Forward a change of the store's own upstream link as a `ConnectionStatus`.
    pub fn on_connection_state_changed(&self, connected: bool, remote_address: Option<&str>) -> Result<()> {
        self.outbound.send(&WireMessage::ConnectionStatus {
            connected,
            remote_address: remote_address.map(str::to_string),
        })
    }

    /// Tell the peer the store is about to lose its upstream.
    ///
    /// Used during teardown, after `close()`, when the store's own
    /// notification can no longer reach us.
    pub fn announce_disconnected(&self) -> Result<()> {
        let remote = self.store.remote_address();
        self.on_connection_state_changed(false, remote.as_deref())
    }

    /// Register both listeners with the store.
    ///
    /// Returns `false` if already open. The store replays its current entries
    /// and connection state before this returns.
    pub async fn open(&self) -> Result<bool> {
        let mut subscription = self.subscription.lock().await;
        if subscription.is_some() {
            debug!(peer_id = %self.outbound.peer_id, "Forwarder already open");
            return Ok(false);
        }

        let out = self.outbound.clone();
        let on_value: ValueListener = Arc::new(move |key: &str, value: &Value, is_new: bool| {
            out.send(&WireMessage::ValueUpdate {
                key: key.to_string(),
                value: value.clone(),
                is_new,
            })
        });
        let value = self
            .store
            .subscribe_global_change(on_value)
            .map_err(|e| BridgeError::store("subscribe_global_change", e.to_string()))?;

        let out = self.outbound.clone();
        let on_connection: ConnectionListener =
            Arc::new(move |connected: bool, remote: Option<&str>| {
                out.send(&WireMessage::ConnectionStatus {
                    connected,
                    remote_address: remote.map(str::to_string),
                })
            });
        let connection = match self.store.subscribe_connection_state(on_connection) {
            Ok(handle) => handle,
            Err(e) => {
                // Leave nothing half-registered
                if let Err(undo) = self.store.unsubscribe_global_change(value) {
                    warn!(peer_id = %self.outbound.peer_id, error = %undo, "Failed to roll back value listener");
                }
                return Err(BridgeError::store("subscribe_connection_state", e.to_string()));
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *subscription = Some(SubscriptionHandle {
            value,
            connection,
            generation,
        });

        metrics::record_subscription(&self.outbound.peer_id, "open");
        info!(peer_id = %self.outbound.peer_id, generation, "Forwarder opened");
        Ok(true)
    }

    /// Unregister both listeners.
    ///
    /// Returns `false` if already closed. The handle is dropped even if the
    /// store reports an error, so a later `open()` starts clean.
    pub async fn close(&self) -> Result<bool> {
        let Some(handle) = self.subscription.lock().await.take() else {
            debug!(peer_id = %self.outbound.peer_id, "Forwarder already closed");
            return Ok(false);
        };

        let value_result = self.store.unsubscribe_global_change(handle.value);
        let connection_result = self.store.unsubscribe_connection_state(handle.connection);

        metrics::record_subscription(&self.outbound.peer_id, "close");
        info!(peer_id = %self.outbound.peer_id, generation = handle.generation, "Forwarder closed");

        value_result.map_err(|e| BridgeError::store("unsubscribe_global_change", e.to_string()))?;
        connection_result
            .map_err(|e| BridgeError::store("unsubscribe_connection_state", e.to_string()))?;
        Ok(true)
    }

    pub async fn is_open(&self) -> bool {
        self.subscription.lock().await.is_some()
    }

    /// The live registration, if open.
    pub async fn subscription(&self) -> Option<SubscriptionHandle> {
        *self.subscription.lock().await
    }
}
