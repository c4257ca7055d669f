// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Inbound message applier.
//!
//! Decodes one frame from the peer and acts on it:
//!
//! | Message | Effect |
//! |---------|--------|
//! | `ValueUpdate` | `set_entry(key, value)`; `is_new` is not reapplied |
//! | `ReconnectRequest` | runs the reconnect sequence |
//! | `ConnectionStatus` | none (outbound-only in this protocol) |
//!
//! A frame that fails to decode is logged, counted and reported as
//! [`ApplyOutcome::Rejected`]. It is never an `Err`, so the receive loop
//! keeps going with the next frame.

use crate::codec::{self, DecodeError, WireMessage};
use crate::error::{BridgeError, Result};
use crate::metrics;
use crate::reconnect::Reconnector;
use crate::store::TableStore;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// What applying one inbound frame did.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The named entry was written.
    Updated { key: String },
    /// The store is now bound to this address.
    Reconnected { address: String },
    /// Decoded fine, nothing to do.
    Ignored,
    /// Dropped as malformed.
    Rejected(DecodeError),
}

/// Applies inbound frames to the local store.
pub struct MessageApplier<S: TableStore> {
    peer_id: String,
    store: Arc<S>,
    reconnector: Arc<Reconnector<S>>,
}

impl<S: TableStore> MessageApplier<S> {
    pub fn new(peer_id: impl Into<String>, store: Arc<S>, reconnector: Arc<Reconnector<S>>) -> Self {
        Self {
            peer_id: peer_id.into(),
            store,
            reconnector,
        }
    }

    /// Decode and apply one frame.
    ///
    /// # Errors
    ///
    /// Store, timeout and reconnect failures are returned to the caller.
    /// Decode failures are not errors; see [`ApplyOutcome::Rejected`].
    pub async fn apply(&self, frame: &[u8]) -> Result<ApplyOutcome> {
        if self.reconnector.is_shutdown() {
            return Err(BridgeError::Shutdown);
        }

        let message = match codec::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                metrics::record_decode_failure(&self.peer_id, e.reason());
                warn!(
                    peer_id = %self.peer_id,
                    len = frame.len(),
                    error = %e,
                    "Dropping malformed frame"
                );
                return Ok(ApplyOutcome::Rejected(e));
            }
        };

        metrics::record_frame_received(&self.peer_id, message.kind());

        match message {
            WireMessage::ValueUpdate { key, value, .. } => {
                let _binding = self.reconnector.binding().await;
                // Shutdown may have released the store while we queued
                if self.reconnector.is_shutdown() {
                    return Err(BridgeError::Shutdown);
                }
                trace!(peer_id = %self.peer_id, key = %key, value_type = value.type_name(), "Applying value");
                if let Err(e) = self.store.set_entry(&key, value) {
                    metrics::record_store_write_failure(&self.peer_id);
                    warn!(peer_id = %self.peer_id, key = %key, error = %e, "Store rejected write");
                    return Err(BridgeError::store("set_entry", e.to_string()));
                }
                Ok(ApplyOutcome::Updated { key })
            }
            WireMessage::ReconnectRequest { address } => {
                self.reconnector.reconnect(&address).await?;
                Ok(ApplyOutcome::Reconnected { address })
            }
            WireMessage::ConnectionStatus { connected, .. } => {
                debug!(peer_id = %self.peer_id, connected, "Ignoring inbound connection status");
                Ok(ApplyOutcome::Ignored)
            }
        }
    }
}
