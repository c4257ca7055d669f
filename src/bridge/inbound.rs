// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Inbound receive loop.
//!
//! One task per peer transport. Frames are applied strictly in arrival
//! order: a `ReconnectRequest` finishes its whole sequence before the next
//! frame is looked at. A bad frame or a failed store write is logged and
//! the loop moves on.
//!
//! # Graceful Shutdown
//!
//! The loop stops when the shutdown signal fires or the frame channel
//! closes. A frame already being applied is allowed to finish.

use crate::applier::{ApplyOutcome, MessageApplier};
use crate::error::BridgeError;
use crate::store::TableStore;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, info_span, warn, Instrument};

/// Run the receive loop until shutdown or until the channel closes.
pub(super) async fn run_receiver<S: TableStore>(
    peer_id: String,
    applier: Arc<MessageApplier<S>>,
    mut frames: mpsc::Receiver<Vec<u8>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let span = info_span!("inbound", peer_id = %peer_id);

    async move {
        info!("Starting inbound receive loop");

        let mut applied: u64 = 0;
        let mut rejected: u64 = 0;

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }

                frame = frames.recv() => {
                    let Some(frame) = frame else {
                        info!("Inbound channel closed");
                        break;
                    };

                    match applier.apply(&frame).await {
                        Ok(ApplyOutcome::Rejected(_)) => {
                            rejected += 1;
                        }
                        Ok(outcome) => {
                            applied += 1;
                            debug!(?outcome, "Frame applied");
                        }
                        Err(BridgeError::Shutdown) => {
                            debug!("Bridge shut down mid-frame");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, retryable = e.is_retryable(), "Failed to apply frame");
                        }
                    }
                }
            }
        }

        info!(applied, rejected, "Inbound receive loop stopped");
    }
    .instrument(span)
    .await
}
