// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Table bridge coordinator.
//!
//! Ties together:
//! - Outbound forwarding via [`ChangeForwarder`]
//! - Inbound frames via [`MessageApplier`]
//! - Upstream rebinding via [`Reconnector`]
//!
//! # Architecture
//!
//! ```text
//! local store ──listener──→ ChangeForwarder ──encode──→ Transport::send
//!
//! mpsc::Receiver ──→ receive loop ──→ MessageApplier ─┬─→ store.set_entry
//!                                                     └─→ Reconnector
//!                                                          (teardown, rebind, re-arm)
//! ```
//!
//! The bridge owns none of the I/O. The host supplies the store, a
//! [`Transport`] for outbound frames, and a channel of inbound frames.

mod inbound;
mod types;

pub use types::BridgeState;

use crate::applier::{ApplyOutcome, MessageApplier};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::forwarder::ChangeForwarder;
use crate::reconnect::{ConnectionState, Reconnector};
use crate::store::TableStore;
use crate::transport::Transport;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Bridges one table store to one peer.
///
/// # Example
///
/// ```rust,no_run
/// use nt_bridge::{Bridge, BridgeConfig, ChannelTransport, MemoryStore};
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
///
/// # async fn run() -> nt_bridge::Result<()> {
/// let (transport, mut outbound) = ChannelTransport::pair();
/// let (inbound_tx, inbound_rx) = mpsc::channel(64);
///
/// let bridge = Bridge::new(
///     BridgeConfig::default(),
///     Arc::new(MemoryStore::new()),
///     Arc::new(transport),
/// )?;
/// bridge.start().await?;
/// bridge.spawn_inbound(inbound_rx)?;
///
/// // Hand `outbound` frames to the socket, push received frames into `inbound_tx`.
/// # drop((inbound_tx, outbound.try_recv()));
/// bridge.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct Bridge<S: TableStore> {
    config: BridgeConfig,

    store: Arc<S>,

    forwarder: Arc<ChangeForwarder<S>>,

    reconnector: Arc<Reconnector<S>>,

    applier: Arc<MessageApplier<S>>,

    /// Bridge lifecycle (broadcast to watchers)
    lifecycle_tx: watch::Sender<BridgeState>,

    /// Shutdown signal for the receive loops
    shutdown_tx: watch::Sender<bool>,

    /// Receive loop task handles
    inbound_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: TableStore> Bridge<S> {
    /// Create a bridge in `Created` state.
    ///
    /// Nothing is subscribed until [`start()`](Self::start).
    pub fn new(config: BridgeConfig, store: Arc<S>, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let forwarder = Arc::new(ChangeForwarder::new(
            config.peer_id.clone(),
            Arc::clone(&store),
            transport,
        ));
        let reconnector = Arc::new(Reconnector::new(
            config.peer_id.clone(),
            Arc::clone(&store),
            Arc::clone(&forwarder),
            &config.reconnect,
        ));
        let applier = Arc::new(MessageApplier::new(
            config.peer_id.clone(),
            Arc::clone(&store),
            Arc::clone(&reconnector),
        ));
        let (lifecycle_tx, _) = watch::channel(BridgeState::Created);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            store,
            forwarder,
            reconnector,
            applier,
            lifecycle_tx,
            shutdown_tx,
            inbound_handles: Mutex::new(Vec::new()),
        })
    }

    pub fn peer_id(&self) -> &str {
        &self.config.peer_id
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn forwarder(&self) -> &Arc<ChangeForwarder<S>> {
        &self.forwarder
    }

    /// Current bridge lifecycle state.
    pub fn lifecycle(&self) -> BridgeState {
        *self.lifecycle_tx.borrow()
    }

    /// Current upstream binding state.
    pub fn connection_state(&self) -> ConnectionState {
        self.reconnector.state()
    }

    /// Get a receiver to watch upstream binding changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.reconnector.state_receiver()
    }

    /// Start forwarding.
    ///
    /// Binds the store to `config.upstream` if set (rebind + re-arm), otherwise
    /// just opens the forwarder. The open replays current state to the peer.
    /// Valid once, from `Created`.
    pub async fn start(&self) -> Result<()> {
        let mut actual = BridgeState::Created;
        let claimed = self.lifecycle_tx.send_if_modified(|state| {
            actual = *state;
            if *state == BridgeState::Created {
                *state = BridgeState::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(BridgeError::InvalidState {
                expected: BridgeState::Created.to_string(),
                actual: actual.to_string(),
            });
        }

        info!(
            peer_id = %self.config.peer_id,
            upstream = ?self.config.upstream,
            "Starting table bridge"
        );

        let started = match self.config.upstream.as_deref() {
            Some(address) => self.reconnector.bind_initial(address).await,
            None => self.forwarder.open().await.map(|_| ()),
        };

        let next = if started.is_ok() { BridgeState::Running } else { BridgeState::Failed };
        // A concurrent shutdown() wins over the start outcome
        self.lifecycle_tx.send_if_modified(|state| {
            if *state == BridgeState::Starting {
                *state = next;
                true
            } else {
                false
            }
        });

        if let Err(e) = started {
            error!(peer_id = %self.config.peer_id, error = %e, "Failed to start table bridge");
            return Err(e);
        }

        info!(
            peer_id = %self.config.peer_id,
            state = %self.connection_state(),
            "Table bridge running"
        );
        Ok(())
    }

    /// Apply one inbound frame directly, bypassing the receive loop.
    pub async fn apply(&self, frame: &[u8]) -> Result<ApplyOutcome> {
        self.applier.apply(frame).await
    }

    /// Spawn a receive loop draining `frames` into the applier.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_inbound(&self, frames: mpsc::Receiver<Vec<u8>>) -> Result<()> {
        let shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow() {
            return Err(BridgeError::Shutdown);
        }

        let peer_id = self.config.peer_id.clone();
        let applier = Arc::clone(&self.applier);
        let handle = tokio::spawn(inbound::run_receiver(peer_id, applier, frames, shutdown_rx));

        let mut handles = self.inbound_handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        drop(handles);

        info!(peer_id = %self.config.peer_id, "Spawned inbound receive loop");
        Ok(())
    }

    /// Shut the bridge down.
    ///
    /// 1. Signal the receive loops and wait for them (bounded by the drain timeout)
    /// 2. Close the forwarder and drop the store's upstream link
    /// 3. Move to `Disconnected` / `Stopped`
    ///
    /// Calling this more than once is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        let proceed = self.lifecycle_tx.send_if_modified(|state| match state {
            BridgeState::ShuttingDown | BridgeState::Stopped => false,
            _ => {
                *state = BridgeState::ShuttingDown;
                true
            }
        });
        if !proceed {
            debug!(peer_id = %self.config.peer_id, "Shutdown already done or in progress");
            return Ok(());
        }

        info!(peer_id = %self.config.peer_id, "Shutting down table bridge");
        self.shutdown_tx.send_replace(true);

        let handles: Vec<_> = {
            let mut guard = self.inbound_handles.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        let drain_timeout = self.config.inbound.drain_timeout_duration();
        for (i, mut handle) in handles.into_iter().enumerate() {
            match tokio::time::timeout(drain_timeout, &mut handle).await {
                Ok(Ok(())) => {
                    debug!(task = i + 1, "Receive loop completed gracefully");
                }
                Ok(Err(e)) => {
                    warn!(task = i + 1, error = %e, "Receive loop panicked during shutdown");
                }
                Err(_) => {
                    warn!(task = i + 1, "Receive loop timed out during shutdown, aborting");
                    handle.abort();
                }
            }
        }

        let result = self.reconnector.shutdown().await;
        if let Err(ref e) = result {
            warn!(peer_id = %self.config.peer_id, error = %e, "Store did not shut down cleanly");
        }

        self.lifecycle_tx.send_replace(BridgeState::Stopped);
        info!(peer_id = %self.config.peer_id, "Table bridge stopped");
        result
    }
}
