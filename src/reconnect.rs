// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reconnect state machine.
//!
//! Moves the store's upstream binding to a new address when the peer asks
//! for it, and keeps the forwarder's subscription consistent across the move.
//!
//! # State Transitions
//!
//! ```text
//!               reconnect(a)                 rebind + re-arm ok
//! Disconnected ─────────────→ Connecting(a) ───────────────────→ Connected(a)
//!      ↑                        │    ↑                                │
//!      │                        │    │ reconnect(b) (stale retry)     │
//!      │                        └────┘                                │
//!      │                             ↑         reconnect(b)           │
//!      │                             └────────────────────────────────┘
//!      │          shutdown()
//!      └──────────────────────── any state
//! ```
//!
//! # Sequence
//!
//! 1. **Teardown**: close the forwarder, announce `connected = false` to the
//!    peer, shut the store's upstream link down.
//! 2. **Rebind**: initialize the store as a client of the new address.
//! 3. **Re-arm**: open the forwarder again (full-state replay to the peer).
//!
//! Each step starts only after the previous one has returned. The whole
//! sequence holds the write half of an `RwLock`, so concurrent requests queue
//! in arrival order and never interleave. Inbound value writes take the read
//! half and therefore never land mid-rebind.
//!
//! A store error or timeout aborts the sequence where it stands: state stays
//! `Connecting(addr)` until the next request. Nothing is retried here.

use crate::config::ReconnectConfig;
use crate::error::{BridgeError, Result};
use crate::forwarder::ChangeForwarder;
use crate::metrics;
use crate::store::{StoreResult, TableStore};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock, RwLockReadGuard};
use tracing::{debug, error, info, warn};

/// Binding state of the store's upstream link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not bound. Initial state, and the state after shutdown.
    Disconnected,
    /// A sequence targeting this address has started but not completed.
    Connecting(String),
    /// Bound to this address with the forwarder re-armed.
    Connected(String),
}

impl ConnectionState {
    /// State name without the address, used for metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting(_) => "Connecting",
            Self::Connected(_) => "Connected",
        }
    }

    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Disconnected => None,
            Self::Connecting(addr) | Self::Connected(addr) => Some(addr),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: &ConnectionState) -> bool {
        match (self, next) {
            (_, Self::Disconnected) => true,
            (Self::Disconnected, Self::Connecting(_)) => true,
            (Self::Connecting(_), Self::Connecting(_)) => true,
            (Self::Connecting(target), Self::Connected(bound)) => target == bound,
            (Self::Connected(_), Self::Connecting(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting(addr) => write!(f, "Connecting({})", addr),
            Self::Connected(addr) => write!(f, "Connected({})", addr),
        }
    }
}

/// Runs reconnect sequences one at a time.
pub struct Reconnector<S: TableStore> {
    peer_id: String,
    store: Arc<S>,
    forwarder: Arc<ChangeForwarder<S>>,

    /// Write half held for a whole sequence; read half for inbound writes
    sequence: RwLock<()>,

    /// Connection state (broadcast to watchers)
    state_tx: watch::Sender<ConnectionState>,

    shutdown: AtomicBool,
    shutdown_timeout: Duration,
    initialize_timeout: Duration,
}

impl<S: TableStore> Reconnector<S> {
    pub fn new(
        peer_id: impl Into<String>,
        store: Arc<S>,
        forwarder: Arc<ChangeForwarder<S>>,
        config: &ReconnectConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            peer_id: peer_id.into(),
            store,
            forwarder,
            sequence: RwLock::new(()),
            state_tx,
            shutdown: AtomicBool::new(false),
            shutdown_timeout: config.shutdown_timeout_duration(),
            initialize_timeout: config.initialize_timeout_duration(),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Shared guard that excludes a running reconnect sequence.
    ///
    /// Held by inbound value writes so they land either before teardown or
    /// after re-arm.
    pub async fn binding(&self) -> RwLockReadGuard<'_, ()> {
        self.sequence.read().await
    }

    /// Tear down the current binding and rebind to `address`.
    ///
    /// Waits behind any sequence already running.
    pub async fn reconnect(&self, address: &str) -> Result<()> {
        self.run(address, true).await
    }

    /// Bind to `address` from a fresh start (no teardown).
    pub async fn bind_initial(&self, address: &str) -> Result<()> {
        self.run(address, false).await
    }

    async fn run(&self, address: &str, teardown: bool) -> Result<()> {
        if self.is_shutdown() {
            return Err(BridgeError::Shutdown);
        }

        let _sequence = self.sequence.write().await;
        // Shutdown may have been queued ahead of us
        if self.is_shutdown() {
            return Err(BridgeError::Shutdown);
        }

        let started = Instant::now();
        let previous = self.state();
        self.transition(ConnectionState::Connecting(address.to_string()))?;
        info!(
            peer_id = %self.peer_id,
            from = %previous,
            address = %address,
            "Reconnect started"
        );

        match self.steps(address, teardown).await {
            Ok(()) => {
                self.transition(ConnectionState::Connected(address.to_string()))?;
                metrics::record_reconnect(&self.peer_id, "success", started.elapsed());
                info!(
                    peer_id = %self.peer_id,
                    address = %address,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Reconnect complete"
                );
                Ok(())
            }
            Err(e) => {
                let outcome = match e {
                    BridgeError::Timeout { .. } => "timeout",
                    BridgeError::Store { .. } => "store_error",
                    _ => "failure",
                };
                metrics::record_reconnect(&self.peer_id, outcome, started.elapsed());
                error!(
                    peer_id = %self.peer_id,
                    address = %address,
                    error = %e,
                    "Reconnect aborted, state left at Connecting"
                );
                Err(e)
            }
        }
    }

    async fn steps(&self, address: &str, teardown: bool) -> Result<()> {
        if teardown {
            self.forwarder.close().await?;
            if let Err(e) = self.forwarder.announce_disconnected() {
                warn!(peer_id = %self.peer_id, error = %e, "Failed to announce disconnect");
            }
            self.bounded("shutdown", self.shutdown_timeout, self.store.shutdown())
                .await?;
            debug!(peer_id = %self.peer_id, "Teardown complete");
        }

        self.bounded(
            "initialize_as_client",
            self.initialize_timeout,
            self.store.initialize_as_client(address),
        )
        .await?;
        debug!(peer_id = %self.peer_id, address = %address, "Rebind complete");

        self.forwarder.open().await?;
        Ok(())
    }

    /// Close the forwarder, drop the upstream link and move to `Disconnected`.
    ///
    /// Waits for a running sequence to finish. Later requests fail with
    /// [`BridgeError::Shutdown`]. Calling this twice is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let _sequence = self.sequence.write().await;
        let closed = self.forwarder.close().await;
        let stopped = self
            .bounded("shutdown", self.shutdown_timeout, self.store.shutdown())
            .await;

        self.transition(ConnectionState::Disconnected)?;
        info!(peer_id = %self.peer_id, "Upstream binding released");

        closed?;
        stopped
    }

    fn transition(&self, next: ConnectionState) -> Result<()> {
        let current = self.state();
        if !current.can_transition_to(&next) {
            return Err(BridgeError::InvalidState {
                expected: format!("a state that can move to {}", next),
                actual: current.to_string(),
            });
        }
        metrics::set_connection_state(&self.peer_id, next.name());
        self.state_tx.send_replace(next);
        Ok(())
    }

    async fn bounded<F>(&self, operation: &'static str, limit: Duration, call: F) -> Result<()>
    where
        F: Future<Output = StoreResult<()>>,
    {
        match tokio::time::timeout(limit, call).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BridgeError::store(operation, e.to_string())),
            Err(_) => Err(BridgeError::Timeout {
                operation: operation.to_string(),
                timeout_ms: limit.as_millis() as u64,
            }),
        }
    }
}
