// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Table store integration.
//!
//! Defines what the bridge needs from the shared table: listener
//! registration that returns explicit handles, direct entry writes, and the
//! ability to drop and re-establish the store's own upstream link.
//!
//! # Example
//!
//! ```rust,no_run
//! use nt_bridge::store::{
//!     BoxFuture, ConnectionListener, ListenerHandle, StoreResult, TableStore, ValueListener,
//! };
//! use nt_bridge::Value;
//!
//! struct MyTable { /* ... */ }
//!
//! impl TableStore for MyTable {
//!     fn subscribe_global_change(&self, _listener: ValueListener) -> StoreResult<ListenerHandle> {
//!         Ok(ListenerHandle::new(1))
//!     }
//!     fn unsubscribe_global_change(&self, _handle: ListenerHandle) -> StoreResult<()> {
//!         Ok(())
//!     }
//!     fn subscribe_connection_state(&self, _listener: ConnectionListener) -> StoreResult<ListenerHandle> {
//!         Ok(ListenerHandle::new(2))
//!     }
//!     fn unsubscribe_connection_state(&self, _handle: ListenerHandle) -> StoreResult<()> {
//!         Ok(())
//!     }
//!     fn set_entry(&self, _key: &str, _value: Value) -> StoreResult<()> {
//!         Ok(())
//!     }
//!     fn shutdown(&self) -> BoxFuture<'_, ()> {
//!         Box::pin(async { Ok(()) })
//!     }
//!     fn initialize_as_client(&self, _address: &str) -> BoxFuture<'_, ()> {
//!         Box::pin(async { Ok(()) })
//!     }
//!     fn remote_address(&self) -> Option<String> {
//!         None
//!     }
//! }
//! ```

use crate::value::Value;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, warn};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Simplified error for store operations.
#[derive(Debug, Clone)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// Opaque token for one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Called for every entry change: `(key, value, is_new)`.
///
/// The returned error is the caller's to handle; the bridge uses it to
/// report a failed send back to the store.
pub type ValueListener = Arc<dyn Fn(&str, &Value, bool) -> crate::error::Result<()> + Send + Sync>;

/// Called when the store's upstream link changes: `(connected, remote_address)`.
pub type ConnectionListener =
    Arc<dyn Fn(bool, Option<&str>) -> crate::error::Result<()> + Send + Sync>;

/// Trait defining what we need from the table store.
///
/// Notifications may be delivered on the store's own threads, concurrently
/// with calls the bridge makes into the store.
pub trait TableStore: Send + Sync + 'static {
    /// Register a change listener.
    ///
    /// Must replay every current entry to `listener` (with `is_new = true`)
    /// before returning, so a fresh subscriber sees full state.
    fn subscribe_global_change(&self, listener: ValueListener) -> StoreResult<ListenerHandle>;

    /// Remove a change listener. Unknown handles are ignored.
    fn unsubscribe_global_change(&self, handle: ListenerHandle) -> StoreResult<()>;

    /// Register an upstream connection listener.
    ///
    /// Must notify the current connection state immediately.
    fn subscribe_connection_state(&self, listener: ConnectionListener) -> StoreResult<ListenerHandle>;

    /// Remove an upstream connection listener. Unknown handles are ignored.
    fn unsubscribe_connection_state(&self, handle: ListenerHandle) -> StoreResult<()>;

    /// Write a value into the named entry.
    fn set_entry(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Drop the store's current upstream link.
    fn shutdown(&self) -> BoxFuture<'_, ()>;

    /// Start the store as a client of `address`.
    fn initialize_as_client(&self, address: &str) -> BoxFuture<'_, ()>;

    /// Address of the current upstream, if connected.
    fn remote_address(&self) -> Option<String>;
}

/// An in-process table for standalone mode and testing.
///
/// Holds entries in memory and delivers notifications synchronously on the
/// calling thread. `initialize_as_client` only records the address.
///
/// Writes and subscriptions are serialized, so listeners see each key's
/// values in write order. Value listeners must not write back into the
/// store from inside the callback.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Value>,
    // Held across write+notify and register+replay
    notify_lock: Mutex<()>,
    value_listeners: DashMap<u64, ValueListener>,
    connection_listeners: DashMap<u64, ConnectionListener>,
    next_handle: AtomicU64,
    remote: RwLock<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let store = Self::new();
        for (k, v) in entries {
            store.entries.insert(k.into(), v.into());
        }
        store
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of registered listeners, `(value, connection)`.
    pub fn listener_counts(&self) -> (usize, usize) {
        (self.value_listeners.len(), self.connection_listeners.len())
    }

    fn allocate_handle(&self) -> ListenerHandle {
        ListenerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn notify_connection(&self, connected: bool, remote: Option<&str>) {
        // Snapshot so listeners may (un)subscribe without deadlocking the map
        let listeners: Vec<ConnectionListener> = self
            .connection_listeners
            .iter()
            .map(|r| r.value().clone())
            .collect();
        for listener in listeners {
            if let Err(e) = listener(connected, remote) {
                warn!(error = %e, connected, "Connection listener failed");
            }
        }
    }
}

impl TableStore for MemoryStore {
    fn subscribe_global_change(&self, listener: ValueListener) -> StoreResult<ListenerHandle> {
        let _serial = self.notify_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = self.allocate_handle();
        self.value_listeners.insert(handle.id(), listener.clone());

        let snapshot: Vec<(String, Value)> = self
            .entries
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        debug!(handle = handle.id(), entries = snapshot.len(), "Replaying entries to new listener");
        for (key, value) in snapshot {
            if let Err(e) = listener(&key, &value, true) {
                warn!(key = %key, error = %e, "Value listener failed during replay");
            }
        }
        Ok(handle)
    }

    fn unsubscribe_global_change(&self, handle: ListenerHandle) -> StoreResult<()> {
        self.value_listeners.remove(&handle.id());
        Ok(())
    }

    fn subscribe_connection_state(&self, listener: ConnectionListener) -> StoreResult<ListenerHandle> {
        let handle = self.allocate_handle();
        self.connection_listeners.insert(handle.id(), listener.clone());

        let remote = self.remote_address();
        if let Err(e) = listener(remote.is_some(), remote.as_deref()) {
            warn!(error = %e, "Connection listener failed during replay");
        }
        Ok(handle)
    }

    fn unsubscribe_connection_state(&self, handle: ListenerHandle) -> StoreResult<()> {
        self.connection_listeners.remove(&handle.id());
        Ok(())
    }

    fn set_entry(&self, key: &str, value: Value) -> StoreResult<()> {
        let _serial = self.notify_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let is_new = self.entries.insert(key.to_string(), value.clone()).is_none();

        let listeners: Vec<ValueListener> = self
            .value_listeners
            .iter()
            .map(|r| r.value().clone())
            .collect();
        for listener in listeners {
            if let Err(e) = listener(key, &value, is_new) {
                warn!(key = %key, error = %e, "Value listener failed");
            }
        }
        Ok(())
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let previous = self
                .remote
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            debug!(previous = ?previous, "MemoryStore: upstream dropped");
            self.notify_connection(false, None);
            Ok(())
        })
    }

    fn initialize_as_client(&self, address: &str) -> BoxFuture<'_, ()> {
        let address = address.to_string();
        Box::pin(async move {
            *self.remote.write().unwrap_or_else(PoisonError::into_inner) = Some(address.clone());
            debug!(address = %address, "MemoryStore: upstream set");
            self.notify_connection(true, Some(&address));
            Ok(())
        })
    }

    fn remote_address(&self) -> Option<String> {
        self.remote
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
