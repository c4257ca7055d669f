//! Mock TableStore for testing.
//!
//! Records every call in a journal for ordering assertions.
//! Configurable failures and delays for shutdown/initialize to test
//! aborted and serialized reconnects.

use nt_bridge::store::{
    BoxFuture, ConnectionListener, ListenerHandle, StoreError, StoreResult, TableStore,
    ValueListener,
};
use nt_bridge::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One recorded store call.
///
/// Async calls are recorded twice (start and finish) so overlapping
/// sequences show up as interleaved entries.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    SubscribeGlobalChange(u64),
    UnsubscribeGlobalChange(u64),
    SubscribeConnectionState(u64),
    UnsubscribeConnectionState(u64),
    SetEntry(String, Value),
    ShutdownStarted,
    ShutdownFinished,
    InitializeStarted(String),
    InitializeFinished(String),
}

/// Mock implementation of TableStore that records all calls.
///
/// # Example
/// ```rust,ignore
/// let store = MockStore::with_entries([("a", 1)]);
/// store.fail_initialize(1);
///
/// // Use in tests...
///
/// assert_eq!(store.active_listeners(), (1, 1));
/// assert!(store.calls().contains(&StoreCall::InitializeStarted("10.0.0.2".into())));
/// ```
pub struct MockStore {
    entries: Mutex<BTreeMap<String, Value>>,
    value_listeners: Mutex<HashMap<u64, ValueListener>>,
    connection_listeners: Mutex<HashMap<u64, ConnectionListener>>,
    remote: Mutex<Option<String>>,
    next_handle: AtomicU64,
    /// Call journal
    calls: Mutex<Vec<StoreCall>>,
    /// Fail the next N initialize_as_client() calls
    initialize_failures: AtomicUsize,
    /// Fail the next N shutdown() calls
    shutdown_failures: AtomicUsize,
    /// Fail the next N set_entry() calls
    set_entry_failures: AtomicUsize,
    initialize_delay: Mutex<Duration>,
    shutdown_delay: Mutex<Duration>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            value_listeners: Mutex::new(HashMap::new()),
            connection_listeners: Mutex::new(HashMap::new()),
            remote: Mutex::new(None),
            next_handle: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
            initialize_failures: AtomicUsize::new(0),
            shutdown_failures: AtomicUsize::new(0),
            set_entry_failures: AtomicUsize::new(0),
            initialize_delay: Mutex::new(Duration::ZERO),
            shutdown_delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Create a mock pre-populated with entries (not journaled).
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let store = Self::new();
        {
            let mut map = store.entries.lock().unwrap();
            for (k, v) in entries {
                map.insert(k.into(), v.into());
            }
        }
        store
    }

    // =========================================================================
    // Failure / Delay Injection
    // =========================================================================

    pub fn fail_initialize(&self, times: usize) {
        self.initialize_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_shutdown(&self, times: usize) {
        self.shutdown_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_set_entry(&self, times: usize) {
        self.set_entry_failures.store(times, Ordering::SeqCst);
    }

    pub fn set_initialize_delay(&self, delay: Duration) {
        *self.initialize_delay.lock().unwrap() = delay;
    }

    pub fn set_shutdown_delay(&self, delay: Duration) {
        *self.shutdown_delay.lock().unwrap() = delay;
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Addresses passed to initialize_as_client(), in call order.
    pub fn initialized_addresses(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::InitializeStarted(addr) => Some(addr),
                _ => None,
            })
            .collect()
    }

    /// Currently registered listeners, `(value, connection)`.
    pub fn active_listeners(&self) -> (usize, usize) {
        (
            self.value_listeners.lock().unwrap().len(),
            self.connection_listeners.lock().unwrap().len(),
        )
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Write an entry as if a local client changed it (not journaled).
    pub fn local_write(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let is_new = self
            .entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone())
            .is_none();
        self.notify_value(key, &value, is_new);
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn handle(&self) -> ListenerHandle {
        ListenerHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst))
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn notify_value(&self, key: &str, value: &Value, is_new: bool) {
        let listeners: Vec<ValueListener> =
            self.value_listeners.lock().unwrap().values().cloned().collect();
        for listener in listeners {
            let _ = listener(key, value, is_new);
        }
    }

    fn notify_connection(&self, connected: bool, remote: Option<&str>) {
        let listeners: Vec<ConnectionListener> =
            self.connection_listeners.lock().unwrap().values().cloned().collect();
        for listener in listeners {
            let _ = listener(connected, remote);
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore for MockStore {
    fn subscribe_global_change(&self, listener: ValueListener) -> StoreResult<ListenerHandle> {
        let handle = self.handle();
        self.record(StoreCall::SubscribeGlobalChange(handle.id()));
        self.value_listeners
            .lock()
            .unwrap()
            .insert(handle.id(), listener.clone());

        let snapshot: Vec<(String, Value)> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in snapshot {
            let _ = listener(&key, &value, true);
        }
        Ok(handle)
    }

    fn unsubscribe_global_change(&self, handle: ListenerHandle) -> StoreResult<()> {
        self.record(StoreCall::UnsubscribeGlobalChange(handle.id()));
        self.value_listeners.lock().unwrap().remove(&handle.id());
        Ok(())
    }

    fn subscribe_connection_state(&self, listener: ConnectionListener) -> StoreResult<ListenerHandle> {
        let handle = self.handle();
        self.record(StoreCall::SubscribeConnectionState(handle.id()));
        self.connection_listeners
            .lock()
            .unwrap()
            .insert(handle.id(), listener.clone());

        let remote = self.remote_address();
        let _ = listener(remote.is_some(), remote.as_deref());
        Ok(handle)
    }

    fn unsubscribe_connection_state(&self, handle: ListenerHandle) -> StoreResult<()> {
        self.record(StoreCall::UnsubscribeConnectionState(handle.id()));
        self.connection_listeners.lock().unwrap().remove(&handle.id());
        Ok(())
    }

    fn set_entry(&self, key: &str, value: Value) -> StoreResult<()> {
        self.record(StoreCall::SetEntry(key.to_string(), value.clone()));
        if Self::take_failure(&self.set_entry_failures) {
            return Err(StoreError("entry is read-only".to_string()));
        }
        self.local_write(key, value);
        Ok(())
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.record(StoreCall::ShutdownStarted);
            let delay = *self.shutdown_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if Self::take_failure(&self.shutdown_failures) {
                self.record(StoreCall::ShutdownFinished);
                return Err(StoreError("shutdown refused".to_string()));
            }
            self.remote.lock().unwrap().take();
            self.notify_connection(false, None);
            self.record(StoreCall::ShutdownFinished);
            Ok(())
        })
    }

    fn initialize_as_client(&self, address: &str) -> BoxFuture<'_, ()> {
        let address = address.to_string();
        Box::pin(async move {
            self.record(StoreCall::InitializeStarted(address.clone()));
            let delay = *self.initialize_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if Self::take_failure(&self.initialize_failures) {
                self.record(StoreCall::InitializeFinished(address.clone()));
                return Err(StoreError(format!("cannot reach {}", address)));
            }
            *self.remote.lock().unwrap() = Some(address.clone());
            self.notify_connection(true, Some(&address));
            self.record(StoreCall::InitializeFinished(address));
            Ok(())
        })
    }

    fn remote_address(&self) -> Option<String> {
        self.remote.lock().unwrap().clone()
    }
}
