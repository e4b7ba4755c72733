//! Persisted sync status with change listeners.

use crate::subscription::{Listener, ListenerRegistry, Subscription};
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use tracing::warn;
use vitalsync_protocol::{ConflictPolicy, SyncStatus};
use vitalsync_storage::KeyValueStore;

/// Owns the engine's [`SyncStatus`].
///
/// Every update is persisted under the status key and then delivered to
/// listeners, in update order.
///
/// Listeners run on the updating thread while the notify lock is held.
/// They may read or update the status again, but must not wait on another
/// thread that is itself updating the status.
pub struct StatusTracker<S> {
    store: Arc<S>,
    key: String,
    status: Mutex<SyncStatus>,
    listeners: ListenerRegistry<SyncStatus>,
    /// Held across mutate, persist and emit so deliveries follow update
    /// order across threads. Re-entrant for listeners that update again.
    notify: ReentrantMutex<()>,
}

impl<S: KeyValueStore> StatusTracker<S> {
    /// Loads the persisted status, or starts from defaults if there is none
    /// or it cannot be decoded.
    pub fn load(store: Arc<S>, key: impl Into<String>, default_policy: ConflictPolicy) -> Self {
        let key = key.into();
        let fallback = SyncStatus::new(false, default_policy);

        let status = match store.get(&key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "sync status is corrupt, using defaults");
                fallback
            }),
            Ok(None) => fallback,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to read sync status, using defaults");
                fallback
            }
        };

        Self {
            store,
            key,
            status: Mutex::new(status),
            listeners: ListenerRegistry::new(),
            notify: ReentrantMutex::new(()),
        }
    }

    /// Returns a copy of the current status.
    pub fn current(&self) -> SyncStatus {
        self.status.lock().clone()
    }

    /// Applies `mutate`, persists, then notifies listeners.
    ///
    /// A persistence failure is logged; the in-memory status and the
    /// notification are not affected by it.
    pub fn update(&self, mutate: impl FnOnce(&mut SyncStatus)) -> SyncStatus {
        let _notify = self.notify.lock();
        let snapshot = {
            let mut status = self.status.lock();
            mutate(&mut status);
            let snapshot = status.clone();
            self.persist(&snapshot);
            snapshot
        };

        self.listeners.emit(&snapshot);
        snapshot
    }

    /// Registers a listener and immediately calls it with the current status.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        let listener: Listener<SyncStatus> = Arc::new(listener);
        let _notify = self.notify.lock();
        let subscription = self.listeners.register(Arc::clone(&listener));
        listener(&self.current());
        subscription
    }

    fn persist(&self, status: &SyncStatus) {
        let result = serde_json::to_string(status)
            .map_err(|e| e.to_string())
            .and_then(|blob| self.store.set(&self.key, &blob).map_err(|e| e.to_string()));

        if let Err(e) = result {
            warn!(key = %self.key, error = %e, "failed to persist sync status");
        }
    }
}
