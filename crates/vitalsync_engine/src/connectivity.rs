//! Online/offline signal.

use crate::subscription::{ListenerRegistry, Subscription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Tracks whether the remote store is reachable.
///
/// Whatever owns the real network signal calls [`set_online`]; listeners
/// only hear about transitions, never about repeated values.
///
/// [`set_online`]: ConnectivityMonitor::set_online
pub struct ConnectivityMonitor {
    online: AtomicBool,
    listeners: ListenerRegistry<bool>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with an initial state.
    pub fn new(initially_online: bool) -> Self {
        Self {
            online: AtomicBool::new(initially_online),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Returns the current state.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Records a new state, notifying listeners if it changed.
    ///
    /// Returns true if this call was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        if self.online.swap(online, Ordering::SeqCst) == online {
            return false;
        }

        if online {
            info!("connectivity restored");
        } else {
            warn!("connectivity lost");
        }
        self.listeners.emit(&online);
        true
    }

    /// Registers a transition listener.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.listeners
            .register(Arc::new(move |online: &bool| listener(*online)))
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
