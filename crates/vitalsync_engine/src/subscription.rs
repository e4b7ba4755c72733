//! Listener registration handles.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle to a registered listener.
///
/// Releasing the handle, either through [`Subscription::unsubscribe`] or by
/// dropping it, deregisters the listener. Release is idempotent.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Creates a handle that runs `cancel` once on release.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Creates a handle with nothing to release.
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    /// Returns true if releasing this handle would deregister something.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Deregisters the listener.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A shared listener callback.
pub(crate) type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

type Slots<T> = Arc<RwLock<Vec<(u64, Listener<T>)>>>;

/// A set of listeners notified in registration order.
///
/// `emit` snapshots the listener list and calls it with no lock held, so a
/// listener may subscribe, unsubscribe or emit again from its callback.
pub(crate) struct ListenerRegistry<T> {
    slots: Slots<T>,
    next_id: AtomicU64,
}

impl<T: 'static> ListenerRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn register(&self, listener: Listener<T>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.slots.write().push((id, listener));

        let slots = Arc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = slots.upgrade() {
                slots.write().retain(|(slot_id, _)| *slot_id != id);
            }
        })
    }

    pub(crate) fn emit(&self, value: &T) {
        let listeners: Vec<Listener<T>> = self
            .slots
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, Listener<u32>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, Arc::new(move |v: &u32| sink.lock().push(*v)))
    }

    #[test]
    fn emits_to_every_listener_in_order() {
        let registry = ListenerRegistry::<u32>::new();
        let (first, listener_a) = recorder();
        let (second, listener_b) = recorder();
        let _a = registry.register(listener_a);
        let _b = registry.register(listener_b);

        registry.emit(&1);
        registry.emit(&2);

        assert_eq!(*first.lock(), vec![1, 2]);
        assert_eq!(*second.lock(), vec![1, 2]);
    }

    #[test]
    fn drop_and_unsubscribe_deregister() {
        let registry = ListenerRegistry::<u32>::new();
        let (seen, listener) = recorder();

        let explicit = registry.register(Arc::clone(&listener));
        let dropped = registry.register(listener);
        assert_eq!(registry.len(), 2);

        explicit.unsubscribe();
        drop(dropped);
        assert_eq!(registry.len(), 0);

        registry.emit(&7);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let registry = ListenerRegistry::<u32>::new();
        let handle: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(Mutex::new(0));

        let slot = Arc::clone(&handle);
        let counter = Arc::clone(&calls);
        let subscription = registry.register(Arc::new(move |_: &u32| {
            *counter.lock() += 1;
            if let Some(own) = slot.lock().take() {
                own.unsubscribe();
            }
        }));
        *handle.lock() = Some(subscription);

        registry.emit(&1);
        registry.emit(&2);
        assert_eq!(*calls.lock(), 1);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn release_after_registry_dropped_is_harmless() {
        let registry = ListenerRegistry::<u32>::new();
        let (_, listener) = recorder();
        let subscription = registry.register(listener);
        drop(registry);
        subscription.unsubscribe();
    }

    #[test]
    fn inert_handle() {
        let subscription = Subscription::inert();
        assert!(!subscription.is_active());
        subscription.unsubscribe();
    }
}
