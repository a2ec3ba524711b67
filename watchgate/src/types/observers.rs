//! Observer registry with explicit subscribe/unsubscribe.
//!
//! Both signal sources in the crate (page visibility and the playback
//! adapter) push edge-triggered events to whoever is listening. Events
//! must not coalesce: a background edge followed quickly by a foreground
//! edge has to reach the accumulator as two calls, or the baseline would
//! never be invalidated. A watch channel would lose the first edge, so
//! each listener gets its own callback instead.
//!
//! Callbacks run outside the registry lock, so a callback may itself
//! subscribe or drop a [`Subscription`]. A callback snapshotted just
//! before its subscription is dropped can still run once afterwards;
//! callbacks must tolerate that (in practice they send into a channel
//! whose receiver may already be gone).

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Identifies one registered callback.
    pub struct ObserverKey;
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type Registry<T> = Mutex<SlotMap<ObserverKey, Callback<T>>>;

/// A set of callbacks interested in values of type `T`.
///
/// Clones share the same registry.
pub struct Observers<T> {
    registry: Arc<Registry<T>>,
}

impl<T: 'static> Observers<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(SlotMap::with_key())),
        }
    }

    /// Register `callback`. It stays registered until the returned
    /// [`Subscription`] is dropped or cancelled.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let key = self.registry.lock().insert(Arc::new(callback));
        let registry: Weak<Registry<T>> = Arc::downgrade(&self.registry);

        Subscription {
            key,
            unsubscribe: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.lock().remove(key);
                }
            })),
        }
    }

    /// Deliver `value` to every registered callback.
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self.registry.lock().values().cloned().collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Observers<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> std::fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.registry.lock().len())
            .finish()
    }
}

/// Registration handle. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    key: ObserverKey,
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn key(&self) -> ObserverKey {
        self.key
    }

    /// Unsubscribe now. Equivalent to dropping the handle.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&u32) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move |_: &u32| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn notifies_every_subscriber() {
        let observers = Observers::<u32>::new();
        let (a, cb_a) = counter();
        let (b, cb_b) = counter();
        let _sub_a = observers.subscribe(cb_a);
        let _sub_b = observers.subscribe(cb_b);

        observers.notify(&7);

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let observers = Observers::<u32>::new();
        let (count, cb) = counter();
        let sub = observers.subscribe(cb);
        assert_eq!(observers.len(), 1);

        drop(sub);
        observers.notify(&1);

        assert!(observers.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_unsubscribes() {
        let observers = Observers::<u32>::new();
        let (count, cb) = counter();
        observers.subscribe(cb).cancel();

        observers.notify(&1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscription_outliving_registry_is_harmless() {
        let observers = Observers::<u32>::new();
        let (_count, cb) = counter();
        let sub = observers.subscribe(cb);

        drop(observers);
        drop(sub);
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let observers = Observers::<u32>::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inner = slot.clone();
        let sub = observers.subscribe(move |_| {
            inner.lock().take();
        });
        *slot.lock() = Some(sub);

        observers.notify(&1);
        assert!(observers.is_empty());
    }
}
