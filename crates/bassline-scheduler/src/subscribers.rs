//! Change subscribers.
//!
//! Callbacks are stored in a [`DashMap`] keyed by a subscription number, so
//! subscribing and unsubscribing never contend with a notification in
//! progress on another thread.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use bassline_core::Change;

/// A change callback.
pub type SubscriberFn = Arc<dyn Fn(&[Change]) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    callbacks: DashMap<u64, SubscriberFn>,
}

/// The set of callbacks notified after each applied batch of changes.
#[derive(Clone, Default)]
pub struct Subscribers {
    inner: Arc<Registry>,
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.len())
            .finish()
    }
}

impl Subscribers {
    pub fn new() -> Self {
        Subscribers::default()
    }

    pub fn subscribe(&self, callback: SubscriberFn) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.callbacks.insert(id, callback);
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Calls every subscriber with `changes`. Empty batches are not delivered.
    pub fn notify(&self, changes: &[Change]) {
        if changes.is_empty() {
            return;
        }
        // Clone out first: a callback may unsubscribe while we iterate.
        let callbacks: Vec<SubscriberFn> = self
            .inner
            .callbacks
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for callback in callbacks {
            callback(changes);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.callbacks.is_empty()
    }
}

/// Handle returned by `subscribe`.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stops delivery to this subscriber.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.callbacks.remove(&self.id);
        }
    }
}
