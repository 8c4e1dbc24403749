//! Lead-change notification.
//!
//! Listeners register a callback and get back a [`Subscription`]; dropping
//! the handle or calling [`Subscription::unsubscribe`] detaches it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadChange {
    Inserted { email: String },
}

type Listener = Arc<dyn Fn(&LeadChange) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<u64, Listener>>,
}

#[derive(Clone, Default)]
pub struct LeadEvents {
    registry: Arc<Registry>,
}

impl LeadEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LeadChange) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(listener));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Calls every listener registered at the time of the call, outside the lock.
    pub fn notify(&self, change: &LeadChange) {
        let listeners = self
            .registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect::<Vec<_>>();

        listeners.iter().for_each(|listener| listener(change));
    }

    pub fn listener_count(&self) -> usize {
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LeadChange, LeadEvents};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn inserted() -> LeadChange {
        LeadChange::Inserted {
            email: "a@x.com".to_string(),
        }
    }

    #[test]
    fn delivers_to_every_listener() {
        let events = LeadEvents::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let first_hits = Arc::clone(&hits);
        let _first = events.subscribe(move |_| {
            first_hits.fetch_add(1, Ordering::SeqCst);
        });
        let second_hits = Arc::clone(&hits);
        let _second = events.subscribe(move |_| {
            second_hits.fetch_add(1, Ordering::SeqCst);
        });

        events.notify(&inserted());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let events = LeadEvents::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let subscription = events.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        events.notify(&inserted());
        subscription.unsubscribe();
        events.notify(&inserted());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn listener_may_subscribe_during_notify() {
        let events = LeadEvents::new();
        let inner_events = events.clone();
        let _outer = events.subscribe(move |_| {
            let nested = inner_events.subscribe(|_| {});
            drop(nested);
        });

        events.notify(&inserted());
        assert_eq!(events.listener_count(), 1);
    }
}
