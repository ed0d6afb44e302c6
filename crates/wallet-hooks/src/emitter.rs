//! Listener registry owned by a single controller.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

/// Notifies registered listeners in subscription order.
#[derive(Clone, Default)]
pub struct Emitter {
    listeners: Arc<Mutex<Listeners>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.insert(id, Arc::new(listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn emit(&self) {
        // Listeners run without the lock held so they may subscribe,
        // unsubscribe or read state. One removed mid-emit is skipped.
        let snapshot: Vec<(u64, Listener)> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();
        for (id, listener) in snapshot {
            if self.listeners.lock().entries.contains_key(&id) {
                listener();
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }
}

/// Handle returned by [`Emitter::subscribe`]. The listener is removed when
/// the handle is dropped or [`Subscription::unsubscribe`] is called.
#[must_use = "dropping a Subscription removes its listener"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().entries.remove(&self.id);
        }
    }
}
