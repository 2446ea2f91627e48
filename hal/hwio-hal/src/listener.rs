//! Change listeners
//!
//! Instances that report changes keep their callbacks in a [`Listeners`]
//! list. Callbacks run on the thread that caused the change, after the
//! instance's own locks are released, so a callback may read the instance
//! or register further listeners.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Handle returned on registration, used to remove the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ListenerId(u64);

/// Registered callbacks of one kind
pub struct Listeners<F: ?Sized> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Arc<F>)>>,
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<F: ?Sized> Listeners<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<F>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, listener));
        id
    }

    /// Remove a listener; false if it was not registered
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Current listeners in registration order
    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    /// Call every listener with `event`
    pub fn notify<E: Copy>(&self, event: E)
    where
        F: Fn(E),
    {
        for listener in self.snapshot() {
            listener(event);
        }
    }
}

impl<F: ?Sized> fmt::Debug for Listeners<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Counter = dyn Fn(u32) + Send + Sync;

    #[test]
    fn test_notify_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let listeners: Listeners<Counter> = Listeners::new();
        for tag in [1, 2] {
            let seen = Arc::clone(&seen);
            listeners.add(Arc::new(move |n: u32| seen.lock().push(tag * 100 + n)));
        }

        listeners.notify(7);
        assert_eq!(*seen.lock(), vec![107, 207]);
    }

    #[test]
    fn test_remove_and_clear() {
        let listeners: Listeners<Counter> = Listeners::new();
        let a = listeners.add(Arc::new(|_: u32| {}));
        let b = listeners.add(Arc::new(|_: u32| {}));
        assert_ne!(a, b);
        assert!(listeners.remove(a));
        assert!(!listeners.remove(a));
        assert_eq!(listeners.len(), 1);
        listeners.clear();
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_listener_may_register_another() {
        let listeners: Arc<Listeners<Counter>> = Arc::new(Listeners::new());
        let inner = Arc::clone(&listeners);
        listeners.add(Arc::new(move |_: u32| {
            inner.add(Arc::new(|_: u32| {}));
        }));

        listeners.notify(1);
        assert_eq!(listeners.len(), 2);
    }
}
