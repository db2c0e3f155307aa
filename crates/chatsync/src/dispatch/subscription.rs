//! Observer lists with disposer handles

use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Callback<T> = Box<dyn FnMut(&T) + Send>;

struct Registry<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
    /// Ids unsubscribed while their callback was checked out for notify
    cancelled: Vec<u64>,
}

fn lock<T>(registry: &Mutex<Registry<T>>) -> MutexGuard<'_, Registry<T>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A list of callbacks notified with a `&T`
///
/// Callbacks may subscribe or drop subscriptions on the same list while
/// being notified; new callbacks are first called on the next notify.
pub struct Observers<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T: 'static> Observers<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
                cancelled: Vec::new(),
            })),
        }
    }

    /// Register a callback; it stays registered until the handle drops
    pub fn subscribe(&self, callback: impl FnMut(&T) + Send + 'static) -> Subscription {
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, Box::new(callback)));
            id
        };

        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                let mut registry = lock(&registry);
                let before = registry.entries.len();
                registry.entries.retain(|(entry_id, _)| *entry_id != id);
                if registry.entries.len() == before {
                    registry.cancelled.push(id);
                }
            }
        })
    }

    pub fn notify(&self, value: &T) {
        let mut entries = std::mem::take(&mut lock(&self.registry).entries);

        for (_, callback) in entries.iter_mut() {
            callback(value);
        }

        let mut registry = lock(&self.registry);
        let cancelled = std::mem::take(&mut registry.cancelled);
        entries.retain(|(id, _)| !cancelled.contains(id));
        entries.append(&mut registry.entries);
        registry.entries = entries;
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).entries.len()
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

/// Disposer returned by every `subscribe` call
///
/// Dropping it unregisters the callback.
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keep the callback registered for the lifetime of the observer list
    pub fn detach(mut self) {
        self.dispose = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.dispose.is_some())
            .finish()
    }
}
