//! Listener lists with handle-based unsubscription.
//!
//! Every `attach`/`on_*` method in the engine returns a [`Subscription`].
//! Dropping the handle removes the listener; [`Subscription::detach`] keeps
//! it registered for as long as its source lives.

use std::sync::{Arc, Mutex};

use crate::sync::lock;

/// Handle keeping a listener registered.
#[must_use = "dropping a subscription immediately removes the listener"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription that owns nothing.
    pub fn empty() -> Self {
        Self { release: None }
    }

    /// Keep the listener registered for the lifetime of its source.
    pub fn detach(mut self) {
        self.release = None;
    }

    /// Combine several handles into one that releases them all.
    pub fn combine(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || drop(subscriptions))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

struct Registry<L: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, Arc<L>)>,
}

/// Ordered list of listeners of type `L` (usually a `dyn Fn(..)`).
///
/// Listeners are snapshotted under the lock and invoked outside it, so a
/// listener may subscribe or unsubscribe without deadlocking.
pub struct Listeners<L: ?Sized> {
    inner: Arc<Mutex<Registry<L>>>,
}

impl<L: ?Sized> Clone for Listeners<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: ?Sized> Default for Listeners<L> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<L: ?Sized + Send + Sync + 'static> Listeners<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener; it is removed when the returned handle drops.
    pub fn add(&self, listener: Arc<L>) -> Subscription {
        let id = {
            let mut registry = lock(&self.inner);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, listener));
            id
        };
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Current listeners in registration order.
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        lock(&self.inner)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
