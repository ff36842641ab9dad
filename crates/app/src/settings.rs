//! Push-on-change settings handles.

use std::sync::{Arc, Mutex};

use crate::subscription::{Listeners, Subscription};
use crate::sync::lock;

type ChangeListener<T> = dyn Fn(&T, &T) + Send + Sync;

struct SettingsInner<T> {
    value: Mutex<T>,
    listeners: Listeners<ChangeListener<T>>,
}

/// Shared, observable settings value.
///
/// Clones share the same value. Listeners registered with
/// [`Settings::on_changed`] receive `(old, new)` after every update that
/// actually changed something.
pub struct Settings<T> {
    inner: Arc<SettingsInner<T>>,
}

impl<T> Clone for Settings<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default + Clone + PartialEq + Send + Sync + 'static> Default for Settings<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Settings<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SettingsInner {
                value: Mutex::new(value),
                listeners: Listeners::new(),
            }),
        }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        lock(&self.inner.value).clone()
    }

    /// Modify the value in place and notify listeners if it changed.
    pub fn update(&self, modify: impl FnOnce(&mut T)) {
        let (old, new) = {
            let mut value = lock(&self.inner.value);
            let old = value.clone();
            modify(&mut value);
            (old, value.clone())
        };
        if old != new {
            for listener in self.inner.listeners.snapshot() {
                listener(&old, &new);
            }
        }
    }

    pub fn replace(&self, value: T) {
        self.update(|current| *current = value);
    }

    pub fn on_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        self.inner.listeners.add(Arc::new(listener))
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Settings<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Settings")
            .field(&*lock(&self.inner.value))
            .finish()
    }
}
