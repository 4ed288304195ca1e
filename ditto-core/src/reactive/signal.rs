//! Signal Implementation
//!
//! A Signal is the root reactive cell. It holds a value and notifies the
//! watchers that read it when the value is replaced.
//!
//! # How Signals Work
//!
//! 1. Reading a signal inside a watcher getter subscribes that watcher.
//!
//! 2. Setting a signal to a value that is not the [same](SameValue) as the
//!    current one triggers its subscribers. Setting an equal primitive or the
//!    same container is a no-op.
//!
//! Clones share the value and the identity.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::equality::SameValue;
use super::runtime::{next_target_id, Dep, Runtime, TargetId, TrackKey};

/// A reactive cell holding a value of type `T`.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: SameValue + Clone + Send + Sync + 'static,
{
    /// Unique identifier for this signal.
    id: TargetId,

    /// The current value.
    value: Arc<RwLock<T>>,
}

impl<T> Signal<T>
where
    T: SameValue + Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: next_target_id(),
            value: Arc::new(RwLock::new(value)),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> TargetId {
        self.id
    }

    fn dep(&self) -> Dep {
        Dep::new(self.id, TrackKey::Value)
    }

    /// Get the current value, subscribing the running watcher if any.
    pub fn get(&self) -> T {
        Runtime::track(self.dep());
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value. Returns whether subscribers were notified.
    pub fn set(&self, value: T) -> bool {
        let changed = {
            let mut guard = self.value.write();
            if guard.same(&value) {
                false
            } else {
                *guard = value;
                true
            }
        };

        if changed {
            Runtime::trigger(self.dep());
        }
        changed
    }

    /// Update the value using a function.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.value.read();
            f(&guard)
        };
        self.set(new_value)
    }

    /// Get the number of watchers subscribed to this signal.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(&self.dep())
    }
}

impl<T> Clone for Signal<T>
where
    T: SameValue + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: SameValue + Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
