//! Subscriber identifiers for the reactive system.
//!
//! Every watcher gets a [`SubscriberId`] when it is created. Ids are handed
//! out in increasing order, and the scheduler runs pending watchers in id
//! order, so "created earlier" always means "runs earlier" within a flush.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique, creation-ordered identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn subscriber_ids_follow_creation_order() {
        let first = SubscriberId::new();
        let second = SubscriberId::new();

        assert!(first < second);
        assert!(first.raw() < second.raw());
    }
}
