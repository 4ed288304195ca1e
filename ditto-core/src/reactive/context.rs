//! Reactive Context
//!
//! The reactive context tracks which watcher getter is currently running.
//! When a signal or container is read, the read is recorded against the
//! innermost context so the runtime can subscribe that watcher to it.
//!
//! # Implementation
//!
//! We use a thread-local stack. Entering a context pushes an entry and
//! returns a guard; dropping the guard pops it. Nested contexts happen when a
//! watcher is created from inside another watcher's getter.

use std::cell::RefCell;

use super::runtime::Dep;
use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The subscriber whose getter is running.
    subscriber_id: SubscriberId,
    /// Dependencies read so far, in read order.
    dependencies: Vec<Dep>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the getter panics.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                dependencies: Vec::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.subscriber_id))
    }

    /// Record a dependency for the innermost context. No-op outside a context.
    pub fn track_dependency(dep: Dep) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                entry.dependencies.push(dep);
            }
        });
    }

    /// Take the dependencies collected so far in the innermost context.
    pub fn take_dependencies() -> Vec<Dep> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}
