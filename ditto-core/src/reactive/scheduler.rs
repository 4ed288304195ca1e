//! Update Scheduler
//!
//! The scheduler holds deferred jobs until the next flush and decides the
//! order in which they run.
//!
//! # Algorithm
//!
//! 1. A trigger queues each deferred subscriber once, keyed by its
//!    [`SubscriberId`].
//! 2. A flush repeatedly takes the pending job with the *smallest* id and
//!    runs it, so jobs created earlier run first. For the mirror this means
//!    parents before children, and a node's removal job before its
//!    replacement job before its addition job.
//! 3. Jobs queued while flushing are picked up by the same flush.
//! 4. Jobs that were stopped or dropped after being queued are skipped.
//!
//! The queue is thread-local: the reactive model is single-threaded and
//! each thread flushes only its own work.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use super::runtime::Reactive;
use super::subscriber::SubscriberId;

thread_local! {
    static PENDING: RefCell<BTreeMap<SubscriberId, Weak<dyn Reactive>>> =
        const { RefCell::new(BTreeMap::new()) };
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
}

/// Resets the flushing flag even if a job panics.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        FLUSHING.with(|flag| flag.set(false));
    }
}

/// The per-thread deferred job queue.
pub struct Scheduler;

impl Scheduler {
    /// Queue a job for the next flush. Queuing twice is a no-op.
    pub fn queue(reactive: &Arc<dyn Reactive>) {
        PENDING.with(|pending| {
            pending
                .borrow_mut()
                .entry(reactive.subscriber_id())
                .or_insert_with(|| Arc::downgrade(reactive));
        });
    }

    /// Number of jobs waiting for a flush.
    pub fn pending() -> usize {
        PENDING.with(|pending| pending.borrow().len())
    }

    /// Run every pending job in creation order.
    ///
    /// Returns the number of jobs that ran. Calling this from inside a job is
    /// a no-op; the outer flush drains whatever gets queued.
    pub fn flush() -> usize {
        if FLUSHING.with(|flag| flag.replace(true)) {
            return 0;
        }
        let _guard = FlushGuard;

        let mut ran = 0;
        loop {
            let next = PENDING.with(|pending| pending.borrow_mut().pop_first());
            let Some((_, job)) = next else {
                break;
            };
            let Some(job) = job.upgrade() else {
                continue;
            };
            if job.is_active() {
                job.run();
                ran += 1;
            }
        }

        if ran > 0 {
            tracing::trace!(jobs = ran, "flushed deferred watchers");
        }
        ran
    }
}

/// Run every pending deferred job on this thread.
pub fn flush() -> usize {
    Scheduler::flush()
}

/// Yield to the async runtime once, then flush deferred jobs.
///
/// Use with a current-thread runtime: the queue belongs to the thread that
/// performed the writes.
pub async fn next_tick() {
    tokio::task::yield_now().await;
    Scheduler::flush();
}
