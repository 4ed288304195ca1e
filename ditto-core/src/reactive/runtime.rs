//! Reactive Runtime
//!
//! The runtime connects reads to watchers and writes to re-runs.
//!
//! # How It Works
//!
//! 1. A watcher registers with the runtime and gets a [`ReactiveHandle`].
//!
//! 2. While its getter runs, every tracked read records a [`Dep`] (a target
//!    id plus the key that was read) in the reactive context. When the getter
//!    finishes, the collected deps replace the watcher's previous ones.
//!
//! 3. When a container or signal changes, it calls [`Runtime::trigger_all`]
//!    with the deps it touched. The runtime looks up every subscriber of those
//!    deps, orders them by subscriber id and either runs them immediately
//!    (`Flush::Sync`) or queues them on the thread's scheduler
//!    (`Flush::Deferred`).
//!
//! # Thread Safety
//!
//! The dependency index is global and lock-sharded (`DashMap`); the context
//! stack and the deferred queue are thread-local. No index lock is ever held
//! while a watcher runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::scheduler::Scheduler;
use super::subscriber::SubscriberId;
use super::Flush;
use crate::path::Key;

/// Identity of a reactive target (signal, container or mirror node).
pub type TargetId = u64;

/// Allocate a fresh target id.
pub fn next_target_id() -> TargetId {
    static TARGET_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
    TARGET_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// What part of a target was read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    /// The whole value of a signal.
    Value,
    /// The key set / length of a container.
    Iterate,
    /// One field or slot of a container.
    Key(Key),
}

/// A single tracked read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dep {
    target: TargetId,
    key: TrackKey,
}

impl Dep {
    pub fn new(target: TargetId, key: TrackKey) -> Self {
        Self { target, key }
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn key(&self) -> &TrackKey {
        &self.key
    }
}

/// A job the runtime can schedule when its dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// When this job should run after a trigger.
    fn flush(&self) -> Flush;

    /// Whether the job has not been stopped.
    fn is_active(&self) -> bool;

    /// Re-run the job.
    fn run(&self);

    /// Stop the job. It never runs again.
    fn dispose(&self);
}

/// Handle to a registered reactive value.
///
/// Dropping this handle unregisters the reactive value from the runtime.
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl ReactiveHandle {
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

// Maps subscriber IDs to weak references to avoid keeping jobs alive.
static REGISTRY: OnceLock<DashMap<SubscriberId, Weak<dyn Reactive>>> = OnceLock::new();
static DEP_SUBSCRIBERS: OnceLock<DashMap<Dep, SmallVec<[SubscriberId; 4]>>> = OnceLock::new();
static SUBSCRIBER_DEPS: OnceLock<DashMap<SubscriberId, Vec<Dep>>> = OnceLock::new();

fn registry() -> &'static DashMap<SubscriberId, Weak<dyn Reactive>> {
    REGISTRY.get_or_init(DashMap::new)
}

fn dep_subscribers() -> &'static DashMap<Dep, SmallVec<[SubscriberId; 4]>> {
    DEP_SUBSCRIBERS.get_or_init(DashMap::new)
}

fn subscriber_deps() -> &'static DashMap<SubscriberId, Vec<Dep>> {
    SUBSCRIBER_DEPS.get_or_init(DashMap::new)
}

impl Runtime {
    /// Register a reactive value with the runtime.
    ///
    /// Returns a handle that unregisters the value when dropped.
    pub fn register(reactive: &Arc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();
        registry().insert(id, Arc::downgrade(reactive));
        ReactiveHandle { subscriber_id: id }
    }

    fn unregister(id: SubscriberId) {
        registry().remove(&id);
        Self::clear_dependencies(id);
    }

    /// Record a read of `dep` against the running getter, if any.
    pub fn track(dep: Dep) {
        ReactiveContext::track_dependency(dep);
    }

    /// Replace a subscriber's dependencies with `deps`.
    pub fn set_dependencies(subscriber_id: SubscriberId, mut deps: Vec<Dep>) {
        Self::clear_dependencies(subscriber_id);

        let mut seen = std::collections::HashSet::with_capacity(deps.len());
        deps.retain(|dep| seen.insert(dep.clone()));

        for dep in &deps {
            dep_subscribers()
                .entry(dep.clone())
                .or_default()
                .push(subscriber_id);
        }
        subscriber_deps().insert(subscriber_id, deps);
    }

    /// Remove all dependencies for a subscriber.
    pub fn clear_dependencies(subscriber_id: SubscriberId) {
        let Some((_, deps)) = subscriber_deps().remove(&subscriber_id) else {
            return;
        };

        for dep in deps {
            dep_subscribers().remove_if_mut(&dep, |_, subs| {
                subs.retain(|s| *s != subscriber_id);
                subs.is_empty()
            });
        }
    }

    /// Number of subscribers currently depending on `dep`.
    pub fn subscriber_count(dep: &Dep) -> usize {
        dep_subscribers().get(dep).map(|subs| subs.len()).unwrap_or(0)
    }

    /// Notify every subscriber of `dep`.
    pub fn trigger(dep: Dep) {
        Self::trigger_all(&[dep]);
    }

    /// Notify every subscriber of any of `deps`.
    ///
    /// Subscribers are deduplicated and handled in creation order. Sync jobs
    /// run before this returns; deferred jobs are queued.
    pub fn trigger_all(deps: &[Dep]) {
        let mut ids: Vec<SubscriberId> = deps
            .iter()
            .filter_map(|dep| dep_subscribers().get(dep).map(|subs| subs.clone()))
            .flatten()
            .collect();

        if ids.is_empty() {
            return;
        }
        ids.sort_unstable();
        ids.dedup();

        let reactives: Vec<Arc<dyn Reactive>> = ids
            .into_iter()
            .filter_map(|id| registry().get(&id).and_then(|weak| weak.upgrade()))
            .collect();

        for reactive in reactives {
            match reactive.flush() {
                Flush::Sync => {
                    // An earlier job in this batch may have stopped it.
                    if reactive.is_active() {
                        reactive.run();
                    }
                }
                Flush::Deferred => Scheduler::queue(&reactive),
            }
        }
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }
}
