//! Watch Implementation
//!
//! A watcher runs a getter inside a tracking context, remembers the result,
//! and calls its callback with `(new, old)` whenever a dependency changes
//! and the getter's result is no longer the same.
//!
//! # How Watchers Work
//!
//! 1. On creation the getter runs once to capture the initial value and the
//!    initial dependencies. The callback does not run.
//!
//! 2. When a dependency is triggered, the runtime runs the watcher now
//!    (`Flush::Sync`) or at the next flush (`Flush::Deferred`).
//!
//! 3. Each run clears the old dependencies and tracks new ones, so a getter
//!    that reads different data over time stays subscribed to what it
//!    actually read last.
//!
//! # Cleanup
//!
//! [`WatchHandle::stop`] or dropping the handle stops the watcher: it leaves
//! the dependency index and never runs again, even if already queued.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::context::ReactiveContext;
use super::equality::SameValue;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::subscriber::SubscriberId;
use crate::source::Value;

/// When triggered watchers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flush {
    /// Inside the write that triggered them.
    Sync,
    /// At the next [`flush`](super::flush) or [`next_tick`](super::next_tick).
    #[default]
    #[serde(alias = "pre")]
    Deferred,
}

/// A getter plus a change callback, registered with the runtime.
struct Watcher<T, G, C> {
    id: SubscriberId,
    flush: Flush,
    getter: G,
    callback: C,
    /// Fire on every trigger, even if the getter result is the same.
    force: bool,
    value: Mutex<Option<T>>,
    active: AtomicBool,
    running: AtomicBool,
    run_count: AtomicUsize,
}

/// Clears the re-entrancy flag when a run ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<T, G, C> Watcher<T, G, C>
where
    T: SameValue + Clone + Send + Sync + 'static,
    G: Fn() -> T + Send + Sync + 'static,
    C: Fn(&T, &T) + Send + Sync + 'static,
{
    /// Run the getter in a reactive context and subscribe to what it read.
    fn collect(&self) -> T {
        let ctx = ReactiveContext::enter(self.id);
        let value = (self.getter)();
        let deps = ReactiveContext::take_dependencies();
        drop(ctx);

        Runtime::set_dependencies(self.id, deps);
        value
    }

    fn prime(&self) {
        let value = self.collect();
        *self.value.lock() = Some(value);
    }
}

impl<T, G, C> Reactive for Watcher<T, G, C>
where
    T: SameValue + Clone + Send + Sync + 'static,
    G: Fn() -> T + Send + Sync + 'static,
    C: Fn(&T, &T) + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn flush(&self) -> Flush {
        self.flush
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn run(&self) {
        if !self.is_active() || self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let _running = RunningGuard(&self.running);

        let new_value = self.collect();
        let old_value = {
            let mut slot = self.value.lock();
            let changed = self.force || !slot.as_ref().is_some_and(|old| old.same(&new_value));
            if !changed {
                return;
            }
            slot.replace(new_value.clone())
        };

        self.run_count.fetch_add(1, Ordering::SeqCst);
        if let Some(old_value) = old_value {
            (self.callback)(&new_value, &old_value);
        }
    }

    fn dispose(&self) {
        self.active.store(false, Ordering::SeqCst);
        Runtime::clear_dependencies(self.id);
    }
}

/// Owner of a running watcher. Dropping it stops the watcher.
pub struct WatchHandle {
    reactive: Arc<dyn Reactive>,
    run_count: Arc<dyn Fn() -> usize + Send + Sync>,
    _registration: ReactiveHandle,
}

impl WatchHandle {
    /// Get the subscriber ID of the watcher.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.reactive.subscriber_id()
    }

    /// Stop the watcher. Idempotent.
    pub fn stop(&self) {
        self.reactive.dispose();
    }

    /// Check whether the watcher is still live.
    pub fn is_active(&self) -> bool {
        self.reactive.is_active()
    }

    /// Number of times the callback has fired.
    pub fn run_count(&self) -> usize {
        (self.run_count)()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.reactive.dispose();
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("subscriber_id", &self.subscriber_id())
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .finish()
    }
}

fn spawn<T, G, C>(getter: G, callback: C, flush: Flush, force: bool) -> WatchHandle
where
    T: SameValue + Clone + Send + Sync + 'static,
    G: Fn() -> T + Send + Sync + 'static,
    C: Fn(&T, &T) + Send + Sync + 'static,
{
    let watcher = Arc::new(Watcher {
        id: SubscriberId::new(),
        flush,
        getter,
        callback,
        force,
        value: Mutex::new(None),
        active: AtomicBool::new(true),
        running: AtomicBool::new(false),
        run_count: AtomicUsize::new(0),
    });

    let reactive: Arc<dyn Reactive> = watcher.clone();
    let registration = Runtime::register(&reactive);
    watcher.prime();

    let counter = Arc::downgrade(&watcher);
    WatchHandle {
        reactive,
        run_count: Arc::new(move || {
            counter
                .upgrade()
                .map(|w| w.run_count.load(Ordering::SeqCst))
                .unwrap_or(0)
        }),
        _registration: registration,
    }
}

/// Watch the result of `getter`.
///
/// `callback(new, old)` fires when a dependency read by the getter changes
/// and the new result is not the same as the previous one.
pub fn watch<T, G, C>(getter: G, callback: C, flush: Flush) -> WatchHandle
where
    T: SameValue + Clone + Send + Sync + 'static,
    G: Fn() -> T + Send + Sync + 'static,
    C: Fn(&T, &T) + Send + Sync + 'static,
{
    spawn(getter, callback, flush, false)
}

/// Watch a value and everything nested inside it.
///
/// Every container reachable from the getter's result is tracked, and the
/// callback fires on any nested write, even when the top-level value is the
/// same container as before.
pub fn watch_deep<G, C>(getter: G, callback: C, flush: Flush) -> WatchHandle
where
    G: Fn() -> Value + Send + Sync + 'static,
    C: Fn(&Value, &Value) + Send + Sync + 'static,
{
    spawn(
        move || {
            let value = getter();
            value.traverse();
            value
        },
        callback,
        flush,
        true,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{flush, Signal};
    use crate::source::Object;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn watch_does_not_fire_on_creation() {
        let signal = Signal::new(1);
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let source = signal.clone();
        let handle = watch(
            move || source.get(),
            move |_, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            },
            Flush::Sync,
        );

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(handle.run_count(), 0);
    }

    #[test]
    fn sync_watch_fires_with_new_and_old() {
        let signal = Signal::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let source = signal.clone();
        let _handle = watch(
            move || source.get(),
            move |new: &i32, old: &i32| seen_clone.lock().push((*new, *old)),
            Flush::Sync,
        );

        signal.set(2);
        signal.set(2);
        signal.set(5);

        assert_eq!(*seen.lock(), vec![(2, 1), (5, 2)]);
    }

    #[test]
    fn deferred_watch_waits_for_flush() {
        let signal = Signal::new(0);
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let source = signal.clone();
        let _handle = watch(
            move || source.get(),
            move |_, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            },
            Flush::Deferred,
        );

        signal.set(1);
        signal.set(2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        flush();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deferred_watch_skips_round_trips() {
        let signal = Signal::new(0);
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let source = signal.clone();
        let _handle = watch(
            move || source.get(),
            move |_, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            },
            Flush::Deferred,
        );

        signal.set(1);
        signal.set(0);
        flush();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stopped_watch_does_not_fire() {
        let signal = Signal::new(0);
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let source = signal.clone();
        let handle = watch(
            move || source.get(),
            move |_, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            },
            Flush::Sync,
        );

        handle.stop();
        assert!(!handle.is_active());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_handle_stops_queued_run() {
        let signal = Signal::new(0);
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let source = signal.clone();
        let handle = watch(
            move || source.get(),
            move |_, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            },
            Flush::Deferred,
        );

        signal.set(1);
        drop(handle);
        flush();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dependencies_follow_the_last_run() {
        let toggle = Signal::new(true);
        let left = Signal::new(1);
        let right = Signal::new(10);

        let (t, l, r) = (toggle.clone(), left.clone(), right.clone());
        let _handle = watch(
            move || if t.get() { l.get() } else { r.get() },
            |_, _| {},
            Flush::Sync,
        );

        assert_eq!(left.subscriber_count(), 1);
        assert_eq!(right.subscriber_count(), 0);

        toggle.set(false);
        assert_eq!(left.subscriber_count(), 0);
        assert_eq!(right.subscriber_count(), 1);
    }

    #[test]
    fn deep_watch_sees_nested_writes() {
        let inner = Object::new();
        inner.insert("count", 1);
        let outer = Object::new();
        outer.insert("inner", inner.clone());
        let signal = Signal::new(Value::from(outer));

        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let source = signal.clone();
        let _handle = watch_deep(
            move || source.get(),
            move |_, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            },
            Flush::Sync,
        );

        inner.insert("count", 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        inner.insert("count", 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shallow_value_watch_ignores_nested_writes() {
        let inner = Object::new();
        let outer = Object::new();
        outer.insert("inner", inner.clone());
        let signal = Signal::new(Value::from(outer));

        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let source = signal.clone();
        let _handle = watch(
            move || source.get(),
            move |_, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            },
            Flush::Sync,
        );

        inner.insert("count", 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn flush_config_parses() {
        let sync: Flush = serde_json::from_str("\"sync\"").unwrap();
        let deferred: Flush = serde_json::from_str("\"deferred\"").unwrap();
        let pre: Flush = serde_json::from_str("\"pre\"").unwrap();

        assert_eq!(sync, Flush::Sync);
        assert_eq!(deferred, Flush::Deferred);
        assert_eq!(pre, Flush::Deferred);
        assert_eq!(Flush::default(), Flush::Deferred);
    }
}
