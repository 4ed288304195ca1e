//! Reactive Primitives
//!
//! This module implements the reactive layer the mirror is built on:
//! signals, watchers and the scheduler that decides when watchers run.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a container for a value. Reading it inside a watcher
//! getter subscribes the watcher; replacing the value with one that is not
//! the [same](SameValue) notifies every subscriber.
//!
//! Source containers ([`Object`](crate::source::Object) and
//! [`Array`](crate::source::Array)) take part in the same tracking at the
//! granularity of single keys, slots and key sets.
//!
//! ## Watchers
//!
//! A watcher pairs a getter with a callback. [`watch`] fires when the getter
//! result changes, [`watch_deep`] on any nested write, [`watch_shallow`] when
//! a cell's direct children change.
//!
//! ## Flush timing
//!
//! Watchers created with [`Flush::Sync`] run inside the write that
//! triggered them. [`Flush::Deferred`] watchers are queued per thread and run
//! on [`flush`] or [`next_tick`], in creation order.
//!
//! # Implementation Notes
//!
//! Dependencies are tracked automatically: the running getter sits on a
//! thread-local context stack, and every tracked read records itself there.

mod context;
mod equality;
mod runtime;
mod scheduler;
mod shallow;
mod signal;
mod subscriber;
mod watch;

pub use context::ReactiveContext;
pub use equality::{same_number, SameValue};
pub use runtime::{next_target_id, Dep, Reactive, ReactiveHandle, Runtime, TargetId, TrackKey};
pub use scheduler::{flush, next_tick, Scheduler};
pub use shallow::{watch_shallow, Snapshot};
pub use signal::Signal;
pub use subscriber::SubscriberId;
pub use watch::{watch, watch_deep, Flush, WatchHandle};
