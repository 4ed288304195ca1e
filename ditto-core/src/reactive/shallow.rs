//! Shallow Watch
//!
//! A shallow watch fires when a cell's *own* children change: a key added,
//! removed or reassigned, a slot filled or emptied, the length changed, or
//! the cell replaced outright. Writes further down the tree do not reach it.
//!
//! It works by watching a [`Snapshot`]: a fresh copy of the node's direct
//! children taken on every run. Taking the snapshot reads (and so tracks)
//! exactly one level; comparing snapshots element by element with
//! [`SameValue`] decides whether the callback fires.

use super::equality::SameValue;
use super::watch::{watch, Flush, WatchHandle};
use crate::source::{SourceCell, Value};

/// A one-level copy of a value.
#[derive(Debug, Clone)]
pub enum Snapshot {
    /// Own key/value pairs of an object, in key order.
    Keyed(Vec<(String, Value)>),
    /// Slots of an array. `None` is a hole.
    Items(Vec<Option<Value>>),
    /// A primitive.
    Leaf(Value),
}

impl Snapshot {
    /// Take a tracked snapshot of `value`.
    pub fn capture(value: &Value) -> Self {
        match value {
            Value::Object(object) => Snapshot::Keyed(object.entries()),
            Value::Array(array) => Snapshot::Items(array.items()),
            other => Snapshot::Leaf(other.clone()),
        }
    }
}

impl SameValue for Snapshot {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Snapshot::Keyed(a), Snapshot::Keyed(b)) => a.same(b),
            (Snapshot::Items(a), Snapshot::Items(b)) => a.same(b),
            (Snapshot::Leaf(a), Snapshot::Leaf(b)) => a.same(b),
            _ => false,
        }
    }
}

/// Watch the direct children of `cell`.
pub fn watch_shallow<C>(cell: SourceCell, callback: C, flush: Flush) -> WatchHandle
where
    C: Fn(&Snapshot, &Snapshot) + Send + Sync + 'static,
{
    watch(move || Snapshot::capture(&cell.get()), callback, flush)
}
