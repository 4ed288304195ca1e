//! Reactive arrays.
//!
//! Arrays may be sparse: a slot is either populated or a hole. Reads of a
//! slot track that index; reads of the length or the whole slot list track
//! the array's key set. Every structural write notifies the key set plus
//! each index whose slot it touched.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Value;
use crate::path::Key;
use crate::reactive::{next_target_id, Dep, Runtime, SameValue, TargetId, TrackKey};

struct ArrayInner {
    id: TargetId,
    items: RwLock<Vec<Option<Value>>>,
}

/// A shared, possibly sparse list of values.
#[derive(Clone)]
pub struct Array(Arc<ArrayInner>);

impl Array {
    pub fn new() -> Self {
        Self::from_slots(Vec::new())
    }

    /// An array of `len` holes.
    pub fn with_len(len: usize) -> Self {
        Self::from_slots(vec![None; len])
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self::from_slots(values.into_iter().map(Some).collect())
    }

    /// Build an array from raw slots, `None` being a hole.
    pub fn from_slots(slots: Vec<Option<Value>>) -> Self {
        Self(Arc::new(ArrayInner {
            id: next_target_id(),
            items: RwLock::new(slots),
        }))
    }

    pub fn target_id(&self) -> TargetId {
        self.0.id
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn index_dep(&self, index: usize) -> Dep {
        Dep::new(self.0.id, TrackKey::Key(Key::Index(index)))
    }

    fn iterate_dep(&self) -> Dep {
        Dep::new(self.0.id, TrackKey::Iterate)
    }

    /// Notify the key set and every index in `range`.
    fn notify(&self, range: std::ops::Range<usize>) {
        let mut deps: Vec<Dep> = range.map(|i| self.index_dep(i)).collect();
        deps.push(self.iterate_dep());
        Runtime::trigger_all(&deps);
    }

    /// Read slot `index`. Holes and out-of-range indices read as `None`.
    pub fn get(&self, index: usize) -> Option<Value> {
        Runtime::track(self.index_dep(index));
        self.get_untracked(index)
    }

    pub fn get_untracked(&self, index: usize) -> Option<Value> {
        self.0.items.read().get(index).cloned().flatten()
    }

    /// Whether slot `index` is populated.
    pub fn has_index(&self, index: usize) -> bool {
        Runtime::track(self.index_dep(index));
        matches!(self.0.items.read().get(index), Some(Some(_)))
    }

    pub fn len(&self) -> usize {
        Runtime::track(self.iterate_dep());
        self.len_untracked()
    }

    pub fn len_untracked(&self) -> usize {
        self.0.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of every slot, holes included.
    pub fn items(&self) -> Vec<Option<Value>> {
        Runtime::track(self.iterate_dep());
        self.items_untracked()
    }

    pub fn items_untracked(&self) -> Vec<Option<Value>> {
        self.0.items.read().clone()
    }

    /// Assign slot `index`, growing the array with holes if needed.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Option<Value> {
        let value = value.into();
        let (previous, old_len) = {
            let mut items = self.0.items.write();
            let old_len = items.len();
            if index >= old_len {
                items.resize(index + 1, None);
            }
            (items[index].replace(value.clone()), old_len)
        };

        let unchanged = previous.as_ref().is_some_and(|old| old.same(&value));
        if !unchanged {
            self.notify(index.min(old_len)..index + 1);
        }
        previous
    }

    /// Empty slot `index` without shifting, leaving a hole.
    pub fn delete(&self, index: usize) -> Option<Value> {
        let removed = self
            .0
            .items
            .write()
            .get_mut(index)
            .and_then(Option::take);
        if removed.is_some() {
            self.notify(index..index + 1);
        }
        removed
    }

    /// Append a value, returning the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let len = {
            let mut items = self.0.items.write();
            items.push(Some(value.into()));
            items.len()
        };
        self.notify(len - 1..len);
        len
    }

    /// Remove the last slot.
    pub fn pop(&self) -> Option<Value> {
        let (popped, len) = {
            let mut items = self.0.items.write();
            let popped = items.pop();
            (popped, items.len())
        };
        let slot = popped?;
        self.notify(len..len + 1);
        slot
    }

    /// Insert at `index`, shifting later slots up.
    pub fn insert_at(&self, index: usize, value: impl Into<Value>) {
        let len = {
            let mut items = self.0.items.write();
            let index = index.min(items.len());
            items.insert(index, Some(value.into()));
            items.len()
        };
        self.notify(index.min(len - 1)..len);
    }

    /// Remove slot `index`, shifting later slots down.
    pub fn remove_at(&self, index: usize) -> Option<Value> {
        let (removed, old_len) = {
            let mut items = self.0.items.write();
            let old_len = items.len();
            if index >= old_len {
                return None;
            }
            (items.remove(index), old_len)
        };
        self.notify(index..old_len);
        removed
    }

    /// Prepend a value.
    pub fn unshift(&self, value: impl Into<Value>) {
        self.insert_at(0, value);
    }

    /// Remove the first slot.
    pub fn shift(&self) -> Option<Value> {
        self.remove_at(0)
    }

    /// Truncate, or extend with holes.
    pub fn set_len(&self, len: usize) {
        let old_len = {
            let mut items = self.0.items.write();
            let old_len = items.len();
            items.resize(len, None);
            old_len
        };
        if old_len != len {
            self.notify(old_len.min(len)..old_len.max(len));
        }
    }

    pub fn reverse(&self) {
        let len = {
            let mut items = self.0.items.write();
            items.reverse();
            items.len()
        };
        if len > 1 {
            self.notify(0..len);
        }
    }

    /// Sort populated slots with `compare`. Holes move to the end.
    pub fn sort_by<F>(&self, mut compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let len = {
            let mut items = self.0.items.write();
            items.sort_by(|a, b| match (a, b) {
                (Some(a), Some(b)) => compare(a, b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
            items.len()
        };
        if len > 1 {
            self.notify(0..len);
        }
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::from_values(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items_untracked()).finish()
    }
}
