//! Reactive keyed objects.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::Value;
use crate::path::Key;
use crate::reactive::{next_target_id, Dep, Runtime, SameValue, TargetId, TrackKey};

struct ObjectInner {
    id: TargetId,
    entries: RwLock<IndexMap<String, Value>>,
}

/// A shared, insertion-ordered map of fields.
///
/// Clones are the same object: writes through one are seen (and observed)
/// through all of them.
#[derive(Clone)]
pub struct Object(Arc<ObjectInner>);

impl Object {
    pub fn new() -> Self {
        Self(Arc::new(ObjectInner {
            id: next_target_id(),
            entries: RwLock::new(IndexMap::new()),
        }))
    }

    pub fn target_id(&self) -> TargetId {
        self.0.id
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn key_dep(&self, key: &str) -> Dep {
        Dep::new(self.0.id, TrackKey::Key(Key::Name(key.to_owned())))
    }

    fn iterate_dep(&self) -> Dep {
        Dep::new(self.0.id, TrackKey::Iterate)
    }

    /// Read a field.
    pub fn get(&self, key: &str) -> Option<Value> {
        Runtime::track(self.key_dep(key));
        self.get_untracked(key)
    }

    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        self.0.entries.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        Runtime::track(self.key_dep(key));
        self.contains_key_untracked(key)
    }

    pub fn contains_key_untracked(&self, key: &str) -> bool {
        self.0.entries.read().contains_key(key)
    }

    /// Own keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        Runtime::track(self.iterate_dep());
        self.keys_untracked()
    }

    pub fn keys_untracked(&self) -> Vec<String> {
        self.0.entries.read().keys().cloned().collect()
    }

    /// Own key/value pairs. Tracks the key set and every key.
    pub fn entries(&self) -> Vec<(String, Value)> {
        let entries = self.entries_untracked();
        Runtime::track(self.iterate_dep());
        for (key, _) in &entries {
            Runtime::track(self.key_dep(key));
        }
        entries
    }

    pub fn entries_untracked(&self) -> Vec<(String, Value)> {
        self.0
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        Runtime::track(self.iterate_dep());
        self.0.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set a field, returning the previous value.
    ///
    /// Watchers are only notified when the key is new or the value is not
    /// the same as before.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();

        let previous = self.0.entries.write().insert(key.clone(), value.clone());

        match &previous {
            None => Runtime::trigger_all(&[self.key_dep(&key), self.iterate_dep()]),
            Some(old) if !old.same(&value) => Runtime::trigger(self.key_dep(&key)),
            Some(_) => {}
        }
        previous
    }

    /// Delete a field, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.0.entries.write().shift_remove(key);
        if removed.is_some() {
            Runtime::trigger_all(&[self.key_dep(key), self.iterate_dep()]);
        }
        removed
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for Object
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self(Arc::new(ObjectInner {
            id: next_target_id(),
            entries: RwLock::new(entries),
        }))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries_untracked()).finish()
    }
}
