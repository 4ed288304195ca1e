//! Mirror Nodes
//!
//! A [`MirrorNode`] is one node of the shadow tree. It is either keyed
//! (mirroring an object or a primitive) or a list (mirroring an array), and
//! holds two kinds of fields:
//!
//! - child nodes, managed by the reconciler, one per source key or slot;
//! - annotations, arbitrary JSON set by callers (usually from lifecycle
//!   hooks).
//!
//! The node's [`Meta`] lives beside the fields and never shows up in
//! [`MirrorNode::keys`] or in serialized output.
//!
//! Reads are tracked like source reads, so watchers can observe a mirror
//! node the same way they observe the source.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::{MirrorError, Result};
use crate::path::{Key, Path, PathTarget};
use crate::reactive::{next_target_id, Dep, Runtime, SameValue, TargetId, TrackKey};
use crate::source::Value;

/// Whether a node mirrors an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Keyed,
    List,
}

impl Shape {
    /// The shape a node mirroring `value` must have.
    pub fn of(value: &Value) -> Shape {
        if value.is_array() {
            Shape::List
        } else {
            Shape::Keyed
        }
    }
}

/// Hidden metadata of a mirror node.
#[derive(Debug, Clone)]
pub struct Meta {
    /// Location of the node in the tree.
    pub path: Path,
    /// The source value the node was last synchronized from.
    pub model: Value,
    /// The source object's numeric `id` field.
    pub id: Option<f64>,
}

impl Meta {
    pub fn new(path: Path, model: Value) -> Self {
        let id = model.id();
        Self { path, model, id }
    }
}

#[derive(Clone)]
enum Field {
    Node(MirrorNode),
    Annotation { value: serde_json::Value, sealed: bool },
}

struct NodeState {
    shape: Shape,
    fields: IndexMap<String, Field>,
    items: Vec<Option<MirrorNode>>,
}

struct NodeInner {
    target: TargetId,
    meta: RwLock<Meta>,
    state: RwLock<NodeState>,
}

/// Where a key lands on a node.
enum Slot {
    Item(usize),
    Field(String),
}

/// A node of the shadow tree. Clones share the node.
#[derive(Clone)]
pub struct MirrorNode(Arc<NodeInner>);

impl MirrorNode {
    pub(crate) fn new(shape: Shape, meta: Meta) -> Self {
        Self(Arc::new(NodeInner {
            target: next_target_id(),
            meta: RwLock::new(meta),
            state: RwLock::new(NodeState {
                shape,
                fields: IndexMap::new(),
                items: Vec::new(),
            }),
        }))
    }

    pub fn target_id(&self) -> TargetId {
        self.0.target
    }

    pub fn ptr_eq(&self, other: &MirrorNode) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn shape(&self) -> Shape {
        self.0.state.read().shape
    }

    pub fn is_list(&self) -> bool {
        self.shape() == Shape::List
    }

    pub fn meta(&self) -> Meta {
        self.0.meta.read().clone()
    }

    pub fn path(&self) -> Path {
        self.0.meta.read().path.clone()
    }

    pub fn model(&self) -> Value {
        self.0.meta.read().model.clone()
    }

    pub fn id(&self) -> Option<f64> {
        self.0.meta.read().id
    }

    /// Refresh the model and the id derived from it.
    pub(crate) fn set_model(&self, model: Value) {
        let mut meta = self.0.meta.write();
        meta.id = model.id();
        meta.model = model;
    }

    fn slot(shape: Shape, key: &Key) -> Slot {
        match (shape, key.as_index()) {
            (Shape::List, Some(index)) => Slot::Item(index),
            _ => Slot::Field(key.as_name().into_owned()),
        }
    }

    fn dep(&self, key: Key) -> Dep {
        Dep::new(self.0.target, TrackKey::Key(key))
    }

    fn iterate_dep(&self) -> Dep {
        Dep::new(self.0.target, TrackKey::Iterate)
    }

    fn slot_dep(&self, slot: &Slot) -> Dep {
        match slot {
            Slot::Item(index) => self.dep(Key::Index(*index)),
            Slot::Field(name) => self.dep(Key::Name(name.clone())),
        }
    }

    /// The child node under `key`.
    pub fn child(&self, key: impl Into<Key>) -> Option<MirrorNode> {
        let key = key.into();
        Runtime::track(self.slot_dep(&Self::slot(self.shape(), &key)));
        self.child_untracked(&key)
    }

    pub fn child_untracked(&self, key: &Key) -> Option<MirrorNode> {
        let state = self.0.state.read();
        match Self::slot(state.shape, key) {
            Slot::Item(index) => state.items.get(index).cloned().flatten(),
            Slot::Field(name) => match state.fields.get(&name) {
                Some(Field::Node(node)) => Some(node.clone()),
                _ => None,
            },
        }
    }

    /// Own keys: populated list slots first, then named fields.
    pub fn keys(&self) -> Vec<Key> {
        Runtime::track(self.iterate_dep());
        self.keys_untracked()
    }

    pub fn keys_untracked(&self) -> Vec<Key> {
        let state = self.0.state.read();
        let items = state
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_some())
            .map(|(index, _)| Key::Index(index));
        let fields = state.fields.keys().map(|name| Key::Name(name.clone()));
        items.chain(fields).collect()
    }

    /// List slots, holes included. Empty for keyed nodes.
    pub fn items(&self) -> Vec<Option<MirrorNode>> {
        Runtime::track(self.iterate_dep());
        self.items_untracked()
    }

    pub fn items_untracked(&self) -> Vec<Option<MirrorNode>> {
        self.0.state.read().items.clone()
    }

    /// List length, or the number of fields of a keyed node.
    pub fn len(&self) -> usize {
        Runtime::track(self.iterate_dep());
        let state = self.0.state.read();
        match state.shape {
            Shape::List => state.items.len(),
            Shape::Keyed => state.fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        Runtime::track(self.slot_dep(&Self::slot(self.shape(), &key)));
        self.contains_key_untracked(&key)
    }

    pub fn contains_key_untracked(&self, key: &Key) -> bool {
        let state = self.0.state.read();
        match Self::slot(state.shape, key) {
            Slot::Item(index) => matches!(state.items.get(index), Some(Some(_))),
            Slot::Field(name) => state.fields.contains_key(&name),
        }
    }

    /// Read an annotation.
    pub fn annotation(&self, name: &str) -> Option<serde_json::Value> {
        Runtime::track(self.dep(Key::Name(name.to_owned())));
        match self.0.state.read().fields.get(name) {
            Some(Field::Annotation { value, .. }) => Some(value.clone()),
            _ => None,
        }
    }

    /// Set an annotation, replacing whatever field had that name.
    ///
    /// A sealed annotation keeps its seal.
    pub fn annotate(&self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.update_annotation(name, |slot| *slot = value.into());
    }

    /// Modify an annotation in place. A missing one starts out as `null`.
    pub fn update_annotation<F>(&self, name: impl Into<String>, f: F)
    where
        F: FnOnce(&mut serde_json::Value),
    {
        let name = name.into();
        let mut value = match self.0.state.read().fields.get(&name) {
            Some(Field::Annotation { value, .. }) => value.clone(),
            _ => serde_json::Value::Null,
        };
        // No lock is held here, so `f` may read this node.
        f(&mut value);

        let is_new = {
            let mut state = self.0.state.write();
            let sealed = matches!(
                state.fields.get(&name),
                Some(Field::Annotation { sealed: true, .. })
            );
            state
                .fields
                .insert(name.clone(), Field::Annotation { value, sealed })
                .is_none()
        };

        let key = self.dep(Key::Name(name));
        if is_new {
            Runtime::trigger_all(&[key, self.iterate_dep()]);
        } else {
            Runtime::trigger(key);
        }
    }

    /// Protect an annotation from deletion. Returns false if there is no
    /// annotation by that name.
    pub fn seal_annotation(&self, name: &str) -> bool {
        match self.0.state.write().fields.get_mut(name) {
            Some(Field::Annotation { sealed, .. }) => {
                *sealed = true;
                true
            }
            _ => false,
        }
    }

    /// Delete the field or slot under `key`. List slots become holes.
    ///
    /// Returns whether anything was removed, or [`MirrorError::Sealed`] for
    /// a sealed annotation.
    pub fn delete(&self, key: &Key) -> Result<bool> {
        let slot = {
            let mut state = self.0.state.write();
            let slot = Self::slot(state.shape, key);
            let removed = match &slot {
                Slot::Item(index) => state.items.get_mut(*index).and_then(Option::take).is_some(),
                Slot::Field(name) => {
                    if let Some(Field::Annotation { sealed: true, .. }) = state.fields.get(name) {
                        return Err(MirrorError::Sealed { key: name.clone() });
                    }
                    state.fields.shift_remove(name).is_some()
                }
            };
            if !removed {
                return Ok(false);
            }
            slot
        };

        Runtime::trigger_all(&[self.slot_dep(&slot), self.iterate_dep()]);
        Ok(true)
    }

    /// Place a child node under `key`, growing a list with holes if needed.
    pub(crate) fn insert_child(&self, key: Key, child: MirrorNode) -> Result<()> {
        let (slot, grew) = {
            let mut state = self.0.state.write();
            let slot = Self::slot(state.shape, &key);
            let grew = match &slot {
                Slot::Item(index) => {
                    let grew = *index >= state.items.len();
                    if grew {
                        state.items.resize(index + 1, None);
                    }
                    let fresh = state.items[*index].is_none();
                    state.items[*index] = Some(child);
                    grew || fresh
                }
                Slot::Field(name) => {
                    if let Some(Field::Annotation { sealed: true, .. }) = state.fields.get(name) {
                        return Err(MirrorError::Sealed { key: name.clone() });
                    }
                    state
                        .fields
                        .insert(name.clone(), Field::Node(child))
                        .is_none()
                }
            };
            (slot, grew)
        };

        if grew {
            Runtime::trigger_all(&[self.slot_dep(&slot), self.iterate_dep()]);
        } else {
            Runtime::trigger(self.slot_dep(&slot));
        }
        Ok(())
    }

    /// Set the list length. Returns the populated indices cut off.
    pub(crate) fn resize(&self, len: usize) -> Vec<usize> {
        let (old_len, truncated) = {
            let mut state = self.0.state.write();
            let old_len = state.items.len();
            let truncated: Vec<usize> = state
                .items
                .iter()
                .enumerate()
                .skip(len)
                .filter(|(_, item)| item.is_some())
                .map(|(index, _)| index)
                .collect();
            state.items.resize(len, None);
            (old_len, truncated)
        };

        if old_len != len {
            let mut deps: Vec<Dep> = (old_len.min(len)..old_len.max(len))
                .map(|index| self.dep(Key::Index(index)))
                .collect();
            deps.push(self.iterate_dep());
            Runtime::trigger_all(&deps);
        }
        truncated
    }

    /// Switch between keyed and list. Child nodes are dropped; annotations
    /// stay. Returns the keys of the dropped children.
    pub(crate) fn reshape(&self, shape: Shape) -> Vec<Key> {
        let dropped = {
            let mut state = self.0.state.write();
            if state.shape == shape {
                return Vec::new();
            }
            state.shape = shape;

            let mut dropped: Vec<Key> = state
                .items
                .drain(..)
                .enumerate()
                .filter(|(_, item)| item.is_some())
                .map(|(index, _)| Key::Index(index))
                .collect();
            state.fields.retain(|name, field| match field {
                Field::Node(_) => {
                    dropped.push(Key::Name(name.clone()));
                    false
                }
                Field::Annotation { .. } => true,
            });
            dropped
        };

        let mut deps: Vec<Dep> = dropped.iter().cloned().map(|key| self.dep(key)).collect();
        deps.push(self.iterate_dep());
        Runtime::trigger_all(&deps);
        dropped
    }

    /// A plain JSON copy of the node and its descendants.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Whether `value` is a mirror node.
pub fn is_mirror_node(value: &dyn Any) -> bool {
    value.is::<MirrorNode>()
}

impl SameValue for MirrorNode {
    fn same(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl PartialEq for MirrorNode {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for MirrorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = self.0.meta.read();
        f.debug_struct("MirrorNode")
            .field("path", &meta.path)
            .field("shape", &self.shape())
            .field("id", &meta.id)
            .field("keys", &self.keys_untracked())
            .finish()
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Field::Node(node) => node.serialize(serializer),
            Field::Annotation { value, .. } => value.serialize(serializer),
        }
    }
}

/// Keyed nodes serialize as maps of their fields, lists as sequences with
/// holes as `null`. Named fields of a list are not serialized.
impl Serialize for MirrorNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let (shape, fields, items) = {
            let state = self.0.state.read();
            (state.shape, state.fields.clone(), state.items.clone())
        };
        match shape {
            Shape::Keyed => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, field) in &fields {
                    map.serialize_entry(name, field)?;
                }
                map.end()
            }
            Shape::List => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in &items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl PathTarget for MirrorNode {
    fn child_at(&self, key: &Key) -> Option<Self> {
        self.child_untracked(key)
    }

    fn assign(&self, key: Key, value: Self) -> Result<()> {
        self.insert_child(key, value)
    }
}
