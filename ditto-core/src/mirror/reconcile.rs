//! Reconciler
//!
//! Builds mirror nodes and keeps them in step with the source.
//!
//! # Algorithm
//!
//! [`reconcile`] creates the node for one source cell:
//!
//! 1. Tear down whatever was registered at the node's path (and below).
//! 2. Create the node with its [`Meta`].
//! 3. Subscribe, in this order:
//!    - a shallow watch that deletes mirror fields the source no longer has;
//!    - a value watch on the cell that rebuilds all children when the source
//!      value is replaced;
//!    - a shallow watch that creates mirror fields the source gained.
//! 4. Fire `on_created`, build the children recursively, fire
//!    `on_children_created`.
//!
//! Subscriptions run in creation order, so for any single write the
//! removal pass of a node runs before its replacement pass, before its
//! addition pass, and a parent's passes run before its children's.
//!
//! Array elements are matched by their numeric `id` field. An element that
//! moved is deleted from its old slot by the removal pass and recreated at
//! its new slot by the addition pass.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::node::{Meta, MirrorNode, Shape};
use super::options::{is_meta_key, HookArgs, Hooks, Lifecycle, MirrorOptions};
use super::registry::WatchRegistry;
use crate::path::{Key, Path};
use crate::reactive::{watch, watch_shallow, Flush, WatchHandle};
use crate::source::{Array, SourceCell, Value};

/// State shared by every node of one mirror.
pub(crate) struct Tree {
    meta_keys: HashSet<String>,
    flush: Flush,
    hooks: Hooks,
    registry: Mutex<WatchRegistry>,
}

impl Tree {
    pub(crate) fn new(options: MirrorOptions) -> Self {
        Self {
            meta_keys: options.config.meta_key_set(),
            flush: options.config.flush,
            hooks: options.hooks,
            registry: Mutex::new(WatchRegistry::new()),
        }
    }

    pub(crate) fn flush(&self) -> Flush {
        self.flush
    }

    fn register(&self, path: &Path, handles: [WatchHandle; 3]) {
        let mut registry = self.registry.lock();
        for handle in handles {
            registry.register(path.clone(), handle);
        }
    }

    /// Stop every subscription at `path` and below.
    pub(crate) fn teardown(&self, path: &Path) {
        self.registry.lock().teardown(path);
    }

    pub(crate) fn registered_paths(&self) -> Vec<Path> {
        self.registry.lock().paths()
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.registry.lock().handle_count()
    }

    fn is_meta_key(&self, key: &Key) -> bool {
        is_meta_key(&self.meta_keys, key)
    }

    fn fire(&self, stage: Lifecycle, scope: &Scope) {
        self.hooks.fire(
            stage,
            HookArgs {
                node: &scope.node,
                path: &scope.path,
                original: &scope.cell,
            },
        );
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        self.registry.get_mut().teardown(&Path::root());
    }
}

/// Array element identity. NaN ids match each other and `-0` matches `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Identity(u64);

impl Identity {
    fn of(id: f64) -> Self {
        if id.is_nan() {
            Identity(f64::NAN.to_bits())
        } else if id == 0.0 {
            Identity(0.0f64.to_bits())
        } else {
            Identity(id.to_bits())
        }
    }
}

/// What a node's subscriptions capture.
#[derive(Clone)]
struct Scope {
    tree: Weak<Tree>,
    cell: SourceCell,
    node: MirrorNode,
    path: Path,
}

/// Build the mirror node for `cell` at `path`, with all descendants and
/// subscriptions.
pub(crate) fn reconcile(tree: &Arc<Tree>, cell: SourceCell, path: Path) -> MirrorNode {
    tree.teardown(&path);

    let model = cell.get_untracked();
    let node = MirrorNode::new(Shape::of(&model), Meta::new(path.clone(), model));
    trace!(path = %path, shape = ?node.shape(), "reconciling node");

    let scope = Scope {
        tree: Arc::downgrade(tree),
        cell,
        node: node.clone(),
        path,
    };

    let removal = {
        let scope = scope.clone();
        watch_shallow(scope.cell.clone(), move |_, _| scope.remove_stale(), tree.flush)
    };
    let replacement = {
        let scope = scope.clone();
        let cell = scope.cell.clone();
        watch(move || cell.get(), move |_, _| scope.on_replaced(), tree.flush)
    };
    let addition = {
        let scope = scope.clone();
        watch_shallow(scope.cell.clone(), move |_, _| scope.add_missing(), tree.flush)
    };
    tree.register(&scope.path, [removal, replacement, addition]);

    tree.fire(Lifecycle::Created, &scope);
    scope.materialize(tree);
    tree.fire(Lifecycle::ChildrenCreated, &scope);

    node
}

impl Scope {
    /// Build a child node for every populated key of the source.
    fn materialize(&self, tree: &Arc<Tree>) {
        match self.cell.get_untracked() {
            Value::Object(object) => {
                for key in object.keys_untracked() {
                    self.attach(tree, Key::Name(key));
                }
            }
            Value::Array(array) => {
                let items = array.items_untracked();
                for (index, item) in items.iter().enumerate() {
                    if item.is_some() {
                        self.attach(tree, Key::Index(index));
                    }
                }
                self.resize(tree, items.len());
            }
            _ => {}
        }
    }

    /// Reconcile the child under `key` and hang it on the node.
    fn attach(&self, tree: &Arc<Tree>, key: Key) {
        let Some(cell) = self.cell.child(&key) else {
            return;
        };
        let path = self.path.concat(key.clone());
        let child = reconcile(tree, cell, path.clone());
        if let Err(err) = self.node.insert_child(key, child) {
            debug!(path = %path, error = %err, "child not attached");
            tree.teardown(&path);
        }
    }

    fn resize(&self, tree: &Tree, len: usize) {
        for index in self.node.resize(len) {
            tree.teardown(&self.path.concat(index));
        }
    }

    fn delete(&self, tree: &Tree, key: Key) {
        match self.node.delete(&key) {
            Ok(true) => tree.teardown(&self.path.concat(key)),
            Ok(false) => {}
            Err(err) => debug!(path = %self.path, error = %err, "skipping protected field"),
        }
    }

    /// The source value was replaced.
    fn on_replaced(&self) {
        let Some(tree) = self.tree.upgrade() else {
            return;
        };
        let model = self.cell.get_untracked();
        let shape = Shape::of(&model);
        self.node.set_model(model);
        for key in self.node.reshape(shape) {
            tree.teardown(&self.path.concat(key));
        }

        tree.fire(Lifecycle::Updated, self);
        self.materialize(&tree);
        tree.fire(Lifecycle::ChildrenUpdated, self);
    }

    /// Delete mirror fields the source no longer has.
    fn remove_stale(&self) {
        let Some(tree) = self.tree.upgrade() else {
            return;
        };
        let source = self.cell.get_untracked();
        let model_is_object = self.node.model().is_object();

        let stale: Vec<Key> = match (&source, self.node.shape()) {
            (Value::Object(object), _) if model_is_object => self
                .node
                .keys_untracked()
                .into_iter()
                .filter(|key| {
                    !object.contains_key_untracked(&key.as_name()) && !tree.is_meta_key(key)
                })
                .collect(),
            (Value::Array(array), Shape::List) => self.moved_or_gone(array),
            _ => self
                .node
                .keys_untracked()
                .into_iter()
                .filter(|key| !tree.is_meta_key(key))
                .collect(),
        };

        for key in stale {
            self.delete(&tree, key);
        }
    }

    /// Mirror slots whose element id is missing from the source or sits at
    /// another index there.
    fn moved_or_gone(&self, array: &Array) -> Vec<Key> {
        let source: HashMap<Identity, usize> = array
            .items_untracked()
            .iter()
            .enumerate()
            .filter_map(|(index, item)| Some((Identity::of(item.as_ref()?.id()?), index)))
            .collect();
        let mirror: HashMap<Identity, usize> = self
            .node
            .items_untracked()
            .iter()
            .enumerate()
            .filter_map(|(index, item)| Some((Identity::of(item.as_ref()?.id()?), index)))
            .collect();

        let mut stale: Vec<usize> = mirror
            .into_iter()
            .filter(|(id, index)| source.get(id) != Some(index))
            .map(|(_, index)| index)
            .collect();
        stale.sort_unstable();
        stale.into_iter().map(Key::Index).collect()
    }

    /// Create mirror fields the source gained.
    fn add_missing(&self) {
        let Some(tree) = self.tree.upgrade() else {
            return;
        };
        let source = self.cell.get_untracked();
        let model_is_object = self.node.model().is_object();

        match (&source, self.node.shape()) {
            (Value::Object(object), _) if model_is_object => {
                for (name, value) in object.entries_untracked() {
                    let key = Key::Name(name);
                    let stale = match self.node.child_untracked(&key) {
                        Some(child) => child.shape() != Shape::of(&value),
                        // An annotation of the same name stays put.
                        None => !self.node.contains_key_untracked(&key),
                    };
                    if stale {
                        self.attach(&tree, key);
                    }
                }
            }
            (Value::Array(array), Shape::List) => {
                let known: HashSet<Identity> = self
                    .node
                    .items_untracked()
                    .into_iter()
                    .flatten()
                    .filter_map(|child| child.id())
                    .map(Identity::of)
                    .collect();
                let items = array.items_untracked();
                for (index, item) in items.iter().enumerate() {
                    let Some(id) = item.as_ref().and_then(Value::id) else {
                        continue;
                    };
                    if !known.contains(&Identity::of(id)) {
                        self.attach(&tree, Key::Index(index));
                    }
                }
                self.resize(&tree, items.len());
            }
            _ => {}
        }
    }
}
