use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use super::node::MirrorNode;
use super::options::MirrorOptions;
use super::reconcile::{reconcile, Tree};
use crate::path::Path;
use crate::reactive::{watch, Signal, WatchHandle};
use crate::source::{SourceCell, Value};

/// A live mirror of a source signal.
///
/// The root node is held in a signal of its own: it is replaced, not
/// patched, when the source flips between array and non-array, so readers
/// that care should go through [`Mirror::get`] each time.
///
/// Dropping the mirror stops every subscription it made.
pub struct Mirror {
    root: Signal<MirrorNode>,
    tree: Arc<Tree>,
    _shape_watch: WatchHandle,
}

impl Mirror {
    /// The current root node, tracked.
    pub fn get(&self) -> MirrorNode {
        self.root.get()
    }

    pub fn get_untracked(&self) -> MirrorNode {
        self.root.get_untracked()
    }

    /// The signal holding the root node.
    pub fn signal(&self) -> Signal<MirrorNode> {
        self.root.clone()
    }

    /// Number of live subscriptions held for mirror nodes.
    pub fn subscription_count(&self) -> usize {
        self.tree.subscription_count()
    }

    /// Paths that currently hold subscriptions, in tree order.
    pub fn registered_paths(&self) -> Vec<Path> {
        self.tree.registered_paths()
    }
}

impl fmt::Debug for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mirror")
            .field("root", &self.get_untracked())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

/// Mirror `source`.
///
/// The whole tree is built before this returns; `on_created` and
/// `on_children_created` have already run for every node.
pub fn wrap(source: &Signal<Value>, options: MirrorOptions) -> Mirror {
    let tree = Arc::new(Tree::new(options));
    let root_slot: Arc<OnceLock<Signal<MirrorNode>>> = Arc::new(OnceLock::new());

    // Created before the root node so it runs ahead of the root's own
    // subscriptions and sees the old model.
    let shape_watch = {
        let weak_tree = Arc::downgrade(&tree);
        let root_slot = Arc::clone(&root_slot);
        let reader = source.clone();
        let source = source.clone();
        watch(
            move || reader.get(),
            move |current: &Value, _| {
                let (Some(tree), Some(root)) = (weak_tree.upgrade(), root_slot.get()) else {
                    return;
                };
                if current.is_array() == root.get_untracked().model().is_array() {
                    return;
                }
                debug!(array = current.is_array(), "root shape changed, rebuilding mirror");
                let node = reconcile(&tree, SourceCell::root(source.clone()), Path::root());
                root.set(node);
            },
            tree.flush(),
        )
    };

    let node = reconcile(&tree, SourceCell::root(source.clone()), Path::root());
    let root = root_slot.get_or_init(|| Signal::new(node)).clone();

    Mirror {
        root,
        tree,
        _shape_watch: shape_watch,
    }
}
