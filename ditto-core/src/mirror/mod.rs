//! Mirrors
//!
//! A mirror is a shadow tree that follows a source tree one node at a time.
//! Each mirror node knows which source value it came from ([`Meta`]) and can
//! carry annotations of its own. Annotations named in
//! [`MirrorConfig::meta_keys`] survive every reconciliation; other fields the
//! source does not have are removed.
//!
//! # Example
//!
//! ```rust,ignore
//! let source = Signal::new(Value::from(json!({ "todos": [{ "id": 1, "done": false }] })));
//! let mirror = wrap(
//!     &source,
//!     MirrorOptions::new()
//!         .meta_keys(["$selected"])
//!         .on_created(|args| args.node.annotate("$selected", false)),
//! );
//!
//! let todo = mirror.get().child("todos").unwrap().child(0).unwrap();
//! todo.annotate("$selected", true);
//! ```

mod handle;
mod node;
mod options;
mod reconcile;
mod registry;

pub use handle::{wrap, Mirror};
pub use node::{is_mirror_node, Meta, MirrorNode, Shape};
pub use options::{Hook, HookArgs, Hooks, Lifecycle, MirrorConfig, MirrorOptions};
pub use registry::WatchRegistry;
