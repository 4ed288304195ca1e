//! Ditto Core
//!
//! This crate keeps a shadow tree in step with an observable source tree.
//! The shadow ("mirror") has the same shape as the source, node for node,
//! but every node can also carry annotations of its own: selection state,
//! render bookkeeping, counters. Annotations survive when the source is
//! mutated or replaced, as long as they are declared as meta keys.
//!
//! It implements:
//!
//! - Reactive primitives (signals, watchers, a deferred scheduler)
//! - Observable source containers (objects, sparse arrays)
//! - The mirror reconciler with identity-based array matching
//! - Lifecycle hooks in pre- and post-order
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: dependency tracking, [`Signal`], watchers and the scheduler
//! - `source`: the [`Value`] tree a mirror follows
//! - `mirror`: mirror nodes, the reconciler and the [`wrap`] entry point
//! - `path`: keys, paths and path-based access for both trees
//!
//! # Example
//!
//! ```rust,ignore
//! use ditto_core::{wrap, Flush, MirrorOptions, Signal, Value};
//! use serde_json::json;
//!
//! let source = Signal::new(Value::from(json!({ "foo": { "bar": 42 } })));
//! let mirror = wrap(
//!     &source,
//!     MirrorOptions::new()
//!         .flush(Flush::Sync)
//!         .meta_keys(["$count"])
//!         .on_created(|args| args.node.annotate("$count", 0)),
//! );
//!
//! let foo = mirror.get().child("foo").unwrap();
//! assert_eq!(foo.annotation("$count"), Some(json!(0)));
//! ```

pub mod error;
pub mod mirror;
pub mod path;
pub mod reactive;
pub mod source;

pub use error::{MirrorError, Result};
pub use mirror::{
    is_mirror_node, wrap, HookArgs, Meta, Mirror, MirrorConfig, MirrorNode, MirrorOptions, Shape,
};
pub use path::{get_by_path, set_by_path, Key, Path, PathTarget};
pub use reactive::{flush, next_tick, watch, watch_deep, watch_shallow, Flush, Signal, WatchHandle};
pub use source::{Array, Object, SourceCell, Value};
