//! Watch Registry
//!
//! Every mirror node owns three subscriptions (removal, replacement,
//! addition). The registry files them under the node's path so they can be
//! cancelled when the node is recreated or removed.
//!
//! Paths are kept in a `BTreeMap`: all descendants of a path sort directly
//! after it, so tearing down a subtree is one range scan.

use std::collections::BTreeMap;

use smallvec::SmallVec;
use tracing::debug;

use crate::path::Path;
use crate::reactive::WatchHandle;

/// Handles filed under one path. A node registers three.
pub type Handles = SmallVec<[WatchHandle; 3]>;

#[derive(Default)]
pub struct WatchRegistry {
    handles: BTreeMap<Path, Handles>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handle` to the handles at `path`.
    pub fn register(&mut self, path: Path, handle: WatchHandle) {
        self.handles.entry(path).or_default().push(handle);
    }

    /// Remove and return the handles at `path` and at every descendant.
    ///
    /// The handles are still live; dropping them stops them.
    pub fn take_subtree(&mut self, path: &Path) -> Vec<Handles> {
        let doomed: Vec<Path> = self
            .handles
            .range(path.clone()..)
            .take_while(|(candidate, _)| candidate.starts_with(path))
            .map(|(candidate, _)| candidate.clone())
            .collect();

        doomed
            .iter()
            .filter_map(|candidate| self.handles.remove(candidate))
            .collect()
    }

    /// Stop every handle at `path` and below. Returns how many were stopped.
    pub fn teardown(&mut self, path: &Path) -> usize {
        let removed = self.take_subtree(path);
        let count = stop_all(removed);
        if count > 0 {
            debug!(path = %path, handles = count, "tore down subscriptions");
        }
        count
    }

    /// Paths that currently hold handles, in tree order.
    pub fn paths(&self) -> Vec<Path> {
        self.handles.keys().cloned().collect()
    }

    /// Total number of live handles.
    pub fn handle_count(&self) -> usize {
        self.handles.values().map(SmallVec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Stop and drop handles taken out of a registry.
fn stop_all(removed: Vec<Handles>) -> usize {
    let mut count = 0;
    for handle in removed.into_iter().flatten() {
        handle.stop();
        count += 1;
    }
    count
}

// ---- Tests ----
