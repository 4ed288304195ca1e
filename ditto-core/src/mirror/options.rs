//! Mirror configuration and lifecycle hooks.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::node::MirrorNode;
use crate::error::Result;
use crate::path::{Key, Path};
use crate::reactive::Flush;
use crate::source::SourceCell;

/// Serializable mirror settings.
///
/// ```rust,ignore
/// let config = MirrorConfig::from_json(r#"{ "metaKeys": ["$meta"], "flush": "sync" }"#)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Field names the reconciler never deletes.
    #[serde(alias = "metaKeys")]
    pub meta_keys: Vec<String>,

    /// When subscriptions run after a source write.
    pub flush: Flush,
}

impl MirrorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub(crate) fn meta_key_set(&self) -> HashSet<String> {
        self.meta_keys.iter().cloned().collect()
    }
}

/// What a hook is told about the node it runs for.
pub struct HookArgs<'a> {
    /// The mirror node. Hooks may annotate it.
    pub node: &'a MirrorNode,
    pub path: &'a Path,
    /// The source location the node mirrors.
    pub original: &'a SourceCell,
}

pub type Hook = Arc<dyn Fn(HookArgs<'_>) + Send + Sync>;

/// Points in a node's life at which hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// The node exists; its children do not yet.
    Created,
    /// Every descendant has been created.
    ChildrenCreated,
    /// The source value was replaced; children are about to be rebuilt.
    Updated,
    /// Children were rebuilt after a replacement.
    ChildrenUpdated,
}

#[derive(Clone, Default)]
pub struct Hooks {
    on_created: Option<Hook>,
    on_children_created: Option<Hook>,
    on_updated: Option<Hook>,
    on_children_updated: Option<Hook>,
}

impl Hooks {
    fn get(&self, stage: Lifecycle) -> Option<&Hook> {
        match stage {
            Lifecycle::Created => self.on_created.as_ref(),
            Lifecycle::ChildrenCreated => self.on_children_created.as_ref(),
            Lifecycle::Updated => self.on_updated.as_ref(),
            Lifecycle::ChildrenUpdated => self.on_children_updated.as_ref(),
        }
    }

    pub(crate) fn fire(&self, stage: Lifecycle, args: HookArgs<'_>) {
        trace!(stage = ?stage, path = %args.path, "lifecycle");
        if let Some(hook) = self.get(stage) {
            hook(args);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_created", &self.on_created.is_some())
            .field("on_children_created", &self.on_children_created.is_some())
            .field("on_updated", &self.on_updated.is_some())
            .field("on_children_updated", &self.on_children_updated.is_some())
            .finish()
    }
}

/// Everything [`wrap`](super::wrap) needs: config plus hooks.
///
/// # Example
///
/// ```rust,ignore
/// let options = MirrorOptions::new()
///     .meta_keys(["$count"])
///     .flush(Flush::Sync)
///     .on_created(|args| args.node.annotate("$count", 0));
/// ```
#[derive(Clone, Debug, Default)]
pub struct MirrorOptions {
    pub config: MirrorConfig,
    pub hooks: Hooks,
}

impl MirrorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: MirrorConfig) -> Self {
        Self {
            config,
            hooks: Hooks::default(),
        }
    }

    pub fn meta_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.config.meta_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn flush(mut self, flush: Flush) -> Self {
        self.config.flush = flush;
        self
    }

    pub fn on_created<F>(mut self, hook: F) -> Self
    where
        F: Fn(HookArgs<'_>) + Send + Sync + 'static,
    {
        self.hooks.on_created = Some(Arc::new(hook));
        self
    }

    pub fn on_children_created<F>(mut self, hook: F) -> Self
    where
        F: Fn(HookArgs<'_>) + Send + Sync + 'static,
    {
        self.hooks.on_children_created = Some(Arc::new(hook));
        self
    }

    pub fn on_updated<F>(mut self, hook: F) -> Self
    where
        F: Fn(HookArgs<'_>) + Send + Sync + 'static,
    {
        self.hooks.on_updated = Some(Arc::new(hook));
        self
    }

    pub fn on_children_updated<F>(mut self, hook: F) -> Self
    where
        F: Fn(HookArgs<'_>) + Send + Sync + 'static,
    {
        self.hooks.on_children_updated = Some(Arc::new(hook));
        self
    }
}

/// Whether `key` names a protected field.
pub(crate) fn is_meta_key(meta_keys: &HashSet<String>, key: &Key) -> bool {
    match key {
        Key::Name(name) => meta_keys.contains(name),
        Key::Index(_) => false,
    }
}
