//! Error Types
//!
//! The reconciler itself never surfaces errors: structural absence is an
//! `Option`, and failed deletions are logged and skipped. Errors only reach
//! callers through the explicit mutation APIs (path assignment, field
//! deletion) and configuration loading.

use thiserror::Error;

use crate::path::{Key, Path};

/// Errors produced by path assignment, mirror-node mutation and config loading.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The field was sealed by the caller and cannot be deleted.
    #[error("field `{key}` is sealed and cannot be deleted")]
    Sealed { key: String },

    /// An intermediate segment of a path does not exist.
    #[error("no container at path {path}")]
    MissingParent { path: Path },

    /// Assignment into a primitive.
    #[error("cannot assign key {key} into a primitive value")]
    NotAContainer { key: Key },

    /// A name key used on an array, or similar.
    #[error("key {key} cannot address a {container}")]
    KeyMismatch { key: Key, container: &'static str },

    /// The mirror configuration could not be parsed.
    #[error("invalid mirror config: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T, E = MirrorError> = std::result::Result<T, E>;
