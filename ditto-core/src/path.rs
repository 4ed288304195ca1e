//! Paths
//!
//! A [`Path`] names a location in a tree as the ordered keys walked from the
//! root. Paths are the registry key for subscriptions and the identifier
//! handed to lifecycle hooks.
//!
//! Two paths are equal when their JSON renderings are equal, so
//! `Key::Index(0)` and `Key::Name("0")` are different keys. The derived
//! `Eq`/`Ord` implementations agree with that rule.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

use crate::error::{MirrorError, Result};

/// A single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    /// An array slot.
    Index(usize),
    /// An object field.
    Name(String),
}

impl Key {
    /// The name this key addresses on a keyed container.
    pub fn as_name(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Key::Name(name) => std::borrow::Cow::Borrowed(name),
            Key::Index(index) => std::borrow::Cow::Owned(index.to_string()),
        }
    }

    /// The slot this key addresses on an array, if any.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            Key::Name(name) => name.parse().ok(),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Name(name.clone())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{index}"),
            Key::Name(name) => write!(f, "{}", serde_json::Value::String(name.clone())),
        }
    }
}

/// An ordered sequence of keys from a root to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(SmallVec<[Key; 4]>);

impl Path {
    /// The empty path.
    pub fn root() -> Self {
        Self(SmallVec::new())
    }

    /// Build a path from keys.
    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = Key>,
    {
        Self(keys.into_iter().collect())
    }

    /// A new path with `key` appended.
    pub fn concat(&self, key: impl Into<Key>) -> Self {
        let mut keys = self.0.clone();
        keys.push(key.into());
        Self(keys)
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split off the last key, returning the parent path and that key.
    pub fn split_last(&self) -> Option<(Path, &Key)> {
        self.0
            .split_last()
            .map(|(last, parent)| (Path(parent.iter().cloned().collect()), last))
    }

    /// Whether `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// JSON rendering, e.g. `["b",0,"c"]`.
    pub fn stringify(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}")?;
        }
        f.write_str("]")
    }
}

impl FromIterator<Key> for Path {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        Self::from_keys(iter)
    }
}

impl From<Vec<Key>> for Path {
    fn from(keys: Vec<Key>) -> Self {
        Self(SmallVec::from_vec(keys))
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<Key>::deserialize(deserializer).map(Path::from)
    }
}

/// Build a [`Path`] from a list of keys: `path!["b", 0, "c"]`.
#[macro_export]
macro_rules! path {
    ($($key:expr),* $(,)?) => {
        $crate::path::Path::from_keys(::std::vec![$($crate::path::Key::from($key)),*])
    };
}

/// A tree that can be walked and assigned by key.
///
/// Implemented for source values and mirror nodes, so the path helpers work
/// on either tree.
pub trait PathTarget: Clone {
    /// The child under `key`, if present.
    fn child_at(&self, key: &Key) -> Option<Self>;

    /// Assign `value` under `key`.
    fn assign(&self, key: Key, value: Self) -> Result<()>;
}

/// Walk `path` from `root`. Returns `None` when any segment is missing.
pub fn get_by_path<T: PathTarget>(root: &T, path: &Path) -> Option<T> {
    path.keys()
        .iter()
        .try_fold(root.clone(), |node, key| node.child_at(key))
}

/// Assign `value` at `path`. An empty path is a no-op.
pub fn set_by_path<T: PathTarget>(root: &T, path: &Path, value: T) -> Result<()> {
    let Some((parent, key)) = path.split_last() else {
        return Ok(());
    };
    let key = key.clone();
    let target = get_by_path(root, &parent).ok_or(MirrorError::MissingParent { path: parent })?;
    target.assign(key, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_does_not_mutate() {
        let root = Path::root();
        let child = root.concat("a");
        let grandchild = child.concat(0);

        assert!(root.is_empty());
        assert_eq!(child.len(), 1);
        assert_eq!(grandchild.keys(), &[Key::from("a"), Key::Index(0)]);
    }

    #[test]
    fn stringify_matches_json() {
        assert_eq!(Path::root().stringify(), "[]");
        assert_eq!(path!["b", 0, "c"].stringify(), r#"["b",0,"c"]"#);
        assert_eq!(path!["say \"hi\""].stringify(), r#"["say \"hi\""]"#);

        let json = serde_json::to_string(&path!["b", 0]).unwrap();
        assert_eq!(json, path!["b", 0].stringify());
    }

    #[test]
    fn index_and_name_are_distinct() {
        assert_ne!(path![0], path!["0"]);
        assert_ne!(path![0].stringify(), path!["0"].stringify());
    }

    #[test]
    fn starts_with_prefix() {
        let p = path!["a", "b", 1];
        assert!(p.starts_with(&Path::root()));
        assert!(p.starts_with(&path!["a"]));
        assert!(p.starts_with(&p));
        assert!(!p.starts_with(&path!["b"]));
        assert!(!path!["a"].starts_with(&p));
    }

    #[test]
    fn split_last() {
        assert!(Path::root().split_last().is_none());

        let p = path!["a", 2];
        let (parent, last) = p.split_last().unwrap();
        assert_eq!(parent, path!["a"]);
        assert_eq!(last, &Key::Index(2));
    }

    #[test]
    fn deserialize_round_trip() {
        let p: Path = serde_json::from_str(r#"["items",3,"name"]"#).unwrap();
        assert_eq!(p, path!["items", 3, "name"]);
    }

    #[test]
    fn descendants_sort_after_their_ancestor() {
        let mut paths = vec![path!["b"], path!["a", 0], path!["a"], path!["a", "x", 1]];
        paths.sort();
        assert_eq!(paths, vec![path!["a"], path!["a", 0], path!["a", "x", 1], path!["b"]]);
    }
}
