use super::{Array, Object, Value};
use crate::path::Key;
use crate::reactive::Signal;

/// A readable location in the source tree: the root signal, a field of an
/// object, or a slot of an array.
///
/// Reading a cell inside a watcher tracks exactly that location, so a watch
/// on `SourceCell::entry(parent, "a")` fires when `parent.a` is reassigned
/// or removed, not when `parent.b` changes.
#[derive(Clone, Debug)]
pub enum SourceCell {
    Root(Signal<Value>),
    Entry(Object, String),
    Slot(Array, usize),
}

impl SourceCell {
    pub fn root(signal: Signal<Value>) -> Self {
        SourceCell::Root(signal)
    }

    pub fn entry(object: Object, key: impl Into<String>) -> Self {
        SourceCell::Entry(object, key.into())
    }

    pub fn slot(array: Array, index: usize) -> Self {
        SourceCell::Slot(array, index)
    }

    /// Tracked read. Missing fields and holes read as `Undefined`.
    pub fn get(&self) -> Value {
        match self {
            SourceCell::Root(signal) => signal.get(),
            SourceCell::Entry(object, key) => object.get(key).unwrap_or_default(),
            SourceCell::Slot(array, index) => array.get(*index).unwrap_or_default(),
        }
    }

    pub fn get_untracked(&self) -> Value {
        match self {
            SourceCell::Root(signal) => signal.get_untracked(),
            SourceCell::Entry(object, key) => object.get_untracked(key).unwrap_or_default(),
            SourceCell::Slot(array, index) => array.get_untracked(*index).unwrap_or_default(),
        }
    }

    /// The cell for `key` inside the current value, if it is a container
    /// that `key` can address.
    pub fn child(&self, key: &Key) -> Option<SourceCell> {
        match self.get_untracked() {
            Value::Object(object) => Some(SourceCell::Entry(object, key.as_name().into_owned())),
            Value::Array(array) => key.as_index().map(|index| SourceCell::Slot(array, index)),
            _ => None,
        }
    }
}
