//! Source Trees
//!
//! The observable data a mirror follows. A [`Value`] is a primitive or a
//! shared container ([`Object`], [`Array`]); containers have identity, so
//! two values holding clones of one object are the *same* value while two
//! objects with equal contents are not.
//!
//! Container reads inside a watcher are tracked at the granularity of a
//! single field or slot, or of the key set as a whole.

mod array;
mod cell;
mod object;

pub use array::Array;
pub use cell::SourceCell;
pub use object::Object;

use std::collections::HashSet;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::{MirrorError, Result};
use crate::path::{Key, PathTarget};
use crate::reactive::{same_number, SameValue, TargetId};

/// The field that identifies array elements across mutations.
pub const ID_FIELD: &str = "id";

/// A source value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Object(Object),
    Array(Array),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Identity of the container, if this is one.
    pub fn target_id(&self) -> Option<TargetId> {
        match self {
            Value::Object(object) => Some(object.target_id()),
            Value::Array(array) => Some(array.target_id()),
            _ => None,
        }
    }

    /// The numeric `id` field of an object. Untracked.
    pub fn id(&self) -> Option<f64> {
        self.as_object()?.get_untracked(ID_FIELD)?.as_f64()
    }

    /// Read every nested container, tracking each one.
    ///
    /// Shared and cyclic containers are visited once.
    pub fn traverse(&self) {
        let mut seen = HashSet::new();
        self.traverse_into(&mut seen);
    }

    fn traverse_into(&self, seen: &mut HashSet<TargetId>) {
        let Some(id) = self.target_id() else {
            return;
        };
        if !seen.insert(id) {
            return;
        }
        match self {
            Value::Object(object) => {
                for (_, value) in object.entries() {
                    value.traverse_into(seen);
                }
            }
            Value::Array(array) => {
                for value in array.items().into_iter().flatten() {
                    value.traverse_into(seen);
                }
            }
            _ => {}
        }
    }

    /// A plain JSON copy of the current value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl SameValue for Value {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => same_number(*a, *b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Write whole numbers as integers so `1.0` renders as `1`.
pub(crate) fn serialize_number<S: Serializer>(
    n: f64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        serializer.serialize_i64(n as i64)
    } else {
        serializer.serialize_f64(n)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serialize_number(*n, serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Object(object) => {
                let entries = object.entries_untracked();
                let mut map = serializer.serialize_map(None)?;
                for (key, value) in entries.iter().filter(|(_, v)| !v.is_undefined()) {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Array(array) => {
                let items = array.items_untracked();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for slot in &items {
                    seq.serialize_element(slot)?;
                }
                seq.end()
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(items) => Value::Array(items.into_iter().collect()),
            serde_json::Value::Object(fields) => Value::Object(fields.into_iter().collect()),
        }
    }
}

macro_rules! value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

value_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Value::Array(array)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl PathTarget for Value {
    fn child_at(&self, key: &Key) -> Option<Self> {
        match self {
            Value::Object(object) => object.get_untracked(&key.as_name()),
            Value::Array(array) => array.get_untracked(key.as_index()?),
            _ => None,
        }
    }

    fn assign(&self, key: Key, value: Self) -> Result<()> {
        match self {
            Value::Object(object) => {
                object.insert(key.as_name().into_owned(), value);
                Ok(())
            }
            Value::Array(array) => {
                let index = key.as_index().ok_or(MirrorError::KeyMismatch {
                    key: key.clone(),
                    container: "array",
                })?;
                array.set(index, value);
                Ok(())
            }
            _ => Err(MirrorError::NotAContainer { key }),
        }
    }
}
