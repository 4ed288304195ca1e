//! Change detection.
//!
//! Signals and watchers only notify when a value is no longer the *same*.
//! Sameness is identity for shared containers and value equality for
//! primitives, with NaN treated as the same as itself.

/// Identity-style equality used to decide whether a change happened.
pub trait SameValue {
    fn same(&self, other: &Self) -> bool;
}

macro_rules! same_by_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SameValue for $ty {
                fn same(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

same_by_eq!(
    bool, char, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, String, &'static str, ()
);

// Annotations are plain data and compare structurally.
same_by_eq!(serde_json::Value);

impl SameValue for f64 {
    fn same(&self, other: &Self) -> bool {
        same_number(*self, *other)
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: SameValue> SameValue for Vec<T> {
    fn same(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same(b))
    }
}

impl<A: SameValue, B: SameValue> SameValue for (A, B) {
    fn same(&self, other: &Self) -> bool {
        self.0.same(&other.0) && self.1.same(&other.1)
    }
}

/// Number sameness: NaN is the same as NaN, `0.0` and `-0.0` differ.
pub fn same_number(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
}
