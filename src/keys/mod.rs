//! Query keys - hierarchical, value-compared cache addresses.
//!
//! A key is an ordered list of primitive segments, e.g.
//! `["bookings", "lab", "42"]`. Keys are compared by value and matched by
//! prefix, so invalidating `["bookings", "user"]` touches every per-user
//! booking list.
//!
//! ## Example
//!
//! ```ignore
//! use lab_booking_sync::keys::booking_keys;
//!
//! let a = booking_keys::multi_lab(&["3", "1"]);
//! let b = booking_keys::multi_lab(&["1", "3"]);
//! assert_eq!(a, b);
//! assert!(a.starts_with(&booking_keys::all()));
//! ```

mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use registry::{booking_keys, lab_keys, metadata_keys, provider_keys, user_keys};

/// One segment of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySegment {
    Bool(bool),
    Int(i64),
    Text(String),
    /// Sorted identifier collection (multi-entity keys).
    List(Vec<String>),
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        KeySegment::Text(value.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        KeySegment::Text(value)
    }
}

impl From<&String> for KeySegment {
    fn from(value: &String) -> Self {
        KeySegment::Text(value.clone())
    }
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        KeySegment::Int(value)
    }
}

impl From<bool> for KeySegment {
    fn from(value: bool) -> Self {
        KeySegment::Bool(value)
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Bool(b) => write!(f, "{}", b),
            KeySegment::Int(i) => write!(f, "{}", i),
            KeySegment::Text(s) => write!(f, "{:?}", s),
            KeySegment::List(items) => write!(f, "[{}]", items.join(",")),
        }
    }
}

/// Hierarchical cache key.
///
/// Every key-family builder returns a freshly allocated key, so
/// callers may mutate what they get back without affecting anyone else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    pub fn new(segments: Vec<KeySegment>) -> Self {
        QueryKey(segments)
    }

    /// Root key with a single text segment.
    pub fn root(name: &str) -> Self {
        QueryKey(vec![KeySegment::from(name)])
    }

    /// Append a segment, builder style.
    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn push(&mut self, segment: impl Into<KeySegment>) {
        self.0.push(segment.into());
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `prefix` is a (non-strict) prefix of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", segment)?;
        }
        write!(f, "]")
    }
}

/// Sort and de-duplicate an id collection so key construction is
/// order-insensitive.
pub(crate) fn sorted_ids<S: AsRef<str>>(ids: &[S]) -> Vec<String> {
    let mut sorted: Vec<String> = ids.iter().map(|id| id.as_ref().to_string()).collect();
    sorted.sort();
    sorted.dedup();
    sorted
}
