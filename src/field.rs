//! Interned field names.
//!
//! Records are small and field names repeat across millions of them, so a
//! `Record` keys its map on an interned `FieldName` rather than on `String`
//! directly: every occurrence of `"word"` across an entire run shares one
//! heap allocation and compares by pointer before falling back to bytes.

use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, OnceLock};

fn interner() -> &'static Mutex<HashSet<Arc<str>>> {
    static INTERNER: OnceLock<Mutex<HashSet<Arc<str>>>> = OnceLock::new();
    INTERNER.get_or_init(|| Mutex::new(HashSet::new()))
}

/// An interned field name.
///
/// Two `FieldName`s built from equal strings always share the same backing
/// allocation, which makes cloning a `FieldName` an `Arc` bump rather than a
/// string copy.
#[derive(Clone, Eq)]
pub struct FieldName(Arc<str>);

impl FieldName {
    /// Interns `name`, allocating only if this exact string has not been seen before.
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        let mut pool = interner().lock().unwrap();
        if let Some(existing) = pool.get(name) {
            return FieldName(existing.clone());
        }
        let arc: Arc<str> = Arc::from(name);
        pool.insert(arc.clone());
        FieldName(arc)
    }

    /// Borrows the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for FieldName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for FieldName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl PartialEq for FieldName {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl std::hash::Hash for FieldName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Ord for FieldName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for FieldName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl From<&str> for FieldName {
    fn from(s: &str) -> Self {
        FieldName::new(s)
    }
}

impl From<String> for FieldName {
    fn from(s: String) -> Self {
        FieldName::new(s)
    }
}

impl From<&String> for FieldName {
    fn from(s: &String) -> Self {
        FieldName::new(s.as_str())
    }
}

/// A composite sort/reduce key: an ordered, non-empty-by-convention list of
/// field names.
///
/// [`crate::graph::Graph::sort`] and [`crate::graph::Graph::reduce`] accept
/// anything convertible into `Keys` so that a single-field key (the common
/// case) doesn't force a caller to write `vec![FieldName::new("word")]` just
/// to name one field.
pub struct Keys(pub(crate) Vec<FieldName>);

impl From<&str> for Keys {
    fn from(name: &str) -> Self {
        Keys(vec![FieldName::new(name)])
    }
}

impl From<String> for Keys {
    fn from(name: String) -> Self {
        Keys(vec![FieldName::new(name)])
    }
}

impl From<FieldName> for Keys {
    fn from(field: FieldName) -> Self {
        Keys(vec![field])
    }
}

impl From<Vec<FieldName>> for Keys {
    fn from(fields: Vec<FieldName>) -> Self {
        Keys(fields)
    }
}

impl serde::Serialize for FieldName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for FieldName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(FieldName::new(s))
    }
}
