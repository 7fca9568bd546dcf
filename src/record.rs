//! The record type: an unordered mapping from field name to [`Value`].

use std::collections::BTreeMap;
use std::fmt;

use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};

use crate::field::FieldName;
use crate::value::Value;

/// An immutable-once-emitted mapping from field name to value.
///
/// Backed by a `BTreeMap` over interned [`FieldName`]s: records are
/// typically small (a handful of fields), so a sorted flat map beats a hash
/// map on both memory and cache behavior, and gives deterministic iteration
/// and `Debug` output for free, which scenario tests rely on.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<FieldName, Value>);

impl Record {
    /// An empty record.
    pub fn new() -> Self {
        Record(BTreeMap::new())
    }

    /// Looks up a field, returning `None` if it is absent.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Looks up a field, treating an absent field as [`Value::Null`].
    ///
    /// This is the lookup sort key extraction uses: a missing key field
    /// sorts as null rather than raising an error.
    pub fn get_or_null(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.0.get(field).unwrap_or(&NULL)
    }

    /// Inserts or replaces a field, returning the previous value if any.
    pub fn insert(&mut self, field: impl Into<FieldName>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of fields in the record.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(field, value)` pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &Value)> {
        self.0.iter()
    }

    /// Extracts the composite key named by `keys`, treating absent fields as null.
    pub fn key_tuple(&self, keys: &[FieldName]) -> Vec<Value> {
        keys.iter().map(|k| self.get_or_null(k).clone()).collect()
    }

    /// Builds a record that is the union of `left` and `right`'s fields.
    ///
    /// Fields present in both are renamed to `<name>_left` / `<name>_right`
    /// (including the join key fields themselves, if they share a name);
    /// fields present in only one side are copied unchanged. This is the
    /// field-collision rule the join kernel uses for every non-cross,
    /// non-unmatched-side output record.
    pub fn merge_with_collision_suffixes(left: &Record, right: &Record) -> Record {
        let mut out = BTreeMap::new();
        // Both sides iterate in field-name order (the `BTreeMap` backing
        // `Record`), so a merge join finds colliding fields in one pass
        // instead of a `contains_key` probe per field.
        for either in left.0.iter().merge_join_by(right.0.iter(), |(a, _), (b, _)| a.cmp(b)) {
            match either {
                EitherOrBoth::Left((field, value)) => {
                    out.insert(field.clone(), value.clone());
                }
                EitherOrBoth::Right((field, value)) => {
                    out.insert(field.clone(), value.clone());
                }
                EitherOrBoth::Both((field, left_value), (_, right_value)) => {
                    out.insert(FieldName::new(format!("{field}_left")), left_value.clone());
                    out.insert(FieldName::new(format!("{field}_right")), right_value.clone());
                }
            }
        }
        Record(out)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter().map(|(k, v)| (k.as_str(), v))).finish()
    }
}

impl FromIterator<(FieldName, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (FieldName, Value)>>(iter: I) -> Self {
        Record(iter.into_iter().collect())
    }
}

impl<K, V> From<Vec<(K, V)>> for Record
where
    K: Into<FieldName>,
    V: Into<Value>,
{
    fn from(fields: Vec<(K, V)>) -> Self {
        fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
    }
}

/// Builds a [`Record`] from `field: value` pairs.
///
/// ```
/// use tableflow::{record, Value};
///
/// let r = record! { "word" => Value::string("a"), "count" => Value::Int(2) };
/// assert_eq!(r.get("count"), Some(&Value::Int(2)));
/// ```
#[macro_export]
macro_rules! record {
    ($($field:expr => $value:expr),* $(,)?) => {{
        let mut record = $crate::Record::new();
        $(record.insert($field, $value);)*
        record
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_field_reads_as_null() {
        let r = Record::new();
        assert_eq!(r.get("missing"), None);
        assert_eq!(r.get_or_null("missing"), &Value::Null);
    }

    #[test]
    fn collision_rule_renames_only_shared_fields() {
        let left = record! { "id" => Value::Int(1), "mail" => Value::string("a") };
        let right = record! { "id" => Value::Int(1), "msg" => Value::string("x") };
        let merged = Record::merge_with_collision_suffixes(&left, &right);
        assert_eq!(merged.get("id_left"), Some(&Value::Int(1)));
        assert_eq!(merged.get("id_right"), Some(&Value::Int(1)));
        assert_eq!(merged.get("id"), None);
        assert_eq!(merged.get("mail"), Some(&Value::string("a")));
        assert_eq!(merged.get("msg"), Some(&Value::string("x")));
    }

    #[test]
    fn non_colliding_fields_keep_their_names() {
        let left = record! { "a" => Value::Int(1) };
        let right = record! { "b" => Value::Int(2) };
        let merged = Record::merge_with_collision_suffixes(&left, &right);
        assert_eq!(merged.get("a"), Some(&Value::Int(1)));
        assert_eq!(merged.get("b"), Some(&Value::Int(2)));
    }
}
