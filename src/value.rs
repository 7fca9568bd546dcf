//! The dynamically typed scalar carried by every record field.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::field::FieldName;

/// A dynamically typed value.
///
/// Equality is structural (derived). Ordering between values of different
/// primitive tags is not a total function — see [`Value::compare`] — so
/// `Value` deliberately does not implement `Ord`/`PartialOrd`: a caller that
/// needs an order must go through `compare` and handle the tag-mismatch
/// case explicitly, the same way [`crate::operators::sort`] does.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values, carried through untouched by the engine.
    List(Vec<Value>),
    /// Nested mapping, carried through untouched by the engine.
    Map(BTreeMap<FieldName, Value>),
    /// Absence of a value.
    Null,
}

impl Value {
    /// The name of this value's tag, for error messages.
    pub fn tag(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Null => "null",
        }
    }

    /// Convenience constructor for a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Orders two values of the same primitive tag.
    ///
    /// Integers and floats compare by numeric value, coercing the integer to
    /// `f64` when the tags differ; strings compare lexicographically by byte
    /// (which coincides with code-point order for valid UTF-8); booleans
    /// order `false < true`; `Null` is equal to `Null` and incomparable with
    /// everything else. Any other combination of tags — including `List`
    /// and `Map`, which the engine never needs to sort by — is a
    /// [`EngineError::TypeMismatch`].
    pub fn compare(&self, other: &Value) -> Result<Ordering, EngineError> {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => Ok(a.cmp(b)),
            (Float(a), Float(b)) => Ok(a.total_cmp(b)),
            (Int(a), Float(b)) => Ok((*a as f64).total_cmp(b)),
            (Float(a), Int(b)) => Ok(a.total_cmp(&(*b as f64))),
            (Bool(a), Bool(b)) => Ok(a.cmp(b)),
            (String(a), String(b)) => Ok(a.cmp(b)),
            (Null, Null) => Ok(Ordering::Equal),
            _ => Err(EngineError::TypeMismatch {
                left: self.tag(),
                right: other.tag(),
            }),
        }
    }

    /// Structural equality, as used by join and reduce key comparisons.
    ///
    /// Unlike [`Value::compare`], this never fails: values of different tags
    /// (including an `Int` and a numerically equal `Float`) are simply
    /// unequal, and grouping/matching keys is defined in terms of this
    /// relation rather than `compare`.
    pub fn structural_eq(&self, other: &Value) -> bool {
        self == other
    }

    /// `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Bool(a), Bool(b)) => a == b,
            (String(a), String(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Null, Null) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Bool(v) => v.hash(state),
            Value::String(v) => v.hash(state),
            Value::List(v) => v.hash(state),
            Value::Map(v) => v.hash(state),
            Value::Null => {}
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_and_float_order_by_coercion() {
        assert_eq!(Value::Int(2).compare(&Value::Float(1.5)).unwrap(), Ordering::Greater);
        assert_eq!(Value::Float(1.0).compare(&Value::Int(1)).unwrap(), Ordering::Equal);
    }

    #[test]
    fn int_and_float_are_not_structurally_equal() {
        assert!(!Value::Int(1).structural_eq(&Value::Float(1.0)));
    }

    #[test]
    fn cross_tag_ordering_is_a_type_mismatch() {
        let err = Value::Int(1).compare(&Value::string("1")).unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { .. }));
    }

    #[test]
    fn strings_order_lexicographically() {
        assert_eq!(Value::string("a").compare(&Value::string("b")).unwrap(), Ordering::Less);
    }

    #[test]
    fn bools_order_false_before_true() {
        assert_eq!(Value::Bool(false).compare(&Value::Bool(true)).unwrap(), Ordering::Less);
    }

    #[test]
    fn null_equals_null_but_does_not_order_against_others() {
        assert_eq!(Value::Null.compare(&Value::Null).unwrap(), Ordering::Equal);
        assert!(Value::Null.compare(&Value::Int(0)).is_err());
    }
}
