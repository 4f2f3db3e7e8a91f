//! Observed Values
//!
//! The digest engine treats the values it observes as opaque. This module
//! provides the dynamically-typed [`Value`] that watch functions return and
//! that scope properties hold.
//!
//! # Reference Semantics
//!
//! Primitives (`Undefined`, `Null`, `Bool`, `Number`, `String`) are plain
//! values. Composites (`Array`, `Object`) are shared handles: cloning a
//! composite `Value` clones the handle, not the contents, so two clones have
//! the same identity and observe each other's in-place mutations. This is
//! what lets a reference-strategy watcher ignore in-place mutation while a
//! deep-strategy watcher notices it.
//!
//! # Utilities
//!
//! - [`Value::ptr_eq`]: identity comparison
//! - [`Value::deep_eq`]: structural comparison, NaN equal to NaN
//! - [`Value::deep_copy`]: structural copy with fresh identities
//!
//! Cyclic composites are not supported by the structural utilities.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Shared, mutable array storage.
pub type Array = Rc<RefCell<Vec<Value>>>;

/// Shared, mutable, insertion-ordered object storage.
pub type Object = Rc<RefCell<IndexMap<String, Value>>>;

/// A dynamically-typed observed value.
///
/// `PartialEq` is structural and follows `f64` semantics for numbers, so
/// `NaN != NaN`. The digest engine does not use it; see
/// [`crate::scope::are_equal`] for the comparison watchers use.
#[derive(Clone, Default, PartialEq)]
pub enum Value {
    /// No value at all, e.g. a property that was never set.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Array),
    Object(Object),
}

impl Value {
    /// Create an array value from the given items.
    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Array(Rc::new(RefCell::new(
            items.into_iter().map(Into::into).collect(),
        )))
    }

    /// Create an object value from the given entries.
    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(Rc::new(RefCell::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if this value is a number and that number is NaN.
    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }

    /// Truthiness: `Undefined`, `Null`, `false`, `0`, `NaN` and `""` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Identity comparison.
    ///
    /// Composites are identical only when they are the same shared handle.
    /// Primitives are identical when they are equal, with NaN never
    /// identical to anything (including itself).
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Structural comparison.
    ///
    /// Composites are compared element by element and key by key; object
    /// key order does not matter. Two NaN leaves compare equal.
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Array(a), Value::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, x)| b.get(key).is_some_and(|y| x.deep_eq(y)))
            }
            _ => self.ptr_eq(other),
        }
    }

    /// Structural copy.
    ///
    /// Every composite in the result is a fresh handle, so mutating the
    /// original afterwards leaves the copy untouched.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Array(items) => Value::Array(Rc::new(RefCell::new(
                items.borrow().iter().map(Value::deep_copy).collect(),
            ))),
            Value::Object(entries) => Value::Object(Rc::new(RefCell::new(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy()))
                    .collect(),
            ))),
            primitive => primitive.clone(),
        }
    }

    /// Convert to JSON. `Undefined` and non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.borrow().iter().map(Value::to_json).collect())
            }
            Value::Object(entries) => serde_json::Value::Object(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Object(entries) => f.debug_map().entries(entries.borrow().iter()).finish(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let items = items.borrow();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(entries) => {
                let entries = entries.borrow();
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries.iter() {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::array(items),
            serde_json::Value::Object(entries) => Value::object(entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn composite_clones_share_identity() {
        let a = Value::array([1, 2, 3]);
        let b = a.clone();

        assert!(a.ptr_eq(&b));
        b.as_array().unwrap().borrow_mut().push(Value::from(4));
        assert_eq!(a.as_array().unwrap().borrow().len(), 4);
    }

    #[test]
    fn equal_contents_are_not_identical() {
        let a = Value::array([1, 2, 3]);
        let b = Value::array([1, 2, 3]);

        assert!(!a.ptr_eq(&b));
        assert!(a.deep_eq(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn nan_is_deep_equal_but_not_identical() {
        let nan = Value::from(f64::NAN);

        assert!(!nan.ptr_eq(&nan));
        assert!(nan.deep_eq(&Value::from(f64::NAN)));
        assert!(Value::array([f64::NAN]).deep_eq(&Value::array([f64::NAN])));
    }

    #[test]
    fn deep_eq_ignores_object_key_order() {
        let a = Value::object([("x", 1), ("y", 2)]);
        let b = Value::object([("y", 2), ("x", 1)]);
        let c = Value::object([("x", 1), ("y", 3)]);

        assert!(a.deep_eq(&b));
        assert!(!a.deep_eq(&c));
    }

    #[test]
    fn undefined_and_null_are_distinct() {
        assert!(!Value::Undefined.deep_eq(&Value::Null));
        assert!(!Value::Undefined.ptr_eq(&Value::Null));
    }

    #[test]
    fn deep_copy_is_detached() {
        let original = Value::from(json!({"items": [1, 2], "name": "a"}));
        let copy = original.deep_copy();

        assert!(copy.deep_eq(&original));
        assert!(!copy.ptr_eq(&original));

        let items = original.as_object().unwrap().borrow()["items"].clone();
        items.as_array().unwrap().borrow_mut().push(Value::from(3));

        assert!(!copy.deep_eq(&original));
    }

    #[test]
    fn json_conversion() {
        let value = Value::from(json!({"a": [true, null, 1.5], "b": "text"}));
        assert_eq!(value.to_json(), json!({"a": [true, null, 1.5], "b": "text"}));

        assert_eq!(Value::Undefined.to_json(), serde_json::Value::Null);
        assert_eq!(Value::from(f64::NAN).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn serializes_through_serde() {
        let value = Value::object([("list", Value::array([1, 2])), ("flag", Value::from(false))]);
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"list":[1.0,2.0],"flag":false}"#);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from(f64::NAN).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::array(Vec::<Value>::new()).is_truthy());
    }
}
