//! Equality Comparator
//!
//! Decides whether a freshly observed value is "the same" as the one a
//! watcher saw last time.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// How a watcher compares successive observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonStrategy {
    /// Identity for composites, value for primitives. In-place mutation of
    /// a watched array or object goes unnoticed.
    #[default]
    Reference,

    /// Full structural comparison. The watcher keeps a deep copy of the
    /// last observation.
    Deep,
}

/// Compare two observations under `strategy`.
///
/// Both strategies treat two NaN numbers as equal; otherwise a watcher
/// fixed at NaN would be dirty on every pass and never converge.
pub fn are_equal(new_value: &Value, old_value: &Value, strategy: ComparisonStrategy) -> bool {
    match strategy {
        ComparisonStrategy::Deep => new_value.deep_eq(old_value),
        ComparisonStrategy::Reference => {
            new_value.ptr_eq(old_value) || (new_value.is_nan() && old_value.is_nan())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_compares_primitives_by_value() {
        let strategy = ComparisonStrategy::Reference;
        assert!(are_equal(&Value::from("a"), &Value::from("a"), strategy));
        assert!(are_equal(&Value::from(1), &Value::from(1.0), strategy));
        assert!(are_equal(&Value::Undefined, &Value::Undefined, strategy));
        assert!(!are_equal(&Value::from(1), &Value::from("1"), strategy));
        assert!(!are_equal(&Value::Undefined, &Value::Null, strategy));
    }

    #[test]
    fn reference_compares_composites_by_identity() {
        let strategy = ComparisonStrategy::Reference;
        let list = Value::array([1, 2, 3]);

        assert!(are_equal(&list, &list.clone(), strategy));
        assert!(!are_equal(&list, &Value::array([1, 2, 3]), strategy));
    }

    #[test]
    fn deep_compares_structure() {
        let strategy = ComparisonStrategy::Deep;
        let list = Value::array([1, 2, 3]);

        assert!(are_equal(&list, &Value::array([1, 2, 3]), strategy));
        assert!(!are_equal(&list, &Value::array([1, 2]), strategy));
    }

    #[test]
    fn nan_equals_nan_under_both_strategies() {
        let nan = Value::from(f64::NAN);
        assert!(are_equal(&nan, &nan, ComparisonStrategy::Reference));
        assert!(are_equal(&nan, &nan, ComparisonStrategy::Deep));
        assert!(!are_equal(&nan, &Value::from(0), ComparisonStrategy::Reference));
    }

    #[test]
    fn strategy_deserializes_lowercase() {
        let strategy: ComparisonStrategy = serde_json::from_str(r#""deep""#).unwrap();
        assert_eq!(strategy, ComparisonStrategy::Deep);
    }
}
