// [libs/domain/hermes-pricing/src/conditions.rs]
//! Generic adjustment-condition evaluator shared by both engines. A
//! condition is a JSON object whose keys name a rating factor with an
//! optional `_min`/`_max`/`_eq`/`_in` suffix; every key must hold against
//! the quote's parameters for the adjustment to apply.

use serde_json::Value;

enum Suffix {
    Min,
    Max,
    Eq,
    In,
}

fn split_suffix(key: &str) -> (&str, Suffix) {
    if let Some(field) = key.strip_suffix("_min") {
        (field, Suffix::Min)
    } else if let Some(field) = key.strip_suffix("_max") {
        (field, Suffix::Max)
    } else if let Some(field) = key.strip_suffix("_eq") {
        (field, Suffix::Eq)
    } else if let Some(field) = key.strip_suffix("_in") {
        (field, Suffix::In)
    } else {
        (key, Suffix::Eq)
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

/// Evaluates one adjustment's condition against the merged quote
/// parameters. A condition that is not a JSON object always holds (an
/// unconditional adjustment).
pub fn evaluate_condition(condition: &Value, params: &Value) -> bool {
    let Some(map) = condition.as_object() else {
        return true;
    };
    map.iter().all(|(key, expected)| {
        let (field, suffix) = split_suffix(key);
        let Some(actual) = params.get(field) else {
            return false;
        };
        match suffix {
            Suffix::Min => as_f64(actual).zip(as_f64(expected)).is_some_and(|(a, e)| a >= e),
            Suffix::Max => as_f64(actual).zip(as_f64(expected)).is_some_and(|(a, e)| a <= e),
            Suffix::Eq => actual == expected,
            Suffix::In => expected.as_array().is_some_and(|arr| arr.iter().any(|v| v == actual)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn min_max_bound_a_numeric_field() {
        let cond = json!({"fico_min": 700, "fico_max": 760});
        assert!(evaluate_condition(&cond, &json!({"fico": 720})));
        assert!(!evaluate_condition(&cond, &json!({"fico": 680})));
    }

    #[test]
    fn in_suffix_checks_list_membership() {
        let cond = json!({"state_in": ["CA", "NY"]});
        assert!(evaluate_condition(&cond, &json!({"state": "NY"})));
        assert!(!evaluate_condition(&cond, &json!({"state": "TX"})));
    }

    #[test]
    fn missing_field_fails_the_condition() {
        let cond = json!({"occupancy_eq": "investment"});
        assert!(!evaluate_condition(&cond, &json!({})));
    }

    #[test]
    fn non_object_condition_always_holds() {
        assert!(evaluate_condition(&Value::Null, &json!({})));
    }
}
