// [libs/domain/hermes-appetite/src/extraction.rs]
//! Best-effort readers over the extracted-rate-table JSON blob. The
//! extraction pipeline's LLM output has no fixed schema row-to-row, so
//! these look for any of a few plausible key names rather than a single
//! rigid field.

use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeSet;

fn rows_as_objects(rows: &Value) -> Vec<&serde_json::Map<String, Value>> {
    rows.as_array().into_iter().flatten().filter_map(|v| v.as_object()).collect()
}

fn first_numeric(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| obj.get(*k)).and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
}

fn first_string(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k)).and_then(|v| v.as_str().map(str::to_string))
}

/// Mean of the first matching rate-like field across every row, or `None`
/// if no row carries one.
pub fn average_rate(rows: &Value) -> Option<f64> {
    let values: Vec<f64> = rows_as_objects(rows).into_iter().filter_map(|obj| first_numeric(obj, &["rate", "base_rate", "rate_pct"])).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Distinct values of the first matching string field across every row.
pub fn string_set(rows: &Value, keys: &[&str]) -> BTreeSet<String> {
    rows_as_objects(rows).into_iter().filter_map(|obj| first_string(obj, keys)).collect()
}

/// Lowest value of the first matching numeric field across every row.
pub fn min_i32(rows: &Value, keys: &[&str]) -> Option<i32> {
    rows_as_objects(rows)
        .into_iter()
        .filter_map(|obj| first_numeric(obj, keys))
        .map(|v| v as i32)
        .min()
}

/// Highest value of the first matching numeric field across every row.
pub fn max_decimal(rows: &Value, keys: &[&str]) -> Option<Decimal> {
    rows_as_objects(rows)
        .into_iter()
        .filter_map(|obj| first_numeric(obj, keys))
        .filter_map(Decimal::from_f64_retain)
        .max()
}

/// Lowest value of the first matching numeric field across every row.
pub fn min_decimal(rows: &Value, keys: &[&str]) -> Option<Decimal> {
    rows_as_objects(rows)
        .into_iter()
        .filter_map(|obj| first_numeric(obj, keys))
        .filter_map(Decimal::from_f64_retain)
        .min()
}

/// Distinct class codes among rows whose eligibility field matches
/// `status` (e.g. `"eligible"`, `"ineligible"`, `"preferred"`).
pub fn classes_with_status(rows: &Value, status: &str) -> BTreeSet<String> {
    rows_as_objects(rows)
        .into_iter()
        .filter(|obj| first_string(obj, &["eligibility_status", "status"]).is_some_and(|s| s.eq_ignore_ascii_case(status)))
        .filter_map(|obj| first_string(obj, &["class_code", "carrier_class_code"]))
        .collect()
}

/// Mean of the rate-like field among rows matching `class_code`, or
/// `None` if no row carries both.
pub fn average_rate_for_class(rows: &Value, class_code: &str) -> Option<f64> {
    let values: Vec<f64> = rows_as_objects(rows)
        .into_iter()
        .filter(|obj| first_string(obj, &["class_code", "carrier_class_code"]).as_deref() == Some(class_code))
        .filter_map(|obj| first_numeric(obj, &["rate", "base_rate", "rate_pct"]))
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn average_rate_ignores_rows_without_a_rate_field() {
        let rows = json!([{"rate": 1.0}, {"class_code": "101"}, {"rate": 3.0}]);
        assert_eq!(average_rate(&rows), Some(2.0));
    }

    #[test]
    fn string_set_dedupes_across_rows() {
        let rows = json!([{"class_code": "101"}, {"class_code": "101"}, {"class_code": "205"}]);
        let set = string_set(&rows, &["class_code"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn classes_with_status_filters_by_eligibility_field() {
        let rows = json!([
            {"class_code": "101", "eligibility_status": "eligible"},
            {"class_code": "205", "eligibility_status": "ineligible"},
            {"class_code": "310", "eligibility_status": "eligible"},
        ]);
        let eligible = classes_with_status(&rows, "eligible");
        assert_eq!(eligible, BTreeSet::from(["101".to_string(), "310".to_string()]));
    }

    #[test]
    fn average_rate_for_class_only_considers_matching_rows() {
        let rows = json!([{"class_code": "101", "rate": 1.0}, {"class_code": "205", "rate": 9.0}, {"class_code": "101", "rate": 3.0}]);
        assert_eq!(average_rate_for_class(&rows, "101"), Some(2.0));
    }
}
