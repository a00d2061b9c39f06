//! Result sorting for in-memory execution
//!
//! Stable and deterministic: records with equal keys keep their order.

use std::cmp::Ordering;

use serde_json::Value;

use crate::query::{SortDirection, SortSpec};

/// Sorts result records
pub struct ResultSorter;

impl ResultSorter {
    /// Sorts records by the given sort field and direction
    pub fn sort(records: &mut [Value], sort_spec: &SortSpec) {
        records.sort_by(|a, b| {
            let ordering = compare_values(a.get(&sort_spec.field), b.get(&sort_spec.field));

            match sort_spec.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }
}

/// Total order over optional JSON values.
///
/// Ordering rules:
/// - missing < null < bool < number < string < array < object
/// - For same types, natural ordering; arrays and objects compare equal
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a_val), Some(b_val)) => {
            let a_type = type_rank(a_val);
            let b_type = type_rank(b_val);
            if a_type != b_type {
                return a_type.cmp(&b_type);
            }

            match (a_val, b_val) {
                (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
                (Value::Number(x), Value::Number(y)) => {
                    if let (Some(xi), Some(yi)) = (x.as_i64(), y.as_i64()) {
                        return xi.cmp(&yi);
                    }
                    let xf = x.as_f64().unwrap_or(0.0);
                    let yf = y.as_f64().unwrap_or(0.0);
                    xf.partial_cmp(&yf).unwrap_or(Ordering::Equal)
                }
                (Value::String(x), Value::String(y)) => x.cmp(y),
                _ => Ordering::Equal,
            }
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
