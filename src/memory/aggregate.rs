//! Aggregation over filtered records
//!
//! Collapses a record set into one summary record, one column per
//! aggregation. Null and missing values are ignored except by `COUNT(*)`.

use serde_json::{Map, Number, Value};

use super::sorter::compare_values;
use crate::query::{AggregateFunction, Aggregation};

/// Computes summary records
pub struct Aggregator;

impl Aggregator {
    /// Summary record for `aggregations` over `records`
    pub fn summarize(records: &[Value], aggregations: &[Aggregation]) -> Value {
        let mut summary = Map::new();
        for aggregation in aggregations {
            summary.insert(
                aggregation.output_name(),
                Self::evaluate(records, aggregation),
            );
        }
        Value::Object(summary)
    }

    fn evaluate(records: &[Value], aggregation: &Aggregation) -> Value {
        let field = match &aggregation.field {
            Some(field) => field,
            None => {
                return match aggregation.function {
                    AggregateFunction::Count => Value::from(records.len() as u64),
                    _ => Value::Null,
                }
            }
        };

        let values: Vec<&Value> = records
            .iter()
            .filter_map(|r| r.get(field))
            .filter(|v| !v.is_null())
            .collect();

        match aggregation.function {
            AggregateFunction::Count => Value::from(values.len() as u64),
            AggregateFunction::Sum => sum(&values),
            AggregateFunction::Avg => {
                let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
                if numbers.is_empty() {
                    Value::Null
                } else {
                    float(numbers.iter().sum::<f64>() / numbers.len() as f64)
                }
            }
            AggregateFunction::Max => values
                .iter()
                .copied()
                .max_by(|a, b| compare_values(Some(*a), Some(*b)))
                .cloned()
                .unwrap_or(Value::Null),
            AggregateFunction::Min => values
                .iter()
                .copied()
                .min_by(|a, b| compare_values(Some(*a), Some(*b)))
                .cloned()
                .unwrap_or(Value::Null),
        }
    }
}

/// Integer sum when every input is an integer and nothing overflows
fn sum(values: &[&Value]) -> Value {
    let numbers: Vec<&Number> = values
        .iter()
        .filter_map(|v| match v {
            Value::Number(n) => Some(n),
            _ => None,
        })
        .collect();

    let integer_sum = numbers
        .iter()
        .try_fold(0i64, |acc, n| n.as_i64().and_then(|i| acc.checked_add(i)));
    match integer_sum {
        Some(total) => Value::from(total),
        None => float(numbers.iter().filter_map(|n| n.as_f64()).sum()),
    }
}

fn float(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
