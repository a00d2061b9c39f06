//! Predicate filtering for in-memory execution
//!
//! Records match when every predicate matches (AND semantics).
//! No type coercion between strings and numbers. A missing or null field
//! never matches, whatever the operator.

use std::cmp::Ordering;

use serde_json::Value;

use crate::query::{FilterOp, Predicate};

/// Evaluates predicates against records
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if a record matches all predicates
    pub fn matches(record: &Value, predicates: &[Predicate]) -> bool {
        predicates
            .iter()
            .all(|pred| Self::matches_predicate(record, pred))
    }

    /// Checks if a record matches a single predicate
    pub fn matches_predicate(record: &Value, predicate: &Predicate) -> bool {
        let field_value = match record.get(&predicate.field) {
            Some(v) if !v.is_null() => v,
            _ => return false,
        };

        match &predicate.op {
            FilterOp::Eq(expected) => Self::eq_match(field_value, expected),
            FilterOp::Ne(expected) => !Self::eq_match(field_value, expected),
            FilterOp::Gt(bound) => Self::compare(field_value, bound) == Some(Ordering::Greater),
            FilterOp::Gte(bound) => matches!(
                Self::compare(field_value, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt(bound) => Self::compare(field_value, bound) == Some(Ordering::Less),
            FilterOp::Lte(bound) => matches!(
                Self::compare(field_value, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::In(values) => values.iter().any(|v| Self::eq_match(field_value, v)),
            FilterOp::Like(pattern) => match field_value {
                Value::String(s) => like_match(s, pattern),
                _ => false,
            },
        }
    }

    /// Equality without coercion; numbers compare by value (1 == 1.0)
    fn eq_match(actual: &Value, expected: &Value) -> bool {
        match (actual, expected) {
            (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
                (Some(af), Some(bf)) => af == bf,
                _ => a == b,
            },
            _ => actual == expected,
        }
    }

    /// Ordering for numbers and strings; other pairs are incomparable
    fn compare(actual: &Value, bound: &Value) -> Option<Ordering> {
        match (actual, bound) {
            (Value::Number(a), Value::Number(b)) => {
                if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
                    return Some(ai.cmp(&bi));
                }
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// SQL LIKE, case-insensitive: `%` matches any run, `_` exactly one character
pub fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut star_t = 0usize;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}
