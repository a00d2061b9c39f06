//! Query shape analysis
//!
//! Counts the structural features that drive tier selection:
//!
//! ```text
//! cost       = 1 + 2·joins + 1.5·aggregations
//! complexity = min(1, (subqueries + 2·unions + 3·window_functions) / 10)
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::ast::Query;
use super::parser::aggregate_re;

/// Structural features of a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryShape {
    pub joins: usize,
    pub aggregations: usize,
    pub subqueries: usize,
    pub unions: usize,
    pub window_functions: usize,
}

fn count(pattern: &'static OnceLock<Regex>, source: &str, sql: &str) -> usize {
    pattern
        .get_or_init(|| Regex::new(source).expect("static pattern compiles"))
        .find_iter(sql)
        .count()
}

impl QueryShape {
    /// Analyzes the SQL text together with the structured descriptors
    ///
    /// Descriptors and SQL may describe the same feature, so each count is
    /// the larger of the two sources rather than their sum.
    pub fn analyze(query: &Query) -> Self {
        static JOIN: OnceLock<Regex> = OnceLock::new();
        static SUBQUERY: OnceLock<Regex> = OnceLock::new();
        static UNION: OnceLock<Regex> = OnceLock::new();
        static WINDOW: OnceLock<Regex> = OnceLock::new();

        let sql = query.sql.as_str();
        let sql_aggregations = aggregate_re()
            .captures_iter(sql)
            .filter(|caps| caps.get(3).is_none())
            .count();

        Self {
            joins: query
                .joins
                .len()
                .max(count(&JOIN, r"(?i)\bJOIN\b", sql)),
            aggregations: query.aggregations.len().max(sql_aggregations),
            subqueries: count(&SUBQUERY, r"(?i)\(\s*SELECT\b", sql),
            unions: count(&UNION, r"(?i)\bUNION\b", sql),
            window_functions: count(&WINDOW, r"(?i)\bOVER\s*\(", sql),
        }
    }

    /// Estimated relative cost
    pub fn cost(&self) -> f64 {
        1.0 + 2.0 * self.joins as f64 + 1.5 * self.aggregations as f64
    }

    /// Complexity score in `[0, 1]`
    pub fn complexity(&self) -> f64 {
        let raw = self.subqueries as f64
            + 2.0 * self.unions as f64
            + 3.0 * self.window_functions as f64;
        (raw / 10.0).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_scan_is_cheap() {
        let shape = QueryShape::analyze(&Query::new("SELECT * FROM orders"));

        assert_eq!(shape, QueryShape::default());
        assert_eq!(shape.cost(), 1.0);
        assert_eq!(shape.complexity(), 0.0);
    }

    #[test]
    fn test_joins_and_aggregations_drive_cost() {
        let query = Query::new(
            "SELECT COUNT(*), SUM(o.amount) FROM orders o JOIN users u ON o.userId = u.id",
        );
        let shape = QueryShape::analyze(&query);

        assert_eq!(shape.joins, 1);
        assert_eq!(shape.aggregations, 2);
        assert_eq!(shape.cost(), 1.0 + 2.0 + 3.0);
    }

    #[test]
    fn test_descriptors_are_not_double_counted() {
        let query = Query::new("SELECT COUNT(*) FROM orders")
            .with_join("users", "orders.userId = users.id");
        let shape = QueryShape::analyze(&query);

        assert_eq!(shape.joins, 1);
        assert_eq!(shape.aggregations, 1);
    }

    #[test]
    fn test_complexity_weights() {
        let query = Query::new(
            "SELECT id FROM a WHERE x IN (SELECT x FROM b) UNION SELECT id FROM c",
        );
        let shape = QueryShape::analyze(&query);

        assert_eq!(shape.subqueries, 1);
        assert_eq!(shape.unions, 1);
        assert!((shape.complexity() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_complexity_is_capped() {
        let query = Query::new(
            "SELECT RANK() OVER (ORDER BY a), RANK() OVER (ORDER BY b), RANK() OVER (ORDER BY c), RANK() OVER (ORDER BY d) FROM t",
        );
        let shape = QueryShape::analyze(&query);

        assert_eq!(shape.window_functions, 4);
        assert_eq!(shape.complexity(), 1.0);
    }
}
