//! Query optimization
//!
//! The engine only depends on the `QueryOptimizer` trait. The default
//! `RuleBasedOptimizer` rewrites predicates:
//!
//! - `dedupe_predicates`: identical predicates are kept once
//! - `order_predicates`: equality → range → membership → pattern → negation
//!
//! Each rule that changes the query is recorded in `query.optimizations`.

use super::errors::EngineResult;
use crate::query::Query;

pub trait QueryOptimizer: Send + Sync {
    fn optimize_query(&self, query: Query) -> EngineResult<Query>;
}

pub const DEDUPE_PREDICATES: &str = "dedupe_predicates";
pub const ORDER_PREDICATES: &str = "order_predicates";

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedOptimizer;

impl RuleBasedOptimizer {
    pub fn new() -> Self {
        Self
    }
}

impl QueryOptimizer for RuleBasedOptimizer {
    fn optimize_query(&self, mut query: Query) -> EngineResult<Query> {
        let before = query.filters.len();
        let mut unique = Vec::with_capacity(before);
        for predicate in query.filters.drain(..) {
            if !unique.contains(&predicate) {
                unique.push(predicate);
            }
        }
        query.filters = unique;
        if query.filters.len() < before {
            query.annotate(DEDUPE_PREDICATES);
        }

        let ordered = query
            .filters
            .windows(2)
            .all(|w| w[0].op.selectivity_rank() <= w[1].op.selectivity_rank());
        if !ordered {
            // stable: predicates of equal rank keep their written order
            query.filters.sort_by_key(|p| p.op.selectivity_rank());
            query.annotate(ORDER_PREDICATES);
        }

        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Predicate;
    use serde_json::json;

    #[test]
    fn test_removes_duplicates() {
        let query = Query::scan("orders")
            .filter_eq("status", json!("pending"))
            .filter_eq("status", json!("pending"));

        let optimized = RuleBasedOptimizer::new().optimize_query(query).unwrap();

        assert_eq!(optimized.filters.len(), 1);
        assert_eq!(optimized.optimizations, vec![DEDUPE_PREDICATES.to_string()]);
    }

    #[test]
    fn test_orders_by_selectivity() {
        let query = Query::scan("orders")
            .with_filter(Predicate::like("name", "a%"))
            .with_filter(Predicate::in_list("region", vec![json!("eu"), json!("us")]))
            .with_filter(Predicate::gt("total", json!(10)))
            .filter_eq("status", json!("pending"));

        let optimized = RuleBasedOptimizer::new().optimize_query(query).unwrap();

        let fields: Vec<&str> = optimized.filters.iter().map(|p| p.field.as_str()).collect();
        assert_eq!(fields, vec!["status", "total", "region", "name"]);
        assert!(optimized.optimizations.contains(&ORDER_PREDICATES.to_string()));
    }

    #[test]
    fn test_already_optimal_query_is_untouched() {
        let query = Query::new("SELECT * FROM orders WHERE status = 'pending' AND total > 5");

        let optimized = RuleBasedOptimizer::new().optimize_query(query.clone()).unwrap();

        assert_eq!(optimized.filters, query.filters);
        assert!(optimized.optimizations.is_empty());
    }
}
