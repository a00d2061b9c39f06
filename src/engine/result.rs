//! Query results

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::plan::{QueryPlan, Tier};
use crate::query::{ColumnInfo, TierOutput};

/// Execution details attached to a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub tables_scanned: Vec<String>,
    pub indexes_used: Vec<String>,
    pub tier: Tier,
    pub optimizations_applied: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_record_counts: Option<BTreeMap<String, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes_queried: Option<usize>,
    /// Hybrid plan fell back from memory to distributed
    #[serde(default)]
    pub fallback_used: bool,
}

/// Result of one query execution
///
/// `row_count` always equals `rows.len()`; the only constructor derives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    rows: Vec<Value>,
    columns: Vec<ColumnInfo>,
    row_count: usize,
    pub execution_time_ms: u64,
    pub executed_at: DateTime<Utc>,
    pub cached: bool,
    pub tenant_id: String,
    pub metadata: ResultMetadata,
}

impl QueryResult {
    /// Builds the result for a plan from the tier that actually ran it
    pub fn from_output(plan: &QueryPlan, tier: Tier, output: TierOutput, fallback_used: bool) -> Self {
        let indexes_used = if output.indexes_used.is_empty() {
            plan.index_ids.clone()
        } else {
            output.indexes_used
        };

        Self {
            id: plan.query.id.clone(),
            row_count: output.rows.len(),
            rows: output.rows,
            columns: output.columns,
            execution_time_ms: output.execution_time_ms,
            executed_at: Utc::now(),
            cached: false,
            tenant_id: plan.tenant_id.clone(),
            metadata: ResultMetadata {
                tables_scanned: output.tables_scanned,
                indexes_used,
                tier,
                optimizations_applied: plan.query.optimizations.clone(),
                node_record_counts: output.node_record_counts,
                nodes_queried: output.nodes_queried,
                fallback_used,
            },
        }
    }

    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn into_rows(self) -> Vec<Value> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use serde_json::json;

    fn plan() -> QueryPlan {
        let mut query = Query::new("SELECT * FROM orders").with_id("q-1");
        query.annotate("dedupe_predicates");
        QueryPlan {
            id: "p-1".into(),
            query,
            tenant_id: "tenant-a".into(),
            tier: Tier::Hybrid,
            index_ids: vec!["idx-1".into()],
            parallelism: 1,
            estimated_cost: 1.0,
            estimated_time_ms: 5,
            created_at: Utc::now(),
            hints: vec![],
        }
    }

    #[test]
    fn test_row_count_matches_rows() {
        let output = TierOutput::from_rows(vec![json!({"id": 1}), json!({"id": 2})])
            .with_execution_time(7)
            .with_table("orders");

        let result = QueryResult::from_output(&plan(), Tier::Distributed, output, true);

        assert_eq!(result.row_count(), result.rows().len());
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.id, "q-1");
        assert_eq!(result.metadata.tier, Tier::Distributed);
        assert!(result.metadata.fallback_used);
        assert_eq!(result.metadata.indexes_used, vec!["idx-1".to_string()]);
        assert_eq!(result.metadata.optimizations_applied, vec!["dedupe_predicates".to_string()]);
        assert!(!result.cached);
    }

    #[test]
    fn test_serialized_shape() {
        let result = QueryResult::from_output(&plan(), Tier::Memory, TierOutput::default(), false)
            .with_cached(true);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["row_count"], 0);
        assert_eq!(json["cached"], true);
        assert_eq!(json["metadata"]["tier"], "memory");
        assert!(json["metadata"].get("nodes_queried").is_none());
    }
}
