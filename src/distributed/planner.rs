//! Fragment planning
//!
//! Static partitioning: one fragment per active node, in node-id order.
//! Each fragment carries the dataset and filters so nodes can prune their
//! partition; sorting, slicing and aggregation happen at the coordinator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::{Predicate, Query};

/// Work unit sent to one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFragment {
    pub query_id: String,
    pub fragment_id: String,
    pub node_id: String,
    pub sql: String,
    pub dataset: Option<String>,
    pub filters: Vec<Predicate>,
}

/// One node's answer to a fragment
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentResult {
    pub node_id: String,
    pub rows: Vec<Value>,
    pub record_count: usize,
    pub execution_time_ms: u64,
}

impl FragmentResult {
    pub fn new(node_id: impl Into<String>, rows: Vec<Value>, execution_time_ms: u64) -> Self {
        let record_count = rows.len();
        Self {
            node_id: node_id.into(),
            rows,
            record_count,
            execution_time_ms,
        }
    }
}

pub struct FragmentPlanner;

impl FragmentPlanner {
    /// One fragment per node; `node_ids` need not be sorted
    pub fn plan(query: &Query, node_ids: &[String]) -> Vec<QueryFragment> {
        let mut ordered: Vec<&String> = node_ids.iter().collect();
        ordered.sort();
        ordered.dedup();

        let dataset = query.dataset_name();
        ordered
            .into_iter()
            .enumerate()
            .map(|(i, node_id)| QueryFragment {
                query_id: query.id.clone(),
                fragment_id: format!("{}-f{}", query.id, i),
                node_id: node_id.clone(),
                sql: query.sql.clone(),
                dataset: dataset.clone(),
                filters: query.filters.clone(),
            })
            .collect()
    }
}
