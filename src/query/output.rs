//! Raw output handed back by an execution tier

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inferred JSON type of a result column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl ColumnType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ColumnType::Null,
            Value::Bool(_) => ColumnType::Boolean,
            Value::Number(_) => ColumnType::Number,
            Value::String(_) => ColumnType::String,
            Value::Array(_) => ColumnType::Array,
            Value::Object(_) => ColumnType::Object,
        }
    }
}

/// Result column descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: ColumnType,
}

/// Infers columns from the first record
pub fn infer_columns(rows: &[Value]) -> Vec<ColumnInfo> {
    match rows.first() {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(name, value)| ColumnInfo {
                name: name.clone(),
                data_type: ColumnType::of(value),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// What a tier returns to the orchestrator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierOutput {
    pub rows: Vec<Value>,
    pub columns: Vec<ColumnInfo>,
    pub execution_time_ms: u64,
    pub tables_scanned: Vec<String>,
    pub indexes_used: Vec<String>,
    /// Records contributed by each node (distributed tier only)
    pub node_record_counts: Option<BTreeMap<String, usize>>,
    /// Nodes that ran a fragment (distributed tier only)
    pub nodes_queried: Option<usize>,
}

impl TierOutput {
    /// Output with columns inferred from the rows
    pub fn from_rows(rows: Vec<Value>) -> Self {
        let columns = infer_columns(&rows);
        Self {
            rows,
            columns,
            ..Self::default()
        }
    }

    pub fn with_execution_time(mut self, ms: u64) -> Self {
        self.execution_time_ms = ms;
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.tables_scanned.push(table.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_columns_from_first_row() {
        let rows = vec![
            json!({"id": 1, "status": "pending", "tags": [], "paid": false}),
            json!({"id": 2}),
        ];
        let columns = infer_columns(&rows);

        assert_eq!(columns.len(), 4);
        let id = columns.iter().find(|c| c.name == "id").unwrap();
        assert_eq!(id.data_type, ColumnType::Number);
        let paid = columns.iter().find(|c| c.name == "paid").unwrap();
        assert_eq!(paid.data_type, ColumnType::Boolean);
    }

    #[test]
    fn test_infer_columns_empty() {
        assert!(infer_columns(&[]).is_empty());
        assert!(infer_columns(&[json!(5)]).is_empty());
    }

    #[test]
    fn test_from_rows() {
        let output = TierOutput::from_rows(vec![json!({"count": 3})])
            .with_execution_time(12)
            .with_table("orders");

        assert_eq!(output.columns[0].name, "count");
        assert_eq!(output.execution_time_ms, 12);
        assert_eq!(output.tables_scanned, vec!["orders"]);
        assert!(output.node_record_counts.is_none());
    }
}
