//! Named in-memory datasets with secondary hash indexes

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::query::{FilterOp, Predicate};

/// Fields that get a secondary index when present on the first record
pub const INDEXED_FIELDS: &[&str] = &["id", "userId", "timestamp", "status", "type"];

/// Records sampled when estimating dataset size
pub const SIZE_SAMPLE: usize = 10;

/// field value (canonical JSON) -> row positions
type FieldIndex = HashMap<String, BTreeSet<usize>>;

/// A named dataset held in memory
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    records: Vec<Value>,
    indexes: BTreeMap<String, FieldIndex>,
    size_bytes: u64,
    loaded_at: DateTime<Utc>,
}

impl Dataset {
    /// Builds a dataset and its secondary indexes
    pub fn new(name: impl Into<String>, records: Vec<Value>) -> Self {
        let size_bytes = estimate_size(&records);
        let indexes = build_indexes(&records);
        Self {
            name: name.into(),
            records,
            indexes,
            size_bytes,
            loaded_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Names of indexed fields
    pub fn indexed_fields(&self) -> Vec<&str> {
        self.indexes.keys().map(String::as_str).collect()
    }

    /// Narrows candidate rows through equality filters on indexed fields.
    ///
    /// Returns `None` when no filter can use an index. Otherwise returns the
    /// intersected row positions (ascending) and the index names used.
    pub fn index_candidates(&self, filters: &[Predicate]) -> Option<(Vec<usize>, Vec<String>)> {
        let mut candidates: Option<BTreeSet<usize>> = None;
        let mut used = Vec::new();

        for predicate in filters {
            let value = match &predicate.op {
                FilterOp::Eq(value) => value,
                _ => continue,
            };
            let index = match self.indexes.get(&predicate.field) {
                Some(index) => index,
                None => continue,
            };

            let rows = index.get(&index_key(value)).cloned().unwrap_or_default();
            candidates = Some(match candidates {
                Some(existing) => existing.intersection(&rows).copied().collect(),
                None => rows,
            });
            let name = format!("{}.{}", self.name, predicate.field);
            if !used.contains(&name) {
                used.push(name);
            }
        }

        candidates.map(|rows| (rows.into_iter().collect(), used))
    }
}

/// Estimates serialized size by sampling up to `SIZE_SAMPLE` records
pub fn estimate_size(records: &[Value]) -> u64 {
    if records.is_empty() {
        return 0;
    }
    let sample = &records[..records.len().min(SIZE_SAMPLE)];
    let sampled_bytes: usize = sample
        .iter()
        .map(|r| serde_json::to_vec(r).map(|b| b.len()).unwrap_or(0))
        .sum();
    let average = sampled_bytes as f64 / sample.len() as f64;
    (average * records.len() as f64).ceil() as u64
}

fn build_indexes(records: &[Value]) -> BTreeMap<String, FieldIndex> {
    let mut indexes = BTreeMap::new();
    let first = match records.first() {
        Some(first) => first,
        None => return indexes,
    };

    for field in INDEXED_FIELDS {
        if first.get(*field).is_none() {
            continue;
        }
        let mut index: FieldIndex = HashMap::new();
        for (row, record) in records.iter().enumerate() {
            if let Some(value) = record.get(*field) {
                index.entry(index_key(value)).or_default().insert(row);
            }
        }
        indexes.insert(field.to_string(), index);
    }
    indexes
}

/// Canonical key: integral floats fold into integers so 1 and 1.0 collide
fn index_key(value: &Value) -> String {
    if let Value::Number(n) = value {
        if n.as_i64().is_none() && n.as_u64().is_none() {
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    return (f as i64).to_string();
                }
            }
        }
    }
    value.to_string()
}
