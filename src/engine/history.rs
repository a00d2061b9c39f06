//! Bounded query history
//!
//! Oldest entries are dropped when the entry ceiling is reached; entries
//! older than the retention window are evicted by `evict_expired`.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::plan::Tier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query_id: String,
    pub tenant_id: String,
    pub tier: Tier,
    pub execution_time_ms: u64,
    pub row_count: usize,
    pub cached: bool,
    /// Error code when the execution failed
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub struct QueryHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
    max_entries: usize,
    retention: Duration,
}

impl QueryHistory {
    pub fn new(max_entries: usize, retention: std::time::Duration) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries: max_entries.max(1),
            retention: Duration::from_std(retention).unwrap_or_else(|_| Duration::days(1)),
        }
    }

    pub fn record(&self, entry: HistoryEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            while entries.len() >= self.max_entries {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Removes entries older than the retention window; returns how many
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        match self.entries.lock() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|e| e.executed_at >= cutoff);
                before - entries.len()
            }
            Err(_) => 0,
        }
    }

    /// Most recent entries, newest last
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .map(|entries| {
                let skip = entries.len().saturating_sub(limit);
                entries.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// All entries for a tenant, newest last
    pub fn for_tenant(&self, tenant_id: &str) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.tenant_id == tenant_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Mean execution time of the last `window` successful executions.
    /// Cache hits never ran on a tier and are left out.
    pub fn rolling_average_ms(&self, window: usize) -> Option<f64> {
        let entries = self.entries.lock().ok()?;
        let times: Vec<u64> = entries
            .iter()
            .rev()
            .filter(|e| e.succeeded() && !e.cached)
            .take(window)
            .map(|e| e.execution_time_ms)
            .collect();
        if times.is_empty() {
            return None;
        }
        Some(times.iter().sum::<u64>() as f64 / times.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
