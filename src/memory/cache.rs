//! Per-query result cache for the memory tier
//!
//! Keyed by the structural hash of the query. Entries remember the query id
//! and dataset that produced them so they can be invalidated by either.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::query::TierOutput;

use super::errors::{MemoryEngineError, MemoryResult};

#[derive(Debug, Clone)]
struct CachedOutput {
    query_id: String,
    dataset: String,
    output: TierOutput,
    size_bytes: usize,
}

/// Memory-tier query cache
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<u64, CachedOutput>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: u64) -> MemoryResult<Option<TierOutput>> {
        let entries = self.entries.lock().map_err(|_| MemoryEngineError::poisoned())?;
        Ok(entries.get(&key).map(|e| e.output.clone()))
    }

    pub fn insert(
        &self,
        key: u64,
        query_id: &str,
        dataset: &str,
        output: TierOutput,
        size_bytes: usize,
    ) -> MemoryResult<()> {
        let mut entries = self.entries.lock().map_err(|_| MemoryEngineError::poisoned())?;
        entries.insert(
            key,
            CachedOutput {
                query_id: query_id.to_string(),
                dataset: dataset.to_string(),
                output,
                size_bytes,
            },
        );
        Ok(())
    }

    /// Drops entries produced by a query id, returning how many were removed
    pub fn remove_query(&self, query_id: &str) -> MemoryResult<usize> {
        self.retain(|e| e.query_id != query_id)
    }

    /// Drops entries computed over a dataset
    pub fn remove_dataset(&self, dataset: &str) -> MemoryResult<usize> {
        self.retain(|e| e.dataset != dataset)
    }

    fn retain(&self, keep: impl Fn(&CachedOutput) -> bool) -> MemoryResult<usize> {
        let mut entries = self.entries.lock().map_err(|_| MemoryEngineError::poisoned())?;
        let before = entries.len();
        entries.retain(|_, e| keep(e));
        Ok(before - entries.len())
    }

    pub fn clear(&self) -> MemoryResult<usize> {
        self.retain(|_| false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialized bytes held by cached results
    pub fn total_bytes(&self) -> usize {
        self.entries
            .lock()
            .map(|e| e.values().map(|c| c.size_bytes).sum())
            .unwrap_or(0)
    }
}
