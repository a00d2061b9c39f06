//! Index builders
//!
//! Building runs outside any metadata lock; the manager flips status once
//! the builder returns.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use super::errors::IndexResult;
use super::types::IndexInfo;

/// Physical properties of a freshly built index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOutcome {
    pub size_bytes: u64,
    pub cardinality: u64,
}

/// Builds the physical structure behind an index definition
#[async_trait]
pub trait IndexBuilder: Send + Sync {
    async fn build(&self, index: &IndexInfo) -> IndexResult<BuildOutcome>;
}

/// Simulated builder: delay proportional to column count, random size/cardinality
#[derive(Debug, Clone)]
pub struct SimulatedIndexBuilder {
    per_column_delay: Duration,
}

impl SimulatedIndexBuilder {
    pub fn new(per_column_delay: Duration) -> Self {
        Self { per_column_delay }
    }
}

impl Default for SimulatedIndexBuilder {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

#[async_trait]
impl IndexBuilder for SimulatedIndexBuilder {
    async fn build(&self, index: &IndexInfo) -> IndexResult<BuildOutcome> {
        let columns = index.columns.len().max(1) as u32;
        tokio::time::sleep(self.per_column_delay * columns).await;

        let mut rng = rand::thread_rng();
        Ok(BuildOutcome {
            size_bytes: rng.gen_range(1_000_000..100_000_000),
            cardinality: rng.gen_range(1_000..1_000_000),
        })
    }
}
