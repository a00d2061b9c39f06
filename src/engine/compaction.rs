//! Table compaction

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::errors::EngineResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactionReport {
    pub tables_compacted: usize,
    /// Mean compressed / original size over compacted tables
    pub compression_ratio: f64,
}

#[async_trait]
pub trait CompactionManager: Send + Sync {
    async fn compact_tables(&self, tables: &[String]) -> EngineResult<CompactionReport>;
}

/// Reports a simulated compression ratio per table after a fixed delay
pub struct SimulatedCompaction {
    delay_per_table: Duration,
    runs: AtomicU64,
}

impl SimulatedCompaction {
    pub fn new(delay_per_table: Duration) -> Self {
        Self {
            delay_per_table,
            runs: AtomicU64::new(0),
        }
    }

    /// Number of completed compaction passes
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedCompaction {
    fn default() -> Self {
        Self::new(Duration::from_millis(5))
    }
}

#[async_trait]
impl CompactionManager for SimulatedCompaction {
    async fn compact_tables(&self, tables: &[String]) -> EngineResult<CompactionReport> {
        let mut ratio_sum = 0.0;
        for _ in tables {
            tokio::time::sleep(self.delay_per_table).await;
            ratio_sum += rand::thread_rng().gen_range(0.3..0.7);
        }
        self.runs.fetch_add(1, Ordering::SeqCst);

        Ok(CompactionReport {
            tables_compacted: tables.len(),
            compression_ratio: if tables.is_empty() {
                1.0
            } else {
                ratio_sum / tables.len() as f64
            },
        })
    }
}
