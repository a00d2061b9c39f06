//! Storage tiering and optimization requests

use serde::{Deserialize, Serialize};

use super::errors::{EngineError, EngineResult};

/// Age thresholds, in days, for moving data between storage tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieringPolicy {
    pub hot_days: u32,
    pub warm_days: u32,
    pub cold_days: u32,
}

impl TieringPolicy {
    pub fn new(hot_days: u32, warm_days: u32, cold_days: u32) -> Self {
        Self {
            hot_days,
            warm_days,
            cold_days,
        }
    }

    /// Thresholds must be positive and strictly increasing
    pub fn validate(&self) -> EngineResult<()> {
        if self.hot_days == 0 {
            return Err(EngineError::InvalidConfig(
                "tiering hot_days must be > 0".to_string(),
            ));
        }
        if !(self.hot_days < self.warm_days && self.warm_days < self.cold_days) {
            return Err(EngineError::InvalidConfig(format!(
                "tiering thresholds must satisfy hot < warm < cold, got {}/{}/{}",
                self.hot_days, self.warm_days, self.cold_days
            )));
        }
        Ok(())
    }

    /// Storage tier name for data of the given age
    pub fn tier_for_age(&self, age_days: u32) -> &'static str {
        if age_days < self.hot_days {
            "hot"
        } else if age_days < self.warm_days {
            "warm"
        } else if age_days < self.cold_days {
            "cold"
        } else {
            "archive"
        }
    }
}

impl Default for TieringPolicy {
    fn default() -> Self {
        Self::new(7, 30, 90)
    }
}

/// Selects the steps of an optimization pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageOptimization {
    pub indexes: bool,
    pub compaction: bool,
    pub statistics: bool,
    pub views: bool,
}

impl StorageOptimization {
    pub fn all() -> Self {
        Self {
            indexes: true,
            compaction: true,
            statistics: true,
            views: true,
        }
    }

    pub fn none() -> Self {
        Self {
            indexes: false,
            compaction: false,
            statistics: false,
            views: false,
        }
    }
}

impl Default for StorageOptimization {
    fn default() -> Self {
        Self::all()
    }
}

/// Outcome of an optimization pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageOptimizationReport {
    pub indexes_rebuilt: usize,
    pub index_drop_candidates: usize,
    pub tables_compacted: usize,
    pub statistics_refreshed: bool,
    pub views_refreshed: usize,
    pub duration_ms: u64,
}
