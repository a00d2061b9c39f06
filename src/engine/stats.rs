//! Cross-component statistics and health

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cache::CacheStats;
use crate::distributed::DistributedStatistics;
use crate::index::IndexStatistics;
use crate::memory::MemoryStatistics;
use crate::observability::{ComponentHealth, HealthStatus};

/// Engine-level query counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryStatistics {
    pub executed: u64,
    pub failed: u64,
    pub cache_hits: u64,
    pub cancelled: u64,
    pub fallbacks: u64,
    pub active: usize,
    pub history_entries: usize,
    pub average_execution_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewStatistics {
    pub views: usize,
    pub hit_rate: f64,
}

/// Snapshot of every component's statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStatistics {
    pub tenant_id: String,
    pub queries: QueryStatistics,
    pub cache: CacheStats,
    pub memory: MemoryStatistics,
    pub distributed: DistributedStatistics,
    pub indexes: IndexStatistics,
    pub views: ViewStatistics,
    pub tiering_policies: usize,
    pub collected_at: DateTime<Utc>,
}

/// Engine health: the worst component status wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub running: bool,
    pub components: Vec<ComponentHealth>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn from_components(running: bool, components: Vec<ComponentHealth>) -> Self {
        let mut status = HealthStatus::worst(components.iter().map(|c| c.status));
        if !running {
            status = status.max(HealthStatus::Degraded);
        }
        Self {
            status,
            running,
            components,
            checked_at: Utc::now(),
        }
    }

    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.component == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_component_wins() {
        let report = HealthReport::from_components(
            true,
            vec![
                ComponentHealth::new("memory", HealthStatus::Healthy),
                ComponentHealth::new("distributed", HealthStatus::Degraded),
            ],
        );
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.component("memory").is_some());
    }

    #[test]
    fn test_stopped_engine_is_at_least_degraded() {
        let report = HealthReport::from_components(
            false,
            vec![ComponentHealth::new("memory", HealthStatus::Healthy)],
        );
        assert_eq!(report.status, HealthStatus::Degraded);
    }
}
