//! Engine configuration
//!
//! Loaded from a JSON file. Every field has a default, so `{}` is a valid
//! configuration. `validate()` is run on load.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{EngineError, EngineResult};
use super::plan::Tier;
use crate::distributed::DistributedConfig;
use crate::index::IndexManagerConfig;
use crate::memory::MemoryEngineConfig;

/// Thresholds for hybrid tier selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Queries cheaper than this run in memory
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold: f64,

    /// Queries less complex than this run in memory
    #[serde(default = "default_complexity_threshold")]
    pub complexity_threshold: f64,
}

fn default_memory_threshold() -> f64 {
    10.0
}

fn default_complexity_threshold() -> f64 {
    0.5
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            memory_threshold: default_memory_threshold(),
            complexity_threshold: default_complexity_threshold(),
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,

    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_max_entries() -> usize {
    10_000
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
        }
    }
}

/// Performance monitoring and query history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_performance_interval_secs")]
    pub performance_interval_secs: u64,

    #[serde(default = "default_memory_check_interval_secs")]
    pub memory_check_interval_secs: u64,

    /// Rolling average above which `SlowQueries` is emitted
    #[serde(default = "default_slow_query_threshold_ms")]
    pub slow_query_threshold_ms: u64,

    /// Number of most recent history entries in the rolling average
    #[serde(default = "default_performance_window")]
    pub performance_window: usize,

    #[serde(default = "default_history_max_entries")]
    pub history_max_entries: usize,

    #[serde(default = "default_history_retention_secs")]
    pub history_retention_secs: u64,

    #[serde(default = "default_history_cleanup_interval_secs")]
    pub history_cleanup_interval_secs: u64,
}

fn default_performance_interval_secs() -> u64 {
    30
}

fn default_memory_check_interval_secs() -> u64 {
    30
}

fn default_slow_query_threshold_ms() -> u64 {
    1000
}

fn default_performance_window() -> usize {
    100
}

fn default_history_max_entries() -> usize {
    10_000
}

fn default_history_retention_secs() -> u64 {
    24 * 60 * 60
}

fn default_history_cleanup_interval_secs() -> u64 {
    300
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            performance_interval_secs: default_performance_interval_secs(),
            memory_check_interval_secs: default_memory_check_interval_secs(),
            slow_query_threshold_ms: default_slow_query_threshold_ms(),
            performance_window: default_performance_window(),
            history_max_entries: default_history_max_entries(),
            history_retention_secs: default_history_retention_secs(),
            history_cleanup_interval_secs: default_history_cleanup_interval_secs(),
        }
    }
}

/// Background maintenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_true")]
    pub auto_optimize: bool,

    #[serde(default = "default_optimize_interval_secs")]
    pub optimize_interval_secs: u64,

    /// How often views are checked for a due refresh
    #[serde(default = "default_view_refresh_interval_secs")]
    pub view_refresh_interval_secs: u64,
}

fn default_optimize_interval_secs() -> u64 {
    3600
}

fn default_view_refresh_interval_secs() -> u64 {
    60
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            auto_optimize: true,
            optimize_interval_secs: default_optimize_interval_secs(),
            view_refresh_interval_secs: default_view_refresh_interval_secs(),
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed tier, or `hybrid` for cost-based selection
    #[serde(default)]
    pub mode: Tier,

    #[serde(default)]
    pub hybrid: HybridConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    #[serde(default)]
    pub memory: MemoryEngineConfig,

    #[serde(default)]
    pub distributed: DistributedConfig,

    #[serde(default)]
    pub index: IndexManagerConfig,

    /// Per-query timeout when the caller sets none
    #[serde(default)]
    pub query_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: Tier::Hybrid,
            hybrid: HybridConfig::default(),
            cache: CacheConfig::default(),
            monitoring: MonitoringConfig::default(),
            maintenance: MaintenanceConfig::default(),
            memory: MemoryEngineConfig::default(),
            distributed: DistributedConfig::default(),
            index: IndexManagerConfig::default(),
            query_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a JSON file
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| EngineError::InvalidConfig(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Write configuration as pretty JSON
    pub fn write_to(&self, path: &Path) -> EngineResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        fs::write(path, json).map_err(|e| {
            EngineError::InvalidConfig(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    pub fn validate(&self) -> EngineResult<()> {
        let intervals = [
            ("monitoring.performance_interval_secs", self.monitoring.performance_interval_secs),
            ("monitoring.memory_check_interval_secs", self.monitoring.memory_check_interval_secs),
            (
                "monitoring.history_cleanup_interval_secs",
                self.monitoring.history_cleanup_interval_secs,
            ),
            ("monitoring.history_retention_secs", self.monitoring.history_retention_secs),
            ("maintenance.optimize_interval_secs", self.maintenance.optimize_interval_secs),
            (
                "maintenance.view_refresh_interval_secs",
                self.maintenance.view_refresh_interval_secs,
            ),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(EngineError::InvalidConfig(format!("{} must be > 0", name)));
            }
        }

        if self.monitoring.performance_window == 0 || self.monitoring.history_max_entries == 0 {
            return Err(EngineError::InvalidConfig(
                "history sizes must be > 0".to_string(),
            ));
        }

        if self.hybrid.memory_threshold <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "hybrid.memory_threshold must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.hybrid.complexity_threshold) {
            return Err(EngineError::InvalidConfig(
                "hybrid.complexity_threshold must be within [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.memory.pressure_threshold) {
            return Err(EngineError::InvalidConfig(
                "memory.pressure_threshold must be within [0, 1]".to_string(),
            ));
        }
        if self.memory.max_memory_bytes == 0 {
            return Err(EngineError::InvalidConfig(
                "memory.max_memory_bytes must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.index.optimal_hit_rate) {
            return Err(EngineError::InvalidConfig(
                "index.optimal_hit_rate must be within [0, 1]".to_string(),
            ));
        }

        if self.mode != Tier::Memory && self.distributed.nodes.is_empty() {
            return Err(EngineError::InvalidConfig(format!(
                "{} mode requires at least one distributed node",
                self.mode
            )));
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(EngineError::InvalidConfig(
                "cache.max_entries must be > 0".to_string(),
            ));
        }

        if self.query_timeout_ms == Some(0) {
            return Err(EngineError::InvalidConfig(
                "query_timeout_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}
