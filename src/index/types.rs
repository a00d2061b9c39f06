//! Index metadata types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Physical index strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStrategy {
    BTree,
    Hash,
    Bitmap,
    Inverted,
    Bloom,
    ZoneMap,
}

impl IndexStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStrategy::BTree => "btree",
            IndexStrategy::Hash => "hash",
            IndexStrategy::Bitmap => "bitmap",
            IndexStrategy::Inverted => "inverted",
            IndexStrategy::Bloom => "bloom",
            IndexStrategy::ZoneMap => "zonemap",
        }
    }

    /// Relative lookup cost (lower is cheaper)
    pub fn cost_factor(&self) -> f64 {
        match self {
            IndexStrategy::BTree => 1.0,
            IndexStrategy::Hash => 0.5,
            IndexStrategy::Bitmap => 0.3,
            IndexStrategy::Inverted => 0.8,
            IndexStrategy::Bloom => 0.2,
            IndexStrategy::ZoneMap => 0.1,
        }
    }

    /// Relative cost of keeping the index current on writes
    pub fn maintenance_cost(&self) -> f64 {
        match self {
            IndexStrategy::BTree => 1.0,
            IndexStrategy::Hash => 0.8,
            IndexStrategy::Bitmap => 1.2,
            IndexStrategy::Inverted => 1.5,
            IndexStrategy::Bloom => 0.3,
            IndexStrategy::ZoneMap => 0.2,
        }
    }
}

impl Default for IndexStrategy {
    fn default() -> Self {
        IndexStrategy::BTree
    }
}

/// Index lifecycle status
///
/// `Building -> Active`, `Active -> Building -> Active` on rebuild,
/// `* -> Corrupted` only through explicit marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Building,
    Active,
    Corrupted,
}

/// Index usage counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexUsageStats {
    pub total_scans: u64,
    pub total_seeks: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub last_used: Option<DateTime<Utc>>,
}

impl IndexUsageStats {
    /// Record one lookup
    ///
    /// A hit is served by an index seek; a miss fell back to a scan.
    pub fn record(&mut self, hit: bool, at: DateTime<Utc>) {
        if hit {
            self.total_seeks += 1;
            self.hits += 1;
        } else {
            self.total_scans += 1;
            self.misses += 1;
        }
        let lookups = self.hits + self.misses;
        self.hit_rate = self.hits as f64 / lookups as f64;
        self.last_used = Some(at);
    }
}

/// Requested index definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub strategy: IndexStrategy,
    #[serde(default)]
    pub unique: bool,
    /// Partial index predicate
    #[serde(default)]
    pub partial: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl IndexConfig {
    pub fn new(table: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            table: table.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            strategy: IndexStrategy::default(),
            unique: false,
            partial: None,
            name: None,
            tenant_id: None,
        }
    }

    pub fn with_strategy(mut self, strategy: IndexStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_partial(mut self, predicate: impl Into<String>) -> Self {
        self.partial = Some(predicate.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// Index metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub id: String,
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub strategy: IndexStrategy,
    pub unique: bool,
    pub partial: Option<String>,
    pub size_bytes: u64,
    pub cardinality: u64,
    pub status: IndexStatus,
    pub created_at: DateTime<Utc>,
    pub last_rebuilt: Option<DateTime<Utc>>,
    pub tenant_id: Option<String>,
    pub usage: IndexUsageStats,
}

impl IndexInfo {
    /// New metadata entry in `Building` status
    pub fn building(config: IndexConfig) -> Self {
        let name = config
            .name
            .unwrap_or_else(|| format!("idx_{}_{}", config.table, config.columns.join("_")));
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            table: config.table,
            columns: config.columns,
            strategy: config.strategy,
            unique: config.unique,
            partial: config.partial,
            size_bytes: 0,
            cardinality: 0,
            status: IndexStatus::Building,
            created_at: Utc::now(),
            last_rebuilt: None,
            tenant_id: config.tenant_id,
            usage: IndexUsageStats::default(),
        }
    }

    pub fn leading_column(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    /// Same table and same ordered columns
    pub fn is_structural_duplicate(&self, table: &str, columns: &[String]) -> bool {
        self.table == table && self.columns == columns
    }

    /// Last use, or creation time if never used
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.usage.last_used.unwrap_or(self.created_at)
    }

    /// Last rebuild, or creation time if never rebuilt
    pub fn last_build(&self) -> DateTime<Utc> {
        self.last_rebuilt.unwrap_or(self.created_at)
    }
}

/// Recommended index action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationAction {
    Create,
    Drop,
    Rebuild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSeverity {
    Low,
    Medium,
    High,
}

/// Advisory index recommendation; never applied automatically
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecommendation {
    pub action: RecommendationAction,
    pub severity: RecommendationSeverity,
    pub table: String,
    pub columns: Vec<String>,
    pub index_id: Option<String>,
    pub reason: String,
}

/// Outcome of an index optimization pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Rebuilt index ids
    pub rebuilt: Vec<String>,
    /// Unused index ids reported for dropping (not dropped)
    pub drop_candidates: Vec<String>,
    pub actions_taken: usize,
}

/// Aggregate index statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStatistics {
    pub total_indexes: usize,
    pub active: usize,
    pub building: usize,
    pub corrupted: usize,
    pub total_size_bytes: u64,
    pub average_hit_rate: f64,
    pub by_strategy: BTreeMap<String, usize>,
}
