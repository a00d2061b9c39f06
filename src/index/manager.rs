//! Index Manager
//!
//! Owns index metadata, usage statistics and advisory recommendations.
//!
//! # API
//!
//! - `create_index(config)` - Insert as `Building`, build, flip to `Active`
//! - `drop_index(id)` - Remove an index
//! - `record_usage(id, hit)` - Update seek/scan statistics
//! - `analyze_query(query, indexes_used)` - Advisory recommendations
//! - `find_unused_indexes()` - Idle indexes with few seeks
//! - `optimize_indexes()` - Rebuild stale indexes, report drop candidates
//! - `get_optimal_indexes(table)` - Active, high hit rate, recently used

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::builder::{IndexBuilder, SimulatedIndexBuilder};
use super::errors::{IndexError, IndexResult};
use super::repository::{InMemoryIndexRepository, IndexRepository};
use super::types::{
    IndexConfig, IndexInfo, IndexRecommendation, IndexStatistics, IndexStatus,
    OptimizationReport, RecommendationAction, RecommendationSeverity,
};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, MetricsSink};
use crate::query::Query;

/// Index manager thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManagerConfig {
    /// Rebuild active indexes whose last build is older than this
    #[serde(default = "default_stale_rebuild_days")]
    pub stale_rebuild_days: i64,

    /// Idle window after which an index counts as unused
    #[serde(default = "default_unused_after_days")]
    pub unused_after_days: i64,

    /// Indexes with fewer seeks than this may count as unused
    #[serde(default = "default_min_seeks")]
    pub min_seeks: u64,

    /// Hit rate an index must exceed to be considered optimal
    #[serde(default = "default_optimal_hit_rate")]
    pub optimal_hit_rate: f64,

    /// Optimal indexes must have been used within this window
    #[serde(default = "default_optimal_recency_days")]
    pub optimal_recency_days: i64,

    /// Size multiplier applied by a rebuild
    #[serde(default = "default_rebuild_shrink_factor")]
    pub rebuild_shrink_factor: f64,

    /// Simulated build time per indexed column
    #[serde(default = "default_build_delay_per_column_ms")]
    pub build_delay_per_column_ms: u64,
}

fn default_stale_rebuild_days() -> i64 {
    30
}

fn default_unused_after_days() -> i64 {
    30
}

fn default_min_seeks() -> u64 {
    10
}

fn default_optimal_hit_rate() -> f64 {
    0.8
}

fn default_optimal_recency_days() -> i64 {
    7
}

fn default_rebuild_shrink_factor() -> f64 {
    0.7
}

fn default_build_delay_per_column_ms() -> u64 {
    10
}

impl Default for IndexManagerConfig {
    fn default() -> Self {
        Self {
            stale_rebuild_days: default_stale_rebuild_days(),
            unused_after_days: default_unused_after_days(),
            min_seeks: default_min_seeks(),
            optimal_hit_rate: default_optimal_hit_rate(),
            optimal_recency_days: default_optimal_recency_days(),
            rebuild_shrink_factor: default_rebuild_shrink_factor(),
            build_delay_per_column_ms: default_build_delay_per_column_ms(),
        }
    }
}

/// Index Manager
pub struct IndexManager {
    config: IndexManagerConfig,
    repository: Arc<dyn IndexRepository>,
    builder: Arc<dyn IndexBuilder>,
    metrics: Arc<dyn MetricsSink>,
    closed: AtomicBool,
}

impl IndexManager {
    /// Creates a manager with in-memory metadata and the simulated builder
    pub fn new(config: IndexManagerConfig) -> Self {
        let builder =
            SimulatedIndexBuilder::new(Duration::from_millis(config.build_delay_per_column_ms));
        Self {
            config,
            repository: Arc::new(InMemoryIndexRepository::new()),
            builder: Arc::new(builder),
            metrics: Arc::new(MetricsRegistry::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn IndexRepository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_builder(mut self, builder: Arc<dyn IndexBuilder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &IndexManagerConfig {
        &self.config
    }

    fn ensure_open(&self) -> IndexResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IndexError::ShutDown);
        }
        Ok(())
    }

    /// Creates and builds an index.
    ///
    /// The entry is inserted as `Building` (duplicate check and insert are
    /// atomic), built, then flipped to `Active`. A failed build removes the
    /// entry so no trace of the index remains.
    pub async fn create_index(&self, config: IndexConfig) -> IndexResult<IndexInfo> {
        self.ensure_open()?;

        if config.table.trim().is_empty() {
            return Err(IndexError::InvalidDefinition("table is empty".into()));
        }
        if config.columns.is_empty() || config.columns.iter().any(|c| c.trim().is_empty()) {
            return Err(IndexError::InvalidDefinition(format!(
                "index on {} has no columns",
                config.table
            )));
        }

        let info = IndexInfo::building(config);
        let id = info.id.clone();
        self.repository.insert_if_absent(info.clone())?;

        let outcome = match self.builder.build(&info).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.repository.remove(&id)?;
                self.metrics.increment("index.build_failed");
                log_event_with_fields(
                    Event::IndexBuildFailed,
                    &[
                        ("index_id", id.as_str()),
                        ("table", info.table.as_str()),
                        ("reason", err.to_string().as_str()),
                    ],
                );
                return Err(IndexError::BuildFailed {
                    id,
                    reason: err.to_string(),
                });
            }
        };

        let now = Utc::now();
        let built = self.repository.update_with(&id, &mut |index| {
            index.size_bytes = outcome.size_bytes;
            index.cardinality = outcome.cardinality;
            index.status = IndexStatus::Active;
            index.last_rebuilt = Some(now);
        })?;

        self.metrics.increment("index.created");
        log_event_with_fields(
            Event::IndexCreated,
            &[
                ("index_id", built.id.as_str()),
                ("table", built.table.as_str()),
                ("columns", built.columns.join(",").as_str()),
                ("strategy", built.strategy.as_str()),
            ],
        );
        Ok(built)
    }

    /// Drops an index
    pub fn drop_index(&self, id: &str) -> IndexResult<IndexInfo> {
        let removed = self
            .repository
            .remove(id)?
            .ok_or_else(|| IndexError::IndexNotFound(id.to_string()))?;

        self.metrics.increment("index.dropped");
        log_event_with_fields(
            Event::IndexDropped,
            &[("index_id", id), ("table", removed.table.as_str())],
        );
        Ok(removed)
    }

    pub fn get_index(&self, id: &str) -> IndexResult<Option<IndexInfo>> {
        self.repository.get(id)
    }

    /// All indexes, optionally restricted to one table
    pub fn list_indexes(&self, table: Option<&str>) -> IndexResult<Vec<IndexInfo>> {
        let all = self.repository.list()?;
        Ok(match table {
            Some(table) => all.into_iter().filter(|i| i.table == table).collect(),
            None => all,
        })
    }

    /// Records one lookup against an index
    pub fn record_usage(&self, id: &str, hit: bool) -> IndexResult<()> {
        let now = Utc::now();
        self.repository
            .update_with(id, &mut |index| index.usage.record(hit, now))?;
        Ok(())
    }

    /// Advisory analysis of an executed query.
    ///
    /// - Full scan (no index used) with filter columns that no index on the
    ///   table leads with: `Create` / `High`
    /// - Indexes on the table that are unused: `Drop` / `Medium`
    ///
    /// Nothing is applied; recommendations are returned and logged.
    pub fn analyze_query(
        &self,
        query: &Query,
        indexes_used: &[String],
    ) -> IndexResult<Vec<IndexRecommendation>> {
        let table = match query.dataset_name() {
            Some(table) => table,
            None => return Ok(Vec::new()),
        };
        let table_indexes = self.list_indexes(Some(&table))?;
        let mut recommendations = Vec::new();

        if indexes_used.is_empty() {
            for column in query.filter_columns() {
                let covered = table_indexes
                    .iter()
                    .filter(|i| i.status != IndexStatus::Corrupted)
                    .any(|i| i.leading_column() == Some(column.as_str()));
                if !covered {
                    recommendations.push(IndexRecommendation {
                        action: RecommendationAction::Create,
                        severity: RecommendationSeverity::High,
                        table: table.clone(),
                        columns: vec![column.clone()],
                        index_id: None,
                        reason: format!("full scan filtering on {}", column),
                    });
                }
            }
        }

        for index in table_indexes.iter().filter(|i| self.is_unused(i)) {
            recommendations.push(IndexRecommendation {
                action: RecommendationAction::Drop,
                severity: RecommendationSeverity::Medium,
                table: table.clone(),
                columns: index.columns.clone(),
                index_id: Some(index.id.clone()),
                reason: format!(
                    "idle for {}+ days with {} seeks",
                    self.config.unused_after_days, index.usage.total_seeks
                ),
            });
        }

        for rec in &recommendations {
            log_event_with_fields(
                Event::IndexRecommendation,
                &[
                    ("action", action_name(rec.action)),
                    ("table", rec.table.as_str()),
                    ("columns", rec.columns.join(",").as_str()),
                    ("reason", rec.reason.as_str()),
                ],
            );
        }
        Ok(recommendations)
    }

    fn is_unused(&self, index: &IndexInfo) -> bool {
        let cutoff = Utc::now() - chrono::Duration::days(self.config.unused_after_days);
        index.last_activity() <= cutoff && index.usage.total_seeks < self.config.min_seeks
    }

    /// Indexes idle for the configured window with fewer than `min_seeks` seeks
    pub fn find_unused_indexes(&self) -> IndexResult<Vec<IndexInfo>> {
        Ok(self
            .repository
            .list()?
            .into_iter()
            .filter(|i| self.is_unused(i))
            .collect())
    }

    /// Rebuilds stale active indexes and reports unused ones.
    ///
    /// Unused indexes are reported as drop candidates, never deleted.
    pub async fn optimize_indexes(&self) -> IndexResult<OptimizationReport> {
        self.ensure_open()?;

        let cutoff = Utc::now() - chrono::Duration::days(self.config.stale_rebuild_days);
        let stale: Vec<IndexInfo> = self
            .repository
            .list()?
            .into_iter()
            .filter(|i| i.status == IndexStatus::Active && i.last_build() <= cutoff)
            .collect();

        let mut report = OptimizationReport::default();
        for index in stale {
            self.repository
                .update_with(&index.id, &mut |i| i.status = IndexStatus::Building)?;

            let shrink = self.config.rebuild_shrink_factor;
            let now = Utc::now();
            let rebuilt = self.repository.update_with(&index.id, &mut |i| {
                i.size_bytes = (i.size_bytes as f64 * shrink) as u64;
                i.status = IndexStatus::Active;
                i.last_rebuilt = Some(now);
            })?;

            self.metrics.increment("index.rebuilt");
            log_event_with_fields(
                Event::IndexRebuilt,
                &[
                    ("index_id", rebuilt.id.as_str()),
                    ("size_bytes", rebuilt.size_bytes.to_string().as_str()),
                ],
            );
            report.rebuilt.push(rebuilt.id);
        }

        report.drop_candidates = self
            .find_unused_indexes()?
            .into_iter()
            .map(|i| i.id)
            .collect();
        report.actions_taken = report.rebuilt.len();
        Ok(report)
    }

    /// Active indexes on a table with a high hit rate and recent use
    pub fn get_optimal_indexes(&self, table: &str) -> IndexResult<Vec<IndexInfo>> {
        let recent = Utc::now() - chrono::Duration::days(self.config.optimal_recency_days);
        Ok(self
            .list_indexes(Some(table))?
            .into_iter()
            .filter(|i| {
                i.status == IndexStatus::Active
                    && i.usage.hit_rate > self.config.optimal_hit_rate
                    && i.usage.last_used.map_or(false, |used| used >= recent)
            })
            .collect())
    }

    /// Marks an index as corrupted
    pub fn mark_corrupted(&self, id: &str) -> IndexResult<IndexInfo> {
        self.repository
            .update_with(id, &mut |i| i.status = IndexStatus::Corrupted)
    }

    /// Aggregate statistics over all indexes
    pub fn statistics(&self) -> IndexResult<IndexStatistics> {
        let all = self.repository.list()?;
        let mut stats = IndexStatistics {
            total_indexes: all.len(),
            ..IndexStatistics::default()
        };
        let mut by_strategy: BTreeMap<String, usize> = BTreeMap::new();
        let mut hit_rate_sum = 0.0;

        for index in &all {
            match index.status {
                IndexStatus::Active => stats.active += 1,
                IndexStatus::Building => stats.building += 1,
                IndexStatus::Corrupted => stats.corrupted += 1,
            }
            stats.total_size_bytes += index.size_bytes;
            hit_rate_sum += index.usage.hit_rate;
            *by_strategy
                .entry(index.strategy.as_str().to_string())
                .or_insert(0) += 1;
        }

        if !all.is_empty() {
            stats.average_hit_rate = hit_rate_sum / all.len() as f64;
        }
        stats.by_strategy = by_strategy;
        Ok(stats)
    }

    /// Stops accepting index builds and optimization passes
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn action_name(action: RecommendationAction) -> &'static str {
    match action {
        RecommendationAction::Create => "create",
        RecommendationAction::Drop => "drop",
        RecommendationAction::Rebuild => "rebuild",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::index::builder::BuildOutcome;

    struct FailingBuilder;

    #[async_trait]
    impl IndexBuilder for FailingBuilder {
        async fn build(&self, index: &IndexInfo) -> IndexResult<BuildOutcome> {
            Err(IndexError::Internal(format!("disk full building {}", index.name)))
        }
    }

    fn fast_manager() -> IndexManager {
        IndexManager::new(IndexManagerConfig {
            build_delay_per_column_ms: 1,
            ..IndexManagerConfig::default()
        })
    }

    fn backdated(table: &str, column: &str, days_idle: i64, seeks: u64) -> IndexInfo {
        let mut info = IndexInfo::building(IndexConfig::new(table, &[column]));
        let then = Utc::now() - chrono::Duration::days(days_idle);
        info.status = IndexStatus::Active;
        info.created_at = then;
        info.last_rebuilt = Some(then);
        info.size_bytes = 1000;
        info.usage.total_seeks = seeks;
        info.usage.hits = seeks;
        info.usage.hit_rate = 1.0;
        info.usage.last_used = Some(then);
        info
    }

    // =========================================================================
    // Create / drop
    // =========================================================================

    #[tokio::test]
    async fn test_create_index_becomes_active() {
        let manager = fast_manager();
        let info = manager
            .create_index(IndexConfig::new("orders", &["status"]))
            .await
            .unwrap();

        assert_eq!(info.status, IndexStatus::Active);
        assert!(info.size_bytes > 0);
        assert!(info.last_rebuilt.is_some());
    }

    #[tokio::test]
    async fn test_create_index_rejects_empty_definition() {
        let manager = fast_manager();

        let err = manager
            .create_index(IndexConfig::new("orders", &[]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INDEX_INVALID_DEFINITION");

        let err = manager
            .create_index(IndexConfig::new(" ", &["status"]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INDEX_INVALID_DEFINITION");
    }

    #[tokio::test]
    async fn test_duplicate_index_rejected() {
        let manager = fast_manager();
        manager
            .create_index(IndexConfig::new("orders", &["status"]))
            .await
            .unwrap();

        let err = manager
            .create_index(IndexConfig::new("orders", &["status"]).with_name("other"))
            .await
            .unwrap_err();

        assert!(matches!(err, IndexError::DuplicateIndex { .. }));
        assert_eq!(manager.list_indexes(None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_build_leaves_no_entry() {
        let manager = fast_manager().with_builder(Arc::new(FailingBuilder));

        let err = manager
            .create_index(IndexConfig::new("orders", &["status"]))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INDEX_BUILD_FAILED");
        assert!(manager.list_indexes(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_index() {
        let manager = fast_manager();
        let info = manager
            .create_index(IndexConfig::new("orders", &["status"]))
            .await
            .unwrap();

        manager.drop_index(&info.id).unwrap();

        assert!(manager.get_index(&info.id).unwrap().is_none());
        assert!(matches!(
            manager.drop_index(&info.id),
            Err(IndexError::IndexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_after_shutdown_fails() {
        let manager = fast_manager();
        manager.shutdown().await;

        let err = manager
            .create_index(IndexConfig::new("orders", &["status"]))
            .await
            .unwrap_err();
        assert_eq!(err, IndexError::ShutDown);
    }

    // =========================================================================
    // Usage and recommendations
    // =========================================================================

    #[tokio::test]
    async fn test_record_usage_and_optimal_indexes() {
        let manager = fast_manager();
        let info = manager
            .create_index(IndexConfig::new("orders", &["status"]))
            .await
            .unwrap();

        assert!(manager.get_optimal_indexes("orders").unwrap().is_empty());

        for _ in 0..9 {
            manager.record_usage(&info.id, true).unwrap();
        }
        manager.record_usage(&info.id, false).unwrap();

        let optimal = manager.get_optimal_indexes("orders").unwrap();
        assert_eq!(optimal.len(), 1);
        assert!((optimal[0].usage.hit_rate - 0.9).abs() < 1e-9);
        assert!(manager.get_optimal_indexes("users").unwrap().is_empty());
    }

    #[test]
    fn test_unused_index_detection() {
        let repository = Arc::new(InMemoryIndexRepository::new());
        let idle = backdated("orders", "region", 40, 3);
        let busy = backdated("orders", "status", 40, 50);
        let idle_id = idle.id.clone();
        repository.insert_if_absent(idle).unwrap();
        repository.insert_if_absent(busy).unwrap();

        let manager = fast_manager().with_repository(repository);
        let unused = manager.find_unused_indexes().unwrap();

        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].id, idle_id);
    }

    #[test]
    fn test_analyze_full_scan_recommends_create() {
        let manager = fast_manager();
        let query = Query::new("SELECT * FROM orders WHERE status = 'pending' AND amount > 10");

        let recs = manager.analyze_query(&query, &[]).unwrap();

        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.action == RecommendationAction::Create));
        assert!(recs.iter().all(|r| r.severity == RecommendationSeverity::High));
        assert_eq!(recs[0].columns, vec!["status"]);
    }

    #[test]
    fn test_analyze_skips_covered_columns_and_flags_unused() {
        let repository = Arc::new(InMemoryIndexRepository::new());
        let idle = backdated("orders", "status", 40, 3);
        repository.insert_if_absent(idle).unwrap();
        let manager = fast_manager().with_repository(repository);

        let query = Query::scan("orders").filter_eq("status", json!("pending"));
        let recs = manager.analyze_query(&query, &[]).unwrap();

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].action, RecommendationAction::Drop);
        assert_eq!(recs[0].severity, RecommendationSeverity::Medium);
    }

    #[test]
    fn test_analyze_with_index_used_skips_create() {
        let manager = fast_manager();
        let query = Query::scan("orders").filter_eq("status", json!("pending"));

        let recs = manager.analyze_query(&query, &["idx-1".to_string()]).unwrap();
        assert!(recs.is_empty());
    }

    // =========================================================================
    // Optimization
    // =========================================================================

    #[tokio::test]
    async fn test_optimize_rebuilds_stale_and_reports_unused() {
        let repository = Arc::new(InMemoryIndexRepository::new());
        let stale_idle = backdated("orders", "region", 40, 3);
        let idle_id = stale_idle.id.clone();
        repository.insert_if_absent(stale_idle).unwrap();
        let manager = fast_manager().with_repository(repository);

        let report = manager.optimize_indexes().await.unwrap();

        assert_eq!(report.rebuilt, vec![idle_id.clone()]);
        assert_eq!(report.actions_taken, 1);
        assert_eq!(report.drop_candidates, vec![idle_id.clone()]);

        let rebuilt = manager.get_index(&idle_id).unwrap().unwrap();
        assert_eq!(rebuilt.status, IndexStatus::Active);
        assert_eq!(rebuilt.size_bytes, 700);
    }

    #[tokio::test]
    async fn test_optimize_skips_fresh_indexes() {
        let manager = fast_manager();
        manager
            .create_index(IndexConfig::new("orders", &["status"]))
            .await
            .unwrap();

        let report = manager.optimize_indexes().await.unwrap();
        assert!(report.rebuilt.is_empty());
        assert_eq!(report.actions_taken, 0);
    }

    #[tokio::test]
    async fn test_mark_corrupted_and_statistics() {
        let manager = fast_manager();
        let a = manager
            .create_index(IndexConfig::new("orders", &["status"]))
            .await
            .unwrap();
        manager
            .create_index(IndexConfig::new("orders", &["userId"]))
            .await
            .unwrap();

        manager.mark_corrupted(&a.id).unwrap();
        let stats = manager.statistics().unwrap();

        assert_eq!(stats.total_indexes, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.corrupted, 1);
        assert_eq!(stats.by_strategy.get("btree"), Some(&2));
    }
}
