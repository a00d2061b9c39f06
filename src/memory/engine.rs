//! In-memory analytics engine
//!
//! # Execution order
//!
//! 1. Resolve dataset (`query.dataset` or `FROM <name>`)
//! 2. Narrow candidates through secondary indexes (equality filters)
//! 3. Filter
//! 4. Sort
//! 5. Offset / limit
//! 6. Aggregate (collapses to one summary record)
//!
//! Results are cached per query shape when slow to compute but small.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregate::Aggregator;
use super::cache::QueryCache;
use super::dataset::{estimate_size, Dataset};
use super::errors::{MemoryEngineError, MemoryResult};
use super::filters::PredicateFilter;
use super::sorter::ResultSorter;
use crate::observability::{
    log_event_with_fields, trace_event, ComponentHealth, Event, HealthStatus, MetricsRegistry,
    MetricsSink, Timer,
};
use crate::query::{Query, TierOutput};

/// Memory tier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEngineConfig {
    /// Ceiling for the estimated size of all loaded datasets
    #[serde(default = "default_max_memory_bytes")]
    pub max_memory_bytes: u64,

    /// Only results slower than this are cached
    #[serde(default = "default_cache_min_execution_ms")]
    pub cache_min_execution_ms: u64,

    /// Only results smaller than this (serialized) are cached
    #[serde(default = "default_cache_max_result_bytes")]
    pub cache_max_result_bytes: usize,

    /// Utilization above which the query cache is cleared
    #[serde(default = "default_pressure_threshold")]
    pub pressure_threshold: f64,
}

fn default_max_memory_bytes() -> u64 {
    1024 * 1024 * 1024
}

fn default_cache_min_execution_ms() -> u64 {
    50
}

fn default_cache_max_result_bytes() -> usize {
    1024 * 1024
}

fn default_pressure_threshold() -> f64 {
    0.9
}

impl Default for MemoryEngineConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: default_max_memory_bytes(),
            cache_min_execution_ms: default_cache_min_execution_ms(),
            cache_max_result_bytes: default_cache_max_result_bytes(),
            pressure_threshold: default_pressure_threshold(),
        }
    }
}

/// Memory tier statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStatistics {
    pub datasets: usize,
    pub total_records: usize,
    pub memory_used_bytes: u64,
    pub max_memory_bytes: u64,
    pub utilization: f64,
    pub cached_results: usize,
    pub cache_bytes: usize,
    pub queries_executed: u64,
    pub cache_hits: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Datasets and their accounted size, updated together
#[derive(Debug, Default)]
struct DatasetTable {
    datasets: HashMap<String, Arc<Dataset>>,
    used_bytes: u64,
}

/// In-memory analytics engine
pub struct InMemoryAnalyticsEngine {
    config: MemoryEngineConfig,
    table: RwLock<DatasetTable>,
    cache: QueryCache,
    executions: AtomicU64,
    cache_hits: AtomicU64,
    last_refresh: RwLock<Option<DateTime<Utc>>>,
    metrics: Arc<dyn MetricsSink>,
    closed: AtomicBool,
}

impl InMemoryAnalyticsEngine {
    pub fn new(config: MemoryEngineConfig) -> Self {
        Self {
            config,
            table: RwLock::new(DatasetTable::default()),
            cache: QueryCache::new(),
            executions: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            last_refresh: RwLock::new(None),
            metrics: Arc::new(MetricsRegistry::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &MemoryEngineConfig {
        &self.config
    }

    fn ensure_open(&self) -> MemoryResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MemoryEngineError::ShutDown);
        }
        Ok(())
    }

    /// Loads (or replaces) a dataset.
    ///
    /// Atomic: either the dataset is registered and memory usage updated, or
    /// it is rejected and nothing changes. A replaced dataset's size is
    /// released before the ceiling check.
    pub fn load_dataset(&self, name: &str, records: Vec<serde_json::Value>) -> MemoryResult<u64> {
        self.ensure_open()?;
        if name.trim().is_empty() {
            return Err(MemoryEngineError::InvalidQuery("dataset name is empty".into()));
        }

        let estimate = estimate_size(&records);
        let mut table = self.table.write().map_err(|_| MemoryEngineError::poisoned())?;

        let replaced = table.datasets.get(name).map(|d| d.size_bytes()).unwrap_or(0);
        let baseline = table.used_bytes.saturating_sub(replaced);
        if baseline + estimate > self.config.max_memory_bytes {
            drop(table);
            self.metrics.increment("memory.dataset_rejected");
            log_event_with_fields(
                Event::DatasetRejected,
                &[
                    ("dataset", name),
                    ("estimated_bytes", estimate.to_string().as_str()),
                    ("used_bytes", baseline.to_string().as_str()),
                ],
            );
            return Err(MemoryEngineError::InsufficientMemory {
                requested: estimate,
                available: self.config.max_memory_bytes.saturating_sub(baseline),
            });
        }

        let dataset = Dataset::new(name, records);
        let record_count = dataset.len();
        table.datasets.insert(name.to_string(), Arc::new(dataset));
        table.used_bytes = baseline + estimate;
        let used = table.used_bytes;
        drop(table);

        if replaced > 0 {
            self.cache.remove_dataset(name)?;
        }
        self.metrics.gauge("memory.used_bytes", used as f64);
        log_event_with_fields(
            Event::DatasetLoaded,
            &[
                ("dataset", name),
                ("records", record_count.to_string().as_str()),
                ("estimated_bytes", estimate.to_string().as_str()),
            ],
        );
        Ok(estimate)
    }

    /// Removes a dataset and the cached results computed over it
    pub fn unload_dataset(&self, name: &str) -> MemoryResult<()> {
        let mut table = self.table.write().map_err(|_| MemoryEngineError::poisoned())?;
        let removed = table
            .datasets
            .remove(name)
            .ok_or_else(|| MemoryEngineError::DatasetNotFound(name.to_string()))?;
        table.used_bytes = table.used_bytes.saturating_sub(removed.size_bytes());
        drop(table);

        self.cache.remove_dataset(name)?;
        Ok(())
    }

    /// Dataset names, sorted
    pub fn list_datasets(&self) -> MemoryResult<Vec<String>> {
        let table = self.table.read().map_err(|_| MemoryEngineError::poisoned())?;
        let mut names: Vec<String> = table.datasets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn has_dataset(&self, name: &str) -> bool {
        self.table
            .read()
            .map(|t| t.datasets.contains_key(name))
            .unwrap_or(false)
    }

    /// Estimated bytes held by loaded datasets
    pub fn memory_used(&self) -> u64 {
        self.table.read().map(|t| t.used_bytes).unwrap_or(0)
    }

    /// Number of `execute_query` calls, cache hits included
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::SeqCst)
    }

    /// Executes a query against a loaded dataset
    pub async fn execute_query(&self, query: &Query) -> MemoryResult<TierOutput> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;

        let name = query.dataset_name().ok_or_else(|| {
            MemoryEngineError::InvalidQuery(format!("no target dataset in: {}", query.sql))
        })?;

        let cache_key = query.structural_hash();
        if let Some(cached) = self.cache.get(cache_key)? {
            self.cache_hits.fetch_add(1, Ordering::SeqCst);
            self.metrics.increment("memory.cache_hit");
            trace_event(Event::QueryCacheHit, &[("query_id", query.id.as_str()), ("tier", "memory")]);
            return Ok(cached);
        }

        let dataset = {
            let table = self.table.read().map_err(|_| MemoryEngineError::poisoned())?;
            table
                .datasets
                .get(&name)
                .cloned()
                .ok_or_else(|| MemoryEngineError::DatasetNotFound(name.clone()))?
        };

        let timer = Timer::new();
        let (rows, indexes_used) = run(&dataset, query);
        let elapsed = timer.elapsed_ms();

        let mut output = TierOutput::from_rows(rows)
            .with_execution_time(elapsed)
            .with_table(name.clone());
        output.indexes_used = indexes_used;

        if elapsed > self.config.cache_min_execution_ms {
            let size = serde_json::to_vec(&output.rows).map(|b| b.len()).unwrap_or(usize::MAX);
            if size < self.config.cache_max_result_bytes {
                self.cache
                    .insert(cache_key, &query.id, &name, output.clone(), size)?;
            }
        }

        self.metrics.timing("memory.execution_time_ms", elapsed);
        Ok(output)
    }

    /// Drops cached results produced by a query id
    pub fn cancel_query(&self, query_id: &str) -> MemoryResult<usize> {
        self.cache.remove_query(query_id)
    }

    /// Current used / max ratio
    pub fn utilization(&self) -> f64 {
        if self.config.max_memory_bytes == 0 {
            return 1.0;
        }
        self.memory_used() as f64 / self.config.max_memory_bytes as f64
    }

    /// Clears the query cache when utilization exceeds the pressure threshold.
    ///
    /// Returns true if the cache was cleared.
    pub fn check_memory_pressure(&self) -> MemoryResult<bool> {
        let utilization = self.utilization();
        self.metrics.gauge("memory.utilization", utilization);

        if utilization <= self.config.pressure_threshold {
            return Ok(false);
        }

        let cleared = self.cache.clear()?;
        self.metrics.increment("memory.pressure_relief");
        log_event_with_fields(
            Event::MemoryPressure,
            &[
                ("utilization", format!("{:.3}", utilization).as_str()),
                ("cleared_entries", cleared.to_string().as_str()),
            ],
        );
        Ok(true)
    }

    /// Recomputes statistics and publishes them as gauges
    pub fn refresh_statistics(&self) -> MemoryResult<MemoryStatistics> {
        let now = Utc::now();
        if let Ok(mut last) = self.last_refresh.write() {
            *last = Some(now);
        }
        let stats = self.statistics()?;
        self.metrics.gauge("memory.datasets", stats.datasets as f64);
        self.metrics.gauge("memory.used_bytes", stats.memory_used_bytes as f64);
        self.metrics.gauge("memory.utilization", stats.utilization);
        self.metrics.gauge("memory.cached_results", stats.cached_results as f64);
        Ok(stats)
    }

    pub fn statistics(&self) -> MemoryResult<MemoryStatistics> {
        let table = self.table.read().map_err(|_| MemoryEngineError::poisoned())?;
        let total_records = table.datasets.values().map(|d| d.len()).sum();
        let stats = MemoryStatistics {
            datasets: table.datasets.len(),
            total_records,
            memory_used_bytes: table.used_bytes,
            max_memory_bytes: self.config.max_memory_bytes,
            utilization: 0.0,
            cached_results: self.cache.len(),
            cache_bytes: self.cache.total_bytes(),
            queries_executed: self.executions.load(Ordering::SeqCst),
            cache_hits: self.cache_hits.load(Ordering::SeqCst),
            refreshed_at: self.last_refresh.read().ok().and_then(|l| *l),
        };
        drop(table);

        Ok(MemoryStatistics {
            utilization: self.utilization(),
            ..stats
        })
    }

    pub fn health(&self) -> ComponentHealth {
        let utilization = self.utilization();
        let status = if self.closed.load(Ordering::SeqCst) {
            HealthStatus::Unhealthy
        } else if utilization > self.config.pressure_threshold {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let datasets = self.list_datasets().map(|d| d.len()).unwrap_or(0);
        ComponentHealth::new("memory", status)
            .with_detail("datasets", datasets)
            .with_detail("memory_used_bytes", self.memory_used())
            .with_detail("utilization", utilization)
            .with_detail("cached_results", self.cache.len())
    }

    /// Releases all datasets and cached results
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut table) = self.table.write() {
            table.datasets.clear();
            table.used_bytes = 0;
        }
        let _ = self.cache.clear();
    }
}

/// Filter, sort, slice and aggregate one dataset
fn run(dataset: &Dataset, query: &Query) -> (Vec<serde_json::Value>, Vec<String>) {
    let records = dataset.records();

    let (mut rows, indexes_used): (Vec<serde_json::Value>, Vec<String>) =
        match dataset.index_candidates(&query.filters) {
            Some((positions, used)) => (
                positions
                    .into_iter()
                    .filter_map(|i| records.get(i))
                    .filter(|r| PredicateFilter::matches(r, &query.filters))
                    .cloned()
                    .collect(),
                used,
            ),
            None => (
                records
                    .iter()
                    .filter(|r| PredicateFilter::matches(r, &query.filters))
                    .cloned()
                    .collect(),
                Vec::new(),
            ),
        };

    if let Some(sort) = &query.sort {
        ResultSorter::sort(&mut rows, sort);
    }

    let offset = query.offset.unwrap_or(0);
    let mut rows: Vec<serde_json::Value> = rows.into_iter().skip(offset).collect();
    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }

    if !query.aggregations.is_empty() {
        rows = vec![Aggregator::summarize(&rows, &query.aggregations)];
    }

    (rows, indexes_used)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    use crate::query::{Aggregation, Predicate, SortSpec};

    fn orders() -> Vec<Value> {
        vec![
            json!({"id": 1, "userId": "u1", "status": "pending", "amount": 10}),
            json!({"id": 2, "userId": "u2", "status": "shipped", "amount": 20}),
            json!({"id": 3, "userId": "u1", "status": "pending", "amount": 30}),
            json!({"id": 4, "userId": "u3", "status": "pending", "amount": 40}),
            json!({"id": 5, "userId": "u2", "status": "cancelled", "amount": 50}),
        ]
    }

    fn engine() -> InMemoryAnalyticsEngine {
        let engine = InMemoryAnalyticsEngine::new(MemoryEngineConfig::default());
        engine.load_dataset("orders", orders()).unwrap();
        engine
    }

    // =========================================================================
    // Dataset lifecycle
    // =========================================================================

    #[test]
    fn test_load_dataset_accounts_memory() {
        let engine = engine();

        assert!(engine.has_dataset("orders"));
        assert_eq!(engine.memory_used(), estimate_size(&orders()));
        assert_eq!(engine.list_datasets().unwrap(), vec!["orders"]);
    }

    #[test]
    fn test_over_ceiling_dataset_rejected() {
        let engine = InMemoryAnalyticsEngine::new(MemoryEngineConfig {
            max_memory_bytes: 64,
            ..MemoryEngineConfig::default()
        });

        let err = engine.load_dataset("orders", orders()).unwrap_err();

        assert!(matches!(err, MemoryEngineError::InsufficientMemory { .. }));
        assert!(!engine.has_dataset("orders"));
        assert_eq!(engine.memory_used(), 0);
    }

    #[test]
    fn test_replacing_dataset_releases_old_size() {
        let estimate = estimate_size(&orders());
        let engine = InMemoryAnalyticsEngine::new(MemoryEngineConfig {
            max_memory_bytes: estimate + estimate / 2,
            ..MemoryEngineConfig::default()
        });

        engine.load_dataset("orders", orders()).unwrap();
        engine.load_dataset("orders", orders()).unwrap();

        assert_eq!(engine.memory_used(), estimate);
    }

    #[test]
    fn test_unload_dataset() {
        let engine = engine();

        engine.unload_dataset("orders").unwrap();

        assert!(!engine.has_dataset("orders"));
        assert_eq!(engine.memory_used(), 0);
        assert!(matches!(
            engine.unload_dataset("orders"),
            Err(MemoryEngineError::DatasetNotFound(_))
        ));
    }

    // =========================================================================
    // Execution
    // =========================================================================

    #[tokio::test]
    async fn test_pending_orders() {
        let engine = engine();
        let query = Query::new("SELECT * FROM orders WHERE status = 'pending'");

        let output = engine.execute_query(&query).await.unwrap();

        assert_eq!(output.rows.len(), 3);
        assert_eq!(output.indexes_used, vec!["orders.status"]);
        assert_eq!(output.tables_scanned, vec!["orders"]);
        assert!(output.rows.iter().all(|r| r["status"] == "pending"));
    }

    #[tokio::test]
    async fn test_sort_offset_limit() {
        let engine = engine();
        let query = Query::scan("orders")
            .with_sort(SortSpec::desc("amount"))
            .with_offset(1)
            .with_limit(2);

        let output = engine.execute_query(&query).await.unwrap();
        let ids: Vec<i64> = output.rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();

        assert_eq!(ids, vec![4, 3]);
    }

    #[tokio::test]
    async fn test_aggregation_collapses_rows() {
        let engine = engine();
        let query = Query::new("SELECT COUNT(*), SUM(amount) FROM orders WHERE userId = 'u1'");

        let output = engine.execute_query(&query).await.unwrap();

        assert_eq!(output.rows, vec![json!({"count": 2, "sum_amount": 40})]);
    }

    #[tokio::test]
    async fn test_non_indexed_filters() {
        let engine = engine();
        let query = Query::scan("orders")
            .with_filter(Predicate::gte("amount", json!(30)))
            .with_aggregation(Aggregation::count_all());

        let output = engine.execute_query(&query).await.unwrap();

        assert_eq!(output.rows[0]["count"], 3);
        assert!(output.indexes_used.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_dataset() {
        let engine = engine();
        let err = engine
            .execute_query(&Query::new("SELECT * FROM users"))
            .await
            .unwrap_err();
        assert_eq!(err, MemoryEngineError::DatasetNotFound("users".into()));

        let err = engine.execute_query(&Query::new("SELECT 1")).await.unwrap_err();
        assert_eq!(err.code(), "MEMORY_INVALID_QUERY");
    }

    #[tokio::test]
    async fn test_fast_results_are_not_cached() {
        let engine = engine();
        let query = Query::scan("orders");

        engine.execute_query(&query).await.unwrap();

        assert_eq!(engine.statistics().unwrap().cached_results, 0);
        assert_eq!(engine.executions(), 1);
    }

    #[tokio::test]
    async fn test_slow_results_are_cached_and_cancel_drops_them() {
        let engine = InMemoryAnalyticsEngine::new(MemoryEngineConfig {
            cache_min_execution_ms: 0,
            ..MemoryEngineConfig::default()
        });
        let records: Vec<Value> = (0..20_000).map(|i| json!({"id": i, "v": i % 7})).collect();
        engine.load_dataset("big", records).unwrap();
        let query = Query::scan("big")
            .with_sort(SortSpec::desc("v"))
            .with_aggregation(Aggregation::count_all());

        let first = engine.execute_query(&query).await.unwrap();
        if first.execution_time_ms == 0 {
            // Too fast to exceed even a zero threshold on this machine
            return;
        }
        assert_eq!(engine.statistics().unwrap().cached_results, 1);

        let second = engine.execute_query(&query).await.unwrap();
        assert_eq!(second.rows, first.rows);
        assert_eq!(engine.statistics().unwrap().cache_hits, 1);

        assert_eq!(engine.cancel_query(&query.id).unwrap(), 1);
        assert_eq!(engine.statistics().unwrap().cached_results, 0);
    }

    // =========================================================================
    // Pressure, statistics, health
    // =========================================================================

    #[test]
    fn test_memory_pressure() {
        let estimate = estimate_size(&orders());
        let engine = InMemoryAnalyticsEngine::new(MemoryEngineConfig {
            max_memory_bytes: estimate,
            ..MemoryEngineConfig::default()
        });
        assert!(!engine.check_memory_pressure().unwrap());

        engine.load_dataset("orders", orders()).unwrap();

        assert!(engine.check_memory_pressure().unwrap());
        assert_eq!(engine.health().status, HealthStatus::Degraded);
    }

    #[test]
    fn test_refresh_statistics() {
        let engine = engine();

        let stats = engine.refresh_statistics().unwrap();

        assert_eq!(stats.datasets, 1);
        assert_eq!(stats.total_records, 5);
        assert!(stats.refreshed_at.is_some());
        assert!(stats.utilization > 0.0);
    }

    #[tokio::test]
    async fn test_shutdown() {
        let engine = engine();
        engine.shutdown().await;

        assert_eq!(engine.memory_used(), 0);
        assert_eq!(engine.health().status, HealthStatus::Unhealthy);
        assert_eq!(
            engine.execute_query(&Query::scan("orders")).await.unwrap_err(),
            MemoryEngineError::ShutDown
        );
    }
}
