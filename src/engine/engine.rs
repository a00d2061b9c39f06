//! Analytics storage engine
//!
//! # Query path
//!
//! 1. Validate tenant, query text and query id
//! 2. Result cache lookup (unless bypassed)
//! 3. Optimize
//! 4. Select tier (preferred tier, else configured selection)
//! 5. Plan and register as active
//! 6. Execute, bounded by the query timeout; hybrid plans may fall back
//!    from memory to distributed
//! 7. Cache, record history and index usage, emit metrics
//!
//! The active registration is removed on every path. A query cancelled
//! while running returns `Cancelled` even if its tier finished.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::background::BackgroundTasks;
use super::cache::{cache_key, ResultCache};
use super::compaction::CompactionManager;
use super::config::EngineConfig;
use super::errors::{EngineError, EngineResult};
use super::history::{HistoryEntry, QueryHistory};
use super::optimizer::QueryOptimizer;
use super::plan::{QueryPlan, Tier};
use super::planner::QueryPlanner;
use super::result::QueryResult;
use super::stats::{HealthReport, QueryStatistics, StorageStatistics, ViewStatistics};
use super::storage::{StorageOptimization, StorageOptimizationReport, TieringPolicy};
use super::views::{MaterializedViewManager, ViewDefinition, ViewInfo};
use crate::distributed::DistributedQueryProcessor;
use crate::index::{IndexConfig, IndexInfo, IndexManager, IndexStatus};
use crate::memory::InMemoryAnalyticsEngine;
use crate::observability::{
    log_event, log_event_with_fields, trace_event, ComponentHealth, Event, HealthStatus, Logger,
    MetricsSink, ObservationScope, Timer,
};
use crate::query::{Query, TierOutput};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Per-call execution options
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Query id to use instead of a generated one
    pub query_id: Option<String>,
    pub use_cache: bool,
    /// Skip the cache lookup but still cache the fresh result
    pub force_refresh: bool,
    pub preferred_tier: Option<Tier>,
    pub timeout: Option<Duration>,
    pub cache_timeout: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            query_id: None,
            use_cache: true,
            force_refresh: false,
            preferred_tier: None,
            timeout: None,
            cache_timeout: None,
        }
    }
}

impl QueryOptions {
    pub fn with_query_id(mut self, id: impl Into<String>) -> Self {
        self.query_id = Some(id.into());
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.preferred_tier = Some(tier);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cache_timeout(mut self, ttl: Duration) -> Self {
        self.cache_timeout = Some(ttl);
        self
    }
}

/// Outcome of `cancel_query`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled { tier: Tier },
    /// No active query with that id; nothing was done
    NotActive,
}

/// Notifications published to `subscribe_events` receivers
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    QueryCompleted {
        query_id: String,
        tier: Tier,
        execution_time_ms: u64,
        cached: bool,
    },
    QueryFailed {
        query_id: String,
        code: &'static str,
    },
    QueryCancelled {
        query_id: String,
        tier: Tier,
    },
    SlowQueries {
        average_ms: f64,
        threshold_ms: u64,
    },
    MemoryPressure {
        utilization: f64,
    },
    HistoryEvicted {
        count: usize,
    },
    ViewRefreshed {
        name: String,
    },
    StorageOptimized {
        report: StorageOptimizationReport,
    },
}

#[derive(Default)]
struct QueryCounters {
    executed: AtomicU64,
    failed: AtomicU64,
    cache_hits: AtomicU64,
    cancelled: AtomicU64,
    fallbacks: AtomicU64,
}

/// Removes an active registration when execution ends
struct ActiveGuard<'a> {
    active: &'a Mutex<HashMap<String, QueryPlan>>,
    query_id: String,
    plan_id: String,
}

impl ActiveGuard<'_> {
    /// False once the registration was removed by a cancel
    fn still_active(&self) -> bool {
        self.active
            .lock()
            .map(|a| a.get(&self.query_id).map_or(false, |p| p.id == self.plan_id))
            .unwrap_or(false)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            if active
                .get(&self.query_id)
                .map_or(false, |p| p.id == self.plan_id)
            {
                active.remove(&self.query_id);
            }
        }
    }
}

/// Orchestrates the memory and distributed tiers
pub struct AnalyticsStorageEngine {
    config: EngineConfig,
    memory: Arc<InMemoryAnalyticsEngine>,
    distributed: Arc<DistributedQueryProcessor>,
    indexes: Arc<IndexManager>,
    optimizer: Arc<dyn QueryOptimizer>,
    planner: QueryPlanner,
    cache: Arc<dyn ResultCache>,
    views: Arc<dyn MaterializedViewManager>,
    compaction: Arc<dyn CompactionManager>,
    metrics: Arc<dyn MetricsSink>,
    history: QueryHistory,
    active: Mutex<HashMap<String, QueryPlan>>,
    tiering: RwLock<HashMap<String, TieringPolicy>>,
    events: broadcast::Sender<EngineEvent>,
    counters: QueryCounters,
    running: AtomicBool,
    background: tokio::sync::Mutex<Option<BackgroundTasks>>,
}

pub(crate) struct EngineParts {
    pub config: EngineConfig,
    pub memory: Arc<InMemoryAnalyticsEngine>,
    pub distributed: Arc<DistributedQueryProcessor>,
    pub indexes: Arc<IndexManager>,
    pub optimizer: Arc<dyn QueryOptimizer>,
    pub planner: QueryPlanner,
    pub cache: Arc<dyn ResultCache>,
    pub views: Arc<dyn MaterializedViewManager>,
    pub compaction: Arc<dyn CompactionManager>,
    pub metrics: Arc<dyn MetricsSink>,
}

fn validate_tenant(tenant_id: &str) -> EngineResult<&str> {
    let tenant = tenant_id.trim();
    if tenant.is_empty() {
        return Err(EngineError::InvalidTenant(tenant_id.to_string()));
    }
    Ok(tenant)
}

impl AnalyticsStorageEngine {
    pub(crate) fn from_parts(parts: EngineParts) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let history = QueryHistory::new(
            parts.config.monitoring.history_max_entries,
            Duration::from_secs(parts.config.monitoring.history_retention_secs),
        );

        Self {
            config: parts.config,
            memory: parts.memory,
            distributed: parts.distributed,
            indexes: parts.indexes,
            optimizer: parts.optimizer,
            planner: parts.planner,
            cache: parts.cache,
            views: parts.views,
            compaction: parts.compaction,
            metrics: parts.metrics,
            history,
            active: Mutex::new(HashMap::new()),
            tiering: RwLock::new(HashMap::new()),
            events,
            counters: QueryCounters::default(),
            running: AtomicBool::new(false),
            background: tokio::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn memory(&self) -> &Arc<InMemoryAnalyticsEngine> {
        &self.memory
    }

    pub fn distributed(&self) -> &Arc<DistributedQueryProcessor> {
        &self.distributed
    }

    pub fn indexes(&self) -> &Arc<IndexManager> {
        &self.indexes
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: EngineEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects the distributed tier and spawns the background loops
    pub async fn start(self: &Arc<Self>) -> EngineResult<()> {
        let mut background = self.background.lock().await;
        if background.is_some() {
            return Ok(());
        }
        log_event(Event::EngineStart);

        if !self.config.distributed.nodes.is_empty() {
            self.distributed.initialize().await?;
        }

        let tasks = BackgroundTasks::spawn(self);
        let loops = tasks.len().to_string();
        *background = Some(tasks);
        self.running.store(true, Ordering::SeqCst);

        log_event_with_fields(
            Event::EngineStartComplete,
            &[
                ("mode", self.config.mode.as_str()),
                ("background_loops", loops.as_str()),
            ],
        );
        Ok(())
    }

    /// Cancels active queries, stops the loops, then shuts down every component
    pub async fn stop(&self) {
        log_event(Event::EngineStop);
        self.running.store(false, Ordering::SeqCst);

        for query_id in self.active_query_ids() {
            self.cancel_query(&query_id).await;
        }

        let tasks = self.background.lock().await.take();
        if let Some(tasks) = tasks {
            tasks.shutdown().await;
        }

        tokio::join!(
            self.memory.shutdown(),
            self.distributed.shutdown(),
            self.indexes.shutdown()
        );

        log_event(Event::EngineStopComplete);
    }

    // =========================================================================
    // Query execution
    // =========================================================================

    pub async fn execute_query(
        &self,
        query: Query,
        tenant_id: &str,
        options: QueryOptions,
    ) -> EngineResult<QueryResult> {
        let tenant = validate_tenant(tenant_id)?;
        if query.sql.trim().is_empty() {
            return Err(EngineError::InvalidQuery("query text is empty".to_string()));
        }

        let mut query = query;
        query.id = match &options.query_id {
            Some(id) if id.trim().is_empty() => {
                return Err(EngineError::InvalidQuery("query id is empty".to_string()))
            }
            Some(id) => id.clone(),
            None => Uuid::new_v4().to_string(),
        };
        if self.is_active(&query.id)? {
            return Err(EngineError::InvalidQuery(format!(
                "query {} is already active",
                query.id
            )));
        }

        let key = cache_key(&query, tenant);
        let caching = options.use_cache && self.config.cache.enabled;
        if caching && !options.force_refresh {
            if let Some(hit) = self.cache.get(&key) {
                return Ok(self.serve_cached(hit, &query.id, tenant));
            }
        }

        log_event_with_fields(
            Event::QueryReceived,
            &[("query_id", query.id.as_str()), ("tenant_id", tenant)],
        );

        let query_id = query.id.clone();
        let result = self.run(query, tenant, &options).await;

        match result {
            Ok((result, plan)) => {
                if caching && plan.query.cacheable {
                    let ttl = options
                        .cache_timeout
                        .or(plan.query.cache_timeout)
                        .unwrap_or_else(|| self.config.cache.default_ttl());
                    self.cache.set(&key, result.clone(), ttl);
                }
                self.after_success(&plan, &result);
                Ok(result)
            }
            Err(err) => {
                self.after_failure(&query_id, tenant, &err);
                Err(err)
            }
        }
    }

    fn serve_cached(&self, hit: QueryResult, query_id: &str, tenant: &str) -> QueryResult {
        self.counters.cache_hits.fetch_add(1, Ordering::SeqCst);
        self.metrics.increment("query.cache_hit");
        log_event_with_fields(
            Event::QueryCacheHit,
            &[("query_id", query_id), ("tenant_id", tenant)],
        );

        let result = hit.with_cached(true);
        self.history.record(HistoryEntry {
            query_id: query_id.to_string(),
            tenant_id: tenant.to_string(),
            tier: result.metadata.tier,
            execution_time_ms: 0,
            row_count: result.row_count(),
            cached: true,
            error: None,
            executed_at: Utc::now(),
        });
        self.publish(EngineEvent::QueryCompleted {
            query_id: query_id.to_string(),
            tier: result.metadata.tier,
            execution_time_ms: 0,
            cached: true,
        });
        result
    }

    async fn run(
        &self,
        query: Query,
        tenant: &str,
        options: &QueryOptions,
    ) -> EngineResult<(QueryResult, QueryPlan)> {
        let query = self.optimizer.optimize_query(query)?;
        let tier = self.planner.select_tier(&self.config, &query, options.preferred_tier);
        let plan = self.planner.plan(query, tenant, tier)?;

        log_event_with_fields(
            Event::QueryPlanned,
            &[
                ("query_id", plan.query_id()),
                ("tier", plan.tier.as_str()),
                ("estimated_cost", plan.estimated_cost.to_string().as_str()),
                ("parallelism", plan.parallelism.to_string().as_str()),
            ],
        );

        let guard = self.register(&plan)?;
        let timer = Timer::new();

        let outcome = match options.timeout.or_else(|| self.config.query_timeout()) {
            Some(limit) => match tokio::time::timeout(limit, self.dispatch(&plan)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.signal_tier(plan.tier, plan.query_id()).await;
                    Err(EngineError::Timeout {
                        query_id: plan.query_id().to_string(),
                        timeout_ms: limit.as_millis() as u64,
                    })
                }
            },
            None => self.dispatch(&plan).await,
        };

        if !guard.still_active() {
            return Err(EngineError::Cancelled(plan.query_id().to_string()));
        }
        drop(guard);

        let (mut output, served_by, fallback_used) = outcome?;
        if output.execution_time_ms == 0 {
            output.execution_time_ms = timer.elapsed_ms();
        }
        let result = QueryResult::from_output(&plan, served_by, output, fallback_used);
        Ok((result, plan))
    }

    fn register(&self, plan: &QueryPlan) -> EngineResult<ActiveGuard<'_>> {
        let mut active = self.active.lock().map_err(|_| EngineError::poisoned())?;
        if active.contains_key(plan.query_id()) {
            return Err(EngineError::InvalidQuery(format!(
                "query {} is already active",
                plan.query_id()
            )));
        }
        active.insert(plan.query_id().to_string(), plan.clone());
        Ok(ActiveGuard {
            active: &self.active,
            query_id: plan.query_id().to_string(),
            plan_id: plan.id.clone(),
        })
    }

    fn is_active(&self, query_id: &str) -> EngineResult<bool> {
        let active = self.active.lock().map_err(|_| EngineError::poisoned())?;
        Ok(active.contains_key(query_id))
    }

    /// Runs a plan on its tier; returns the output, the tier that served it
    /// and whether a hybrid fallback happened
    async fn dispatch(&self, plan: &QueryPlan) -> EngineResult<(TierOutput, Tier, bool)> {
        match plan.tier {
            Tier::Memory => {
                let output = self.memory.execute_query(&plan.query).await?;
                Ok((output, Tier::Memory, false))
            }
            Tier::Distributed => {
                let output = self.distributed.execute_query(&plan.query).await?;
                Ok((output, Tier::Distributed, false))
            }
            Tier::Hybrid => {
                if plan.estimated_cost < self.config.hybrid.memory_threshold {
                    match self.memory.execute_query(&plan.query).await {
                        Ok(output) => return Ok((output, Tier::Memory, false)),
                        Err(err) => {
                            self.counters.fallbacks.fetch_add(1, Ordering::SeqCst);
                            self.metrics.increment("query.fallback");
                            trace_event(
                                Event::TierFallback,
                                &[
                                    ("query_id", plan.query_id()),
                                    ("reason", err.to_string().as_str()),
                                ],
                            );
                        }
                    }
                    let output = self.distributed.execute_query(&plan.query).await?;
                    return Ok((output, Tier::Distributed, true));
                }
                let output = self.distributed.execute_query(&plan.query).await?;
                Ok((output, Tier::Distributed, false))
            }
        }
    }

    fn after_success(&self, plan: &QueryPlan, result: &QueryResult) {
        let tier = result.metadata.tier;
        self.counters.executed.fetch_add(1, Ordering::SeqCst);
        self.metrics.increment("query.executed");
        self.metrics.increment(&format!("query.tier.{}", tier));
        self.metrics
            .timing("query.execution_time_ms", result.execution_time_ms);

        self.history.record(HistoryEntry {
            query_id: result.id.clone(),
            tenant_id: plan.tenant_id.clone(),
            tier,
            execution_time_ms: result.execution_time_ms,
            row_count: result.row_count(),
            cached: false,
            error: None,
            executed_at: result.executed_at,
        });

        self.record_index_usage(plan);
        if let Err(e) = self.indexes.analyze_query(&plan.query, &plan.index_ids) {
            Logger::warn(
                "INDEX_ANALYSIS_FAILED",
                &[("query_id", plan.query_id()), ("error", e.to_string().as_str())],
            );
        }

        log_event_with_fields(
            Event::QueryExecuted,
            &[
                ("query_id", result.id.as_str()),
                ("tenant_id", plan.tenant_id.as_str()),
                ("tier", tier.as_str()),
                ("rows", result.row_count().to_string().as_str()),
                ("execution_time_ms", result.execution_time_ms.to_string().as_str()),
                ("fallback", if result.metadata.fallback_used { "true" } else { "false" }),
            ],
        );
        self.publish(EngineEvent::QueryCompleted {
            query_id: result.id.clone(),
            tier,
            execution_time_ms: result.execution_time_ms,
            cached: false,
        });
    }

    /// Every active index on the target table records one lookup: a hit when
    /// the plan used it or its leading column is filtered on, else a miss
    fn record_index_usage(&self, plan: &QueryPlan) {
        let table = match plan.query.dataset_name() {
            Some(table) => table,
            None => return,
        };
        let indexes = match self.indexes.list_indexes(Some(&table)) {
            Ok(indexes) => indexes,
            Err(_) => return,
        };
        let columns = plan.query.filter_columns();

        for index in indexes.iter().filter(|i| i.status == IndexStatus::Active) {
            let hit = plan.index_ids.contains(&index.id)
                || index
                    .leading_column()
                    .map_or(false, |c| columns.iter().any(|f| f == c));
            if let Err(e) = self.indexes.record_usage(&index.id, hit) {
                Logger::warn(
                    "INDEX_USAGE_NOT_RECORDED",
                    &[("index_id", index.id.as_str()), ("error", e.to_string().as_str())],
                );
            }
        }
    }

    fn after_failure(&self, query_id: &str, tenant: &str, err: &EngineError) {
        self.counters.failed.fetch_add(1, Ordering::SeqCst);
        self.metrics.increment("query.failed");

        self.history.record(HistoryEntry {
            query_id: query_id.to_string(),
            tenant_id: tenant.to_string(),
            tier: err.tier().unwrap_or_default(),
            execution_time_ms: 0,
            row_count: 0,
            cached: false,
            error: Some(err.code().to_string()),
            executed_at: Utc::now(),
        });

        log_event_with_fields(
            Event::QueryFailed,
            &[
                ("query_id", query_id),
                ("tenant_id", tenant),
                ("code", err.code()),
                ("stage", err.stage().as_str()),
                ("category", err.category().as_str()),
                ("error", err.to_string().as_str()),
            ],
        );
        self.publish(EngineEvent::QueryFailed {
            query_id: query_id.to_string(),
            code: err.code(),
        });
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancels an active query. Unknown or finished ids are a no-op.
    pub async fn cancel_query(&self, query_id: &str) -> CancelOutcome {
        let plan = match self.active.lock() {
            Ok(mut active) => active.remove(query_id),
            Err(_) => None,
        };
        let plan = match plan {
            Some(plan) => plan,
            None => return CancelOutcome::NotActive,
        };

        self.signal_tier(plan.tier, query_id).await;

        self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
        self.metrics.increment("query.cancelled");
        log_event_with_fields(
            Event::QueryCancelled,
            &[("query_id", query_id), ("tier", plan.tier.as_str())],
        );
        self.publish(EngineEvent::QueryCancelled {
            query_id: query_id.to_string(),
            tier: plan.tier,
        });
        CancelOutcome::Cancelled { tier: plan.tier }
    }

    async fn signal_tier(&self, tier: Tier, query_id: &str) {
        if matches!(tier, Tier::Memory | Tier::Hybrid) {
            if let Err(e) = self.memory.cancel_query(query_id) {
                Logger::warn(
                    "MEMORY_CANCEL_FAILED",
                    &[("query_id", query_id), ("error", e.to_string().as_str())],
                );
            }
        }
        if matches!(tier, Tier::Distributed | Tier::Hybrid) {
            if let Err(e) = self.distributed.cancel_query(query_id).await {
                Logger::warn(
                    "DISTRIBUTED_CANCEL_FAILED",
                    &[("query_id", query_id), ("error", e.to_string().as_str())],
                );
            }
        }
    }

    pub fn active_query_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .active
            .lock()
            .map(|a| a.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// History entries for a tenant, newest last
    pub fn query_history(&self, tenant_id: &str) -> EngineResult<Vec<HistoryEntry>> {
        let tenant = validate_tenant(tenant_id)?;
        Ok(self.history.for_tenant(tenant))
    }

    // =========================================================================
    // Data
    // =========================================================================

    /// Loads a dataset into the memory tier. Cached results are dropped.
    pub fn load_dataset(
        &self,
        tenant_id: &str,
        name: &str,
        records: Vec<Value>,
    ) -> EngineResult<u64> {
        let tenant = validate_tenant(tenant_id)?;
        let size = self.memory.load_dataset(name, records)?;
        self.cache.clear();
        self.metrics.increment("engine.dataset_loaded");
        trace_event(
            Event::DatasetLoaded,
            &[("tenant_id", tenant), ("dataset", name)],
        );
        Ok(size)
    }

    /// Partitions a dataset across the distributed nodes
    pub async fn distribute_dataset(
        &self,
        tenant_id: &str,
        name: &str,
        records: Vec<Value>,
    ) -> EngineResult<BTreeMap<String, usize>> {
        validate_tenant(tenant_id)?;
        let placed = self.distributed.distribute_dataset(name, records).await?;
        self.cache.clear();
        self.metrics.increment("engine.dataset_distributed");
        Ok(placed)
    }

    // =========================================================================
    // Indexes and views
    // =========================================================================

    pub async fn create_index(&self, tenant_id: &str, config: IndexConfig) -> EngineResult<IndexInfo> {
        let tenant = validate_tenant(tenant_id)?;
        let info = self.indexes.create_index(config.with_tenant(tenant)).await?;
        self.metrics.increment("engine.index_created");
        Ok(info)
    }

    pub fn drop_index(&self, tenant_id: &str, index_id: &str) -> EngineResult<IndexInfo> {
        validate_tenant(tenant_id)?;
        let info = self.indexes.drop_index(index_id)?;
        self.metrics.increment("engine.index_dropped");
        Ok(info)
    }

    pub async fn create_materialized_view(
        &self,
        tenant_id: &str,
        mut definition: ViewDefinition,
    ) -> EngineResult<ViewInfo> {
        let tenant = validate_tenant(tenant_id)?;
        definition.tenant_id = tenant.to_string();
        let info = self.views.create_view(definition).await?;
        self.metrics.increment("engine.view_created");
        Ok(info)
    }

    pub async fn refresh_materialized_view(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> EngineResult<ViewInfo> {
        validate_tenant(tenant_id)?;
        self.refresh_view(name).await
    }

    async fn refresh_view(&self, name: &str) -> EngineResult<ViewInfo> {
        match self.views.refresh_view(name).await {
            Ok(info) => {
                self.metrics.increment("engine.view_refreshed");
                log_event_with_fields(
                    Event::ViewRefreshed,
                    &[
                        ("view", name),
                        ("rows", info.row_count.to_string().as_str()),
                    ],
                );
                self.publish(EngineEvent::ViewRefreshed {
                    name: name.to_string(),
                });
                Ok(info)
            }
            Err(err) => {
                self.metrics.increment("engine.view_refresh_failed");
                log_event_with_fields(
                    Event::ViewRefreshFailed,
                    &[("view", name), ("error", err.to_string().as_str())],
                );
                Err(err)
            }
        }
    }

    // =========================================================================
    // Storage management
    // =========================================================================

    /// Stores a validated tiering policy for a tenant
    pub fn configure_tiering(&self, tenant_id: &str, policy: TieringPolicy) -> EngineResult<()> {
        let tenant = validate_tenant(tenant_id)?;
        policy.validate()?;

        let mut tiering = self.tiering.write().map_err(|_| EngineError::poisoned())?;
        tiering.insert(tenant.to_string(), policy);
        drop(tiering);

        self.metrics.increment("engine.tiering_configured");
        log_event_with_fields(
            Event::TieringConfigured,
            &[
                ("tenant_id", tenant),
                ("hot_days", policy.hot_days.to_string().as_str()),
                ("warm_days", policy.warm_days.to_string().as_str()),
                ("cold_days", policy.cold_days.to_string().as_str()),
            ],
        );
        Ok(())
    }

    pub fn tiering_policy(&self, tenant_id: &str) -> Option<TieringPolicy> {
        self.tiering
            .read()
            .ok()
            .and_then(|t| t.get(tenant_id.trim()).copied())
    }

    pub async fn optimize_storage(
        &self,
        tenant_id: &str,
        steps: StorageOptimization,
    ) -> EngineResult<StorageOptimizationReport> {
        validate_tenant(tenant_id)?;
        self.run_optimization(steps).await
    }

    pub(crate) async fn run_optimization(
        &self,
        steps: StorageOptimization,
    ) -> EngineResult<StorageOptimizationReport> {
        let scope = ObservationScope::new("STORAGE_OPTIMIZE");
        match self.optimize_steps(steps).await {
            Ok(report) => {
                scope.complete_with_fields(&[
                    ("indexes_rebuilt", report.indexes_rebuilt.to_string().as_str()),
                    ("tables_compacted", report.tables_compacted.to_string().as_str()),
                    ("views_refreshed", report.views_refreshed.to_string().as_str()),
                ]);
                self.metrics.increment("engine.storage_optimized");
                self.metrics.timing("engine.optimize_duration_ms", report.duration_ms);
                log_event_with_fields(
                    Event::StorageOptimized,
                    &[("duration_ms", report.duration_ms.to_string().as_str())],
                );
                self.publish(EngineEvent::StorageOptimized {
                    report: report.clone(),
                });
                Ok(report)
            }
            Err(err) => {
                scope.fail(&err.to_string());
                Err(err)
            }
        }
    }

    async fn optimize_steps(
        &self,
        steps: StorageOptimization,
    ) -> EngineResult<StorageOptimizationReport> {
        let timer = Timer::new();
        let mut report = StorageOptimizationReport::default();

        if steps.indexes {
            let outcome = self.indexes.optimize_indexes().await?;
            report.indexes_rebuilt = outcome.rebuilt.len();
            report.index_drop_candidates = outcome.drop_candidates.len();
        }

        if steps.compaction {
            let tables = self.memory.list_datasets()?;
            let compacted = self.compaction.compact_tables(&tables).await?;
            report.tables_compacted = compacted.tables_compacted;
        }

        if steps.statistics {
            self.memory.refresh_statistics()?;
            report.statistics_refreshed = true;
        }

        if steps.views {
            for view in self.views.get_all_views() {
                if self.refresh_view(&view.name).await.is_ok() {
                    report.views_refreshed += 1;
                }
            }
        }

        report.duration_ms = timer.elapsed_ms();
        Ok(report)
    }

    // =========================================================================
    // Maintenance ticks
    // =========================================================================

    /// Emits `SlowQueries` when the rolling average exceeds the threshold.
    ///
    /// Returns the rolling average, if any history exists.
    pub fn run_performance_check(&self) -> Option<f64> {
        let window = self.config.monitoring.performance_window;
        let threshold = self.config.monitoring.slow_query_threshold_ms;
        let average = self.history.rolling_average_ms(window)?;

        self.metrics.gauge("query.rolling_average_ms", average);
        if average > threshold as f64 {
            log_event_with_fields(
                Event::SlowQueries,
                &[
                    ("average_ms", format!("{:.1}", average).as_str()),
                    ("threshold_ms", threshold.to_string().as_str()),
                ],
            );
            self.publish(EngineEvent::SlowQueries {
                average_ms: average,
                threshold_ms: threshold,
            });
        }
        Some(average)
    }

    /// Checks memory pressure; returns true if the memory tier cache was cleared
    pub fn run_memory_check(&self) -> EngineResult<bool> {
        let utilization = self.memory.utilization();
        self.metrics.gauge("memory.utilization", utilization);
        let cleared = self.memory.check_memory_pressure()?;
        if cleared {
            self.publish(EngineEvent::MemoryPressure { utilization });
        }
        Ok(cleared)
    }

    /// Evicts history entries past the retention window
    pub fn run_history_cleanup(&self) -> usize {
        let evicted = self.history.evict_expired(Utc::now());
        if evicted > 0 {
            log_event_with_fields(
                Event::HistoryEvicted,
                &[("count", evicted.to_string().as_str())],
            );
            self.publish(EngineEvent::HistoryEvicted { count: evicted });
        }
        evicted
    }

    /// Refreshes views whose interval has elapsed; returns how many refreshed
    pub async fn run_view_refresh(&self) -> usize {
        let now = Utc::now();
        let mut refreshed = 0;
        for view in self.views.get_all_views().into_iter().filter(|v| v.is_due(now)) {
            if self.refresh_view(&view.name).await.is_ok() {
                refreshed += 1;
            }
        }
        refreshed
    }

    // =========================================================================
    // Statistics and health
    // =========================================================================

    pub fn get_storage_statistics(&self, tenant_id: &str) -> EngineResult<StorageStatistics> {
        let tenant = validate_tenant(tenant_id)?;
        let window = self.config.monitoring.performance_window;

        let queries = QueryStatistics {
            executed: self.counters.executed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            cache_hits: self.counters.cache_hits.load(Ordering::SeqCst),
            cancelled: self.counters.cancelled.load(Ordering::SeqCst),
            fallbacks: self.counters.fallbacks.load(Ordering::SeqCst),
            active: self.active_query_ids().len(),
            history_entries: self.history.len(),
            average_execution_time_ms: self.history.rolling_average_ms(window),
        };
        let tiering_policies = self.tiering.read().map(|t| t.len()).unwrap_or(0);

        Ok(StorageStatistics {
            tenant_id: tenant.to_string(),
            queries,
            cache: self.cache.stats(),
            memory: self.memory.statistics()?,
            distributed: self.distributed.statistics()?,
            indexes: self.indexes.statistics()?,
            views: ViewStatistics {
                views: self.views.get_all_views().len(),
                hit_rate: self.views.get_hit_rate(),
            },
            tiering_policies,
            collected_at: Utc::now(),
        })
    }

    pub fn get_health_status(&self) -> HealthReport {
        let mut components = vec![self.memory.health(), self.distributed.health()];

        components.push(match self.indexes.statistics() {
            Ok(stats) => {
                let status = if stats.corrupted > 0 {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                };
                ComponentHealth::new("indexes", status)
                    .with_detail("total", stats.total_indexes)
                    .with_detail("active", stats.active)
                    .with_detail("corrupted", stats.corrupted)
            }
            Err(e) => ComponentHealth::new("indexes", HealthStatus::Unhealthy)
                .with_detail("error", e.to_string()),
        });

        let cache = self.cache.stats();
        components.push(
            ComponentHealth::new("cache", HealthStatus::Healthy)
                .with_detail("entries", cache.entries)
                .with_detail("hit_rate", cache.hit_rate),
        );

        components.push(
            ComponentHealth::new("engine", HealthStatus::Healthy)
                .with_detail("running", self.is_running())
                .with_detail("active_queries", self.active_query_ids().len())
                .with_detail("history_entries", self.history.len()),
        );

        HealthReport::from_components(self.is_running(), components)
    }
}
