//! Engine assembly
//!
//! Every collaborator has a default; `with_*` swaps one out.

use std::sync::Arc;

use super::cache::{ResultCache, TtlResultCache};
use super::compaction::{CompactionManager, SimulatedCompaction};
use super::config::EngineConfig;
use super::engine::{AnalyticsStorageEngine, EngineParts};
use super::errors::EngineResult;
use super::optimizer::{QueryOptimizer, RuleBasedOptimizer};
use super::parallelism::{CpuParallelism, ParallelProcessor};
use super::planner::QueryPlanner;
use super::views::{InMemoryViewManager, MaterializedViewManager};
use crate::distributed::{DistributedQueryProcessor, NodeClient};
use crate::index::{IndexBuilder, IndexManager, IndexRepository};
use crate::memory::InMemoryAnalyticsEngine;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, MetricsSink};

pub struct EngineBuilder {
    config: EngineConfig,
    optimizer: Option<Arc<dyn QueryOptimizer>>,
    parallelism: Option<Arc<dyn ParallelProcessor>>,
    cache: Option<Arc<dyn ResultCache>>,
    views: Option<Arc<dyn MaterializedViewManager>>,
    compaction: Option<Arc<dyn CompactionManager>>,
    metrics: Option<Arc<dyn MetricsSink>>,
    node_client: Option<Arc<dyn NodeClient>>,
    index_builder: Option<Arc<dyn IndexBuilder>>,
    index_repository: Option<Arc<dyn IndexRepository>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            optimizer: None,
            parallelism: None,
            cache: None,
            views: None,
            compaction: None,
            metrics: None,
            node_client: None,
            index_builder: None,
            index_repository: None,
        }
    }

    pub fn with_optimizer(mut self, optimizer: Arc<dyn QueryOptimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn with_parallelism(mut self, parallelism: Arc<dyn ParallelProcessor>) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the default view manager, which materializes from the memory tier
    pub fn with_views(mut self, views: Arc<dyn MaterializedViewManager>) -> Self {
        self.views = Some(views);
        self
    }

    pub fn with_compaction(mut self, compaction: Arc<dyn CompactionManager>) -> Self {
        self.compaction = Some(compaction);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_node_client(mut self, client: Arc<dyn NodeClient>) -> Self {
        self.node_client = Some(client);
        self
    }

    pub fn with_index_builder(mut self, builder: Arc<dyn IndexBuilder>) -> Self {
        self.index_builder = Some(builder);
        self
    }

    pub fn with_index_repository(mut self, repository: Arc<dyn IndexRepository>) -> Self {
        self.index_repository = Some(repository);
        self
    }

    /// Validates the configuration and wires the components
    pub fn build(self) -> EngineResult<Arc<AnalyticsStorageEngine>> {
        self.config.validate()?;

        let metrics: Arc<dyn MetricsSink> = self
            .metrics
            .unwrap_or_else(|| Arc::new(MetricsRegistry::new()));

        let memory = Arc::new(
            InMemoryAnalyticsEngine::new(self.config.memory.clone()).with_metrics(metrics.clone()),
        );

        let distributed = match self.node_client {
            Some(client) => {
                DistributedQueryProcessor::with_client(self.config.distributed.clone(), client)
            }
            None => DistributedQueryProcessor::new(self.config.distributed.clone()),
        };
        let distributed = Arc::new(distributed.with_metrics(metrics.clone()));

        let mut indexes = IndexManager::new(self.config.index.clone()).with_metrics(metrics.clone());
        if let Some(repository) = self.index_repository {
            indexes = indexes.with_repository(repository);
        }
        if let Some(builder) = self.index_builder {
            indexes = indexes.with_builder(builder);
        }
        let indexes = Arc::new(indexes);

        let parallelism = self
            .parallelism
            .unwrap_or_else(|| Arc::new(CpuParallelism::new()));
        let planner = QueryPlanner::new(indexes.clone(), parallelism);

        let views = self
            .views
            .unwrap_or_else(|| Arc::new(InMemoryViewManager::new().with_memory(memory.clone())));

        let parts = EngineParts {
            optimizer: self
                .optimizer
                .unwrap_or_else(|| Arc::new(RuleBasedOptimizer::new())),
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(TtlResultCache::new(self.config.cache.max_entries))),
            compaction: self
                .compaction
                .unwrap_or_else(|| Arc::new(SimulatedCompaction::default())),
            config: self.config,
            memory,
            distributed,
            indexes,
            planner,
            views,
            metrics,
        };

        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("mode", parts.config.mode.as_str()),
                ("nodes", parts.config.distributed.nodes.len().to_string().as_str()),
            ],
        );
        Ok(Arc::new(AnalyticsStorageEngine::from_parts(parts)))
    }
}
