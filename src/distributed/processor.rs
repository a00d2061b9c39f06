//! Distributed query processor
//!
//! # Execution
//!
//! 1. Plan one fragment per active node
//! 2. Resolve every fragment's node (fail fast if one is missing)
//! 3. Fan out concurrently, join at a barrier
//! 4. All-or-nothing: any fragment failure fails the query; a node that
//!    holds no partition of the target dataset fails it as not found
//! 5. Merge: concatenate rows, sum record counts, max execution time
//! 6. Coordinator applies sort, offset/limit and aggregations
//!
//! Cancellation is cooperative: the in-flight flag is checked after the
//! barrier, and a cancel signal is broadcast to every active node.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::client::NodeClient;
use super::errors::{DistributedError, DistributedResult};
use super::node::{Node, NodeConfig, NodeInfo, NodeStatus};
use super::planner::FragmentPlanner;
use super::simulated::SimulatedNodeClient;
use crate::memory::{Aggregator, ResultSorter};
use crate::observability::{
    log_event_with_fields, ComponentHealth, Event, HealthStatus, MetricsRegistry, MetricsSink,
};
use crate::query::{Query, TierOutput};

/// Distributed tier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributedConfig {
    /// Static node set
    #[serde(default = "default_nodes")]
    pub nodes: Vec<NodeConfig>,

    /// Latency of the simulated node client
    #[serde(default = "default_simulated_latency_ms")]
    pub simulated_latency_ms: u64,
}

fn default_nodes() -> Vec<NodeConfig> {
    (1..=3)
        .map(|i| NodeConfig::new(format!("node-{}", i), "127.0.0.1", 7000 + i as u16))
        .collect()
}

fn default_simulated_latency_ms() -> u64 {
    5
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            simulated_latency_ms: default_simulated_latency_ms(),
        }
    }
}

/// Outcome of a cancellation broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReport {
    /// The query was running on this processor
    pub was_in_flight: bool,
    /// Nodes that acknowledged the signal
    pub signalled: usize,
    /// Nodes whose signal failed
    pub failed: usize,
}

/// Distributed tier statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributedStatistics {
    pub nodes: Vec<NodeInfo>,
    pub total_nodes: usize,
    pub healthy_nodes: usize,
    pub total_capacity: u64,
    pub current_load: u64,
    pub distribution_efficiency: f64,
    pub queries_executed: u64,
    pub queries_failed: u64,
    pub fragments_executed: u64,
    pub cancellations: u64,
}

/// Removes the in-flight cancel flag when execution ends
struct InFlight<'a> {
    registry: &'a Mutex<HashMap<String, Arc<AtomicBool>>>,
    query_id: String,
    flag: Arc<AtomicBool>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            if registry
                .get(&self.query_id)
                .map_or(false, |f| Arc::ptr_eq(f, &self.flag))
            {
                registry.remove(&self.query_id);
            }
        }
    }
}

/// Coordinates fragment execution across worker nodes
pub struct DistributedQueryProcessor {
    config: DistributedConfig,
    client: Arc<dyn NodeClient>,
    nodes: RwLock<BTreeMap<String, Node>>,
    initialized: AtomicBool,
    in_flight: Mutex<HashMap<String, Arc<AtomicBool>>>,
    metrics: Arc<dyn MetricsSink>,
    queries_executed: AtomicU64,
    queries_failed: AtomicU64,
    fragments_executed: AtomicU64,
    cancellations: AtomicU64,
}

impl DistributedQueryProcessor {
    /// Creates a processor backed by the simulated node client
    pub fn new(config: DistributedConfig) -> Self {
        let client = SimulatedNodeClient::new(Duration::from_millis(config.simulated_latency_ms));
        Self::with_client(config, Arc::new(client))
    }

    pub fn with_client(config: DistributedConfig, client: Arc<dyn NodeClient>) -> Self {
        Self {
            config,
            client,
            nodes: RwLock::new(BTreeMap::new()),
            initialized: AtomicBool::new(false),
            in_flight: Mutex::new(HashMap::new()),
            metrics: Arc::new(MetricsRegistry::new()),
            queries_executed: AtomicU64::new(0),
            queries_failed: AtomicU64::new(0),
            fragments_executed: AtomicU64::new(0),
            cancellations: AtomicU64::new(0),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &DistributedConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Registers the static node set and connects to every node concurrently.
    ///
    /// Any failed connection fails initialization. Calling again after a
    /// successful initialization is a no-op.
    pub async fn initialize(&self) -> DistributedResult<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let connections = self
            .config
            .nodes
            .iter()
            .map(|node| async move { (node, self.client.connect(node).await) });
        let results = join_all(connections).await;

        for (node, result) in &results {
            if let Err(err) = result {
                log_event_with_fields(
                    Event::FragmentFailed,
                    &[
                        ("node_id", node.id.as_str()),
                        ("stage", "connect"),
                        ("reason", err.to_string().as_str()),
                    ],
                );
                return Err(DistributedError::NodeUnavailable(node.id.clone()));
            }
        }

        {
            let mut nodes = self.nodes.write().map_err(|_| DistributedError::poisoned())?;
            for (node, _) in &results {
                nodes.insert(node.id.clone(), Node::new((*node).clone()));
            }
        }
        for (node, _) in &results {
            log_event_with_fields(
                Event::NodeConnected,
                &[
                    ("node_id", node.id.as_str()),
                    ("address", node.address().as_str()),
                ],
            );
        }

        self.initialized.store(true, Ordering::SeqCst);
        self.metrics.gauge("distributed.nodes", results.len() as f64);
        Ok(())
    }

    fn active_nodes(&self) -> DistributedResult<Vec<Node>> {
        let nodes = self.nodes.read().map_err(|_| DistributedError::poisoned())?;
        Ok(nodes.values().filter(|n| n.is_active()).cloned().collect())
    }

    /// Executes a query across all active nodes
    pub async fn execute_query(&self, query: &Query) -> DistributedResult<TierOutput> {
        if !self.is_initialized() {
            return Err(DistributedError::NotInitialized);
        }

        let result = self.run(query).await;
        match &result {
            Ok(_) => {
                self.queries_executed.fetch_add(1, Ordering::SeqCst);
                self.metrics.increment("distributed.query_executed");
            }
            Err(_) => {
                self.queries_failed.fetch_add(1, Ordering::SeqCst);
                self.metrics.increment("distributed.query_failed");
            }
        }
        result
    }

    async fn run(&self, query: &Query) -> DistributedResult<TierOutput> {
        if query.dataset_name().is_none() {
            return Err(DistributedError::InvalidQuery(
                "query names no dataset".to_string(),
            ));
        }
        let active: Vec<String> = self
            .active_nodes()?
            .iter()
            .map(|n| n.id().to_string())
            .collect();
        if active.is_empty() {
            return Err(DistributedError::NodeUnavailable("no active nodes".into()));
        }

        let fragments = FragmentPlanner::plan(query, &active);
        let assignments = {
            let nodes = self.nodes.read().map_err(|_| DistributedError::poisoned())?;
            fragments
                .into_iter()
                .map(|fragment| match nodes.get(&fragment.node_id) {
                    Some(node) => Ok((node.clone(), fragment)),
                    None => Err(DistributedError::NodeUnavailable(fragment.node_id.clone())),
                })
                .collect::<DistributedResult<Vec<_>>>()?
        };

        let in_flight = self.track(&query.id)?;

        let executions = assignments.iter().map(|(node, fragment)| async move {
            let _load = node.begin_fragment();
            self.client.execute_fragment(node.id(), fragment).await
        });
        let results = join_all(executions).await;
        self.fragments_executed
            .fetch_add(results.len() as u64, Ordering::SeqCst);

        if in_flight.flag.load(Ordering::SeqCst) {
            return Err(DistributedError::Cancelled(query.id.clone()));
        }

        let mut node_record_counts = BTreeMap::new();
        let mut rows: Vec<Value> = Vec::new();
        let mut execution_time_ms = 0u64;

        for ((node, _), result) in assignments.iter().zip(results) {
            let fragment = match result {
                Ok(fragment) => fragment,
                Err(err) => {
                    self.metrics.increment("distributed.fragment_failed");
                    log_event_with_fields(
                        Event::FragmentFailed,
                        &[
                            ("node_id", node.id()),
                            ("query_id", query.id.as_str()),
                            ("reason", err.to_string().as_str()),
                        ],
                    );
                    if let DistributedError::DatasetNotFound(_) = err {
                        return Err(err);
                    }
                    return Err(DistributedError::FragmentFailed {
                        node_id: node.id().to_string(),
                        reason: err.to_string(),
                    });
                }
            };
            node_record_counts.insert(fragment.node_id.clone(), fragment.record_count);
            execution_time_ms = execution_time_ms.max(fragment.execution_time_ms);
            rows.extend(fragment.rows);
        }

        let rows = coordinate(rows, query);
        let mut output = TierOutput::from_rows(rows).with_execution_time(execution_time_ms);
        if let Some(dataset) = query.dataset_name() {
            output = output.with_table(dataset);
        }
        output.nodes_queried = Some(node_record_counts.len());
        output.node_record_counts = Some(node_record_counts);
        Ok(output)
    }

    fn track(&self, query_id: &str) -> DistributedResult<InFlight<'_>> {
        let flag = Arc::new(AtomicBool::new(false));
        let mut registry = self
            .in_flight
            .lock()
            .map_err(|_| DistributedError::poisoned())?;
        registry.insert(query_id.to_string(), Arc::clone(&flag));
        Ok(InFlight {
            registry: &self.in_flight,
            query_id: query_id.to_string(),
            flag,
        })
    }

    /// Marks a query cancelled and broadcasts the signal to all active nodes.
    ///
    /// Best effort: individual signal failures are logged and counted.
    pub async fn cancel_query(&self, query_id: &str) -> DistributedResult<CancelReport> {
        let was_in_flight = {
            let registry = self
                .in_flight
                .lock()
                .map_err(|_| DistributedError::poisoned())?;
            match registry.get(query_id) {
                Some(flag) => {
                    flag.store(true, Ordering::SeqCst);
                    true
                }
                None => false,
            }
        };

        let nodes = self.active_nodes()?;
        let signals = nodes.iter().map(|node| async move {
            (node.id(), self.client.cancel(node.id(), query_id).await)
        });

        let mut report = CancelReport {
            was_in_flight,
            ..CancelReport::default()
        };
        for (node_id, result) in join_all(signals).await {
            match result {
                Ok(()) => report.signalled += 1,
                Err(err) => {
                    report.failed += 1;
                    self.metrics.increment("distributed.cancel_failed");
                    log_event_with_fields(
                        Event::CancelSignalFailed,
                        &[
                            ("node_id", node_id),
                            ("query_id", query_id),
                            ("reason", err.to_string().as_str()),
                        ],
                    );
                }
            }
        }

        self.cancellations.fetch_add(1, Ordering::SeqCst);
        Ok(report)
    }

    /// Partitions a dataset round-robin across active nodes.
    ///
    /// Returns the number of records placed on each node.
    pub async fn distribute_dataset(
        &self,
        name: &str,
        records: Vec<Value>,
    ) -> DistributedResult<BTreeMap<String, usize>> {
        if !self.is_initialized() {
            return Err(DistributedError::NotInitialized);
        }
        let nodes = self.active_nodes()?;
        if nodes.is_empty() {
            return Err(DistributedError::NodeUnavailable("no active nodes".into()));
        }

        let mut partitions: Vec<Vec<Value>> = vec![Vec::new(); nodes.len()];
        for (i, record) in records.into_iter().enumerate() {
            partitions[i % nodes.len()].push(record);
        }

        let counts: BTreeMap<String, usize> = nodes
            .iter()
            .zip(&partitions)
            .map(|(node, part)| (node.id().to_string(), part.len()))
            .collect();

        let loads = nodes
            .iter()
            .zip(partitions)
            .map(|(node, part)| self.client.load_partition(node.id(), name, part));
        for result in join_all(loads).await {
            result?;
        }

        self.metrics.increment("distributed.dataset_distributed");
        Ok(counts)
    }

    /// Disconnects every node
    pub async fn shutdown(&self) {
        let disconnected: Vec<String> = match self.nodes.write() {
            Ok(mut nodes) => nodes
                .values_mut()
                .filter(|n| n.is_active())
                .map(|n| {
                    n.disconnect();
                    n.id().to_string()
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        for node_id in &disconnected {
            log_event_with_fields(Event::NodeDisconnected, &[("node_id", node_id.as_str())]);
        }
    }

    pub fn statistics(&self) -> DistributedResult<DistributedStatistics> {
        let nodes = self.nodes.read().map_err(|_| DistributedError::poisoned())?;
        let infos: Vec<NodeInfo> = nodes.values().map(Node::info).collect();
        drop(nodes);

        let total_nodes = infos.len();
        let healthy_nodes = infos.iter().filter(|n| n.status == NodeStatus::Active).count();
        let distribution_efficiency = if total_nodes == 0 {
            0.0
        } else {
            healthy_nodes as f64 / total_nodes as f64
        };

        Ok(DistributedStatistics {
            total_capacity: infos.iter().map(|n| n.capacity as u64).sum(),
            current_load: infos.iter().map(|n| n.current_load as u64).sum(),
            nodes: infos,
            total_nodes,
            healthy_nodes,
            distribution_efficiency,
            queries_executed: self.queries_executed.load(Ordering::SeqCst),
            queries_failed: self.queries_failed.load(Ordering::SeqCst),
            fragments_executed: self.fragments_executed.load(Ordering::SeqCst),
            cancellations: self.cancellations.load(Ordering::SeqCst),
        })
    }

    pub fn health(&self) -> ComponentHealth {
        let stats = match self.statistics() {
            Ok(stats) => stats,
            Err(err) => {
                return ComponentHealth::new("distributed", HealthStatus::Unhealthy)
                    .with_detail("error", err.to_string())
            }
        };

        let status = if !self.is_initialized() || stats.healthy_nodes == 0 {
            HealthStatus::Unhealthy
        } else if stats.healthy_nodes < stats.total_nodes {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        ComponentHealth::new("distributed", status)
            .with_detail("total_nodes", stats.total_nodes)
            .with_detail("healthy_nodes", stats.healthy_nodes)
            .with_detail("distribution_efficiency", stats.distribution_efficiency)
            .with_detail("total_capacity", stats.total_capacity)
            .with_detail("current_load", stats.current_load)
    }
}

/// Coordinator-side sort, slice and aggregation over merged rows
fn coordinate(mut rows: Vec<Value>, query: &Query) -> Vec<Value> {
    if let Some(sort) = &query.sort {
        ResultSorter::sort(&mut rows, sort);
    }
    if let Some(offset) = query.offset {
        rows = rows.into_iter().skip(offset).collect();
    }
    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }
    if !query.aggregations.is_empty() {
        rows = vec![Aggregator::summarize(&rows, &query.aggregations)];
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use super::super::planner::{FragmentResult, QueryFragment};

    /// Returns `count` rows after reporting `time_ms`, or fails for one node
    struct FixedClient {
        answers: HashMap<String, (usize, u64)>,
        failing: Option<String>,
        cancel_failing: Option<String>,
    }

    impl FixedClient {
        fn new(answers: &[(&str, usize, u64)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|(id, n, t)| (id.to_string(), (*n, *t)))
                    .collect(),
                failing: None,
                cancel_failing: None,
            }
        }
    }

    #[async_trait]
    impl NodeClient for FixedClient {
        async fn connect(&self, _node: &NodeConfig) -> DistributedResult<()> {
            Ok(())
        }

        async fn execute_fragment(
            &self,
            node_id: &str,
            _fragment: &QueryFragment,
        ) -> DistributedResult<FragmentResult> {
            if self.failing.as_deref() == Some(node_id) {
                return Err(DistributedError::Internal("worker crashed".into()));
            }
            let (count, time) = self.answers.get(node_id).copied().unwrap_or((0, 0));
            let rows = (0..count).map(|i| json!({"node": node_id, "i": i})).collect();
            Ok(FragmentResult::new(node_id, rows, time))
        }

        async fn cancel(&self, node_id: &str, _query_id: &str) -> DistributedResult<()> {
            if self.cancel_failing.as_deref() == Some(node_id) {
                return Err(DistributedError::NodeUnavailable(node_id.to_string()));
            }
            Ok(())
        }

        async fn load_partition(
            &self,
            _node_id: &str,
            _dataset: &str,
            _records: Vec<Value>,
        ) -> DistributedResult<()> {
            Ok(())
        }
    }

    fn three_nodes() -> DistributedConfig {
        DistributedConfig {
            nodes: vec![
                NodeConfig::new("node-1", "10.0.0.1", 7001),
                NodeConfig::new("node-2", "10.0.0.2", 7001),
                NodeConfig::new("node-3", "10.0.0.3", 7001),
            ],
            simulated_latency_ms: 1,
        }
    }

    async fn fixed_processor(client: FixedClient) -> DistributedQueryProcessor {
        let processor = DistributedQueryProcessor::with_client(three_nodes(), Arc::new(client));
        processor.initialize().await.unwrap();
        processor
    }

    // =========================================================================
    // Execution and aggregation
    // =========================================================================

    #[tokio::test]
    async fn test_partial_results_are_merged() {
        let processor = fixed_processor(FixedClient::new(&[
            ("node-1", 10, 50),
            ("node-2", 20, 120),
            ("node-3", 5, 30),
        ]))
        .await;

        let output = processor
            .execute_query(&Query::scan("events"))
            .await
            .unwrap();

        assert_eq!(output.rows.len(), 35);
        assert_eq!(output.execution_time_ms, 120);
        assert_eq!(output.nodes_queried, Some(3));
        let counts = output.node_record_counts.unwrap();
        assert_eq!(counts["node-2"], 20);
        assert_eq!(processor.statistics().unwrap().fragments_executed, 3);
    }

    #[tokio::test]
    async fn test_aggregations_collapse_at_coordinator() {
        let processor = fixed_processor(FixedClient::new(&[
            ("node-1", 10, 5),
            ("node-2", 20, 5),
            ("node-3", 5, 5),
        ]))
        .await;

        let output = processor
            .execute_query(&Query::new("SELECT COUNT(*) FROM events"))
            .await
            .unwrap();

        assert_eq!(output.rows, vec![json!({"count": 35})]);
        assert_eq!(output.node_record_counts.unwrap().values().sum::<usize>(), 35);
    }

    #[tokio::test]
    async fn test_fragment_failure_fails_query() {
        let mut client = FixedClient::new(&[("node-1", 10, 5), ("node-2", 20, 5), ("node-3", 5, 5)]);
        client.failing = Some("node-2".into());
        let processor = fixed_processor(client).await;

        let err = processor
            .execute_query(&Query::scan("events"))
            .await
            .unwrap_err();

        assert!(matches!(err, DistributedError::FragmentFailed { ref node_id, .. } if node_id == "node-2"));
        assert_eq!(processor.statistics().unwrap().queries_failed, 1);
    }

    #[tokio::test]
    async fn test_undistributed_dataset_is_not_found() {
        let processor = DistributedQueryProcessor::new(three_nodes());
        processor.initialize().await.unwrap();
        processor
            .distribute_dataset("orders", vec![json!({"id": 1})])
            .await
            .unwrap();

        let err = processor
            .execute_query(&Query::scan("ghosts"))
            .await
            .unwrap_err();
        assert_eq!(err, DistributedError::DatasetNotFound("ghosts".into()));

        let err = processor
            .execute_query(&Query::new("SELECT 1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DISTRIBUTED_INVALID_QUERY");
        assert_eq!(processor.statistics().unwrap().queries_failed, 2);
    }

    #[tokio::test]
    async fn test_execute_requires_initialize() {
        let processor = DistributedQueryProcessor::new(three_nodes());
        let err = processor
            .execute_query(&Query::scan("events"))
            .await
            .unwrap_err();
        assert_eq!(err, DistributedError::NotInitialized);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let processor = DistributedQueryProcessor::new(three_nodes());
        processor.initialize().await.unwrap();
        processor.initialize().await.unwrap();

        assert_eq!(processor.statistics().unwrap().total_nodes, 3);
    }

    #[tokio::test]
    async fn test_initialize_fails_on_bad_node() {
        let mut config = three_nodes();
        config.nodes.push(NodeConfig::new("node-4", "10.0.0.4", 0));
        let processor = DistributedQueryProcessor::new(config);

        let err = processor.initialize().await.unwrap_err();

        assert_eq!(err, DistributedError::NodeUnavailable("node-4".into()));
        assert!(!processor.is_initialized());
    }

    // =========================================================================
    // Simulated end to end
    // =========================================================================

    #[tokio::test]
    async fn test_distribute_and_query() {
        let processor = DistributedQueryProcessor::new(three_nodes());
        processor.initialize().await.unwrap();
        let records: Vec<Value> = (0..10)
            .map(|i| json!({"id": i, "status": if i % 2 == 0 { "pending" } else { "shipped" }}))
            .collect();

        let placed = processor.distribute_dataset("orders", records).await.unwrap();
        assert_eq!(placed.values().sum::<usize>(), 10);
        assert_eq!(placed["node-1"], 4);

        let output = processor
            .execute_query(&Query::new(
                "SELECT * FROM orders WHERE status = 'pending' ORDER BY id DESC LIMIT 3",
            ))
            .await
            .unwrap();

        let ids: Vec<i64> = output.rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![8, 6, 4]);
    }

    // =========================================================================
    // Cancellation, shutdown, health
    // =========================================================================

    #[tokio::test]
    async fn test_cancel_broadcast_counts_failures() {
        let mut client = FixedClient::new(&[]);
        client.cancel_failing = Some("node-3".into());
        let processor = fixed_processor(client).await;

        let report = processor.cancel_query("q-unknown").await.unwrap();

        assert!(!report.was_in_flight);
        assert_eq!(report.signalled, 2);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_cancel_in_flight_query() {
        let processor = Arc::new(DistributedQueryProcessor::with_client(
            three_nodes(),
            Arc::new(SimulatedNodeClient::new(Duration::from_millis(200))),
        ));
        processor.initialize().await.unwrap();
        let query = Query::scan("events").with_id("q-slow");

        let runner = Arc::clone(&processor);
        let handle = tokio::spawn(async move { runner.execute_query(&query).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let report = processor.cancel_query("q-slow").await.unwrap();
        assert!(report.was_in_flight);

        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err, DistributedError::Cancelled("q-slow".into()));
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_nodes() {
        let processor = DistributedQueryProcessor::new(three_nodes());
        processor.initialize().await.unwrap();
        assert_eq!(processor.health().status, HealthStatus::Healthy);

        processor.shutdown().await;

        let stats = processor.statistics().unwrap();
        assert_eq!(stats.healthy_nodes, 0);
        assert_eq!(stats.distribution_efficiency, 0.0);
        assert_eq!(processor.health().status, HealthStatus::Unhealthy);
        assert!(matches!(
            processor.execute_query(&Query::scan("events")).await,
            Err(DistributedError::NodeUnavailable(_))
        ));
    }
}
