//! In-process node simulation
//!
//! Each node holds its dataset partitions in memory and evaluates fragment
//! filters with the memory tier's predicate filter after a fixed latency.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::client::NodeClient;
use super::errors::{DistributedError, DistributedResult};
use super::node::NodeConfig;
use super::planner::{FragmentResult, QueryFragment};
use crate::memory::PredicateFilter;
use crate::observability::Timer;

/// node id -> dataset -> partition records
type Partitions = HashMap<String, HashMap<String, Vec<Value>>>;

#[derive(Debug, Default)]
pub struct SimulatedNodeClient {
    latency: Duration,
    connected: RwLock<HashSet<String>>,
    partitions: RwLock<Partitions>,
}

impl SimulatedNodeClient {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    fn ensure_connected(&self, node_id: &str) -> DistributedResult<()> {
        let connected = self
            .connected
            .read()
            .map_err(|_| DistributedError::poisoned())?;
        if !connected.contains(node_id) {
            return Err(DistributedError::NodeUnavailable(node_id.to_string()));
        }
        Ok(())
    }

    /// Records held by a node for a dataset
    pub fn partition_len(&self, node_id: &str, dataset: &str) -> usize {
        self.partitions
            .read()
            .ok()
            .and_then(|p| p.get(node_id).and_then(|d| d.get(dataset)).map(Vec::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl NodeClient for SimulatedNodeClient {
    async fn connect(&self, node: &NodeConfig) -> DistributedResult<()> {
        if node.host.trim().is_empty() || node.port == 0 {
            return Err(DistributedError::NodeUnavailable(node.id.clone()));
        }
        let mut connected = self
            .connected
            .write()
            .map_err(|_| DistributedError::poisoned())?;
        connected.insert(node.id.clone());
        Ok(())
    }

    async fn execute_fragment(
        &self,
        node_id: &str,
        fragment: &QueryFragment,
    ) -> DistributedResult<FragmentResult> {
        self.ensure_connected(node_id)?;
        let timer = Timer::new();
        tokio::time::sleep(self.latency).await;

        let dataset = fragment
            .dataset
            .as_deref()
            .ok_or_else(|| DistributedError::InvalidQuery("no target dataset".to_string()))?;
        let rows: Vec<Value> = {
            let partitions = self
                .partitions
                .read()
                .map_err(|_| DistributedError::poisoned())?;
            let records = partitions
                .get(node_id)
                .and_then(|d| d.get(dataset))
                .ok_or_else(|| DistributedError::DatasetNotFound(dataset.to_string()))?;
            records
                .iter()
                .filter(|r| PredicateFilter::matches(r, &fragment.filters))
                .cloned()
                .collect()
        };

        Ok(FragmentResult::new(node_id, rows, timer.elapsed_ms()))
    }

    async fn cancel(&self, node_id: &str, _query_id: &str) -> DistributedResult<()> {
        self.ensure_connected(node_id)
    }

    async fn load_partition(
        &self,
        node_id: &str,
        dataset: &str,
        records: Vec<Value>,
    ) -> DistributedResult<()> {
        self.ensure_connected(node_id)?;
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| DistributedError::poisoned())?;
        partitions
            .entry(node_id.to_string())
            .or_default()
            .insert(dataset.to_string(), records);
        Ok(())
    }
}
