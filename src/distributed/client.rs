//! Node transport
//!
//! The processor talks to workers only through `NodeClient`. The default
//! implementation is `SimulatedNodeClient`; a networked client can be
//! injected without touching the processor.

use async_trait::async_trait;
use serde_json::Value;

use super::errors::DistributedResult;
use super::node::NodeConfig;
use super::planner::{FragmentResult, QueryFragment};

#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Establish a connection to a node
    async fn connect(&self, node: &NodeConfig) -> DistributedResult<()>;

    /// Run one fragment on a node
    async fn execute_fragment(
        &self,
        node_id: &str,
        fragment: &QueryFragment,
    ) -> DistributedResult<FragmentResult>;

    /// Ask a node to abandon a query
    async fn cancel(&self, node_id: &str, query_id: &str) -> DistributedResult<()>;

    /// Store a dataset partition on a node, replacing any previous one
    async fn load_partition(
        &self,
        node_id: &str,
        dataset: &str,
        records: Vec<Value>,
    ) -> DistributedResult<()>;
}
