//! # Distributed Tier
//!
//! Fans a query out as one fragment per active worker node, joins the
//! partial results and finishes sort, slicing and aggregation at the
//! coordinator. Execution is all-or-nothing: one failed fragment fails
//! the query.

mod client;
mod errors;
mod node;
mod planner;
mod processor;
mod simulated;

pub use client::NodeClient;
pub use errors::{DistributedError, DistributedResult};
pub use node::{LoadGuard, Node, NodeConfig, NodeInfo, NodeStatus};
pub use planner::{FragmentPlanner, FragmentResult, QueryFragment};
pub use processor::{
    CancelReport, DistributedConfig, DistributedQueryProcessor, DistributedStatistics,
};
pub use simulated::SimulatedNodeClient;
