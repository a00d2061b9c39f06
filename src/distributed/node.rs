//! Worker nodes

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Static node definition from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    pub host: String,
    pub port: u16,
    /// Concurrent fragments the node is sized for
    #[serde(default = "default_capacity")]
    pub capacity: u32,
}

fn default_capacity() -> u32 {
    100
}

impl NodeConfig {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            capacity: default_capacity(),
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Disconnected,
}

/// A registered node; clones share the load counter
#[derive(Debug, Clone)]
pub struct Node {
    config: NodeConfig,
    status: NodeStatus,
    load: Arc<AtomicU32>,
}

impl Node {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            status: NodeStatus::Active,
            load: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }

    pub fn disconnect(&mut self) {
        self.status = NodeStatus::Disconnected;
    }

    pub fn current_load(&self) -> u32 {
        self.load.load(Ordering::SeqCst)
    }

    /// Counts one running fragment until the guard drops
    pub fn begin_fragment(&self) -> LoadGuard {
        self.load.fetch_add(1, Ordering::SeqCst);
        LoadGuard {
            load: Arc::clone(&self.load),
        }
    }

    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            id: self.config.id.clone(),
            host: self.config.host.clone(),
            port: self.config.port,
            status: self.status,
            capacity: self.config.capacity,
            current_load: self.current_load(),
        }
    }
}

/// Decrements node load on drop
#[derive(Debug)]
pub struct LoadGuard {
    load: Arc<AtomicU32>,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.load.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Point-in-time node view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub status: NodeStatus,
    pub capacity: u32,
    pub current_load: u32,
}
