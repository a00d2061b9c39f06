//! Execution tiers and query plans

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::query::Query;

/// Where a query runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Memory,
    Distributed,
    Hybrid,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Memory => "memory",
            Tier::Distributed => "distributed",
            Tier::Hybrid => "hybrid",
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Hybrid
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Tier::Memory),
            "distributed" => Ok(Tier::Distributed),
            "hybrid" => Ok(Tier::Hybrid),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

/// Plan for one query execution
///
/// Registered as active for the duration of execution, keyed by query id.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub id: String,
    /// The optimized query
    pub query: Query,
    pub tenant_id: String,
    pub tier: Tier,
    /// Indexes the plan expects to use
    pub index_ids: Vec<String>,
    pub parallelism: usize,
    pub estimated_cost: f64,
    pub estimated_time_ms: u64,
    pub created_at: DateTime<Utc>,
    pub hints: Vec<String>,
}

impl QueryPlan {
    pub fn query_id(&self) -> &str {
        &self.query.id
    }
}
