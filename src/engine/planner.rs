//! Tier selection and plan generation
//!
//! # Tier selection
//!
//! Fixed modes return their tier. Hybrid mode runs in memory iff
//! `cost < memory_threshold` and `complexity < complexity_threshold`,
//! otherwise on the distributed tier. Selection is deterministic for a
//! given query text and descriptors.
//!
//! # Estimates
//!
//! ```text
//! estimated_cost    = shape.cost() × cheapest cost factor of usable indexes
//! estimated_time_ms = ceil(base_ms(tier) × estimated_cost / parallelism)
//! ```

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::config::{EngineConfig, HybridConfig};
use super::errors::{EngineError, EngineResult};
use super::parallelism::ParallelProcessor;
use super::plan::{QueryPlan, Tier};
use crate::index::{IndexInfo, IndexManager};
use crate::query::{Query, QueryShape};

pub struct TierSelector;

impl TierSelector {
    pub fn select(mode: Tier, hybrid: &HybridConfig, query: &Query) -> Tier {
        match mode {
            Tier::Memory | Tier::Distributed => mode,
            Tier::Hybrid => {
                let shape = QueryShape::analyze(query);
                if shape.cost() < hybrid.memory_threshold
                    && shape.complexity() < hybrid.complexity_threshold
                {
                    Tier::Memory
                } else {
                    Tier::Distributed
                }
            }
        }
    }
}

/// Base per-unit time estimate for each tier
fn base_ms(tier: Tier) -> f64 {
    match tier {
        Tier::Memory => 5.0,
        Tier::Hybrid => 20.0,
        Tier::Distributed => 50.0,
    }
}

/// Builds execution plans
pub struct QueryPlanner {
    indexes: Arc<IndexManager>,
    parallelism: Arc<dyn ParallelProcessor>,
}

impl QueryPlanner {
    pub fn new(indexes: Arc<IndexManager>, parallelism: Arc<dyn ParallelProcessor>) -> Self {
        Self {
            indexes,
            parallelism,
        }
    }

    /// Tier for a query: the preferred tier if given, else the configured selection
    pub fn select_tier(&self, config: &EngineConfig, query: &Query, preferred: Option<Tier>) -> Tier {
        preferred.unwrap_or_else(|| TierSelector::select(config.mode, &config.hybrid, query))
    }

    pub fn plan(&self, query: Query, tenant_id: &str, tier: Tier) -> EngineResult<QueryPlan> {
        let shape = QueryShape::analyze(&query);
        let usable = self.usable_indexes(&query)?;

        let cost_factor = usable
            .iter()
            .map(|i| i.strategy.cost_factor())
            .fold(1.0_f64, f64::min);
        let estimated_cost = shape.cost() * cost_factor;

        let parallelism = match tier {
            Tier::Memory => 1,
            Tier::Distributed | Tier::Hybrid => {
                self.parallelism.calculate_optimal_parallelism().max(1)
            }
        };
        let estimated_time_ms =
            (base_ms(tier) * estimated_cost / parallelism as f64).ceil() as u64;

        let mut hints = Vec::new();
        if usable.is_empty() {
            if !query.filters.is_empty() {
                hints.push("full_scan".to_string());
            }
        } else {
            hints.extend(usable.iter().map(|i| format!("use_index:{}", i.name)));
        }
        if shape.aggregations > 0 {
            hints.push("aggregate".to_string());
        }
        if parallelism > 1 {
            hints.push(format!("parallel:{}", parallelism));
        }

        Ok(QueryPlan {
            id: Uuid::new_v4().to_string(),
            index_ids: usable.into_iter().map(|i| i.id).collect(),
            query,
            tenant_id: tenant_id.to_string(),
            tier,
            parallelism,
            estimated_cost,
            estimated_time_ms,
            created_at: Utc::now(),
            hints,
        })
    }

    /// Optimal indexes on the target table whose leading column is filtered on
    fn usable_indexes(&self, query: &Query) -> EngineResult<Vec<IndexInfo>> {
        let table = match query.dataset_name() {
            Some(table) => table,
            None => return Ok(Vec::new()),
        };
        let columns = query.filter_columns();
        let optimal = self
            .indexes
            .get_optimal_indexes(&table)
            .map_err(|e| EngineError::Planning(e.to_string()))?;

        Ok(optimal
            .into_iter()
            .filter(|i| {
                i.leading_column()
                    .map_or(false, |c| columns.iter().any(|f| f == c))
            })
            .collect())
    }
}
