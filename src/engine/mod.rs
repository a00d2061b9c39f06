//! Analytics storage engine
//!
//! Routes analytical queries to the memory tier, the distributed tier, or
//! both (hybrid), and owns the cross-cutting state around them:
//!
//! - result cache keyed by normalized SQL, tenant and parameters
//! - planning with index selection and parallelism
//! - active query registry and cancellation
//! - bounded query history
//! - materialized views, storage tiering policies and optimization
//! - background maintenance loops
//!
//! # Usage
//!
//! ```ignore
//! use aero_analytics::engine::{EngineBuilder, EngineConfig, QueryOptions};
//! use aero_analytics::query::Query;
//!
//! let engine = EngineBuilder::new(EngineConfig::default()).build()?;
//! engine.start().await?;
//! engine.load_dataset("tenant-a", "orders", records)?;
//!
//! let result = engine
//!     .execute_query(Query::new("SELECT * FROM orders"), "tenant-a", QueryOptions::default())
//!     .await?;
//! engine.stop().await;
//! ```

mod background;
mod builder;
mod cache;
mod compaction;
mod config;
mod engine;
mod errors;
mod history;
mod optimizer;
mod parallelism;
mod plan;
mod planner;
mod result;
mod stats;
mod storage;
mod views;

pub use builder::EngineBuilder;
pub use cache::{cache_key, canonical_sql, CacheStats, ResultCache, TtlResultCache};
pub use compaction::{CompactionManager, CompactionReport, SimulatedCompaction};
pub use config::{CacheConfig, EngineConfig, HybridConfig, MaintenanceConfig, MonitoringConfig};
pub use engine::{AnalyticsStorageEngine, CancelOutcome, EngineEvent, QueryOptions};
pub use errors::{EngineError, EngineResult, ErrorCategory, Stage, TierFailure};
pub use history::{HistoryEntry, QueryHistory};
pub use optimizer::{QueryOptimizer, RuleBasedOptimizer, DEDUPE_PREDICATES, ORDER_PREDICATES};
pub use parallelism::{CpuParallelism, ParallelProcessor};
pub use plan::{QueryPlan, Tier};
pub use planner::{QueryPlanner, TierSelector};
pub use result::{QueryResult, ResultMetadata};
pub use stats::{HealthReport, QueryStatistics, StorageStatistics, ViewStatistics};
pub use storage::{StorageOptimization, StorageOptimizationReport, TieringPolicy};
pub use views::{InMemoryViewManager, MaterializedViewManager, ViewDefinition, ViewInfo};
