//! Index Manager subsystem
//!
//! Index metadata, usage statistics and advisory recommendations. Indexes
//! here are planning metadata: the manager decides which indexes a plan may
//! use and which ones should be created, rebuilt or dropped.
//!
//! # Invariants
//!
//! - At most one index per table and ordered column list
//! - `Building -> Active`, `Active -> Building -> Active` on rebuild
//! - `* -> Corrupted` only through `mark_corrupted`
//! - A failed build leaves no entry behind
//! - Recommendations are advisory; nothing is dropped automatically

mod builder;
mod errors;
mod manager;
mod repository;
mod types;

pub use builder::{BuildOutcome, IndexBuilder, SimulatedIndexBuilder};
pub use errors::{IndexError, IndexResult};
pub use manager::{IndexManager, IndexManagerConfig};
pub use repository::{InMemoryIndexRepository, IndexRepository};
pub use types::{
    IndexConfig, IndexInfo, IndexRecommendation, IndexStatistics, IndexStatus, IndexStrategy,
    IndexUsageStats, OptimizationReport, RecommendationAction, RecommendationSeverity,
};
