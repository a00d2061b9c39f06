//! In-memory analytics tier
//!
//! Named datasets of JSON records held in memory, with secondary hash
//! indexes on common identifier fields, filter/sort/slice/aggregate
//! execution, a per-query result cache, and a memory ceiling.
//!
//! # Invariants
//!
//! - Dataset load is atomic: registered with usage updated, or rejected
//!   with nothing registered
//! - Estimated usage never exceeds `max_memory_bytes`
//! - Under memory pressure the whole query cache is dropped

mod aggregate;
mod cache;
mod dataset;
mod engine;
mod errors;
mod filters;
mod sorter;

pub use aggregate::Aggregator;
pub use cache::QueryCache;
pub use dataset::{estimate_size, Dataset, INDEXED_FIELDS, SIZE_SAMPLE};
pub use engine::{InMemoryAnalyticsEngine, MemoryEngineConfig, MemoryStatistics};
pub use errors::{MemoryEngineError, MemoryResult};
pub use filters::{like_match, PredicateFilter};
pub use sorter::{compare_values, ResultSorter};
