//! aero-analytics - a tiered analytics query engine
//!
//! Queries are routed to an in-memory tier, a distributed tier of worker
//! nodes, or a hybrid of both. See [`engine::AnalyticsStorageEngine`].

pub mod cli;
pub mod distributed;
pub mod engine;
pub mod index;
pub mod memory;
pub mod observability;
pub mod query;
