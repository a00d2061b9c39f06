//! # Engine Errors
//!
//! Every engine operation returns `EngineResult<T>`. Errors carry a stable
//! code, a coarse `ErrorCategory` and the `Stage` in which they occurred.
//! Tier failures keep their source error.

use std::fmt;

use thiserror::Error;

use super::plan::Tier;
use crate::distributed::DistributedError;
use crate::index::IndexError;
use crate::memory::MemoryEngineError;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Coarse error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    ResourceExhausted,
    TierExecution,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::ResourceExhausted => "resource_exhausted",
            ErrorCategory::TierExecution => "tier_execution",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stage of an engine operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    TenantValidation,
    QueryValidation,
    Optimization,
    Planning,
    Execution,
    Maintenance,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Configuration => "configuration",
            Stage::TenantValidation => "tenant_validation",
            Stage::QueryValidation => "query_validation",
            Stage::Optimization => "optimization",
            Stage::Planning => "planning",
            Stage::Execution => "execution",
            Stage::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure reported by a tier
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TierFailure {
    #[error(transparent)]
    Memory(#[from] MemoryEngineError),

    #[error(transparent)]
    Distributed(#[from] DistributedError),
}

impl TierFailure {
    pub fn code(&self) -> &'static str {
        match self {
            TierFailure::Memory(e) => e.code(),
            TierFailure::Distributed(e) => e.code(),
        }
    }
}

/// Analytics engine errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Invalid tenant id: {0:?}")]
    InvalidTenant(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Materialized view not found: {0}")]
    ViewNotFound(String),

    #[error("Insufficient memory: {requested} bytes requested, {available} available")]
    InsufficientMemory { requested: u64, available: u64 },

    #[error("Duplicate index: {0}")]
    DuplicateIndex(String),

    #[error("Optimization failed: {0}")]
    Optimization(String),

    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("{tier} tier failed: {source}")]
    TierExecution {
        tier: Tier,
        #[source]
        source: TierFailure,
    },

    #[error("Query {query_id} timed out after {timeout_ms}ms")]
    Timeout { query_id: String, timeout_ms: u64 },

    #[error("Query cancelled: {0}")]
    Cancelled(String),

    #[error("Index operation failed: {0}")]
    Index(IndexError),

    #[error("Maintenance failed: {0}")]
    Maintenance(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidTenant(_) => "ENGINE_INVALID_TENANT",
            EngineError::InvalidQuery(_) => "ENGINE_INVALID_QUERY",
            EngineError::InvalidConfig(_) => "ENGINE_INVALID_CONFIG",
            EngineError::DatasetNotFound(_) => "ENGINE_DATASET_NOT_FOUND",
            EngineError::IndexNotFound(_) => "ENGINE_INDEX_NOT_FOUND",
            EngineError::ViewNotFound(_) => "ENGINE_VIEW_NOT_FOUND",
            EngineError::InsufficientMemory { .. } => "ENGINE_INSUFFICIENT_MEMORY",
            EngineError::DuplicateIndex(_) => "ENGINE_DUPLICATE_INDEX",
            EngineError::Optimization(_) => "ENGINE_OPTIMIZATION_FAILED",
            EngineError::Planning(_) => "ENGINE_PLANNING_FAILED",
            EngineError::TierExecution { .. } => "ENGINE_TIER_EXECUTION",
            EngineError::Timeout { .. } => "ENGINE_TIMEOUT",
            EngineError::Cancelled(_) => "ENGINE_CANCELLED",
            EngineError::Index(_) => "ENGINE_INDEX_FAILED",
            EngineError::Maintenance(_) => "ENGINE_MAINTENANCE_FAILED",
            EngineError::Internal(_) => "ENGINE_INTERNAL",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::InvalidTenant(_)
            | EngineError::InvalidQuery(_)
            | EngineError::InvalidConfig(_) => ErrorCategory::Validation,
            EngineError::DatasetNotFound(_)
            | EngineError::IndexNotFound(_)
            | EngineError::ViewNotFound(_) => ErrorCategory::NotFound,
            EngineError::InsufficientMemory { .. } | EngineError::DuplicateIndex(_) => {
                ErrorCategory::ResourceExhausted
            }
            EngineError::TierExecution { .. }
            | EngineError::Timeout { .. }
            | EngineError::Cancelled(_) => ErrorCategory::TierExecution,
            EngineError::Optimization(_)
            | EngineError::Planning(_)
            | EngineError::Index(_)
            | EngineError::Maintenance(_)
            | EngineError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Stage the error is raised in
    pub fn stage(&self) -> Stage {
        match self {
            EngineError::InvalidTenant(_) => Stage::TenantValidation,
            EngineError::InvalidQuery(_) => Stage::QueryValidation,
            EngineError::InvalidConfig(_) => Stage::Configuration,
            EngineError::Optimization(_) => Stage::Optimization,
            EngineError::Planning(_) => Stage::Planning,
            EngineError::IndexNotFound(_)
            | EngineError::ViewNotFound(_)
            | EngineError::DuplicateIndex(_)
            | EngineError::Index(_)
            | EngineError::Maintenance(_) => Stage::Maintenance,
            EngineError::DatasetNotFound(_)
            | EngineError::InsufficientMemory { .. }
            | EngineError::TierExecution { .. }
            | EngineError::Timeout { .. }
            | EngineError::Cancelled(_)
            | EngineError::Internal(_) => Stage::Execution,
        }
    }

    /// Tier that failed, if any
    pub fn tier(&self) -> Option<Tier> {
        match self {
            EngineError::TierExecution { tier, .. } => Some(*tier),
            _ => None,
        }
    }

    pub(crate) fn poisoned() -> Self {
        EngineError::Internal("Lock poisoned".to_string())
    }

    pub(crate) fn memory(source: MemoryEngineError) -> Self {
        match source {
            MemoryEngineError::DatasetNotFound(name) => EngineError::DatasetNotFound(name),
            MemoryEngineError::InsufficientMemory {
                requested,
                available,
            } => EngineError::InsufficientMemory {
                requested,
                available,
            },
            other => EngineError::TierExecution {
                tier: Tier::Memory,
                source: other.into(),
            },
        }
    }

    pub(crate) fn distributed(source: DistributedError) -> Self {
        match source {
            DistributedError::Cancelled(query_id) => EngineError::Cancelled(query_id),
            DistributedError::DatasetNotFound(name) => EngineError::DatasetNotFound(name),
            DistributedError::InvalidQuery(reason) => EngineError::InvalidQuery(reason),
            other => EngineError::TierExecution {
                tier: Tier::Distributed,
                source: other.into(),
            },
        }
    }
}

impl From<IndexError> for EngineError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::IndexNotFound(id) => EngineError::IndexNotFound(id),
            IndexError::DuplicateIndex { table, columns } => {
                EngineError::DuplicateIndex(format!("{}({})", table, columns))
            }
            other => EngineError::Index(other),
        }
    }
}

impl From<MemoryEngineError> for EngineError {
    fn from(e: MemoryEngineError) -> Self {
        EngineError::memory(e)
    }
}

impl From<DistributedError> for EngineError {
    fn from(e: DistributedError) -> Self {
        EngineError::distributed(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_categories() {
        assert_eq!(
            EngineError::InvalidTenant(" ".into()).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            EngineError::from(MemoryEngineError::DatasetNotFound("orders".into())).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            EngineError::from(MemoryEngineError::InsufficientMemory {
                requested: 10,
                available: 1
            })
            .category(),
            ErrorCategory::ResourceExhausted
        );
        assert_eq!(
            EngineError::from(IndexError::duplicate("orders", &["status".to_string()])).category(),
            ErrorCategory::ResourceExhausted
        );
    }

    #[test]
    fn test_tier_failure_keeps_source() {
        let err = EngineError::from(DistributedError::FragmentFailed {
            node_id: "node-2".into(),
            reason: "timeout".into(),
        });

        assert_eq!(err.category(), ErrorCategory::TierExecution);
        assert_eq!(err.tier(), Some(Tier::Distributed));
        assert_eq!(err.stage(), Stage::Execution);
        let source = err.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(source.contains("node-2"));
    }

    #[test]
    fn test_distributed_missing_dataset_is_not_found() {
        let err = EngineError::from(DistributedError::DatasetNotFound("ghosts".into()));
        assert_eq!(err, EngineError::DatasetNotFound("ghosts".into()));
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_distributed_cancel_maps_to_cancelled() {
        let err = EngineError::from(DistributedError::Cancelled("q-1".into()));
        assert_eq!(err, EngineError::Cancelled("q-1".into()));
    }

    #[test]
    fn test_stages() {
        assert_eq!(
            EngineError::InvalidTenant(String::new()).stage(),
            Stage::TenantValidation
        );
        assert_eq!(
            EngineError::InvalidQuery("empty".into()).stage(),
            Stage::QueryValidation
        );
        assert_eq!(EngineError::Optimization("x".into()).stage(), Stage::Optimization);
        assert_eq!(EngineError::ViewNotFound("v".into()).code(), "ENGINE_VIEW_NOT_FOUND");
    }
}
