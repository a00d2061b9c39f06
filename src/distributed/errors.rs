//! # Distributed Processing Errors

use thiserror::Error;

/// Result type for distributed operations
pub type DistributedResult<T> = Result<T, DistributedError>;

/// Distributed tier errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributedError {
    #[error("Distributed processor not initialized")]
    NotInitialized,

    #[error("Node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("Dataset not distributed: {0}")]
    DatasetNotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Fragment failed on node {node_id}: {reason}")]
    FragmentFailed { node_id: String, reason: String },

    #[error("Query cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DistributedError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            DistributedError::NotInitialized => "DISTRIBUTED_NOT_INITIALIZED",
            DistributedError::NodeUnavailable(_) => "DISTRIBUTED_NODE_UNAVAILABLE",
            DistributedError::DatasetNotFound(_) => "DISTRIBUTED_DATASET_NOT_FOUND",
            DistributedError::InvalidQuery(_) => "DISTRIBUTED_INVALID_QUERY",
            DistributedError::FragmentFailed { .. } => "DISTRIBUTED_FRAGMENT_FAILED",
            DistributedError::Cancelled(_) => "DISTRIBUTED_CANCELLED",
            DistributedError::Internal(_) => "DISTRIBUTED_INTERNAL",
        }
    }

    pub(crate) fn poisoned() -> Self {
        DistributedError::Internal("Lock poisoned".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(DistributedError::NotInitialized.code(), "DISTRIBUTED_NOT_INITIALIZED");
        assert_eq!(
            DistributedError::FragmentFailed {
                node_id: "node-2".into(),
                reason: "timeout".into()
            }
            .code(),
            "DISTRIBUTED_FRAGMENT_FAILED"
        );
    }

    #[test]
    fn test_fragment_failed_names_node() {
        let err = DistributedError::FragmentFailed {
            node_id: "node-2".into(),
            reason: "connection reset".into(),
        };
        assert_eq!(err.to_string(), "Fragment failed on node node-2: connection reset");
    }
}
