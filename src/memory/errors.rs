//! # Memory Engine Errors

use thiserror::Error;

/// Result type for memory tier operations
pub type MemoryResult<T> = Result<T, MemoryEngineError>;

/// In-memory tier errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MemoryEngineError {
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Insufficient memory: dataset needs {requested} bytes, {available} available")]
    InsufficientMemory { requested: u64, available: u64 },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Memory engine is shut down")]
    ShutDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MemoryEngineError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            MemoryEngineError::DatasetNotFound(_) => "MEMORY_DATASET_NOT_FOUND",
            MemoryEngineError::InsufficientMemory { .. } => "MEMORY_INSUFFICIENT",
            MemoryEngineError::InvalidQuery(_) => "MEMORY_INVALID_QUERY",
            MemoryEngineError::ShutDown => "MEMORY_SHUT_DOWN",
            MemoryEngineError::Internal(_) => "MEMORY_INTERNAL",
        }
    }

    pub(crate) fn poisoned() -> Self {
        MemoryEngineError::Internal("Lock poisoned".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            MemoryEngineError::DatasetNotFound("orders".into()).code(),
            "MEMORY_DATASET_NOT_FOUND"
        );
        assert_eq!(
            MemoryEngineError::InsufficientMemory {
                requested: 10,
                available: 5
            }
            .code(),
            "MEMORY_INSUFFICIENT"
        );
    }

    #[test]
    fn test_insufficient_memory_display() {
        let err = MemoryEngineError::InsufficientMemory {
            requested: 2048,
            available: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient memory: dataset needs 2048 bytes, 1024 available"
        );
    }
}
