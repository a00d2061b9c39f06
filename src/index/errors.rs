//! # Index Errors
//!
//! Error codes:
//! - INDEX_INVALID_DEFINITION
//! - INDEX_DUPLICATE
//! - INDEX_NOT_FOUND
//! - INDEX_BUILD_FAILED
//! - INDEX_SHUT_DOWN
//! - INDEX_INTERNAL

use thiserror::Error;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Index manager errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    #[error("Invalid index definition: {0}")]
    InvalidDefinition(String),

    #[error("Index already exists on {table}({columns})")]
    DuplicateIndex { table: String, columns: String },

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index build failed for {id}: {reason}")]
    BuildFailed { id: String, reason: String },

    #[error("Index manager is shut down")]
    ShutDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IndexError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            IndexError::InvalidDefinition(_) => "INDEX_INVALID_DEFINITION",
            IndexError::DuplicateIndex { .. } => "INDEX_DUPLICATE",
            IndexError::IndexNotFound(_) => "INDEX_NOT_FOUND",
            IndexError::BuildFailed { .. } => "INDEX_BUILD_FAILED",
            IndexError::ShutDown => "INDEX_SHUT_DOWN",
            IndexError::Internal(_) => "INDEX_INTERNAL",
        }
    }

    pub(crate) fn duplicate(table: &str, columns: &[String]) -> Self {
        IndexError::DuplicateIndex {
            table: table.to_string(),
            columns: columns.join(", "),
        }
    }

    pub(crate) fn poisoned() -> Self {
        IndexError::Internal("Lock poisoned".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(IndexError::IndexNotFound("idx".into()).code(), "INDEX_NOT_FOUND");
        assert_eq!(IndexError::ShutDown.code(), "INDEX_SHUT_DOWN");
        assert_eq!(
            IndexError::duplicate("orders", &["status".to_string()]).code(),
            "INDEX_DUPLICATE"
        );
    }

    #[test]
    fn test_duplicate_display() {
        let err = IndexError::duplicate("orders", &["userId".to_string(), "status".to_string()]);
        assert_eq!(err.to_string(), "Index already exists on orders(userId, status)");
    }
}
