//! # Query Errors

use thiserror::Error;

/// Result type for query parsing
pub type QueryResult<T> = Result<T, QueryError>;

/// Query model errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("Query text is empty")]
    EmptyQuery,

    #[error("No target dataset in query: {0}")]
    MissingDataset(String),

    #[error("Unsupported condition: {0}")]
    UnsupportedCondition(String),

    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),
}

impl QueryError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::EmptyQuery => "QUERY_EMPTY",
            QueryError::MissingDataset(_) => "QUERY_MISSING_DATASET",
            QueryError::UnsupportedCondition(_) => "QUERY_UNSUPPORTED_CONDITION",
            QueryError::InvalidLiteral(_) => "QUERY_INVALID_LITERAL",
        }
    }
}
