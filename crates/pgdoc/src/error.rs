//! Error types for pgdoc

use std::time::Duration;
use thiserror::Error;

/// Result type alias for pgdoc operations
pub type DocResult<T> = Result<T, DocError>;

/// Error types for document store operations
#[derive(Debug, Error)]
pub enum DocError {
    /// An expression or builder call the translator cannot express in SQL
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A parameter helper received a different number of values than it declared
    #[error("Parameter count mismatch: expected {expected} values, got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    /// A join was built without any ON clause
    #[error("Invalid join: {0}")]
    InvalidJoin(String),

    /// A where-clause group was pushed but never popped (or popped too often)
    #[error("Unbalanced where-clause groups: {0}")]
    UnbalancedGroups(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A unique constraint declared on the document map was violated
    #[error("{message}")]
    UniqueConstraint { constraint: String, message: String },

    /// Deadlock detected by the database, with a dump of open transactions
    #[error("Deadlock in transaction '{transaction}' executing `{sql}`\nopen transactions:\n{open_transactions}")]
    Deadlock {
        sql: String,
        transaction: String,
        open_transactions: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// Database error with statement context
    #[error("Database error in transaction '{transaction}' executing `{sql}`: {source}")]
    Database {
        sql: String,
        transaction: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// Raw driver error without statement context
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Command timeout
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// A required document was not found
    #[error("Not found: {table} with id {id}")]
    NotFound { table: String, id: String },

    /// An operation the current builder shape cannot perform
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// An explicit id conflicts with the id already assigned to the document
    #[error("Document already has id {existing}, cannot assign id {requested}")]
    IdConflict { existing: i64, requested: i64 },

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DocError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error for a document id
    pub fn not_found(table: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            table: table.into(),
            id: id.to_string(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unsupported-expression error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Check if this is a unique constraint violation
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueConstraint { .. })
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Rebuild a stored builder error so it can be returned more than once.
    ///
    /// Builder-time errors are plain data and come back unchanged; anything
    /// carrying a driver error is flattened to its message.
    pub(crate) fn replay(&self) -> DocError {
        match self {
            Self::Unsupported(m) => Self::Unsupported(m.clone()),
            Self::ParameterCount { expected, actual } => Self::ParameterCount {
                expected: *expected,
                actual: *actual,
            },
            Self::InvalidJoin(m) => Self::InvalidJoin(m.clone()),
            Self::UnbalancedGroups(m) => Self::UnbalancedGroups(m.clone()),
            Self::Validation(m) => Self::Validation(m.clone()),
            Self::UnsupportedOperation(m) => Self::UnsupportedOperation(m.clone()),
            Self::Serialization(m) => Self::Serialization(m.clone()),
            other => Self::Other(other.to_string()),
        }
    }

    /// The SQLSTATE code of the underlying database error, if any.
    pub fn sql_state(&self) -> Option<&str> {
        self.db_source()
            .and_then(|e| e.as_db_error())
            .map(|db| db.code().code())
    }

    fn db_source(&self) -> Option<&tokio_postgres::Error> {
        match self {
            Self::Deadlock { source, .. } | Self::Database { source, .. } => Some(source),
            Self::Query(source) => Some(source),
            _ => None,
        }
    }

    /// Whether the failure is expected to clear on its own (deadlock, serialization
    /// failure, dropped connection, timeout).
    ///
    /// Translation, constraint and misuse errors are never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Deadlock { .. } | Self::Timeout(_) | Self::Connection(_) => true,
            #[cfg(feature = "pool")]
            Self::Pool(_) => true,
            Self::Database { source, .. } | Self::Query(source) => {
                if source.is_closed() {
                    return true;
                }
                match source.as_db_error() {
                    Some(db) => is_transient_state(db.code().code()),
                    // No server response at all: I/O failure on the socket.
                    None => true,
                }
            }
            _ => false,
        }
    }
}

/// SQLSTATE codes worth retrying.
pub(crate) fn is_transient_state(code: &str) -> bool {
    matches!(code, "40P01" | "40001" | "57014" | "53300") || code.starts_with("08")
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for DocError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<serde_json::Error> for DocError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
