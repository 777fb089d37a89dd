//! Error types for hf-db

use thiserror::Error;

/// Warehouse connection and execution errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connect timeout (D001)
    #[error("[D001] Connection to {host} timed out after {timeout_secs}s")]
    ConnectTimeout { host: String, timeout_secs: u64 },

    /// Pool saturated (D002)
    #[error("[D002] Connection pool exhausted: all {capacity} connections are in use")]
    ConnectionExhausted { capacity: usize },

    /// Warehouse rejected a statement (D003)
    #[error("[D003] SQL execution failed: {message} (statement: {statement})")]
    ExecutionFailed { statement: String, message: String },

    /// Connection establishment failed for a non-timeout reason (D004)
    #[error("[D004] Failed to connect to {host}: {message}")]
    ConnectionFailed { host: String, message: String },

    /// Feature this build cannot honor (D005)
    #[error("[D005] Unsupported: {feature}")]
    Unsupported { feature: String },
}

impl DbError {
    /// Wrap a driver error as an `ExecutionFailed` carrying the offending
    /// statement and the warehouse diagnostic when the server sent one.
    pub(crate) fn execution(statement: &str, err: &tokio_postgres::Error) -> Self {
        let message = match err.as_db_error() {
            Some(db) => db.message().to_string(),
            None => err.to_string(),
        };
        DbError::ExecutionFailed {
            statement: statement.to_string(),
            message,
        }
    }
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;
