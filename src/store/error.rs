//! Store error types
//!
//! Defines all errors that can occur in the storage layer.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur while talking to the database
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite rejected a write because of a foreign-key, NOT NULL or CHECK rule
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Any other SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    /// A JSON-encoded column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Connection pool failure (poisoned lock)
    #[error("Pool error: {0}")]
    Pool(String),

    /// I/O operation failed (creating the database directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking task running a session panicked or was cancelled
    #[error("Task error: {0}")]
    Join(String),
}

impl StoreError {
    /// Whether this error is a rejected write the caller may report as a conflict
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::ConstraintViolation(
                    message.clone().unwrap_or_else(|| failure.to_string()),
                )
            }
            _ => StoreError::Sqlite(err),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Join(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::ConstraintViolation("FOREIGN KEY constraint failed".to_string());
        assert_eq!(
            err.to_string(),
            "Constraint violation: FOREIGN KEY constraint failed"
        );
        assert!(err.is_constraint_violation());

        let err = StoreError::Pool("poisoned".to_string());
        assert!(!err.is_constraint_violation());
    }

    #[test]
    fn test_constraint_failure_conversion() {
        let failure = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY),
            Some("FOREIGN KEY constraint failed".to_string()),
        );
        let err: StoreError = failure.into();
        assert!(matches!(err, StoreError::ConstraintViolation(ref m) if m.contains("FOREIGN KEY")));
    }

    #[test]
    fn test_other_sqlite_failure_conversion() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }
}
