//! Storage error types
//!
//! Every engine failure is re-expressed as one of these kinds before it
//! leaves a storage operation.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Browser backend used before the readiness gate and web store init
    #[error("Storage backend not ready: {0}")]
    NotReady(String),

    #[error("Connection '{0}' already exists and is open")]
    DuplicateConnection(String),

    #[error("Failed to open database '{name}': {reason}")]
    Open { name: String, reason: String },

    #[error("Schema bootstrap failed: {0}")]
    Schema(String),

    /// Uniqueness, CHECK or foreign-key violation reported by the engine
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Connection '{0}' is closed")]
    ClosedConnection(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl StoreError {
    /// Classify an engine failure.
    pub fn from_engine(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(
                    message
                        .clone()
                        .unwrap_or_else(|| failure.to_string()),
                )
            }
            _ => StoreError::Storage(error.to_string()),
        }
    }

    pub(crate) fn open(name: &str, reason: impl ToString) -> Self {
        StoreError::Open {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller can fix the input and try again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::Constraint(_))
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, StoreError::Constraint(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        StoreError::from_engine(error)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        StoreError::Storage(error.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(error: tokio::task::JoinError) -> Self {
        StoreError::Storage(format!("engine task failed: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_unique_violation_is_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (email TEXT UNIQUE); INSERT INTO t (email) VALUES ('a@x.io');",
        )
        .unwrap();

        let err = conn
            .execute("INSERT INTO t (email) VALUES ('a@x.io')", [])
            .unwrap_err();
        let err = StoreError::from(err);

        assert!(err.is_constraint());
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("UNIQUE"));
    }

    #[test]
    fn test_syntax_error_is_storage() {
        let conn = Connection::open_in_memory().unwrap();
        let err = StoreError::from(conn.execute("SELEKT 1", []).unwrap_err());

        assert!(matches!(err, StoreError::Storage(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_io_error_is_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = StoreError::from(io);
        assert!(matches!(err, StoreError::Storage(ref msg) if msg.contains("disk on fire")));
    }
}
