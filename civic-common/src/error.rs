//! Common error types for the civic reader services

use thiserror::Error;

/// Common result type for civic reader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the civic reader services
///
/// Storage failures are classified at conversion time so callers can decide
/// on retry without inspecting driver messages.
#[derive(Error, Debug)]
pub enum Error {
    /// Unclassified database error (fatal, not retried)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Lock contention or pool exhaustion; safe to retry
    #[error("Transient storage error: {0}")]
    TransientStorage(String),

    /// Constraint violation on write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures that may succeed when the operation is repeated
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientStorage(_))
    }
}

// SQLite primary result codes (extended codes share the low byte)
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("row not found".to_string()),
            sqlx::Error::PoolTimedOut => {
                Error::TransientStorage("timed out waiting for a database connection".to_string())
            }
            sqlx::Error::Database(ref db_err) => {
                let code = db_err
                    .code()
                    .and_then(|c| c.parse::<i64>().ok())
                    .map(|c| c & 0xff);
                let locked = matches!(code, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
                    || db_err.message().contains("database is locked");

                if locked {
                    Error::TransientStorage(db_err.message().to_string())
                } else if matches!(
                    db_err.kind(),
                    sqlx::error::ErrorKind::UniqueViolation
                        | sqlx::error::ErrorKind::ForeignKeyViolation
                ) {
                    Error::Conflict(db_err.message().to_string())
                } else {
                    Error::Database(err)
                }
            }
            other => Error::Database(other),
        }
    }
}
