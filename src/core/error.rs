/// dbwrap Error Module
///
/// This module defines the error type shared by the data-access layer,
/// the configuration loader and the command-line runner.
use thiserror::Error;

/// Message reported when a session cannot be established.
pub const CONNECT_FAILURE_MESSAGE: &str = "Could not connect to database.";

/// Error type for dbwrap.
///
/// Connection failures are kept apart from statement failures: the first
/// means no `DataAccess` exists, the second is the client's own error
/// returned unchanged after the statement diagnostics were recorded.
#[derive(Error, Debug)]
pub enum DbError {
    /// Opening the session or running its init command failed
    #[error("Could not connect to database.")]
    Connection {
        #[source]
        source: rusqlite::Error,
    },

    /// Prepare, bind, execute, fetch or transaction errors from SQLite
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Returns true for errors raised while establishing the session.
    pub fn is_connection(&self) -> bool {
        matches!(self, DbError::Connection { .. })
    }
}

/// Type alias for Result to use DbError as the error type.
pub type Result<T> = std::result::Result<T, DbError>;
