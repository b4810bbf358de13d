/// Statement Status Module
///
/// Diagnostics recorded for the most recently executed statement, in the
/// SQLSTATE / driver code / message triple that database clients report.

use rusqlite::ErrorCode;
use serde::Serialize;
use std::fmt;

/// SQLSTATE reported for a statement that completed without error.
pub const SQLSTATE_OK: &str = "00000";

/// Diagnostic info of one executed statement.
///
/// Success is `00000` with no code and no message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    /// Five character SQLSTATE class and subclass
    pub sqlstate: String,
    /// Engine (extended) result code, when the engine produced one
    pub code: Option<i32>,
    /// Engine error text
    pub message: Option<String>,
}

impl ErrorInfo {
    /// Status of a successful statement.
    pub fn ok() -> Self {
        ErrorInfo {
            sqlstate: SQLSTATE_OK.to_string(),
            code: None,
            message: None,
        }
    }

    /// Builds the diagnostics for a failed statement.
    pub fn from_error(err: &rusqlite::Error) -> Self {
        let (sqlstate, code) = match err {
            rusqlite::Error::SqliteFailure(failure, _) => {
                (sqlstate_for(failure.code), Some(failure.extended_code))
            }
            rusqlite::Error::InvalidParameterCount(..)
            | rusqlite::Error::InvalidParameterName(_) => ("HY093", None),
            _ => ("HY000", None),
        };

        ErrorInfo {
            sqlstate: sqlstate.to_string(),
            code,
            message: Some(err.to_string()),
        }
    }

    /// True when the statement completed without error.
    pub fn is_ok(&self) -> bool {
        self.sqlstate == SQLSTATE_OK
    }
}

impl Default for ErrorInfo {
    fn default() -> Self {
        ErrorInfo::ok()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "[{}] ({}) {}", self.sqlstate, code, message),
            (None, Some(message)) => write!(f, "[{}] {}", self.sqlstate, message),
            _ => write!(f, "[{}]", self.sqlstate),
        }
    }
}

/// Maps a SQLite primary result code onto a SQLSTATE.
fn sqlstate_for(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::ConstraintViolation => "23000",
        ErrorCode::NotFound => "42S02",
        ErrorCode::OperationInterrupted => "01002",
        ErrorCode::TooBig => "22001",
        ErrorCode::NoLargeFileSupport => "HYC00",
        ErrorCode::ParameterOutOfRange => "HY093",
        _ => "HY000",
    }
}
