/// Core Module for dbwrap
///
/// This module contains the data-access layer and the error type every
/// other part of the crate reports through.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DbError, Result, CONNECT_FAILURE_MESSAGE};
