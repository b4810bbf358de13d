// Core infrastructure modules
pub mod core;

// Configuration loading
pub mod config;

#[cfg(test)]
mod test_utils;

pub use crate::core::db::{
    AssocKey, ColumnKey, ConnectOptions, DataAccess, ErrorInfo, FetchStyle, Params,
    RekeyedResultSet, ResultSet, Row, StatementHandle,
};
pub use crate::core::{DbError, Result};
pub use rusqlite::types::Value;
