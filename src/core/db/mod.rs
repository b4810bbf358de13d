/// Database Module
///
/// This module provides the `DataAccess` wrapper: one SQLite session, the
/// statements run on it and the helpers that reshape their results.
///
/// ## Architecture
///
/// - **Connection Management** (`connection.rs`): construction, transactions, counters, teardown
/// - **Query Execution** (`query.rs`): parameter binding, statement handles and fetch styles
/// - **Rekeying** (`rekey.rs`): turning a result set into a map keyed by its first column
/// - **Statement Status** (`status.rs`): diagnostics recorded for the last statement
///
/// ## Error Handling
///
/// Connection failures surface as `DbError::Connection`; every statement
/// failure is the client's own error inside `DbError::Database`.
pub mod connection;
pub mod query;
pub mod rekey;
pub mod status;

pub use connection::*;
pub use query::*;
pub use rekey::*;
pub use status::*;
