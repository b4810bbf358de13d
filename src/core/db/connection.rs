/// Connection Management Module
///
/// This module owns the single SQLite session behind a `DataAccess`, its
/// transaction passthroughs and the per-instance statement counters.

use crate::core::db::status::ErrorInfo;
use crate::core::{DbError, Result};
use rusqlite::Connection;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Database name that selects a private in-memory database
pub const MEMORY_DATABASE: &str = ":memory:";

/// Session init command, run once right after the connection opens
const INIT_COMMAND: &str = "PRAGMA encoding = 'UTF-8';";

/// Connection coordinates for a `DataAccess`
///
/// SQLite has no server, so `host` names the directory holding the
/// database file. `username` and `password` are carried but not checked.
#[derive(Clone, Default)]
pub struct ConnectOptions {
    pub host: String,
    pub username: String,
    pub password: String,
    pub database: String,
    /// Busy timeout handed to the engine; `None` keeps its default
    pub busy_timeout: Option<Duration>,
}

impl ConnectOptions {
    /// Creates options from the four connection coordinates
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        ConnectOptions {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            database: database.into(),
            busy_timeout: None,
        }
    }

    /// Options for a private in-memory database
    pub fn in_memory() -> Self {
        ConnectOptions::new("", "", "", MEMORY_DATABASE)
    }

    /// Sets the busy timeout
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    /// Resolves the database file, or `None` for an in-memory database
    pub fn database_path(&self) -> Option<PathBuf> {
        if self.database == MEMORY_DATABASE {
            None
        } else if self.host.is_empty() {
            Some(PathBuf::from(&self.database))
        } else {
            Some(PathBuf::from(&self.host).join(&self.database))
        }
    }

    /// Human readable connection target, used in logs
    pub fn target(&self) -> String {
        match self.database_path() {
            Some(path) => path.display().to_string(),
            None => MEMORY_DATABASE.to_string(),
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}

/// A single database session plus its statement bookkeeping
///
/// One instance owns one connection for its whole lifetime. Counters and
/// the last statement status are plain fields; mutating calls take
/// `&mut self`, so sharing an instance needs external serialization.
pub struct DataAccess {
    /// Open session, never absent after construction
    pub(crate) conn: Connection,
    /// Status of the most recently executed statement
    pub(crate) last_error: Option<ErrorInfo>,
    /// Number of statements executed
    pub(crate) query_count: u64,
    /// Row count of the most recent statement
    pub(crate) row_count: usize,
}

impl DataAccess {
    /// Opens a session from the four connection coordinates
    ///
    /// # Examples
    ///
    /// ```
    /// use dbwrap::core::db::DataAccess;
    ///
    /// let db = DataAccess::new("", "app", "secret", ":memory:").unwrap();
    /// assert_eq!(db.query_count(), 0);
    /// ```
    pub fn new(host: &str, username: &str, password: &str, database: &str) -> Result<Self> {
        DataAccess::connect(&ConnectOptions::new(host, username, password, database))
    }

    /// Opens a session described by `options`
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` when the database cannot be opened or
    /// the session init command fails.
    pub fn connect(options: &ConnectOptions) -> Result<Self> {
        let target = options.target();
        let conn = open_session(options).map_err(|source| {
            warn!(target = %target, error = %source, "connection failed");
            DbError::Connection { source }
        })?;

        info!(target = %target, username = %options.username, "connected");

        Ok(DataAccess {
            conn,
            last_error: None,
            query_count: 0,
            row_count: 0,
        })
    }

    /// Begins a transaction
    pub fn begin_transaction(&mut self) -> Result<()> {
        debug!("BEGIN");
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    /// Commits the open transaction
    pub fn commit(&mut self) -> Result<()> {
        debug!("COMMIT");
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Rolls back the open transaction
    pub fn rollback(&mut self) -> Result<()> {
        debug!("ROLLBACK");
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    /// Whether the session is inside an explicit transaction
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Number of statements executed since construction
    pub fn query_count(&self) -> u64 {
        self.query_count
    }

    /// Row count of the most recently executed statement
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Diagnostics of the most recently executed statement
    ///
    /// `None` until the first statement has run.
    pub fn last_error(&self) -> Option<&ErrorInfo> {
        self.last_error.as_ref()
    }

    /// The underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Closes the session, reporting errors the engine raises on close
    pub fn close(self) -> Result<()> {
        let queries = self.query_count;
        self.conn.close().map_err(|(_, err)| DbError::Database(err))?;
        info!(queries, "connection closed");
        Ok(())
    }
}

impl fmt::Debug for DataAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataAccess")
            .field("path", &self.conn.path())
            .field("query_count", &self.query_count)
            .field("row_count", &self.row_count)
            .field("last_error", &self.last_error)
            .finish()
    }
}

/// Opens the connection and runs the session init command
fn open_session(options: &ConnectOptions) -> rusqlite::Result<Connection> {
    let conn = match options.database_path() {
        Some(path) => Connection::open(path)?,
        None => Connection::open_in_memory()?,
    };

    conn.execute_batch(INIT_COMMAND)?;

    if let Some(timeout) = options.busy_timeout {
        conn.busy_timeout(timeout)?;
    }

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::query::{FetchStyle, Params};
    use crate::test_utils::DataAccessFixture;

    #[test]
    fn test_new_instance_has_zeroed_counters() {
        let db = DataAccess::new("", "user", "pass", MEMORY_DATABASE).unwrap();
        assert_eq!(db.query_count(), 0);
        assert_eq!(db.row_count(), 0);
        assert!(db.last_error().is_none());
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_session_uses_utf8() {
        let db = DataAccess::connect(&ConnectOptions::in_memory()).unwrap();
        let encoding: String = db
            .connection()
            .query_row("PRAGMA encoding", [], |row| row.get(0))
            .unwrap();
        assert_eq!(encoding, "UTF-8");
    }

    #[test]
    fn test_invalid_host_is_connection_error() {
        let result = DataAccess::new("/nonexistent/host/dir", "user", "pass", "app.db");

        match result {
            Err(err @ DbError::Connection { .. }) => {
                assert_eq!(err.to_string(), "Could not connect to database.");
            }
            other => panic!("Expected Connection error, got {:?}", other),
        }
    }

    #[test]
    fn test_database_path_resolution() {
        let opts = ConnectOptions::new("/srv/data", "u", "p", "app.db");
        assert_eq!(opts.database_path(), Some(PathBuf::from("/srv/data/app.db")));

        let opts = ConnectOptions::new("", "u", "p", "app.db");
        assert_eq!(opts.database_path(), Some(PathBuf::from("app.db")));

        let opts = ConnectOptions::new("/srv/data", "u", "p", MEMORY_DATABASE);
        assert_eq!(opts.database_path(), None);
        assert_eq!(opts.target(), MEMORY_DATABASE);
    }

    #[test]
    fn test_debug_redacts_password() {
        let opts = ConnectOptions::new("", "app", "hunter2", MEMORY_DATABASE);
        let rendered = format!("{:?}", opts);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_transaction_passthrough() {
        let mut fixture = DataAccessFixture::with_sample_data();
        let db = &mut fixture.db;

        db.begin_transaction().unwrap();
        assert!(db.in_transaction());
        db.query("DELETE FROM users", Params::None).unwrap();
        db.rollback().unwrap();
        assert!(!db.in_transaction());

        let rows = db
            .get_array("SELECT id FROM users", Params::None, FetchStyle::Assoc)
            .unwrap();
        assert_eq!(rows.len(), 3);

        db.begin_transaction().unwrap();
        db.query("DELETE FROM users WHERE id = ?", 1i64).unwrap();
        db.commit().unwrap();

        let rows = db
            .get_array("SELECT id FROM users", Params::None, FetchStyle::Assoc)
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_commit_without_transaction_is_engine_error() {
        let mut db = DataAccess::connect(&ConnectOptions::in_memory()).unwrap();
        match db.commit() {
            Err(DbError::Database(_)) => {}
            other => panic!("Expected Database error, got {:?}", other),
        }
    }

    #[test]
    fn test_transaction_calls_are_not_counted() {
        let mut db = DataAccess::connect(&ConnectOptions::in_memory()).unwrap();
        db.begin_transaction().unwrap();
        db.commit().unwrap();
        assert_eq!(db.query_count(), 0);
    }

    #[test]
    fn test_close() {
        let db = DataAccess::connect(&ConnectOptions::in_memory()).unwrap();
        db.close().unwrap();
    }
}
