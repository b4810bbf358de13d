/// Query Execution Module
///
/// This module provides positional parameter binding, the executed
/// statement handle and the row shapes results are fetched in. The
/// `query` family of `DataAccess` methods lives here as well.

use crate::core::db::connection::DataAccess;
use crate::core::db::rekey::{rekey, RekeyedResultSet};
use crate::core::db::status::ErrorInfo;
use crate::core::{DbError, Result};
use indexmap::IndexMap;
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Bind parameters of one statement
///
/// Binding is positional and 1-indexed: `One` binds position 1, `Many`
/// binds positions 1..=N in order, `None` binds nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    One(Value),
    Many(Vec<Value>),
}

impl Params {
    /// Number of values that will be bound
    pub fn len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::One(_) => 1,
            Params::Many(values) => values.len(),
        }
    }

    /// True when nothing will be bound
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Binds the values to `stmt` in order, starting at position 1
    fn bind(&self, stmt: &mut rusqlite::Statement<'_>) -> rusqlite::Result<()> {
        match self {
            Params::None => {}
            Params::One(value) => stmt.raw_bind_parameter(1, value)?,
            Params::Many(values) => {
                for (i, value) in values.iter().enumerate() {
                    stmt.raw_bind_parameter(i + 1, value)?;
                }
            }
        }
        Ok(())
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::None
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        Params::One(value)
    }
}

impl From<i32> for Params {
    fn from(value: i32) -> Self {
        Params::One(Value::Integer(i64::from(value)))
    }
}

impl From<i64> for Params {
    fn from(value: i64) -> Self {
        Params::One(Value::Integer(value))
    }
}

impl From<f64> for Params {
    fn from(value: f64) -> Self {
        Params::One(Value::Real(value))
    }
}

impl From<bool> for Params {
    fn from(value: bool) -> Self {
        Params::One(Value::from(value))
    }
}

impl From<&str> for Params {
    fn from(value: &str) -> Self {
        Params::One(Value::Text(value.to_string()))
    }
}

impl From<String> for Params {
    fn from(value: String) -> Self {
        Params::One(Value::Text(value))
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Many(values)
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Params {
    fn from(values: [T; N]) -> Self {
        Params::Many(values.into_iter().map(Into::into).collect())
    }
}

impl FromIterator<Value> for Params {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Params::Many(iter.into_iter().collect())
    }
}

/// Shape result rows are fetched in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStyle {
    /// Keyed by column name
    #[default]
    Assoc,
    /// Keyed by 0-based column position
    Num,
    /// Name key then position key for every column
    Both,
}

impl FromStr for FetchStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "assoc" => Ok(FetchStyle::Assoc),
            "num" => Ok(FetchStyle::Num),
            "both" => Ok(FetchStyle::Both),
            other => Err(format!("unknown fetch style '{}'", other)),
        }
    }
}

/// Key of one entry in a `Row`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Name(String),
    Index(usize),
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Name(name) => f.write_str(name),
            ColumnKey::Index(pos) => write!(f, "{}", pos),
        }
    }
}

impl ColumnKey {
    /// Key for a column name
    ///
    /// A name in canonical non-negative integer form (`"0"`, `"12"`, not
    /// `"012"`) is the same key as that position.
    pub fn for_name(name: &str) -> Self {
        match name.parse::<usize>() {
            Ok(pos) if pos.to_string() == name => ColumnKey::Index(pos),
            _ => ColumnKey::Name(name.to_string()),
        }
    }
}

impl From<&str> for ColumnKey {
    fn from(name: &str) -> Self {
        ColumnKey::for_name(name)
    }
}

impl From<usize> for ColumnKey {
    fn from(pos: usize) -> Self {
        ColumnKey::Index(pos)
    }
}

impl Serialize for ColumnKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ColumnKey::Name(name) => serializer.serialize_str(name),
            ColumnKey::Index(pos) => serializer.serialize_u64(*pos as u64),
        }
    }
}

/// One result row, an insertion-ordered map from column key to value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    entries: IndexMap<ColumnKey, Value>,
}

/// All rows of one statement, in result order
pub type ResultSet = Vec<Row>;

impl Row {
    pub fn new() -> Self {
        Row::default()
    }

    /// Shapes raw column values into a row of the given style
    ///
    /// A repeated key keeps its first position and takes the later value,
    /// so a column named `"0"` and position 0 share one entry.
    pub fn from_values(columns: &[String], values: Vec<Value>, style: FetchStyle) -> Self {
        let mut row = Row::new();
        for (pos, (name, value)) in columns.iter().zip(values).enumerate() {
            match style {
                FetchStyle::Assoc => row.insert(ColumnKey::for_name(name), value),
                FetchStyle::Num => row.insert(ColumnKey::Index(pos), value),
                FetchStyle::Both => {
                    row.insert(ColumnKey::for_name(name), value.clone());
                    row.insert(ColumnKey::Index(pos), value);
                }
            }
        }
        row
    }

    /// Inserts or replaces an entry, keeping the position of an existing key
    pub fn insert(&mut self, key: ColumnKey, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &ColumnKey) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Value of the named column
    pub fn by_name(&self, name: &str) -> Option<&Value> {
        self.entries.get(&ColumnKey::for_name(name))
    }

    /// Value at a 0-based position key
    pub fn by_position(&self, pos: usize) -> Option<&Value> {
        self.entries.get(&ColumnKey::Index(pos))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry in insertion order
    pub fn first(&self) -> Option<(&ColumnKey, &Value)> {
        self.entries.first()
    }

    /// Removes the first entry and renumbers the remaining position keys from 0
    pub fn shift(&mut self) -> Option<(ColumnKey, Value)> {
        let first = self.entries.shift_remove_index(0)?;

        let mut next = 0;
        self.entries = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(key, value)| match key {
                ColumnKey::Index(_) => {
                    let key = ColumnKey::Index(next);
                    next += 1;
                    (key, value)
                }
                named => (named, value),
            })
            .collect();

        Some(first)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ColumnKey> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ColumnKey, &Value)> {
        self.entries.iter()
    }
}

impl FromIterator<(ColumnKey, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (ColumnKey, Value)>>(iter: I) -> Self {
        Row {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, &SqlValue(value))?;
        }
        map.end()
    }
}

/// Serializes a SQLite value; blobs become lowercase hex
struct SqlValue<'a>(&'a Value);

impl Serialize for SqlValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null => serializer.serialize_unit(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
                serializer.serialize_str(&hex)
            }
        }
    }
}

/// An executed statement
///
/// Result rows are buffered when the statement runs; `fetch` and
/// `fetch_all` hand them out in the requested shape, each row built fresh.
#[derive(Debug)]
pub struct StatementHandle {
    sql: String,
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
    row_count: usize,
    status: ErrorInfo,
}

impl StatementHandle {
    /// SQL text the statement was prepared from
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Result column names, empty for statements that return no rows
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Rows returned, or rows changed for statements without result columns
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Diagnostics of this statement
    pub fn error_info(&self) -> &ErrorInfo {
        &self.status
    }

    /// Next row, or `None` once the result is exhausted
    pub fn fetch(&mut self, style: FetchStyle) -> Option<Row> {
        let values = self.rows.pop_front()?;
        Some(Row::from_values(&self.columns, values, style))
    }

    /// All remaining rows
    pub fn fetch_all(&mut self, style: FetchStyle) -> ResultSet {
        let columns = &self.columns;
        self.rows
            .drain(..)
            .map(|values| Row::from_values(columns, values, style))
            .collect()
    }
}

/// Prepares `sql` and binds `params` to it
fn prepare_bound<'c>(
    conn: &'c Connection,
    sql: &str,
    params: &Params,
) -> rusqlite::Result<rusqlite::Statement<'c>> {
    let mut stmt = conn.prepare(sql)?;
    params.bind(&mut stmt)?;
    Ok(stmt)
}

/// Rows changed on the session since it opened, triggers included
fn total_changes(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT total_changes()", [], |row| row.get(0))
}

/// Runs a prepared statement, buffering any result rows
///
/// Statements without result columns report the rows they changed
/// themselves, measured on the session's running change total, so DDL and
/// transaction control report 0.
fn execute(
    conn: &Connection,
    mut stmt: rusqlite::Statement<'_>,
    sql: &str,
) -> rusqlite::Result<StatementHandle> {
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let column_count = columns.len();

    let mut buffered = VecDeque::new();
    let row_count = if column_count == 0 {
        let before = total_changes(conn)?;
        stmt.raw_execute()?;
        let after = total_changes(conn)?;
        (after - before).max(0) as usize
    } else {
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(Value::from(row.get_ref(i)?));
            }
            buffered.push_back(values);
        }
        buffered.len()
    };

    Ok(StatementHandle {
        sql: sql.to_string(),
        columns,
        rows: buffered,
        row_count,
        status: ErrorInfo::ok(),
    })
}

/// Stores the diagnostics of a failed statement and wraps its error
fn record_failure(last_error: &mut Option<ErrorInfo>, sql: &str, err: rusqlite::Error) -> DbError {
    let info = ErrorInfo::from_error(&err);
    warn!(sql, sqlstate = %info.sqlstate, error = %err, "statement failed");
    *last_error = Some(info);
    DbError::Database(err)
}

impl DataAccess {
    /// Runs one statement and returns its handle
    ///
    /// Records the statement status as the last error whether or not it
    /// succeeds. Once the statement is prepared and bound it counts as a
    /// query: the query count goes up and the row count is replaced, with
    /// 0 when execution fails. A prepare or bind failure touches neither.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Database` with the client's error when prepare,
    /// bind or execute fails.
    pub fn query(&mut self, sql: &str, params: impl Into<Params>) -> Result<StatementHandle> {
        let params = params.into();

        let stmt = match prepare_bound(&self.conn, sql, &params) {
            Ok(stmt) => stmt,
            Err(err) => return Err(record_failure(&mut self.last_error, sql, err)),
        };

        let outcome = execute(&self.conn, stmt, sql);
        self.query_count += 1;

        match outcome {
            Ok(handle) => {
                self.last_error = Some(handle.status.clone());
                self.row_count = handle.row_count;
                debug!(
                    sql,
                    params = params.len(),
                    row_count = self.row_count,
                    query_count = self.query_count,
                    "statement executed"
                );
                Ok(handle)
            }
            Err(err) => {
                self.row_count = 0;
                Err(record_failure(&mut self.last_error, sql, err))
            }
        }
    }

    /// Runs `sql` and returns its first row, `None` when nothing matched
    pub fn get_row(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
        style: FetchStyle,
    ) -> Result<Option<Row>> {
        let mut handle = self.query(sql, params)?;
        Ok(handle.fetch(style))
    }

    /// Runs `sql` and returns every row
    pub fn get_array(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
        style: FetchStyle,
    ) -> Result<ResultSet> {
        let mut handle = self.query(sql, params)?;
        Ok(handle.fetch_all(style))
    }

    /// Runs `sql` and keys every row by its first value
    ///
    /// Rows whose first value is not numeric are dropped. See [`rekey`].
    pub fn get_assoc_array(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
        style: FetchStyle,
    ) -> Result<RekeyedResultSet> {
        let rows = self.get_array(sql, params, style)?;
        Ok(rekey(rows))
    }
}
