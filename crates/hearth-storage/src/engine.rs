//! SQL engine contract
//!
//! Both backends hand out an `Engine`; the connection handle drives it on a
//! blocking thread so callers only ever see async operations.

use rusqlite::types::{FromSql, Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::sync::Arc;

use crate::error::StoreError;
use crate::Result;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    /// Rows inserted, updated or deleted
    pub changes: usize,
    /// Rowid of the most recent successful insert on this connection
    pub last_id: i64,
}

/// One result row with its column names.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|index| &self.values[index])
    }

    /// Typed access by column name.
    pub fn get<T: FromSql>(&self, column: &str) -> Result<T> {
        let value = self
            .value(column)
            .ok_or_else(|| StoreError::Storage(format!("no column named '{column}'")))?;

        T::column_result(ValueRef::from(value))
            .map_err(|e| StoreError::Storage(format!("column '{column}': {e}")))
    }
}

pub trait Engine: Send {
    /// Run one or more statements without parameters.
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Run a single write statement with bound parameters.
    fn run(&mut self, sql: &str, params: &[Value]) -> Result<RunResult>;

    /// Run a single read statement with bound parameters.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    fn close(self: Box<Self>) -> Result<()>;
}

pub(crate) fn execute_on(conn: &Connection, sql: &str) -> Result<()> {
    conn.execute_batch(sql)?;
    Ok(())
}

pub(crate) fn run_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<RunResult> {
    let changes = conn.execute(sql, params_from_iter(params.iter()))?;
    Ok(RunResult {
        changes,
        last_id: conn.last_insert_rowid(),
    })
}

pub(crate) fn query_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let width = columns.len();

    let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
        (0..width)
            .map(|index| row.get::<_, Value>(index))
            .collect::<rusqlite::Result<Vec<_>>>()
    })?;

    let mut result = Vec::new();
    for values in rows {
        result.push(Row {
            columns: Arc::clone(&columns),
            values: values?,
        });
    }
    Ok(result)
}

pub(crate) fn close_on(conn: Connection) -> Result<()> {
    conn.close().map_err(|(_, e)| StoreError::from_engine(e))
}
