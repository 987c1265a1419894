//! Native backend: a SQLite file on the device

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

use hearth_platform::Platform;

use crate::backend::Backend;
use crate::connection::ConnectionOptions;
use crate::engine::{close_on, execute_on, query_on, run_on, Engine, Row, RunResult};
use crate::error::StoreError;
use crate::Result;

/// File name used for a database called `name`.
pub(crate) fn database_file_name(name: &str) -> String {
    format!("{name}SQLite.db")
}

pub struct NativeBackend {
    /// `None` keeps every database in memory
    data_dir: Option<PathBuf>,
}

impl NativeBackend {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
        }
    }

    pub fn in_memory() -> Self {
        Self { data_dir: None }
    }

    pub fn database_path(&self, name: &str) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(database_file_name(name)))
    }
}

#[async_trait]
impl Backend for NativeBackend {
    fn platform(&self) -> Platform {
        Platform::Native
    }

    async fn init_store(&self) -> Result<()> {
        Ok(())
    }

    async fn open(&self, options: &ConnectionOptions) -> Result<Box<dyn Engine>> {
        let name = options.name.clone();
        let path = self.database_path(&name);
        let readonly = options.readonly;

        let engine = tokio::task::spawn_blocking(move || {
            NativeEngine::open(path.as_deref(), readonly)
                .map_err(|e| StoreError::open(&name, e))
        })
        .await??;

        tracing::debug!(
            database = %options.name,
            path = ?self.database_path(&options.name),
            readonly,
            "Opened native database"
        );

        Ok(Box::new(engine))
    }

    fn location(&self, name: &str) -> Option<PathBuf> {
        self.database_path(name)
    }
}

pub struct NativeEngine {
    conn: Connection,
}

impl NativeEngine {
    fn open(path: Option<&Path>, readonly: bool) -> std::result::Result<Self, String> {
        let conn = match path {
            Some(path) if readonly => {
                Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
                    .map_err(|e| e.to_string())?
            }
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                Connection::open(path).map_err(|e| e.to_string())?
            }
            None => Connection::open_in_memory().map_err(|e| e.to_string())?,
        };

        Self::configure(&conn, path.is_some(), readonly).map_err(|e| e.to_string())?;

        Ok(Self { conn })
    }

    fn configure(conn: &Connection, on_disk: bool, readonly: bool) -> rusqlite::Result<()> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        if readonly {
            conn.pragma_update(None, "query_only", "ON")?;
        } else if on_disk {
            let _: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        }

        Ok(())
    }
}

impl Engine for NativeEngine {
    fn execute(&mut self, sql: &str) -> Result<()> {
        execute_on(&self.conn, sql)
    }

    fn run(&mut self, sql: &str, params: &[Value]) -> Result<RunResult> {
        run_on(&self.conn, sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        query_on(&self.conn, sql, params)
    }

    fn close(self: Box<Self>) -> Result<()> {
        close_on(self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let backend = NativeBackend::new(dir.path());
        let options = ConnectionOptions::new("notes");

        let mut engine = backend.open(&options).await.unwrap();
        engine
            .execute("CREATE TABLE notes (body TEXT); INSERT INTO notes VALUES ('kept');")
            .unwrap();
        engine.close().unwrap();

        assert!(dir.path().join("notesSQLite.db").exists());

        let mut engine = backend.open(&options).await.unwrap();
        let rows = engine.query("SELECT body FROM notes", &[]).unwrap();
        assert_eq!(rows[0].get::<String>("body").unwrap(), "kept");
    }

    #[tokio::test]
    async fn test_readonly_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let backend = NativeBackend::new(dir.path());

        let seed = Connection::open(dir.path().join(database_file_name("ro"))).unwrap();
        seed.execute_batch("CREATE TABLE t (v INTEGER);").unwrap();
        seed.close().unwrap();

        let options = ConnectionOptions::new("ro").readonly(true);
        let mut reader = backend.open(&options).await.unwrap();
        assert!(reader.query("SELECT v FROM t", &[]).unwrap().is_empty());

        let err = reader
            .run("INSERT INTO t (v) VALUES (?1)", &[Value::Integer(1)])
            .unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
    }

    #[tokio::test]
    async fn test_readonly_missing_file_is_open_error() {
        let dir = TempDir::new().unwrap();
        let backend = NativeBackend::new(dir.path());
        let options = ConnectionOptions::new("absent").readonly(true);

        let err = backend.open(&options).await.err().unwrap();
        assert!(matches!(err, StoreError::Open { ref name, .. } if name == "absent"));
    }

    #[tokio::test]
    async fn test_in_memory_backend() {
        let backend = NativeBackend::in_memory();
        assert!(backend.database_path("any").is_none());
        assert!(backend.open(&ConnectionOptions::new("mem")).await.is_ok());
    }
}
