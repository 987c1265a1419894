//! Browser backend: in-memory SQLite persisted into the web store
//!
//! The live database sits in memory. After every committed write its image
//! is copied into the web store, and opening a database restores the last
//! saved image. The web store is a storage area standing in for the
//! origin's persistent browser storage; each database is one image named
//! like its native counterpart.

use async_trait::async_trait;
use rusqlite::backup::Backup;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hearth_platform::Platform;

use crate::backend::Backend;
use crate::connection::ConnectionOptions;
use crate::engine::{close_on, execute_on, query_on, run_on, Engine, Row, RunResult};
use crate::error::StoreError;
use crate::native::database_file_name;
use crate::Result;

const PAGES_PER_STEP: i32 = 256;

pub struct WebStore {
    /// `None` for a store that forgets everything when the process exits
    root: Option<PathBuf>,
}

impl WebStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn ephemeral() -> Self {
        Self { root: None }
    }

    pub fn is_persistent(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn image_path(&self, name: &str) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(database_file_name(name)))
    }

    pub fn has_image(&self, name: &str) -> bool {
        self.image_path(name).is_some_and(|path| path.exists())
    }

    /// Prepare the storage area. Safe to repeat.
    pub fn init(&self) -> Result<()> {
        if let Some(root) = &self.root {
            std::fs::create_dir_all(root)?;
            if !root.is_dir() {
                return Err(StoreError::Storage(format!(
                    "web store root {} is not a directory",
                    root.display()
                )));
            }
        }
        Ok(())
    }

    /// Remove the saved image of `name`. Returns whether one existed.
    pub fn delete_image(&self, name: &str) -> Result<bool> {
        match self.image_path(name) {
            Some(path) if path.exists() => {
                std::fs::remove_file(&path)?;
                tracing::info!(database = %name, "Deleted web store image");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Load the saved image of `name` into `conn`. Returns whether one existed.
    fn restore(&self, name: &str, conn: &mut Connection) -> Result<bool> {
        let Some(path) = self.image_path(name).filter(|path| path.exists()) else {
            return Ok(false);
        };

        let source = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        copy_database(&source, conn)?;

        tracing::debug!(database = %name, "Restored image from web store");
        Ok(true)
    }

    /// Replace the saved image of `name` with the contents of `conn`.
    fn persist(&self, name: &str, conn: &Connection) -> Result<()> {
        let Some(path) = self.image_path(name) else {
            return Ok(());
        };

        let staging = path.with_extension("db.saving");
        {
            let mut target = Connection::open(&staging)?;
            copy_database(conn, &mut target)?;
        }
        std::fs::rename(&staging, &path)?;

        tracing::trace!(database = %name, "Saved image to web store");
        Ok(())
    }
}

pub struct WebBackend {
    store: Arc<WebStore>,
}

impl WebBackend {
    pub fn new(store: WebStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn store(&self) -> &WebStore {
        &self.store
    }
}

#[async_trait]
impl Backend for WebBackend {
    fn platform(&self) -> Platform {
        Platform::Browser
    }

    async fn init_store(&self) -> Result<()> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.init()).await??;

        tracing::info!(persistent = self.store.is_persistent(), "Web store initialized");
        Ok(())
    }

    async fn open(&self, options: &ConnectionOptions) -> Result<Box<dyn Engine>> {
        let store = Arc::clone(&self.store);
        let name = options.name.clone();
        let readonly = options.readonly;

        let engine = tokio::task::spawn_blocking(move || WebEngine::open(store, name, readonly))
            .await??;

        Ok(Box::new(engine))
    }

    fn location(&self, name: &str) -> Option<PathBuf> {
        self.store.image_path(name)
    }

    fn store_root(&self) -> Option<PathBuf> {
        self.store.root().map(Path::to_path_buf)
    }
}

/// Replace the contents of `to` with the contents of `from`.
fn copy_database(from: &Connection, to: &mut Connection) -> rusqlite::Result<()> {
    Backup::new(from, to)?.run_to_completion(PAGES_PER_STEP, Duration::ZERO, None)
}

pub struct WebEngine {
    conn: Connection,
    /// Contents of the last saved image; `None` when nothing is ever saved
    saved: Option<Connection>,
    store: Arc<WebStore>,
    name: String,
}

impl WebEngine {
    fn open(store: Arc<WebStore>, name: String, readonly: bool) -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(|e| StoreError::open(&name, e))?;

        let restored = store
            .restore(&name, &mut conn)
            .map_err(|e| StoreError::open(&name, e))?;

        if readonly && !restored {
            return Err(StoreError::open(&name, "no saved image to open read-only"));
        }

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| StoreError::open(&name, e))?;
        if readonly {
            conn.pragma_update(None, "query_only", "ON")
                .map_err(|e| StoreError::open(&name, e))?;
        }

        let saved = if readonly || !store.is_persistent() {
            None
        } else {
            let mut saved =
                Connection::open_in_memory().map_err(|e| StoreError::open(&name, e))?;
            copy_database(&conn, &mut saved).map_err(|e| StoreError::open(&name, e))?;
            Some(saved)
        };

        tracing::debug!(database = %name, restored, readonly, "Opened web database");

        Ok(Self {
            conn,
            saved,
            store,
            name,
        })
    }

    /// Save after writes, but never in the middle of an open transaction.
    ///
    /// If the image cannot be saved the live database is put back to the
    /// last saved contents, so a failed write leaves nothing behind.
    fn sync(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            return Ok(());
        }
        let Some(saved) = self.saved.as_mut() else {
            return Ok(());
        };

        match self.store.persist(&self.name, &self.conn) {
            Ok(()) => {
                copy_database(&self.conn, saved)?;
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    database = %self.name,
                    error = %e,
                    "Failed to save web store image, rolling back"
                );
                copy_database(saved, &mut self.conn)?;
                Err(StoreError::Storage(format!(
                    "write to '{}' was not saved and has been rolled back: {e}",
                    self.name
                )))
            }
        }
    }
}

impl Engine for WebEngine {
    fn execute(&mut self, sql: &str) -> Result<()> {
        execute_on(&self.conn, sql)?;
        self.sync()
    }

    fn run(&mut self, sql: &str, params: &[Value]) -> Result<RunResult> {
        let result = run_on(&self.conn, sql, params)?;
        self.sync()?;
        Ok(result)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        query_on(&self.conn, sql, params)
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.sync()?;
        let WebEngine { conn, .. } = *self;
        close_on(conn)
    }
}
