//! Connection Manager
//!
//! Owns every named connection and the platform strategy behind them.
//! On the browser, connections can only be opened once the readiness gate
//! has resolved and the web store has been initialized.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

use hearth_platform::{Platform, ReadinessGate};

use crate::backend::Backend;
use crate::connection::{Connection, ConnectionOptions, ConnectionState};
use crate::error::StoreError;
use crate::shared;
use crate::Result;

pub struct ConnectionManager {
    backend: Arc<dyn Backend>,
    gate: Arc<ReadinessGate>,
    /// Registered handles by database name
    connections: Arc<RwLock<HashMap<String, Connection>>>,
    /// Set once the web store has been initialized, shared per store root
    web_store: Arc<OnceCell<()>>,
}

impl ConnectionManager {
    pub fn new(backend: Arc<dyn Backend>, gate: Arc<ReadinessGate>) -> Self {
        if backend.platform() != gate.platform() {
            tracing::warn!(
                backend = %backend.platform(),
                gate = %gate.platform(),
                "Backend and readiness gate disagree on platform"
            );
        }

        let web_store = shared::web_store_cell(backend.store_root());

        Self {
            backend,
            gate,
            connections: Arc::new(RwLock::new(HashMap::new())),
            web_store,
        }
    }

    pub fn platform(&self) -> Platform {
        self.backend.platform()
    }

    pub fn is_web_store_initialized(&self) -> bool {
        self.platform().is_native_platform() || self.web_store.initialized()
    }

    /// Register a new handle. No I/O happens here.
    pub fn create_connection(&self, options: ConnectionOptions) -> Result<Connection> {
        validate_name(&options.name)?;

        let mut connections = self.connections.write();

        if let Some(existing) = connections.get(&options.name) {
            if existing.is_open() {
                return Err(StoreError::DuplicateConnection(options.name));
            }
            tracing::debug!(
                database = %options.name,
                state = ?existing.state(),
                "Replacing unopened connection"
            );
        }

        let name = options.name.clone();
        let conn = Connection::new(options);
        connections.insert(name, conn.clone());

        tracing::info!(
            database = %conn.name(),
            version = conn.version(),
            readonly = conn.is_readonly(),
            "Created connection"
        );

        Ok(conn)
    }

    /// Prepare the web store. Only the first successful call does any work;
    /// later and concurrent calls wait for it and return. Skipped on native.
    pub async fn init_web_store(&self) -> Result<()> {
        if self.platform().is_native_platform() {
            tracing::debug!("Native platform, no web store to initialize");
            return Ok(());
        }

        if !self.gate.is_ready() {
            return Err(StoreError::NotReady(format!(
                "storage component <{}> is not registered yet",
                self.gate.tag()
            )));
        }

        self.web_store
            .get_or_try_init(|| async { self.backend.init_store().await })
            .await?;

        Ok(())
    }

    /// Open `conn`. Opening an already open handle is a no-op.
    pub async fn open(&self, conn: &Connection) -> Result<()> {
        self.check_ready()?;

        match conn.state() {
            ConnectionState::Open => {
                tracing::debug!(database = %conn.name(), "Connection already open");
                return Ok(());
            }
            ConnectionState::Closed => {
                return Err(StoreError::ClosedConnection(conn.name().to_string()));
            }
            ConnectionState::Created => {}
        }

        self.check_registered(conn)?;

        if conn.options().wants_encryption() {
            return Err(StoreError::open(
                conn.name(),
                format!("encryption mode '{}' is not supported", conn.options().mode),
            ));
        }

        let location = self.backend.location(conn.name());
        if let Some(path) = &location {
            if !shared::claim(path) {
                return Err(StoreError::DuplicateConnection(conn.name().to_string()));
            }
        }

        let engine = match self.backend.open(conn.options()).await {
            Ok(engine) => engine,
            Err(e) => {
                release(location.as_ref());
                return Err(e);
            }
        };

        // create_connection may have replaced the handle while the engine opened
        let attached = {
            let connections = self.connections.write();
            match connections.get(conn.name()) {
                Some(registered) if registered.same_session(conn) => conn.attach(engine),
                _ => Err(engine),
            }
        };

        if let Err(engine) = attached {
            drop(engine);
            release(location.as_ref());
            return match conn.state() {
                ConnectionState::Closed => {
                    Err(StoreError::ClosedConnection(conn.name().to_string()))
                }
                ConnectionState::Open => Ok(()),
                ConnectionState::Created => Err(StoreError::open(
                    conn.name(),
                    "handle was replaced while it was opening",
                )),
            };
        }

        tracing::info!(
            database = %conn.name(),
            platform = %self.platform(),
            "Opened connection"
        );

        Ok(())
    }

    /// Close `conn` and forget it. Closing an already closed handle is a
    /// logged no-op.
    pub async fn close(&self, conn: &Connection) -> Result<()> {
        let (previous, engine) = conn.detach();

        {
            let mut connections = self.connections.write();
            if connections
                .get(conn.name())
                .is_some_and(|registered| registered.same_session(conn))
            {
                connections.remove(conn.name());
            }
        }

        match (previous, engine) {
            (ConnectionState::Closed, _) => {
                tracing::warn!(database = %conn.name(), "Connection already closed");
                Ok(())
            }
            (_, Some(engine)) => {
                let closed = tokio::task::spawn_blocking(move || engine.close()).await;
                release(self.backend.location(conn.name()).as_ref());
                closed??;
                tracing::info!(database = %conn.name(), "Closed connection");
                Ok(())
            }
            (_, None) => {
                tracing::debug!(database = %conn.name(), "Closed connection that was never opened");
                Ok(())
            }
        }
    }

    pub fn retrieve_connection(&self, name: &str) -> Option<Connection> {
        self.connections.read().get(name).cloned()
    }

    pub fn is_connection(&self, name: &str) -> bool {
        self.connections.read().contains_key(name)
    }

    /// Close the connection registered under `name`. Returns whether one existed.
    pub async fn close_connection(&self, name: &str) -> Result<bool> {
        match self.retrieve_connection(name) {
            Some(conn) => {
                self.close(&conn).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close every registered connection, reporting the first failure.
    pub async fn close_all(&self) -> Result<()> {
        let connections: Vec<Connection> = self.connections.read().values().cloned().collect();

        let mut first_error = None;
        for conn in connections {
            if let Err(e) = self.close(&conn).await {
                tracing::error!(database = %conn.name(), error = %e, "Failed to close connection");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn check_ready(&self) -> Result<()> {
        if self.platform().is_native_platform() {
            return Ok(());
        }

        if !self.gate.is_ready() {
            return Err(StoreError::NotReady(format!(
                "storage component <{}> is not registered yet",
                self.gate.tag()
            )));
        }

        if !self.web_store.initialized() {
            return Err(StoreError::NotReady(
                "web store has not been initialized".to_string(),
            ));
        }

        Ok(())
    }

    fn check_registered(&self, conn: &Connection) -> Result<()> {
        match self.connections.read().get(conn.name()) {
            Some(registered) if registered.same_session(conn) => Ok(()),
            Some(registered) if registered.is_open() => {
                Err(StoreError::DuplicateConnection(conn.name().to_string()))
            }
            _ => Err(StoreError::open(
                conn.name(),
                "handle is no longer registered with this manager",
            )),
        }
    }
}

fn release(location: Option<&PathBuf>) {
    if let Some(path) = location {
        shared::release(path);
    }
}

/// Names become file names, so they must not reach outside the data directory.
fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StoreError::open(name, "database name cannot be empty"));
    }
    if name.contains(|c: char| c == '/' || c == '\\' || c == '\0') {
        return Err(StoreError::open(
            name,
            "database name must not contain path separators",
        ));
    }
    Ok(())
}

impl Clone for ConnectionManager {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            gate: Arc::clone(&self.gate),
            connections: Arc::clone(&self.connections),
            web_store: Arc::clone(&self.web_store),
        }
    }
}
