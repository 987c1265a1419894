//! Connection handle
//!
//! A `Connection` is a cheap, cloneable reference to one named database
//! session. Clones share the same session. Statements run one at a time
//! on a blocking thread, so a single caller's operations complete in the
//! order they were issued.

use parking_lot::Mutex;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::{Engine, Row, RunResult};
use crate::error::StoreError;
use crate::Result;

/// The only encryption mode in scope.
pub const NO_ENCRYPTION: &str = "no-encryption";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    pub name: String,
    pub encrypted: bool,
    pub mode: String,
    /// Schema version the application expects
    pub version: i32,
    pub readonly: bool,
}

impl ConnectionOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            encrypted: false,
            mode: NO_ENCRYPTION.to_string(),
            version: 1,
            readonly: false,
        }
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn with_encryption(mut self, encrypted: bool, mode: impl Into<String>) -> Self {
        self.encrypted = encrypted;
        self.mode = mode.into();
        self
    }

    pub fn wants_encryption(&self) -> bool {
        self.encrypted || self.mode != NO_ENCRYPTION
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Created,
    Open,
    Closed,
}

enum Slot {
    Created,
    Open(Box<dyn Engine>),
    Closed,
}

impl Slot {
    fn state(&self) -> ConnectionState {
        match self {
            Slot::Created => ConnectionState::Created,
            Slot::Open(_) => ConnectionState::Open,
            Slot::Closed => ConnectionState::Closed,
        }
    }
}

struct Inner {
    options: ConnectionOptions,
    slot: Mutex<Slot>,
}

pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    pub(crate) fn new(options: ConnectionOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                slot: Mutex::new(Slot::Created),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.options.name
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.inner.options
    }

    pub fn version(&self) -> i32 {
        self.inner.options.version
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.options.readonly
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.slot.lock().state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Whether both handles refer to the same session.
    pub fn same_session(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run one or more statements without parameters.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.with_engine(move |engine| engine.execute(&sql)).await
    }

    /// Run one write statement with bound parameters.
    pub async fn run(&self, sql: &str, params: Vec<Value>) -> Result<RunResult> {
        let sql = sql.to_string();
        self.with_engine(move |engine| engine.run(&sql, &params))
            .await
    }

    /// Run one read statement with bound parameters.
    pub async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        let sql = sql.to_string();
        self.with_engine(move |engine| engine.query(&sql, &params))
            .await
    }

    async fn with_engine<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Engine) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);

        tokio::task::spawn_blocking(move || {
            let mut slot = inner.slot.lock();
            match &mut *slot {
                Slot::Open(engine) => f(engine.as_mut()),
                Slot::Created => Err(StoreError::Storage(format!(
                    "connection '{}' has not been opened",
                    inner.options.name
                ))),
                Slot::Closed => Err(StoreError::ClosedConnection(inner.options.name.clone())),
            }
        })
        .await?
    }

    /// Install an opened engine. Hands it back if the handle is not in the
    /// `Created` state.
    pub(crate) fn attach(
        &self,
        engine: Box<dyn Engine>,
    ) -> std::result::Result<(), Box<dyn Engine>> {
        let mut slot = self.inner.slot.lock();
        match *slot {
            Slot::Created => {
                *slot = Slot::Open(engine);
                Ok(())
            }
            _ => Err(engine),
        }
    }

    /// Mark the handle closed, returning the previous state and the engine
    /// if it was open.
    pub(crate) fn detach(&self) -> (ConnectionState, Option<Box<dyn Engine>>) {
        let mut slot = self.inner.slot.lock();
        let previous = std::mem::replace(&mut *slot, Slot::Closed);
        let state = previous.state();
        match previous {
            Slot::Open(engine) => (state, Some(engine)),
            _ => (state, None),
        }
    }
}

impl Clone for Connection {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("options", &self.inner.options)
            .field("state", &self.state())
            .finish()
    }
}
