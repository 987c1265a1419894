//! Hearth Storage Layer
//!
//! One connection API over two SQLite strategies: a native on-device
//! database file, or an in-memory database whose image is persisted into
//! the browser's web store.
//!
//! Lifecycle: `create_connection` -> `open` -> `ensure_schema`, after which
//! the handle is shared read-only with the data access layer. Only the
//! `ConnectionManager` closes handles.

mod backend;
mod connection;
mod engine;
mod error;
mod manager;
mod native;
mod schema;
mod shared;
mod web;

pub use backend::{backend_for, Backend, StorageConfig};
pub use connection::{Connection, ConnectionOptions, ConnectionState, NO_ENCRYPTION};
pub use engine::{Engine, Row, RunResult};
pub use error::StoreError;
pub use manager::ConnectionManager;
pub use native::NativeBackend;
pub use schema::{ensure_schema, USERS_TABLE};
pub use web::{WebBackend, WebStore};

pub use rusqlite::types::Value;

pub type Result<T> = std::result::Result<T, StoreError>;
