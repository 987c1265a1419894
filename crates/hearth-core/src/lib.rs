//! Hearth Core
//!
//! Startup sequence for the local store: detect the platform, wait for the
//! storage component (browser), initialize the web store, open the
//! connection, bootstrap the schema, then hand out the user records layer.

mod config;
mod error;
mod hearth;

pub use config::Config;
pub use error::CoreError;
pub use hearth::Hearth;

// Re-export core components
pub use hearth_platform::{
    current_platform, ComponentRegistry, ElementRegistry, Platform, PlatformError,
    ReadinessGate, Ready, STORE_ELEMENT_TAG,
};
pub use hearth_storage::{
    Connection, ConnectionManager, ConnectionOptions, ConnectionState, StoreError,
};
pub use hearth_users::{User, UserId, UserManager};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
