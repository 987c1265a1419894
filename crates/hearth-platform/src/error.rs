//! Platform error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Storage component <{tag}> was not ready within {timeout:?}")]
    Timeout { tag: String, timeout: Duration },

    #[error("A process-wide readiness gate is already installed")]
    AlreadyInstalled,
}
