//! Hearth Platform Layer
//!
//! Decides which storage strategy a process runs on and, for the browser,
//! holds back connection work until the storage-emulation component exists.
//!
//! - The platform is detected once and never changes for the process.
//! - The readiness token is set exactly once and never reset.

mod error;
mod gate;
mod platform;
mod registry;

pub use error::PlatformError;
pub use gate::{ReadinessGate, Ready};
pub use platform::{current_platform, init_platform, Platform, PLATFORM_ENV_VAR};
pub use registry::{ComponentRegistry, ElementRegistry, STORE_ELEMENT_TAG};

pub type Result<T> = std::result::Result<T, PlatformError>;
