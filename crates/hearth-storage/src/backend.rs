//! Platform storage strategies

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use hearth_platform::Platform;

use crate::connection::ConnectionOptions;
use crate::engine::Engine;
use crate::native::NativeBackend;
use crate::web::{WebBackend, WebStore};
use crate::Result;

/// The capability set that differs between platforms.
#[async_trait]
pub trait Backend: Send + Sync {
    fn platform(&self) -> Platform;

    /// One-time preparation of the backing store.
    async fn init_store(&self) -> Result<()>;

    /// Open the database described by `options`.
    ///
    /// Failures to open are reported as `StoreError::Open`.
    async fn open(&self, options: &ConnectionOptions) -> Result<Box<dyn Engine>>;

    /// Where the database called `name` is kept, if it outlives the process.
    fn location(&self, name: &str) -> Option<PathBuf>;

    /// Root of the backing store, if it outlives the process.
    fn store_root(&self) -> Option<PathBuf> {
        None
    }
}

/// Where each backend keeps its data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for native database files; in memory when unset
    pub data_dir: Option<PathBuf>,
    /// Storage area for web store images; ephemeral when unset
    pub web_store_dir: Option<PathBuf>,
}

/// Pick the strategy for `platform`. Called once at startup.
pub fn backend_for(platform: Platform, config: &StorageConfig) -> Arc<dyn Backend> {
    tracing::debug!(platform = %platform, "Selecting storage backend");

    match platform {
        Platform::Native => match &config.data_dir {
            Some(dir) => Arc::new(NativeBackend::new(dir.clone())),
            None => Arc::new(NativeBackend::in_memory()),
        },
        Platform::Browser => {
            let store = match &config.web_store_dir {
                Some(dir) => WebStore::new(dir.clone()),
                None => WebStore::ephemeral(),
            };
            Arc::new(WebBackend::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_matches_platform() {
        let config = StorageConfig::default();
        assert_eq!(
            backend_for(Platform::Native, &config).platform(),
            Platform::Native
        );
        assert_eq!(
            backend_for(Platform::Browser, &config).platform(),
            Platform::Browser
        );
    }
}
