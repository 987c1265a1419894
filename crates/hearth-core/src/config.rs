//! Store configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hearth_platform::Platform;
use hearth_storage::{ConnectionOptions, StorageConfig};

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logical database name
    pub database_name: String,
    /// Schema version recorded by the bootstrapper
    pub schema_version: i32,
    /// Open the database read-only
    pub readonly: bool,
    /// Directory for native database files; in memory when unset
    pub data_dir: Option<PathBuf>,
    /// Storage area for the browser's web store; ephemeral when unset
    pub web_store_dir: Option<PathBuf>,
    /// Force a platform instead of detecting it
    pub platform: Option<Platform>,
    /// How long to wait for the browser storage component
    pub readiness_timeout_ms: u64,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_name: "hearth".to_string(),
            schema_version: 1,
            readonly: false,
            web_store_dir: Some(data_dir.join("webstore")),
            data_dir: Some(data_dir),
            platform: None,
            readiness_timeout_ms: 10_000,
        }
    }

    /// Everything in memory; nothing touches the disk.
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            web_store_dir: None,
            ..Self::new(PathBuf::new())
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Hearth"))
            .unwrap_or_else(|| PathBuf::from(".hearth"))
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_name.trim().is_empty() {
            return Err(CoreError::Config("database_name cannot be empty".to_string()));
        }
        if self
            .database_name
            .contains(|c: char| c == '/' || c == '\\' || c == '\0')
        {
            return Err(CoreError::Config(format!(
                "database_name '{}' must not contain path separators",
                self.database_name
            )));
        }
        if self.schema_version < 1 {
            return Err(CoreError::Config("schema_version must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn storage(&self) -> StorageConfig {
        StorageConfig {
            data_dir: self.data_dir.clone(),
            web_store_dir: self.web_store_dir.clone(),
        }
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions::new(self.database_name.clone())
            .with_version(self.schema_version)
            .readonly(self.readonly)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

// Per-OS application data directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(
            target_os = "windows",
            target_os = "macos",
            target_os = "linux",
            target_os = "android"
        )))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::new(PathBuf::from("/data"));
        assert_eq!(config.database_name, "hearth");
        assert_eq!(config.data_dir, Some(PathBuf::from("/data")));
        assert_eq!(config.web_store_dir, Some(PathBuf::from("/data/webstore")));
        assert_eq!(config.readiness_timeout(), Duration::from_secs(10));
        config.validate().unwrap();

        let options = config.connection_options();
        assert_eq!(options.name, "hearth");
        assert_eq!(options.version, 1);
        assert!(!options.wants_encryption());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hearth.json");
        std::fs::write(
            &path,
            r#"{ "database_name": "crm", "platform": "browser", "readiness_timeout_ms": 250 }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_name, "crm");
        assert_eq!(config.platform, Some(Platform::Browser));
        assert_eq!(config.readiness_timeout(), Duration::from_millis(250));
        assert_eq!(config.schema_version, 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/hearth.json");
        let mut config = Config::new(dir.path().to_path_buf());
        config.schema_version = 4;
        config.readonly = true;

        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let mut config = Config::in_memory();
        config.database_name = "  ".to_string();
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        config.database_name = "../escape".to_string();
        assert!(config.validate().is_err());

        config.database_name = "ok".to_string();
        config.schema_version = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
