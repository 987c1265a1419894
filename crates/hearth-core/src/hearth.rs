//! Store startup and ownership
//!
//! `Hearth` runs the startup sequence in order and owns the result: the
//! connection manager, the one open connection, and the user records layer
//! built on it. The presentation layer only ever talks to `users()`.

use std::sync::Arc;

use hearth_platform::{init_platform, ComponentRegistry, Platform, ReadinessGate};
use hearth_storage::{backend_for, ensure_schema, Connection, ConnectionManager};
use hearth_users::UserManager;

use crate::config::Config;
use crate::Result;

pub struct Hearth {
    config: Config,
    manager: ConnectionManager,
    connection: Connection,
    users: UserManager,
}

impl Hearth {
    /// Start against the process-wide readiness gate.
    ///
    /// The first call installs a gate for the detected platform watching
    /// `registry`; later calls reuse it.
    pub async fn start(config: Config, registry: Arc<dyn ComponentRegistry>) -> Result<Self> {
        config.validate()?;

        let gate = match ReadinessGate::global() {
            Some(gate) => {
                if let Some(conflict) = installed_gate_conflict(&gate, config.platform, &registry) {
                    tracing::warn!(
                        installed = %gate.platform(),
                        conflict,
                        "Readiness gate already installed, keeping it"
                    );
                }
                gate
            }
            None => {
                let platform = init_platform(config.platform);
                let gate = Arc::new(ReadinessGate::new(platform, registry));
                // Lost an install race: use whichever gate won
                ReadinessGate::install(Arc::clone(&gate))
                    .ok()
                    .or_else(ReadinessGate::global)
                    .unwrap_or(gate)
            }
        };

        Self::start_with_gate(config, gate).await
    }

    /// Start against an explicit gate; its platform selects the backend.
    pub async fn start_with_gate(config: Config, gate: Arc<ReadinessGate>) -> Result<Self> {
        config.validate()?;
        let platform = gate.platform();

        tracing::info!(
            platform = %platform,
            database = %config.database_name,
            "Starting local store"
        );

        gate.await_ready_within(config.readiness_timeout()).await?;

        let manager = ConnectionManager::new(backend_for(platform, &config.storage()), gate);
        manager.init_web_store().await?;

        let connection = manager.create_connection(config.connection_options())?;
        manager.open(&connection).await?;

        if let Err(e) = ensure_schema(&connection).await {
            tracing::error!(database = %connection.name(), error = %e, "Schema bootstrap failed");
            if let Err(close_err) = manager.close(&connection).await {
                tracing::warn!(error = %close_err, "Failed to close connection after bootstrap error");
            }
            return Err(e.into());
        }

        let users = UserManager::new(connection.clone());

        tracing::info!(database = %connection.name(), "Local store ready");

        Ok(Self {
            config,
            manager,
            connection,
            users,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn platform(&self) -> Platform {
        self.manager.platform()
    }

    pub fn users(&self) -> &UserManager {
        &self.users
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Close every connection this store opened.
    pub async fn shutdown(&self) -> Result<()> {
        self.manager.close_all().await?;
        tracing::info!(database = %self.config.database_name, "Local store shut down");
        Ok(())
    }
}

/// How the requested startup differs from the gate already installed.
fn installed_gate_conflict(
    gate: &ReadinessGate,
    platform: Option<Platform>,
    registry: &Arc<dyn ComponentRegistry>,
) -> Option<&'static str> {
    let platform_differs = platform.is_some_and(|p| p != gate.platform());
    let registry_differs = !Arc::ptr_eq(gate.registry(), registry);

    match (platform_differs, registry_differs) {
        (true, true) => Some("platform and registry differ"),
        (true, false) => Some("platform differs"),
        (false, true) => Some("registry differs"),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use hearth_platform::{ElementRegistry, PlatformError, STORE_ELEMENT_TAG};
    use hearth_storage::{ConnectionState, StoreError};
    use std::time::Duration;
    use tempfile::TempDir;

    fn browser_gate() -> (Arc<ReadinessGate>, Arc<ElementRegistry>) {
        let registry = Arc::new(ElementRegistry::new());
        let gate = Arc::new(ReadinessGate::new(Platform::Browser, registry.clone()));
        (gate, registry)
    }

    fn mount_store(registry: &ElementRegistry) {
        registry.define(STORE_ELEMENT_TAG);
        registry.mount(STORE_ELEMENT_TAG);
    }

    #[tokio::test]
    async fn test_native_start_in_memory() {
        let hearth = Hearth::start_with_gate(Config::in_memory(), Arc::new(ReadinessGate::native()))
            .await
            .unwrap();
        assert_eq!(hearth.platform(), Platform::Native);
        assert!(hearth.connection().is_open());

        let id = hearth.users().add("Ada", "ada@x.io").await.unwrap();
        let users = hearth.users().list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, id);

        hearth.shutdown().await.unwrap();
        assert_eq!(hearth.connection().state(), ConnectionState::Closed);
        assert!(matches!(
            hearth.users().list().await,
            Err(StoreError::ClosedConnection(_))
        ));
    }

    #[tokio::test]
    async fn test_native_data_persists_across_restarts() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path().to_path_buf());

        let first = Hearth::start_with_gate(config.clone(), Arc::new(ReadinessGate::native()))
            .await
            .unwrap();
        first.users().add("Ada", "ada@x.io").await.unwrap();
        first.shutdown().await.unwrap();

        let second = Hearth::start_with_gate(config, Arc::new(ReadinessGate::native()))
            .await
            .unwrap();
        let users = second.users().list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "ada@x.io");
    }

    #[tokio::test]
    async fn test_browser_start_waits_for_component() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path().to_path_buf());
        let (gate, registry) = browser_gate();

        let starting = tokio::spawn(Hearth::start_with_gate(config, gate));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!starting.is_finished());

        mount_store(&registry);
        let hearth = tokio::time::timeout(Duration::from_secs(2), starting)
            .await
            .expect("startup should finish once the component is ready")
            .unwrap()
            .unwrap();

        assert_eq!(hearth.platform(), Platform::Browser);
        assert!(hearth.manager().is_web_store_initialized());
        hearth.users().add("Grace", "grace@x.io").await.unwrap();
        assert!(dir.path().join("webstore/hearthSQLite.db").exists());
    }

    #[tokio::test]
    async fn test_browser_data_persists_in_web_store() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path().to_path_buf());

        {
            let (gate, registry) = browser_gate();
            mount_store(&registry);
            let hearth = Hearth::start_with_gate(config.clone(), gate).await.unwrap();
            hearth.users().add("Ada", "ada@x.io").await.unwrap();
            hearth.shutdown().await.unwrap();
        }

        let (gate, registry) = browser_gate();
        mount_store(&registry);
        let hearth = Hearth::start_with_gate(config, gate).await.unwrap();
        let users = hearth.users().list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Ada");
    }

    #[tokio::test]
    async fn test_browser_start_times_out_without_component() {
        let mut config = Config::in_memory();
        config.readiness_timeout_ms = 50;
        let (gate, _registry) = browser_gate();

        let err = Hearth::start_with_gate(config, gate).await.err().unwrap();
        assert!(matches!(
            err,
            CoreError::Platform(PlatformError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_any_work() {
        let mut config = Config::in_memory();
        config.database_name = String::new();

        let err = Hearth::start_with_gate(config, Arc::new(ReadinessGate::native()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[tokio::test]
    async fn test_start_uses_process_gate() {
        let registry = Arc::new(ElementRegistry::new());
        mount_store(&registry);

        let mut config = Config::in_memory();
        config.database_name = "global".to_string();
        let hearth = Hearth::start(config, registry).await.unwrap();

        assert!(ReadinessGate::global().is_some());
        assert_eq!(hearth.platform(), ReadinessGate::global().unwrap().platform());
        hearth.shutdown().await.unwrap();
    }

    #[test]
    fn test_installed_gate_conflicts() {
        let registry: Arc<dyn ComponentRegistry> = Arc::new(ElementRegistry::new());
        let gate = ReadinessGate::new(Platform::Native, Arc::clone(&registry));

        assert_eq!(installed_gate_conflict(&gate, None, &registry), None);
        assert_eq!(
            installed_gate_conflict(&gate, Some(Platform::Native), &registry),
            None
        );
        assert_eq!(
            installed_gate_conflict(&gate, Some(Platform::Browser), &registry),
            Some("platform differs")
        );

        let other: Arc<dyn ComponentRegistry> = Arc::new(ElementRegistry::new());
        assert_eq!(
            installed_gate_conflict(&gate, None, &other),
            Some("registry differs")
        );
        assert_eq!(
            installed_gate_conflict(&gate, Some(Platform::Browser), &other),
            Some("platform and registry differ")
        );
    }

    #[tokio::test]
    async fn test_second_store_over_same_data_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path().to_path_buf());

        let (gate, registry) = browser_gate();
        mount_store(&registry);
        let first = Hearth::start_with_gate(config.clone(), gate).await.unwrap();

        let (gate, registry) = browser_gate();
        mount_store(&registry);
        let err = Hearth::start_with_gate(config.clone(), gate)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            CoreError::Store(StoreError::DuplicateConnection(_))
        ));

        first.users().add("Ada", "ada@x.io").await.unwrap();
        first.shutdown().await.unwrap();

        let (gate, registry) = browser_gate();
        mount_store(&registry);
        let second = Hearth::start_with_gate(config, gate).await.unwrap();
        assert_eq!(second.users().count().await.unwrap(), 1);
        second.shutdown().await.unwrap();
    }
}
