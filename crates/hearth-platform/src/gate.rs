//! Storage readiness gate
//!
//! On the browser the storage-emulation component must be mounted and
//! defined before any connection work starts. The gate turns that into a
//! one-shot token: set the first time the component is observed ready,
//! read-only for the rest of the process. On native it is always open.
//!
//! The gate has no retry policy and no failure mode of its own. If the
//! component never registers, `await_ready` never resolves; use
//! `await_ready_within` to bound the wait.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::error::PlatformError;
use crate::platform::Platform;
use crate::registry::{ComponentRegistry, ElementRegistry, STORE_ELEMENT_TAG};
use crate::Result;

static GLOBAL: OnceLock<Arc<ReadinessGate>> = OnceLock::new();

/// Proof that the storage backend was observed ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    _private: (),
}

pub struct ReadinessGate {
    platform: Platform,
    registry: Arc<dyn ComponentRegistry>,
    tag: String,
    token: OnceLock<()>,
}

impl ReadinessGate {
    pub fn new(platform: Platform, registry: Arc<dyn ComponentRegistry>) -> Self {
        Self {
            platform,
            registry,
            tag: STORE_ELEMENT_TAG.to_string(),
            token: OnceLock::new(),
        }
    }

    /// Gate for a native process; never waits.
    pub fn native() -> Self {
        Self::new(Platform::Native, Arc::new(ElementRegistry::new()))
    }

    /// Watch a different component tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn registry(&self) -> &Arc<dyn ComponentRegistry> {
        &self.registry
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_ready(&self) -> bool {
        self.platform.is_native_platform() || self.token.get().is_some()
    }

    /// Wait until the storage component is mounted and defined.
    pub async fn await_ready(&self) -> Ready {
        if self.is_ready() {
            return Ready { _private: () };
        }

        tracing::debug!(tag = %self.tag, "Waiting for storage component");

        if !self.registry.is_mounted(&self.tag) {
            self.registry.when_mounted(&self.tag).await;
        }
        if !self.registry.is_defined(&self.tag) {
            self.registry.when_defined(&self.tag).await;
        }

        if self.token.set(()).is_ok() {
            tracing::info!(tag = %self.tag, "Storage component ready");
        }

        Ready { _private: () }
    }

    /// `await_ready` bounded by `timeout`.
    pub async fn await_ready_within(&self, timeout: Duration) -> Result<Ready> {
        tokio::time::timeout(timeout, self.await_ready())
            .await
            .map_err(|_| {
                tracing::error!(
                    tag = %self.tag,
                    timeout_ms = timeout.as_millis() as u64,
                    "Storage component never became ready"
                );
                PlatformError::Timeout {
                    tag: self.tag.clone(),
                    timeout,
                }
            })
    }

    /// Make `gate` the process-wide instance. Allowed once per process.
    pub fn install(gate: Arc<ReadinessGate>) -> Result<Arc<ReadinessGate>> {
        GLOBAL
            .set(Arc::clone(&gate))
            .map_err(|_| PlatformError::AlreadyInstalled)?;
        Ok(gate)
    }

    pub fn global() -> Option<Arc<ReadinessGate>> {
        GLOBAL.get().cloned()
    }
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("platform", &self.platform)
            .field("tag", &self.tag)
            .field("ready", &self.is_ready())
            .finish()
    }
}
