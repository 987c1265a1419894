//! Custom component registry
//!
//! Models the browser's custom element registry: a component is *defined*
//! once its class finished registering and *mounted* once an instance is
//! attached to the document. The two happen independently and in any order.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::watch;

/// Tag of the storage-emulation component the browser backend depends on.
pub const STORE_ELEMENT_TAG: &str = "jeep-sqlite";

#[async_trait]
pub trait ComponentRegistry: Send + Sync {
    fn is_defined(&self, tag: &str) -> bool;

    fn is_mounted(&self, tag: &str) -> bool;

    /// Resolves once `tag` is defined. Never resolves otherwise.
    async fn when_defined(&self, tag: &str);

    /// Resolves once an instance of `tag` is mounted. Never resolves otherwise.
    async fn when_mounted(&self, tag: &str);
}

#[derive(Debug, Default)]
struct RegistryState {
    defined: HashSet<String>,
    /// Instance count per tag
    mounted: HashMap<String, usize>,
}

/// In-process registry driven by the host shell.
pub struct ElementRegistry {
    state: watch::Sender<RegistryState>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        let (state, _) = watch::channel(RegistryState::default());
        Self { state }
    }

    /// Complete the definition handshake for `tag`.
    ///
    /// Returns `false` if it was already defined.
    pub fn define(&self, tag: &str) -> bool {
        let mut added = false;
        self.state.send_if_modified(|state| {
            added = state.defined.insert(tag.to_string());
            added
        });

        if added {
            tracing::debug!(tag = %tag, "Component defined");
        }
        added
    }

    /// Attach the single instance of `tag` to the document.
    ///
    /// Only the first mount counts; later ones are logged and ignored.
    pub fn mount(&self, tag: &str) -> bool {
        let mut first = false;
        self.state.send_if_modified(|state| {
            let count = state.mounted.entry(tag.to_string()).or_insert(0);
            *count += 1;
            first = *count == 1;
            first
        });

        if first {
            tracing::debug!(tag = %tag, "Component mounted");
        } else {
            tracing::warn!(tag = %tag, "Component already mounted, ignoring extra instance");
        }
        first
    }

    async fn wait_until<F>(&self, condition: F)
    where
        F: Fn(&RegistryState) -> bool + Send,
    {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this only fails if the
        // registry is being torn down; stay pending in that case.
        let closed = rx.wait_for(|state| condition(state)).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for ElementRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComponentRegistry for ElementRegistry {
    fn is_defined(&self, tag: &str) -> bool {
        self.state.borrow().defined.contains(tag)
    }

    fn is_mounted(&self, tag: &str) -> bool {
        self.state
            .borrow()
            .mounted
            .get(tag)
            .is_some_and(|count| *count > 0)
    }

    async fn when_defined(&self, tag: &str) {
        self.wait_until(|state| state.defined.contains(tag)).await;
    }

    async fn when_mounted(&self, tag: &str) {
        self.wait_until(|state| state.mounted.get(tag).is_some_and(|count| *count > 0))
            .await;
    }
}
