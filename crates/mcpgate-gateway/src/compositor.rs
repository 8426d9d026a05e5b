//! Gateway Compositor
//!
//! Mounts registered resources onto the aggregate gateway as namespaced
//! proxies, and owns the name → position table the aggregate itself cannot
//! provide.
//!
//! Per-name state machine:
//!
//! ```text
//!   UNMOUNTED ──mount──▶ MOUNTED ◀──enable/disable──▶ DISABLED
//!       ▲                   │                            │
//!       └─────unmount───────┴────────────────────────────┘
//! ```
//!
//! Every mutation runs under one async mutex, held across proxy construction,
//! so concurrent callers queue instead of interleaving with each other.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use mcpgate_core::ServerResource;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::aggregate::{AggregateError, AggregateGateway};
use crate::proxy::{ProxyFactory, TransportProxyFactory};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositorError {
    #[error("Server '{0}' is already mounted. Unmount it first to re-mount.")]
    AlreadyMounted(String),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// What `mount_server` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted { position: usize },
    /// `is_enabled` was false
    SkippedDisabled,
    /// No proxy could be built for the resource
    SkippedInvalid(String),
}

impl MountOutcome {
    pub fn is_mounted(&self) -> bool {
        matches!(self, MountOutcome::Mounted { .. })
    }
}

/// Bookkeeping for one mounted resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountEntry {
    pub name: String,
    /// Index of this resource's proxy in the aggregate
    pub position: usize,
    /// Hidden from the aggregate without being removed
    pub disabled: bool,
}

/// The mount/unmount seam used by lifecycle orchestration
#[async_trait]
pub trait Compositor: Send + Sync {
    async fn mount_server(&self, resource: &ServerResource)
        -> Result<MountOutcome, CompositorError>;

    async fn unmount_server(&self, name: &str) -> Result<(), CompositorError>;

    /// Names currently tracked, disabled ones included
    async fn mounted_names(&self) -> BTreeSet<String>;
}

struct CompositorState {
    aggregate: Box<dyn AggregateGateway>,
    mounts: HashMap<String, MountEntry>,
}

pub struct GatewayCompositor {
    state: Mutex<CompositorState>,
    factory: Arc<dyn ProxyFactory>,
}

impl GatewayCompositor {
    pub fn new(aggregate: Box<dyn AggregateGateway>) -> Self {
        Self::with_factory(aggregate, Arc::new(TransportProxyFactory))
    }

    pub fn with_factory(aggregate: Box<dyn AggregateGateway>, factory: Arc<dyn ProxyFactory>) -> Self {
        Self {
            state: Mutex::new(CompositorState {
                aggregate,
                mounts: HashMap::new(),
            }),
            factory,
        }
    }

    /// Mount `resource` under its name.
    ///
    /// Disabled resources and resources no proxy can be built for are skipped
    /// without error. Mounting a tracked name fails with `AlreadyMounted` and
    /// changes nothing.
    pub async fn mount_server(
        &self,
        resource: &ServerResource,
    ) -> Result<MountOutcome, CompositorError> {
        let mut state = self.state.lock().await;

        if !resource.is_enabled {
            debug!(server = %resource.name, "[Compositor] Skipping disabled resource");
            return Ok(MountOutcome::SkippedDisabled);
        }

        if state.mounts.contains_key(&resource.name) {
            return Err(CompositorError::AlreadyMounted(resource.name.clone()));
        }

        let proxy = match self.factory.build(resource).await {
            Ok(proxy) => proxy,
            Err(e) => {
                warn!(
                    server = %resource.name,
                    error = %e,
                    "[Compositor] Cannot build proxy, skipping mount"
                );
                return Ok(MountOutcome::SkippedInvalid(e.to_string()));
            }
        };

        let description = proxy.description();
        let position = state.aggregate.append(proxy, &resource.name)?;
        state.mounts.insert(
            resource.name.clone(),
            MountEntry {
                name: resource.name.clone(),
                position,
                disabled: false,
            },
        );

        info!(
            server = %resource.name,
            position,
            proxy = %description,
            "[Compositor] Mounted server"
        );
        Ok(MountOutcome::Mounted { position })
    }

    /// Remove `name` from the aggregate. Untracked names are a no-op.
    ///
    /// Entries mounted after the removed one move down by one position. A
    /// recorded position beyond the aggregate's length means the aggregate
    /// was mutated behind our back: the entry is dropped from tracking and
    /// nothing is popped.
    pub async fn unmount_server(&self, name: &str) -> Result<(), CompositorError> {
        let mut state = self.state.lock().await;

        let Some(entry) = state.mounts.remove(name) else {
            return Ok(());
        };

        let removed = entry.position;
        let len = state.aggregate.len();
        if removed >= len {
            warn!(
                server = %name,
                position = removed,
                len,
                "[Compositor] Recorded position out of range, may already be removed"
            );
            return Ok(());
        }

        if let Err(e) = state.aggregate.pop(removed) {
            state.mounts.insert(name.to_string(), entry);
            return Err(e.into());
        }

        for other in state.mounts.values_mut() {
            if other.position > removed {
                other.position -= 1;
            }
        }

        info!(server = %name, position = removed, "[Compositor] Unmounted server");
        Ok(())
    }

    /// Hide a mounted server's proxy without removing it
    pub async fn disable_server(&self, name: &str) -> Result<(), CompositorError> {
        self.set_visibility(name, false).await
    }

    /// Restore a disabled server's proxy
    pub async fn enable_server(&self, name: &str) -> Result<(), CompositorError> {
        self.set_visibility(name, true).await
    }

    async fn set_visibility(&self, name: &str, enabled: bool) -> Result<(), CompositorError> {
        let mut state = self.state.lock().await;
        let CompositorState { aggregate, mounts } = &mut *state;

        let Some(entry) = mounts.get_mut(name) else {
            return Ok(());
        };

        if let Err(e) = aggregate.set_enabled(entry.position, enabled) {
            warn!(
                server = %name,
                position = entry.position,
                error = %e,
                "[Compositor] Cannot change visibility"
            );
            return Ok(());
        }
        entry.disabled = !enabled;

        info!(
            server = %name,
            enabled,
            "[Compositor] Changed server visibility"
        );
        Ok(())
    }

    pub async fn mounted_names(&self) -> BTreeSet<String> {
        self.state.lock().await.mounts.keys().cloned().collect()
    }

    /// False for untracked names
    pub async fn is_disabled(&self, name: &str) -> bool {
        self.state
            .lock()
            .await
            .mounts
            .get(name)
            .is_some_and(|e| e.disabled)
    }

    /// Snapshot of the index table, ordered by position
    pub async fn mount_table(&self) -> Vec<MountEntry> {
        let state = self.state.lock().await;
        let mut entries: Vec<_> = state.mounts.values().cloned().collect();
        entries.sort_by_key(|e| e.position);
        entries
    }

    pub async fn aggregate_len(&self) -> usize {
        self.state.lock().await.aggregate.len()
    }

    /// Namespaces currently exposed by the aggregate
    pub async fn visible_namespaces(&self) -> Vec<String> {
        self.state.lock().await.aggregate.visible_namespaces()
    }

    /// Split a qualified tool name `"<namespace>_<tool>"` into its parts.
    ///
    /// Only enabled mounts resolve; the longest matching namespace wins.
    pub async fn resolve(&self, qualified: &str) -> Option<(String, String)> {
        let state = self.state.lock().await;

        state
            .mounts
            .values()
            .filter(|e| !e.disabled)
            .filter_map(|e| {
                qualified
                    .strip_prefix(e.name.as_str())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .filter(|tool| !tool.is_empty())
                    .map(|tool| (e.name.clone(), tool.to_string()))
            })
            .max_by_key(|(namespace, _)| namespace.len())
    }
}

#[async_trait]
impl Compositor for GatewayCompositor {
    async fn mount_server(
        &self,
        resource: &ServerResource,
    ) -> Result<MountOutcome, CompositorError> {
        GatewayCompositor::mount_server(self, resource).await
    }

    async fn unmount_server(&self, name: &str) -> Result<(), CompositorError> {
        GatewayCompositor::unmount_server(self, name).await
    }

    async fn mounted_names(&self) -> BTreeSet<String> {
        GatewayCompositor::mounted_names(self).await
    }
}
