//! Lifecycle hooks for server create/update/delete
//!
//! Sequences the side effects of registry changes:
//! - container start/stop
//! - mount/unmount via the compositor
//! - connection pool eviction
//!
//! Every step is best-effort: a failure is logged with the server name and
//! the remaining steps still run. Nothing is rolled back or retried.
//!
//! [`reconcile`] rebuilds mount state from the store when the per-event hooks
//! can no longer be trusted to have seen every change.

use std::collections::HashMap;

use mcpgate_core::{ContainerManager, ResourceStore, ServerResource};
use serde::Serialize;
use tracing::{info, warn};

use crate::compositor::{Compositor, MountOutcome};
use crate::pool::ConnectionPool;

/// 1. start the backing container, if any
/// 2. mount the server
pub async fn on_server_created(
    resource: &ServerResource,
    compositor: &dyn Compositor,
    container_manager: Option<&dyn ContainerManager>,
) {
    if resource.is_docker_backed() {
        if let Some(manager) = container_manager {
            match manager.start_server(resource).await {
                Ok(container_id) => info!(
                    server = %resource.name,
                    container_id = %container_id,
                    "[Lifecycle] Started container"
                ),
                Err(e) => warn!(
                    server = %resource.name,
                    error = %e,
                    "[Lifecycle] Failed to start container"
                ),
            }
        }
    }

    mount(resource, compositor).await;
}

/// 1. unmount 2. evict from the pool 3. stop the container
pub async fn on_server_deleted(
    name: &str,
    compositor: &dyn Compositor,
    pool: &dyn ConnectionPool,
    container_manager: Option<&dyn ContainerManager>,
) {
    unmount_and_evict(name, compositor, pool).await;

    if let Some(manager) = container_manager {
        match manager.stop_server(name).await {
            Ok(()) => info!(server = %name, "[Lifecycle] Stopped container"),
            Err(e) => warn!(server = %name, error = %e, "[Lifecycle] Failed to stop container"),
        }
    }
}

/// Remount with the new definition. Container state is left alone.
pub async fn on_server_updated(
    resource: &ServerResource,
    compositor: &dyn Compositor,
    pool: &dyn ConnectionPool,
) {
    unmount_and_evict(&resource.name, compositor, pool).await;
    mount(resource, compositor).await;
}

async fn mount(resource: &ServerResource, compositor: &dyn Compositor) {
    match compositor.mount_server(resource).await {
        Ok(MountOutcome::Mounted { position }) => {
            info!(server = %resource.name, position, "[Lifecycle] Server mounted");
        }
        Ok(outcome) => {
            info!(server = %resource.name, outcome = ?outcome, "[Lifecycle] Mount skipped");
        }
        Err(e) => {
            warn!(server = %resource.name, error = %e, "[Lifecycle] Failed to mount server");
        }
    }
}

async fn unmount_and_evict(name: &str, compositor: &dyn Compositor, pool: &dyn ConnectionPool) {
    if let Err(e) = compositor.unmount_server(name).await {
        warn!(server = %name, error = %e, "[Lifecycle] Failed to unmount server");
    }

    if let Err(e) = pool.evict(name).await {
        warn!(server = %name, error = %e, "[Lifecycle] Failed to evict pool connection");
    }
}

/// What [`reconcile`] changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Enabled resources that were not mounted
    pub mounted: Vec<String>,
    /// Mounted names that are gone from the store or disabled
    pub removed: Vec<String>,
    /// Mounted names rebuilt from their stored definition
    pub remounted: Vec<String>,
}

/// Bring the mounts back in line with the store.
///
/// - tracked names missing from the store go through [`on_server_deleted`]
/// - tracked names now disabled are unmounted and evicted
/// - tracked names still enabled are remounted, since a missed update cannot
///   be told apart from an unchanged definition
/// - enabled names not tracked go through [`on_server_created`]
///
/// A store failure leaves everything as it is.
pub async fn reconcile(
    store: &dyn ResourceStore,
    compositor: &dyn Compositor,
    pool: &dyn ConnectionPool,
    container_manager: Option<&dyn ContainerManager>,
) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();

    let stored: HashMap<String, ServerResource> = match store.list_all().await {
        Ok(resources) => resources.into_iter().map(|r| (r.name.clone(), r)).collect(),
        Err(e) => {
            warn!(error = %e, "[Lifecycle] Cannot list resources, skipping reconcile");
            return summary;
        }
    };
    let tracked = compositor.mounted_names().await;

    for name in &tracked {
        match stored.get(name) {
            None => {
                on_server_deleted(name, compositor, pool, container_manager).await;
                summary.removed.push(name.clone());
            }
            Some(resource) if !resource.is_enabled => {
                unmount_and_evict(name, compositor, pool).await;
                summary.removed.push(name.clone());
            }
            Some(resource) => {
                on_server_updated(resource, compositor, pool).await;
                summary.remounted.push(name.clone());
            }
        }
    }

    let mut missing: Vec<&ServerResource> = stored
        .values()
        .filter(|r| r.is_enabled && !tracked.contains(&r.name))
        .collect();
    missing.sort_by(|a, b| a.name.cmp(&b.name));

    for resource in missing {
        on_server_created(resource, compositor, container_manager).await;
        summary.mounted.push(resource.name.clone());
    }

    info!(
        mounted = summary.mounted.len(),
        removed = summary.removed.len(),
        remounted = summary.remounted.len(),
        "[Lifecycle] Reconciled mounts with the store"
    );
    summary
}
