//! Gateway health checker
//!
//! Combines connection pool health with container status. Runs independently
//! of the mount/unmount path and never fails: every error is folded into the
//! report it was computing.

use std::sync::Arc;
use std::time::Duration;

use mcpgate_core::{ContainerManager, ResourceStore, ServerResource};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pool::{ConnectionPool, HealthSweep};

/// Result of [`HealthChecker::run_health_check`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_active: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep: Option<HealthSweep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Container state of one docker-backed resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerHealth {
    pub name: String,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContainerHealth {
    fn unavailable(name: &str, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            running: false,
            container_id: None,
            status: "unavailable".to_string(),
            error: Some(error.into()),
        }
    }
}

/// Cheap gateway-wide counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayStatus {
    pub pool_connections: usize,
    pub registered_servers: usize,
}

pub struct HealthChecker {
    pool: Arc<dyn ConnectionPool>,
    store: Arc<dyn ResourceStore>,
    containers: Option<Arc<dyn ContainerManager>>,
}

impl HealthChecker {
    pub fn new(pool: Arc<dyn ConnectionPool>, store: Arc<dyn ResourceStore>) -> Self {
        Self {
            pool,
            store,
            containers: None,
        }
    }

    pub fn with_container_manager(mut self, manager: Arc<dyn ContainerManager>) -> Self {
        self.containers = Some(manager);
        self
    }

    /// Probe the pool
    pub async fn run_health_check(&self) -> HealthCheckReport {
        match self.pool.health_check().await {
            Ok(sweep) => HealthCheckReport {
                ok: true,
                pool_active: Some(self.pool.active_count()),
                sweep: Some(sweep),
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "[HealthChecker] Gateway health check failed");
                HealthCheckReport {
                    ok: false,
                    pool_active: None,
                    sweep: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Container status for every docker-backed resource.
    ///
    /// An unreachable backend marks every entry unavailable instead of
    /// failing the batch.
    pub async fn check_docker_servers(&self) -> Vec<ContainerHealth> {
        let resources = match self.store.list_all().await {
            Ok(resources) => resources,
            Err(e) => {
                warn!(error = %e, "[HealthChecker] Cannot list resources");
                return Vec::new();
            }
        };

        let docker: Vec<ServerResource> = resources
            .into_iter()
            .filter(ServerResource::is_docker_backed)
            .collect();
        if docker.is_empty() {
            return Vec::new();
        }

        let Some(manager) = &self.containers else {
            return docker
                .iter()
                .map(|r| ContainerHealth::unavailable(&r.name, "No container manager configured"))
                .collect();
        };

        if let Err(e) = manager.ping().await {
            warn!(error = %e, "[HealthChecker] Container backend unreachable");
            return docker
                .iter()
                .map(|r| ContainerHealth::unavailable(&r.name, "Docker unavailable"))
                .collect();
        }

        let mut results = Vec::with_capacity(docker.len());
        for resource in &docker {
            let entry = match manager.get_status(&resource.name).await {
                Ok(status) => ContainerHealth {
                    name: resource.name.clone(),
                    running: status.running,
                    container_id: status.container_id,
                    status: status.status,
                    error: None,
                },
                Err(e) => {
                    warn!(server = %resource.name, error = %e, "[HealthChecker] Container status failed");
                    ContainerHealth::unavailable(&resource.name, e.to_string())
                }
            };
            results.push(entry);
        }
        results
    }

    /// Pool size plus registry size; no probing
    pub async fn get_status(&self) -> GatewayStatus {
        let registered_servers = match self.store.count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "[HealthChecker] Cannot count resources");
                0
            }
        };

        GatewayStatus {
            pool_connections: self.pool.active_count(),
            registered_servers,
        }
    }

    /// Run [`run_health_check`](Self::run_health_check) every `interval` until
    /// `cancel` fires
    pub fn spawn_periodic(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval = ?interval, "[HealthChecker] Periodic health checks started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = self.run_health_check().await;
                        debug!(ok = report.ok, "[HealthChecker] Periodic check finished");
                    }
                }
            }

            info!("[HealthChecker] Periodic health checks stopped");
        })
    }
}
