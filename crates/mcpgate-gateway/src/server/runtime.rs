//! Gateway runtime - constructs and owns the process-wide services
//!
//! Every singleton (store, pool, compositor, registry client) is built here
//! once and handed out by reference; nothing is global.

use std::sync::Arc;

use anyhow::{Context, Result};
use mcpgate_core::{
    ContainerManager, EventBus, RegistryClient, ResourceStore, ServerAppService,
};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::GatewayConfig;
use crate::aggregate::{AggregateGateway, NamespacedAggregate};
use crate::compositor::{GatewayCompositor, MountOutcome};
use crate::consumers::LifecycleEventHandler;
use crate::health::HealthChecker;
use crate::pool::{
    ConnectionPool, Connector, McpConnectionPool, PoolError, PooledConnection, RmcpConnector,
};

/// Why a qualified tool name could not be routed to a backend session
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("No mounted server provides tool '{0}'")]
    Unresolved(String),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Result of mounting the stored resources at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartupSummary {
    pub mounted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Builder for [`GatewayRuntime`]
pub struct RuntimeBuilder {
    config: GatewayConfig,
    store: Arc<dyn ResourceStore>,
    connector: Option<Arc<dyn Connector>>,
    pool: Option<Arc<dyn ConnectionPool>>,
    aggregate: Option<Box<dyn AggregateGateway>>,
    containers: Option<Arc<dyn ContainerManager>>,
}

impl RuntimeBuilder {
    /// Connector used by the default pool (rmcp when unset)
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replace the pool entirely
    pub fn with_pool(mut self, pool: Arc<dyn ConnectionPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_aggregate(mut self, aggregate: Box<dyn AggregateGateway>) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    pub fn with_container_manager(mut self, manager: Arc<dyn ContainerManager>) -> Self {
        self.containers = Some(manager);
        self
    }

    pub fn build(self) -> Result<GatewayRuntime> {
        info!("[Gateway] Initializing services...");

        let event_bus = EventBus::new();

        let pool = match self.pool {
            Some(pool) => pool,
            None => {
                let connector = self
                    .connector
                    .unwrap_or_else(|| Arc::new(RmcpConnector::new()));
                Arc::new(McpConnectionPool::new(
                    self.store.clone(),
                    connector,
                    self.config.pool,
                )) as Arc<dyn ConnectionPool>
            }
        };

        let aggregate = self
            .aggregate
            .unwrap_or_else(|| Box::new(NamespacedAggregate::new()));
        let compositor = Arc::new(GatewayCompositor::new(aggregate));

        let mut health = HealthChecker::new(pool.clone(), self.store.clone());
        if let Some(manager) = &self.containers {
            health = health.with_container_manager(manager.clone());
        }

        let servers = Arc::new(ServerAppService::new(
            self.store.clone(),
            event_bus.sender(),
        ));

        let registry = Arc::new(
            RegistryClient::new(self.config.registry_url.clone())
                .context("Failed to create registry client")?,
        );

        Ok(GatewayRuntime {
            config: self.config,
            store: self.store,
            event_bus,
            pool,
            compositor,
            health: Arc::new(health),
            servers,
            registry,
            containers: self.containers,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }
}

pub struct GatewayRuntime {
    config: GatewayConfig,
    store: Arc<dyn ResourceStore>,
    event_bus: EventBus,
    pool: Arc<dyn ConnectionPool>,
    compositor: Arc<GatewayCompositor>,
    health: Arc<HealthChecker>,
    servers: Arc<ServerAppService>,
    registry: Arc<RegistryClient>,
    containers: Option<Arc<dyn ContainerManager>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl GatewayRuntime {
    pub fn builder(config: GatewayConfig, store: Arc<dyn ResourceStore>) -> RuntimeBuilder {
        RuntimeBuilder {
            config,
            store,
            connector: None,
            pool: None,
            aggregate: None,
            containers: None,
        }
    }

    /// Mount every enabled stored resource, then start the lifecycle consumer
    /// and periodic health checks.
    ///
    /// One bad resource never aborts startup.
    pub async fn start(&self) -> Result<StartupSummary> {
        // Subscribe first so registry changes made during startup are not lost
        let rx = self.event_bus.subscribe();

        let resources = self
            .store
            .list_enabled()
            .await
            .context("Failed to load stored resources")?;

        let mut summary = StartupSummary::default();
        for resource in &resources {
            match self.compositor.mount_server(resource).await {
                Ok(MountOutcome::Mounted { .. }) => summary.mounted += 1,
                Ok(_) => summary.skipped += 1,
                Err(e) => {
                    warn!(server = %resource.name, error = %e, "[Gateway] Startup mount failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            mounted = summary.mounted,
            skipped = summary.skipped,
            failed = summary.failed,
            "[Gateway] Mounted stored resources"
        );

        let handler = Arc::new(LifecycleEventHandler::new(
            self.store.clone(),
            self.compositor.clone(),
            self.pool.clone(),
            self.containers.clone(),
        ));
        let consumer = handler.start(rx, self.cancel.child_token());

        let health = self
            .health
            .clone()
            .spawn_periodic(self.config.health_check_interval, self.cancel.child_token());

        self.tasks.lock().extend([consumer, health]);

        Ok(summary)
    }

    /// Stop background tasks and drop every pooled connection
    pub async fn shutdown(&self) {
        info!("[Gateway] Shutting down...");
        self.cancel.cancel();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "[Gateway] Background task ended abnormally");
            }
        }

        for name in self.pool.pooled_names() {
            if let Err(e) = self.pool.evict(&name).await {
                warn!(server = %name, error = %e, "[Gateway] Failed to evict on shutdown");
            }
        }

        info!("[Gateway] Shutdown complete");
    }

    /// Route a qualified tool name (`"<server>_<tool>"`) to its backend.
    ///
    /// Returns the pooled session for the owning server and the tool name as
    /// that server knows it. Only enabled mounts resolve.
    pub async fn connection_for(
        &self,
        qualified: &str,
    ) -> Result<(Arc<PooledConnection>, String), RouteError> {
        let (server, tool) = self
            .compositor
            .resolve(qualified)
            .await
            .ok_or_else(|| RouteError::Unresolved(qualified.to_string()))?;

        debug!(tool = %qualified, server = %server, "[Gateway] Routing tool call");
        let connection = self.pool.get_or_create(&server).await?;
        Ok((connection, tool))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    pub fn pool(&self) -> &Arc<dyn ConnectionPool> {
        &self.pool
    }

    pub fn compositor(&self) -> &Arc<GatewayCompositor> {
        &self.compositor
    }

    pub fn health(&self) -> &Arc<HealthChecker> {
        &self.health
    }

    pub fn servers(&self) -> &Arc<ServerAppService> {
        &self.servers
    }

    pub fn registry(&self) -> &Arc<RegistryClient> {
        &self.registry
    }

    pub fn container_manager(&self) -> Option<&Arc<dyn ContainerManager>> {
        self.containers.as_ref()
    }
}
