//! Gateway Server
//!
//! HTTP surface of the gateway: the resource CRUD API, registry discovery and
//! health endpoints, all backed by a single [`GatewayRuntime`].

mod config;
mod handlers;
mod runtime;

pub use config::{
    ConfigError, DatabaseLocation, GatewayConfig, DEFAULT_HEALTH_CHECK_INTERVAL, DEFAULT_PORT,
    IN_MEMORY_DATABASE,
};
pub use handlers::{caller_from_headers, AppState, USER_ID_HEADER, USER_ROLES_HEADER};
pub use runtime::{GatewayRuntime, RouteError, RuntimeBuilder, StartupSummary};

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the HTTP router for a runtime
pub fn build_router(runtime: Arc<GatewayRuntime>) -> Router {
    let enable_cors = runtime.config().enable_cors;
    let state = AppState { runtime };

    let router = Router::new()
        .route("/api/servers", post(handlers::servers))
        .route("/api/discover", post(handlers::discover))
        .route("/health", get(handlers::health))
        .route("/health/status", get(handlers::health_status))
        .route("/health/containers", get(handlers::health_containers))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// MCP Gateway Server
///
/// Owns the runtime for its whole life: starts it, serves HTTP until
/// `shutdown_signal` resolves, then shuts the runtime down.
pub struct GatewayServer {
    runtime: Arc<GatewayRuntime>,
}

impl GatewayServer {
    pub fn new(runtime: GatewayRuntime) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }

    pub fn runtime(&self) -> &Arc<GatewayRuntime> {
        &self.runtime
    }

    pub async fn run<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.runtime.config().addr()?;

        let summary = self.runtime.start().await?;
        info!(
            mounted = summary.mounted,
            skipped = summary.skipped,
            failed = summary.failed,
            "[Gateway] Runtime started"
        );

        let router = build_router(self.runtime.clone());
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("[Gateway] Listening on http://{}", addr);

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .context("Gateway server error");

        self.runtime.shutdown().await;
        served
    }
}
