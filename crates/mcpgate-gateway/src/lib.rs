//! mcpgate Gateway
//!
//! Presents many backend MCP servers as one namespaced endpoint:
//! - Aggregate gateway with positional, namespaced mounts
//! - Compositor tracking mount positions across unmounts
//! - Connection pool with single-flight connects and health-based eviction
//! - Lifecycle orchestration driven by DomainEvent consumers
//! - Health checks over the pool and docker-backed servers
//! - Thin HTTP API for the resource registry and discovery

pub mod aggregate;
pub mod compositor;
pub mod consumers;
pub mod health;
pub mod lifecycle;
pub mod pool;
pub mod proxy;
pub mod server;

pub use aggregate::{AggregateError, AggregateGateway, MountedProxy, NamespacedAggregate};
pub use compositor::{
    Compositor, CompositorError, GatewayCompositor, MountEntry, MountOutcome,
};
pub use consumers::LifecycleEventHandler;
pub use lifecycle::ReconcileSummary;
pub use health::{ContainerHealth, GatewayStatus, HealthCheckReport, HealthChecker};
pub use proxy::{BackendProxy, ProxyError, ProxyFactory, TransportProxyFactory};
pub use server::{
    build_router, ConfigError, DatabaseLocation, GatewayConfig, GatewayRuntime, GatewayServer,
    RouteError, RuntimeBuilder, StartupSummary,
};

pub use pool::{
    ConnectionPool, ConnectionSnapshot, Connector, HealthSweep, HealthState, McpConnection,
    McpConnectionPool, PoolConfig, PoolError, PooledConnection, RmcpConnector,
};
