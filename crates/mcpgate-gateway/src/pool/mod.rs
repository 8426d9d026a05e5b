//! Connection Pool
//!
//! Live sessions to mounted backends, keyed by resource name.
//!
//! - `get_or_create` is single-flight per name: concurrent callers for the
//!   same name share one connection attempt
//! - `health_check` probes every pooled session; failures accumulate and a
//!   session is evicted once it reaches the configured threshold
//! - `evict` drops a name's session idempotently

mod connection;
mod service;
mod transport;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use connection::{Connector, HealthState, McpConnection, PooledConnection};
pub use service::McpConnectionPool;
pub use transport::{McpClient, McpClientHandler, RmcpConnection, RmcpConnector};

use crate::proxy::ProxyError;

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default per-probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Consecutive failed probes after which a session is evicted
    pub failure_threshold: NonZeroU32,
    pub connect_timeout: Duration,
    pub probe_timeout: Duration,
}

impl PoolConfig {
    pub fn new(failure_threshold: NonZeroU32) -> Self {
        Self {
            failure_threshold,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Unknown server: {0}")]
    UnknownServer(String),

    #[error("Server '{0}' is disabled")]
    Disabled(String),

    #[error("Cannot build proxy for '{name}': {source}")]
    InvalidTarget {
        name: String,
        #[source]
        source: ProxyError,
    },

    #[error("Connection to '{name}' timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("Failed to connect to '{name}': {source}")]
    Connect {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Server '{0}' was evicted while connecting")]
    Evicted(String),

    #[error("Resource store error: {0}")]
    Store(#[source] anyhow::Error),
}

/// Outcome of one health sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSweep {
    pub probed: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    /// Names evicted for reaching the failure threshold
    pub evicted: Vec<String>,
}

/// Point-in-time view of one pool entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    pub name: String,
    pub health: HealthState,
    pub failures: u32,
}

#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Usable session for `name`, connecting if needed
    async fn get_or_create(&self, name: &str) -> Result<Arc<PooledConnection>, PoolError>;

    /// Probe every pooled session
    async fn health_check(&self) -> anyhow::Result<HealthSweep>;

    /// Drop the session for `name`, if any
    async fn evict(&self, name: &str) -> anyhow::Result<()>;

    /// Number of live pooled sessions
    fn active_count(&self) -> usize;

    /// Names with a live pooled session
    fn pooled_names(&self) -> Vec<String>;
}
