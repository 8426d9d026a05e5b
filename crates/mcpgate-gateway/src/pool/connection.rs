//! Pooled connection types
//!
//! [`McpConnection`] is a live session to one backend, produced by a
//! [`Connector`]. The pool wraps each one in a [`PooledConnection`] that
//! carries its health state.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

use crate::proxy::BackendProxy;

/// A live session to one backend server
#[async_trait]
pub trait McpConnection: Send + Sync {
    /// Cheap liveness probe
    async fn ping(&self) -> anyhow::Result<()>;

    /// Tear the session down. Closing twice is not an error.
    async fn close(&self) -> anyhow::Result<()>;
}

/// Establishes sessions for the pool
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, name: &str, proxy: &BackendProxy)
        -> anyhow::Result<Arc<dyn McpConnection>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    Connecting,
}

#[derive(Debug, Clone, Copy)]
struct Health {
    state: HealthState,
    failures: u32,
}

/// A connection held by the pool, with its health bookkeeping
pub struct PooledConnection {
    name: String,
    connection: Arc<dyn McpConnection>,
    health: Mutex<Health>,
}

impl PooledConnection {
    pub fn new(name: impl Into<String>, connection: Arc<dyn McpConnection>) -> Self {
        Self {
            name: name.into(),
            connection,
            health: Mutex::new(Health {
                state: HealthState::Healthy,
                failures: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Arc<dyn McpConnection> {
        &self.connection
    }

    pub fn health(&self) -> HealthState {
        self.health.lock().state
    }

    /// Consecutive failed probes since the last success
    pub fn failures(&self) -> u32 {
        self.health.lock().failures
    }

    pub(crate) fn record_success(&self) {
        let mut health = self.health.lock();
        health.state = HealthState::Healthy;
        health.failures = 0;
    }

    /// Returns the updated failure count
    pub(crate) fn record_failure(&self) -> u32 {
        let mut health = self.health.lock();
        health.state = HealthState::Unhealthy;
        health.failures = health.failures.saturating_add(1);
        health.failures
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let health = *self.health.lock();
        f.debug_struct("PooledConnection")
            .field("name", &self.name)
            .field("state", &health.state)
            .field("failures", &health.failures)
            .finish()
    }
}
