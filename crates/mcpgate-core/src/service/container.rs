//! Container backend port
//!
//! The gateway never orchestrates containers itself; it asks an external
//! manager to start, stop and report on the container backing a resource.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ServerResource;

/// Status of the container backing a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub running: bool,
    pub container_id: Option<String>,
    pub status: String,
}

impl ContainerStatus {
    pub fn running(container_id: impl Into<String>) -> Self {
        Self {
            running: true,
            container_id: Some(container_id.into()),
            status: "running".to_string(),
        }
    }

    /// Placeholder when no manager is configured
    pub fn no_manager() -> Self {
        Self::not_running("no_manager")
    }

    /// Placeholder when the manager could not be reached
    pub fn unavailable() -> Self {
        Self::not_running("unavailable")
    }

    pub fn not_running(status: impl Into<String>) -> Self {
        Self {
            running: false,
            container_id: None,
            status: status.into(),
        }
    }
}

#[async_trait]
pub trait ContainerManager: Send + Sync {
    /// Whether the container backend is reachable at all
    async fn ping(&self) -> anyhow::Result<()>;

    /// Start (or reuse) the container for `resource`, returning its id
    async fn start_server(&self, resource: &ServerResource) -> anyhow::Result<String>;

    /// Stop the container for `name`. Stopping a missing container succeeds.
    async fn stop_server(&self, name: &str) -> anyhow::Result<()>;

    async fn get_status(&self, name: &str) -> anyhow::Result<ContainerStatus>;
}
