//! Repository traits for data access
//!
//! These traits define the interface for data storage without specifying
//! the implementation (SQLite, in-memory, etc.)

use async_trait::async_trait;

use crate::domain::{Caller, Operation, ServerResource};

mod memory;

pub use memory::InMemoryResourceStore;

/// Result type for repository operations
pub type RepoResult<T> = anyhow::Result<T>;

/// Keyed registry of server resources
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Create or replace a resource by name
    async fn upsert(&self, resource: &ServerResource) -> RepoResult<()>;

    /// Get a resource by name
    async fn get(&self, name: &str) -> RepoResult<Option<ServerResource>>;

    /// Get every resource, ordered by name
    async fn list_all(&self) -> RepoResult<Vec<ServerResource>>;

    /// Delete a resource. Deleting an unknown name is not an error.
    async fn delete(&self, name: &str) -> RepoResult<()>;

    /// Get every enabled resource
    async fn list_enabled(&self) -> RepoResult<Vec<ServerResource>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|r| r.is_enabled)
            .collect())
    }

    /// Get resources the caller is allowed to read
    async fn list_for_caller(&self, caller: &Caller) -> RepoResult<Vec<ServerResource>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|r| r.can_access(caller, Operation::Read))
            .collect())
    }

    /// Number of registered resources
    async fn count(&self) -> RepoResult<usize> {
        Ok(self.list_all().await?.len())
    }
}
