use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{RepoResult, ResourceStore};
use crate::domain::ServerResource;

/// Process-local resource store, used for `:memory:` deployments and tests
#[derive(Default)]
pub struct InMemoryResourceStore {
    resources: RwLock<HashMap<String, ServerResource>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the given resources
    pub fn with_resources(resources: impl IntoIterator<Item = ServerResource>) -> Self {
        let map = resources
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
        Self {
            resources: RwLock::new(map),
        }
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn upsert(&self, resource: &ServerResource) -> RepoResult<()> {
        self.resources
            .write()
            .insert(resource.name.clone(), resource.clone());
        Ok(())
    }

    async fn get(&self, name: &str) -> RepoResult<Option<ServerResource>> {
        Ok(self.resources.read().get(name).cloned())
    }

    async fn list_all(&self) -> RepoResult<Vec<ServerResource>> {
        let mut resources: Vec<_> = self.resources.read().values().cloned().collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(resources)
    }

    async fn delete(&self, name: &str) -> RepoResult<()> {
        self.resources.write().remove(name);
        Ok(())
    }

    async fn count(&self) -> RepoResult<usize> {
        Ok(self.resources.read().len())
    }
}
