//! Server Application Service
//!
//! RBAC-gated CRUD over the resource registry with automatic event emission.
//! Side effects (containers, mounts, pool) are driven by consumers of the
//! emitted events, never from here.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{
    Caller, DomainEvent, Operation, ResourceError, ResourceResult, ServerResource, TransportKind,
};
use crate::event_bus::EventSender;
use crate::registry::{resource_from_entry, RegistryEntry};
use crate::repository::ResourceStore;
use crate::service::{ContainerManager, ContainerStatus};

/// Fields accepted when registering a resource
#[derive(Debug, Clone, Deserialize)]
pub struct ServerDraft {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "transport_type")]
    pub transport: TransportKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub docker_image: Option<String>,
    #[serde(default)]
    pub docker_ports: BTreeMap<String, u16>,
    #[serde(default)]
    pub required_roles: BTreeSet<String>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

impl ServerDraft {
    fn into_resource(self, created_by: &str) -> ServerResource {
        let mut resource = ServerResource::new(self.name, self.transport, created_by);
        resource.url = self.url;
        resource.command = self.command;
        resource.args = self.args;
        resource.env = self.env;
        resource.docker_image = self.docker_image;
        resource.docker_ports = self.docker_ports;
        resource.required_roles = self.required_roles;
        resource.is_enabled = self.is_enabled.unwrap_or(true);
        resource
    }
}

impl From<ServerResource> for ServerDraft {
    fn from(r: ServerResource) -> Self {
        Self {
            name: r.name,
            transport: r.transport,
            url: r.url,
            command: r.command,
            args: r.args,
            env: r.env,
            docker_image: r.docker_image,
            docker_ports: r.docker_ports,
            required_roles: r.required_roles,
            is_enabled: Some(r.is_enabled),
        }
    }
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerPatch {
    #[serde(default, rename = "transport_type")]
    pub transport: Option<TransportKind>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,
    #[serde(default)]
    pub docker_image: Option<String>,
    #[serde(default)]
    pub docker_ports: Option<BTreeMap<String, u16>>,
    #[serde(default)]
    pub required_roles: Option<BTreeSet<String>>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

impl ServerPatch {
    fn apply(self, resource: &mut ServerResource) {
        if let Some(transport) = self.transport {
            resource.transport = transport;
        }
        if let Some(url) = self.url {
            resource.url = Some(url);
        }
        if let Some(command) = self.command {
            resource.command = Some(command);
        }
        if let Some(args) = self.args {
            resource.args = args;
        }
        if let Some(env) = self.env {
            resource.env = env;
        }
        if let Some(image) = self.docker_image {
            resource.docker_image = Some(image);
        }
        if let Some(ports) = self.docker_ports {
            resource.docker_ports = ports;
        }
        if let Some(roles) = self.required_roles {
            resource.required_roles = roles;
        }
        if let Some(enabled) = self.is_enabled {
            resource.is_enabled = enabled;
        }
    }
}

/// Result of [`ServerAppService::status`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStatusReport {
    pub name: String,
    pub transport_type: TransportKind,
    pub is_enabled: bool,
    pub container: ContainerStatus,
}

/// Application service for the resource registry
pub struct ServerAppService {
    store: Arc<dyn ResourceStore>,
    event_sender: EventSender,
}

impl ServerAppService {
    pub fn new(store: Arc<dyn ResourceStore>, event_sender: EventSender) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Resources the caller may read
    pub async fn list(&self, caller: &Caller) -> ResourceResult<Vec<ServerResource>> {
        let mut resources = self.store.list_for_caller(caller).await?;
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(resources)
    }

    /// Validate and register a new resource owned by the caller.
    ///
    /// Fails with `AlreadyExists` when the name is registered, whoever owns it.
    ///
    /// Emits: `ServerCreated`
    pub async fn create(
        &self,
        caller: &Caller,
        draft: ServerDraft,
    ) -> ResourceResult<ServerResource> {
        let resource = draft.into_resource(&caller.user_id);
        resource.validate()?;

        // Replacing someone else's resource goes through `update`
        if self.store.get(&resource.name).await?.is_some() {
            warn!(
                server = %resource.name,
                user = %caller.user_id,
                "[ServerAppService] Create rejected, name taken"
            );
            return Err(ResourceError::AlreadyExists(resource.name));
        }

        self.store.upsert(&resource).await?;

        info!(
            server = %resource.name,
            transport = %resource.transport,
            created_by = %resource.created_by,
            "[ServerAppService] Created server"
        );

        self.event_sender.emit(DomainEvent::ServerCreated {
            resource: resource.clone(),
        });

        Ok(resource)
    }

    /// Merge `patch` into an existing resource.
    ///
    /// Emits: `ServerUpdated`
    pub async fn update(
        &self,
        caller: &Caller,
        name: &str,
        patch: ServerPatch,
    ) -> ResourceResult<ServerResource> {
        let mut resource = self.authorized(caller, name, Operation::Write).await?;

        patch.apply(&mut resource);
        resource.touch();
        resource.validate()?;

        self.store.upsert(&resource).await?;

        info!(server = %name, "[ServerAppService] Updated server");

        self.event_sender.emit(DomainEvent::ServerUpdated {
            resource: resource.clone(),
        });

        Ok(resource)
    }

    /// Remove a resource from the registry.
    ///
    /// Emits: `ServerDeleted`
    pub async fn delete(&self, caller: &Caller, name: &str) -> ResourceResult<()> {
        self.authorized(caller, name, Operation::Write).await?;

        self.store.delete(name).await?;

        info!(server = %name, "[ServerAppService] Deleted server");

        self.event_sender.emit(DomainEvent::ServerDeleted {
            name: name.to_string(),
        });

        Ok(())
    }

    /// Registry view of a resource plus its container state
    pub async fn status(
        &self,
        caller: &Caller,
        name: &str,
        container_manager: Option<&dyn ContainerManager>,
    ) -> ResourceResult<ServerStatusReport> {
        let resource = self.authorized(caller, name, Operation::Read).await?;

        let container = match container_manager {
            None => ContainerStatus::no_manager(),
            Some(manager) => match manager.get_status(name).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(server = %name, error = %e, "[ServerAppService] Container status unavailable");
                    ContainerStatus::unavailable()
                }
            },
        };

        Ok(ServerStatusReport {
            name: resource.name,
            transport_type: resource.transport,
            is_enabled: resource.is_enabled,
            container,
        })
    }

    /// Register a server discovered in the public registry
    ///
    /// Emits: `ServerCreated`
    pub async fn install(
        &self,
        caller: &Caller,
        entry: &RegistryEntry,
    ) -> ResourceResult<ServerResource> {
        let resource = resource_from_entry(entry, &caller.user_id)?;
        self.create(caller, ServerDraft::from(resource)).await
    }

    async fn authorized(
        &self,
        caller: &Caller,
        name: &str,
        operation: Operation,
    ) -> ResourceResult<ServerResource> {
        let resource = self
            .store
            .get(name)
            .await?
            .ok_or_else(|| ResourceError::not_found(name))?;

        if !resource.can_access(caller, operation) {
            warn!(
                server = %name,
                user = %caller.user_id,
                operation = ?operation,
                "[ServerAppService] Access denied"
            );
            return Err(ResourceError::forbidden(name));
        }
        Ok(resource)
    }
}
