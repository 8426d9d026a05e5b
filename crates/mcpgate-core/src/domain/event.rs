//! Domain events emitted by application services
//!
//! Producers: `ServerAppService`. Consumers: the gateway lifecycle handler.

use serde::Serialize;

use super::resource::ServerResource;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A resource was registered
    ServerCreated { resource: ServerResource },

    /// A resource's definition changed
    ServerUpdated { resource: ServerResource },

    /// A resource was removed from the registry
    ServerDeleted { name: String },
}

impl DomainEvent {
    /// Short name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            DomainEvent::ServerCreated { .. } => "server_created",
            DomainEvent::ServerUpdated { .. } => "server_updated",
            DomainEvent::ServerDeleted { .. } => "server_deleted",
        }
    }

    /// Name of the resource the event is about
    pub fn server_name(&self) -> &str {
        match self {
            DomainEvent::ServerCreated { resource } | DomainEvent::ServerUpdated { resource } => {
                &resource.name
            }
            DomainEvent::ServerDeleted { name } => name,
        }
    }
}
