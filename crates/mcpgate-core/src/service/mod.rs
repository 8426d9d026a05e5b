//! Domain services and ports to external collaborators

mod container;
mod registry_client;

pub use container::{ContainerManager, ContainerStatus};
pub use registry_client::{RegistryClient, DEFAULT_REGISTRY_URL};
