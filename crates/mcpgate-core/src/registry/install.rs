//! Conversion of registry entries into installable resources

use tracing::debug;

use super::types::{RegistryEntry, RegistryPackage, RegistryRemote};
use crate::domain::{ServerResource, TransportKind, ValidationError};

/// Build a [`ServerResource`] for `entry`, owned by `created_by`.
///
/// The first package wins over remotes. The result still has to pass
/// [`ServerResource::validate`] before it is stored.
pub fn resource_from_entry(
    entry: &RegistryEntry,
    created_by: &str,
) -> Result<ServerResource, ValidationError> {
    if entry.name.trim().is_empty() {
        return Err(ValidationError::MissingField("name"));
    }

    let mut resource = ServerResource::new(&entry.name, TransportKind::StreamableHttp, created_by);

    if let Some(pkg) = entry.packages.first() {
        apply_package(&mut resource, pkg);
    } else if let Some(remote) = entry.remotes.first() {
        apply_remote(&mut resource, remote);
    }

    debug!(
        server = %resource.name,
        transport = %resource.transport,
        "[Registry] Converted registry entry"
    );
    Ok(resource)
}

fn apply_package(resource: &mut ServerResource, pkg: &RegistryPackage) {
    let (name, version) = pkg.name_and_version();
    let transport = pkg
        .transport_type()
        .map(normalize_transport)
        .unwrap_or(TransportKind::Stdio);

    match pkg.registry_name.as_str() {
        "npm" => {
            resource.transport = transport;
            resource.command = Some("npx".to_string());
            let package_ref = if version.is_empty() {
                name
            } else {
                format!("{}@{}", name, version)
            };
            resource.args = vec!["-y".to_string(), package_ref];
        }
        "pip" | "pypi" => {
            resource.transport = transport;
            resource.command = Some("uvx".to_string());
            resource.args = vec![name];
        }
        "docker" | "oci" => {
            resource.transport = transport;
            let image = if !pkg.identifier.is_empty() {
                pkg.identifier.clone()
            } else if version.is_empty() {
                name
            } else {
                format!("{}:{}", name, version)
            };
            resource.docker_image = Some(image);
        }
        other => {
            debug!(
                server = %resource.name,
                registry = other,
                "[Registry] Unknown package registry, leaving connection unset"
            );
        }
    }
}

fn apply_remote(resource: &mut ServerResource, remote: &RegistryRemote) {
    if !remote.url.is_empty() {
        resource.url = Some(remote.url.clone());
    }
    resource.transport = normalize_transport(&remote.remote_type);
}

/// Registry spellings (`streamable-http`, `http`) to our transport kinds
fn normalize_transport(raw: &str) -> TransportKind {
    if raw.contains("http") {
        TransportKind::StreamableHttp
    } else {
        TransportKind::from(raw)
    }
}
