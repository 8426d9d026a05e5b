//! Wire types of the public MCP registry (`/v0/servers`)

use serde::{Deserialize, Serialize};

/// One page of `/v0/servers`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub servers: Vec<RegistryServerEnvelope>,
    #[serde(default)]
    pub metadata: PageMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMetadata {
    #[serde(default, rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

/// Registry responses wrap each server under a `server` key
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryServerEnvelope {
    #[serde(default)]
    pub server: RegistryEntry,
}

/// Flattened registry server.
///
/// A server ships `packages` (local installs), `remotes` (hosted endpoints),
/// or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub packages: Vec<RegistryPackage>,
    #[serde(default)]
    pub remotes: Vec<RegistryRemote>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub repository: serde_json::Value,
}

/// Installable package. Older entries use `registry_name`/`name`, newer ones
/// `registryType`/`identifier`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryPackage {
    #[serde(default, alias = "registryType")]
    pub registry_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub transport: Option<PackageTransport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageTransport {
    #[serde(default, rename = "type")]
    pub transport_type: String,
}

/// Hosted endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRemote {
    #[serde(default = "default_remote_type", rename = "type")]
    pub remote_type: String,
    #[serde(default)]
    pub url: String,
}

fn default_remote_type() -> String {
    "streamable-http".to_string()
}

impl RegistryPackage {
    /// Package transport type, if the entry names one
    pub fn transport_type(&self) -> Option<&str> {
        self.transport
            .as_ref()
            .map(|t| t.transport_type.as_str())
            .filter(|t| !t.is_empty())
    }

    /// `(name, version)`, falling back to parsing `identifier`
    /// (`docker.io/user/repo:tag`, `@scope/pkg`).
    pub fn name_and_version(&self) -> (String, String) {
        if !self.name.is_empty() || self.identifier.is_empty() {
            return (self.name.clone(), self.version.clone());
        }
        match self.identifier.rsplit_once(':') {
            Some((name, version)) if !version.is_empty() => {
                (name.to_string(), version.to_string())
            }
            Some((name, _)) => (name.to_string(), String::new()),
            None => (self.identifier.clone(), String::new()),
        }
    }
}
