use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::access::{self, Caller, Operation};
use super::error::ValidationError;

/// How the gateway reaches a backend server.
///
/// Unknown wire values are kept as [`TransportKind::Unsupported`] so that a
/// single malformed record never fails a bulk load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransportKind {
    /// Local child process over stdin/stdout
    Stdio,
    /// Streamable HTTP
    StreamableHttp,
    /// Legacy server-sent events endpoint
    Sse,
    /// Anything else found on the wire
    Unsupported(String),
}

impl TransportKind {
    pub fn as_str(&self) -> &str {
        match self {
            TransportKind::Stdio => "stdio",
            TransportKind::StreamableHttp => "streamable_http",
            TransportKind::Sse => "sse",
            TransportKind::Unsupported(other) => other,
        }
    }

    /// Whether the kind connects over a URL
    pub fn is_http(&self) -> bool {
        matches!(self, TransportKind::StreamableHttp | TransportKind::Sse)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, TransportKind::Unsupported(_))
    }
}

impl From<String> for TransportKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "stdio" => TransportKind::Stdio,
            "streamable_http" => TransportKind::StreamableHttp,
            "sse" => TransportKind::Sse,
            _ => TransportKind::Unsupported(value),
        }
    }
}

impl From<&str> for TransportKind {
    fn from(value: &str) -> Self {
        TransportKind::from(value.to_string())
    }
}

impl From<TransportKind> for String {
    fn from(kind: TransportKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered backend MCP server.
///
/// `name` is both the store key and the namespace the server is mounted under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResource {
    pub name: String,

    #[serde(rename = "transport_type")]
    pub transport: TransportKind,

    /// Endpoint for streamable_http and sse servers
    #[serde(default)]
    pub url: Option<String>,

    /// Executable for stdio servers
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Container image backing this server, independent of transport
    #[serde(default)]
    pub docker_image: Option<String>,

    /// Container port -> host port
    #[serde(default)]
    pub docker_ports: BTreeMap<String, u16>,

    /// Any one of these roles grants read access. Empty means public.
    #[serde(default)]
    pub required_roles: BTreeSet<String>,

    #[serde(default = "default_enabled")]
    pub is_enabled: bool,

    pub created_by: String,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl ServerResource {
    pub fn new(
        name: impl Into<String>,
        transport: TransportKind,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            transport,
            url: None,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            docker_image: None,
            docker_ports: BTreeMap::new(),
            required_roles: BTreeSet::new(),
            is_enabled: true,
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn streamable_http(
        name: impl Into<String>,
        url: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self::new(name, TransportKind::StreamableHttp, created_by).with_url(url)
    }

    pub fn sse(
        name: impl Into<String>,
        url: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self::new(name, TransportKind::Sse, created_by).with_url(url)
    }

    pub fn stdio(
        name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let mut resource = Self::new(name, TransportKind::Stdio, created_by);
        resource.command = Some(command.into());
        resource.args = args;
        resource
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_docker(mut self, image: impl Into<String>, ports: BTreeMap<String, u16>) -> Self {
        self.docker_image = Some(image.into());
        self.docker_ports = ports;
        self
    }

    pub fn with_required_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.is_enabled = enabled;
        self
    }

    /// Whether a container has to be provisioned for this server
    pub fn is_docker_backed(&self) -> bool {
        self.docker_image.as_deref().is_some_and(|image| !image.is_empty())
    }

    /// The first connection field this resource lacks for its transport, if any.
    pub fn missing_connection_field(&self) -> Option<&'static str> {
        match self.transport {
            TransportKind::StreamableHttp | TransportKind::Sse if is_blank(&self.url) => {
                Some("url")
            }
            TransportKind::Stdio if is_blank(&self.command) => Some("command"),
            _ => None,
        }
    }

    /// Check that the resource can be accepted into the registry.
    ///
    /// Docker-backed resources may omit their connection field: the endpoint
    /// only exists once the container is up.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if !self.transport.is_supported() {
            return Err(ValidationError::UnsupportedTransport(
                self.transport.to_string(),
            ));
        }
        if let Some(field) = self.missing_connection_field() {
            if !self.is_docker_backed() {
                return Err(ValidationError::MissingTransportField {
                    transport: self.transport.to_string(),
                    field,
                });
            }
        }
        if let Some(raw) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            url::Url::parse(raw).map_err(|e| ValidationError::InvalidUrl {
                url: raw.to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// RBAC check, see [`access::can_access`].
    pub fn can_access(&self, caller: &Caller, operation: Operation) -> bool {
        access::can_access(caller, self, operation)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
