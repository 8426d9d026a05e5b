//! Backend proxies
//!
//! A [`BackendProxy`] is the resolved, transport-specific description of how
//! the gateway reaches one backend. The compositor mounts proxies onto the
//! aggregate and the connection pool dials them.

use std::collections::HashMap;

use async_trait::async_trait;
use mcpgate_core::{ServerResource, TransportKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("Unsupported transport type '{0}'")]
    UnsupportedTransport(String),

    #[error("{transport} resource has no {field}")]
    MissingField {
        transport: String,
        field: &'static str,
    },

    #[error("Invalid command '{command}': {reason}")]
    InvalidCommand { command: String, reason: String },
}

/// Resolved connection target for one backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendProxy {
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    StreamableHttp {
        url: String,
    },
    Sse {
        url: String,
    },
}

impl BackendProxy {
    /// Resolve the proxy for `resource`.
    ///
    /// Fails when the transport kind is unknown or its connection field is
    /// missing.
    pub fn from_resource(resource: &ServerResource) -> Result<Self, ProxyError> {
        if let Some(field) = resource.missing_connection_field() {
            return Err(ProxyError::MissingField {
                transport: resource.transport.to_string(),
                field,
            });
        }

        match &resource.transport {
            TransportKind::StreamableHttp => Ok(BackendProxy::StreamableHttp {
                url: resource.url.clone().unwrap_or_default(),
            }),
            TransportKind::Sse => Ok(BackendProxy::Sse {
                url: resource.url.clone().unwrap_or_default(),
            }),
            TransportKind::Stdio => {
                let command = resource.command.as_deref().unwrap_or_default();
                let (command, args) = parse_command(command, &resource.args)?;
                Ok(BackendProxy::Stdio {
                    command,
                    args,
                    env: resource.env.clone(),
                })
            }
            TransportKind::Unsupported(other) => {
                Err(ProxyError::UnsupportedTransport(other.clone()))
            }
        }
    }

    pub fn transport(&self) -> TransportKind {
        match self {
            BackendProxy::Stdio { .. } => TransportKind::Stdio,
            BackendProxy::StreamableHttp { .. } => TransportKind::StreamableHttp,
            BackendProxy::Sse { .. } => TransportKind::Sse,
        }
    }

    /// Short description for logging
    pub fn description(&self) -> String {
        match self {
            BackendProxy::Stdio { command, .. } => format!("stdio:{}", command),
            BackendProxy::StreamableHttp { url } => format!("http:{}", url),
            BackendProxy::Sse { url } => format!("sse:{}", url),
        }
    }
}

/// Split a command that may carry embedded arguments.
///
/// - "docker run -i --rm image" → ("docker", ["run", "-i", "--rm", "image"])
/// - "node" with args ["server.js"] → ("node", ["server.js"])
///
/// Explicit args win: the command is then taken verbatim.
pub fn parse_command(command: &str, args: &[String]) -> Result<(String, Vec<String>), ProxyError> {
    let command = command.trim();
    if !args.is_empty() || !command.contains(' ') {
        return Ok((command.to_string(), args.to_vec()));
    }

    let mut parts = shell_words::split(command).map_err(|e| ProxyError::InvalidCommand {
        command: command.to_string(),
        reason: e.to_string(),
    })?;

    if parts.is_empty() {
        return Err(ProxyError::InvalidCommand {
            command: command.to_string(),
            reason: "empty after parsing".to_string(),
        });
    }

    let executable = parts.remove(0);
    Ok((executable, parts))
}

/// Builds proxies for the compositor.
///
/// Building may suspend (e.g. to resolve an endpoint); the compositor keeps
/// its exclusive section held across the call.
#[async_trait]
pub trait ProxyFactory: Send + Sync {
    async fn build(&self, resource: &ServerResource) -> Result<BackendProxy, ProxyError>;
}

/// Default factory: resolves proxies straight from the resource definition
#[derive(Debug, Default, Clone, Copy)]
pub struct TransportProxyFactory;

#[async_trait]
impl ProxyFactory for TransportProxyFactory {
    async fn build(&self, resource: &ServerResource) -> Result<BackendProxy, ProxyError> {
        BackendProxy::from_resource(resource)
    }
}
