//! rmcp-backed connector
//!
//! - Stdio: child process via `TokioChildProcess`
//! - Streamable HTTP and SSE: `StreamableHttpClientTransport` over reqwest
//!
//! SSE backends are reached through the streamable HTTP client, which falls
//! back to the SSE stream the server offers on the same endpoint.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rmcp::model::{ClientCapabilities, ClientInfo, Implementation};
use rmcp::service::RunningService;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{ConfigureCommandExt, StreamableHttpClientTransport, TokioChildProcess};
use rmcp::{ClientHandler, RoleClient, ServiceExt};
use tokio::process::Command;
use tracing::{debug, info};

use super::connection::{Connector, McpConnection};
use crate::proxy::BackendProxy;

/// Type alias for the MCP client service
pub type McpClient = RunningService<RoleClient, McpClientHandler>;

/// Client handler announcing the gateway to backends
#[derive(Clone, Debug)]
pub struct McpClientHandler {
    info: ClientInfo,
}

impl McpClientHandler {
    pub fn new(server_name: &str) -> Self {
        Self {
            info: ClientInfo {
                protocol_version: Default::default(),
                capabilities: ClientCapabilities::default(),
                client_info: Implementation {
                    name: format!("mcpgate-{}", server_name),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: Some("mcpgate Gateway".to_string()),
                    icons: None,
                    website_url: None,
                    ..Default::default()
                },
                meta: None,
            },
        }
    }
}

impl ClientHandler for McpClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }
}

/// A running rmcp client session
pub struct RmcpConnection {
    name: String,
    client: tokio::sync::Mutex<Option<McpClient>>,
}

impl RmcpConnection {
    pub fn new(name: impl Into<String>, client: McpClient) -> Self {
        Self {
            name: name.into(),
            client: tokio::sync::Mutex::new(Some(client)),
        }
    }
}

#[async_trait]
impl McpConnection for RmcpConnection {
    async fn ping(&self) -> Result<()> {
        let peer = {
            let guard = self.client.lock().await;
            match guard.as_ref() {
                Some(client) => client.peer().clone(),
                None => anyhow::bail!("connection to '{}' is closed", self.name),
            }
        };

        peer.list_tools(Default::default())
            .await
            .context("Failed to list tools")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let client = self.client.lock().await.take();
        if let Some(client) = client {
            info!(server = %self.name, "[RmcpConnection] Disconnecting");
            client.cancel().await.context("Failed to cancel service")?;
        }
        Ok(())
    }
}

/// Connector dialing real backends with rmcp
pub struct RmcpConnector {
    http: reqwest::Client,
}

impl RmcpConnector {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn connect_stdio(
        &self,
        name: &str,
        command: &str,
        args: &[String],
        env: &std::collections::HashMap<String, String>,
    ) -> Result<McpClient> {
        let executable = which::which(command)
            .with_context(|| format!("Command not found: {}. Ensure it's installed and in PATH.", command))?;

        debug!(server = %name, path = ?executable, "[RmcpConnector] Found command");

        let args = args.to_vec();
        let env = env.clone();
        let transport = TokioChildProcess::new(Command::new(&executable).configure(move |cmd| {
            cmd.args(&args)
                .envs(&env)
                .stderr(Stdio::null())
                .kill_on_drop(true);

            // Keep terminal signals aimed at the gateway away from backends
            #[cfg(unix)]
            {
                cmd.process_group(0);
            }
        }))
        .with_context(|| format!("Failed to spawn process: {}", command))?;

        McpClientHandler::new(name)
            .serve(transport)
            .await
            .context("MCP handshake failed")
    }

    async fn connect_http(&self, name: &str, url: &str) -> Result<McpClient> {
        let config = StreamableHttpClientTransportConfig::with_uri(url);
        let transport = StreamableHttpClientTransport::with_client(self.http.clone(), config);

        McpClientHandler::new(name)
            .serve(transport)
            .await
            .context("MCP handshake failed")
    }
}

impl Default for RmcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for RmcpConnector {
    async fn connect(&self, name: &str, proxy: &BackendProxy) -> Result<Arc<dyn McpConnection>> {
        info!(server = %name, proxy = %proxy.description(), "[RmcpConnector] Connecting");

        let client = match proxy {
            BackendProxy::Stdio { command, args, env } => {
                self.connect_stdio(name, command, args, env).await?
            }
            BackendProxy::StreamableHttp { url } | BackendProxy::Sse { url } => {
                self.connect_http(name, url).await?
            }
        };

        debug!(server = %name, peer = ?client.peer_info(), "[RmcpConnector] Connected");
        Ok(Arc::new(RmcpConnection::new(name, client)))
    }
}
