//! Gateway configuration
//!
//! Loaded from `MCPGATE_*` environment variables. The pool failure threshold
//! has no default and must be set explicitly.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use mcpgate_core::DEFAULT_REGISTRY_URL;
use thiserror::Error;

use crate::pool::PoolConfig;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8765;

/// Default interval between periodic health checks
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// `database_path` value selecting the in-memory store
pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Where resources are persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    InMemory,
    File(PathBuf),
}

/// Gateway server configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Resource store location; `None` uses the platform default
    pub database: Option<DatabaseLocation>,
    pub health_check_interval: Duration,
    pub pool: PoolConfig,
    /// Base URL of the MCP registry used for discovery
    pub registry_url: String,
    /// Enable CORS for browser access
    pub enable_cors: bool,
}

impl GatewayConfig {
    pub fn new(pool: PoolConfig) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            database: None,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            pool,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            enable_cors: true,
        }
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let threshold_key = "MCPGATE_POOL_FAILURE_THRESHOLD";
        let threshold = get(threshold_key).ok_or(ConfigError::Missing(threshold_key))?;
        let threshold = threshold
            .trim()
            .parse::<NonZeroU32>()
            .map_err(|e| ConfigError::Invalid {
                key: threshold_key,
                reason: e.to_string(),
            })?;

        let mut pool = PoolConfig::new(threshold);
        if let Some(secs) = parse_secs(&get, "MCPGATE_POOL_CONNECT_TIMEOUT_SECS")? {
            pool = pool.with_connect_timeout(secs);
        }
        if let Some(secs) = parse_secs(&get, "MCPGATE_POOL_PROBE_TIMEOUT_SECS")? {
            pool = pool.with_probe_timeout(secs);
        }

        let mut config = Self::new(pool);

        if let Some(host) = get("MCPGATE_HOST") {
            config.host = host;
        }
        if let Some(port) = get("MCPGATE_PORT") {
            config.port = port.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    key: "MCPGATE_PORT",
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(path) = get("MCPGATE_DATABASE_PATH") {
            config.database = Some(if path == IN_MEMORY_DATABASE {
                DatabaseLocation::InMemory
            } else {
                DatabaseLocation::File(PathBuf::from(path))
            });
        }
        if let Some(interval) = parse_secs(&get, "MCPGATE_HEALTH_CHECK_INTERVAL_SECS")? {
            config.health_check_interval = interval;
        }
        if let Some(url) = get("MCPGATE_REGISTRY_URL") {
            config.registry_url = url;
        }
        if let Some(cors) = get("MCPGATE_ENABLE_CORS") {
            config.enable_cors = matches!(cors.trim(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// Get the socket address
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "MCPGATE_HOST",
                reason: e.to_string(),
            })
    }
}

fn parse_secs<G>(get: &G, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => {
            let secs: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    key,
                    reason: e.to_string(),
                }
            })?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
            Ok(Some(Duration::from_secs(secs)))
        }
    }
}
