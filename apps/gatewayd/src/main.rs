//! mcpgated - standalone MCP gateway daemon
//!
//! Reads `MCPGATE_*` settings from the environment (or a `.env` file), opens
//! the resource store and serves the gateway until Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use mcpgate_core::{InMemoryResourceStore, ResourceStore};
use mcpgate_gateway::{DatabaseLocation, GatewayConfig, GatewayRuntime, GatewayServer};
use mcpgate_storage::{default_database_path, Database, SqliteResourceStore};
use tokio::sync::Mutex;
use tracing::{error, info};

const LOG_PREFIX: &str = "mcpgate";

fn get_app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mcpgate")
}

fn get_logs_dir() -> PathBuf {
    get_app_data_dir().join("logs")
}

/// Initialize tracing with console and file logging
///
/// - Console: colored, compact format
/// - File: daily rotation under the local data dir (`mcpgate/logs/`)
fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let logs_dir = get_logs_dir();
    if let Err(e) = std::fs::create_dir_all(&logs_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
    }

    // mcpgate.2026-01-22.log
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix("log")
        .build(&logs_dir)
        .context("Failed to create log file appender")?;
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG takes precedence
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("info")
            .add_directive("mcpgate_core=debug".parse()?)
            .add_directive("mcpgate_gateway=debug".parse()?)
            .add_directive("mcpgate_storage=debug".parse()?)
            .add_directive("mcpgated=debug".parse()?),
    };

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn open_store(location: Option<&DatabaseLocation>) -> Result<Arc<dyn ResourceStore>> {
    let path = match location {
        Some(DatabaseLocation::InMemory) => {
            info!("[Storage] Using in-memory resource store");
            return Ok(Arc::new(InMemoryResourceStore::new()));
        }
        Some(DatabaseLocation::File(path)) => path.clone(),
        None => default_database_path().context("Cannot determine local data directory")?,
    };

    info!(path = %path.display(), "[Storage] Opening database");
    let db = Database::open(&path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok(Arc::new(SqliteResourceStore::new(Arc::new(Mutex::new(db)))))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Keep the guard alive for the entire program - dropping it stops file logging
    let _log_guard = init_tracing()?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting mcpgated");

    let config = GatewayConfig::from_env().context("Invalid gateway configuration")?;
    let store = open_store(config.database.as_ref())?;

    let runtime = GatewayRuntime::builder(config, store).build()?;
    GatewayServer::new(runtime).run(shutdown_signal()).await
}
