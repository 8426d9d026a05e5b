//! mcpgate Storage Layer
//!
//! SQLite persistence for the resource registry.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mcpgate_storage::{Database, SqliteResourceStore};
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//!
//! let db = Database::open(&path)?;
//! let store = SqliteResourceStore::new(Arc::new(Mutex::new(db)));
//! ```

mod database;
mod repositories;

pub use database::Database;
pub use repositories::*;

/// Default database file name.
pub const DATABASE_FILE: &str = "mcpgate.db";

/// Get the default database path for the current platform.
pub fn default_database_path() -> Option<std::path::PathBuf> {
    dirs::data_local_dir().map(|p| p.join("mcpgate").join(DATABASE_FILE))
}
