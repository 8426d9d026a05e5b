//! SQLite handle for the resource registry
//!
//! Schema changes live in numbered files under `migrations/` and are listed in
//! [`MIGRATIONS`]. Applied versions are recorded in `schema_migrations`, so
//! opening an existing database only runs what it has not seen yet.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use tracing::{debug, error, info};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

impl Migration {
    /// Run the script and record it, atomically
    fn apply(&self, conn: &Connection) -> Result<()> {
        let tx = conn.unchecked_transaction()?;

        tx.execute_batch(self.sql).map_err(|e| {
            error!(
                version = self.version,
                name = self.name,
                error = %e,
                "[Database] Migration failed"
            );
            anyhow::anyhow!("Migration {} ({}) failed: {}", self.version, self.name, e)
        })?;

        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, datetime('now'))",
            params![self.version, self.name],
        )?;

        tx.commit()
            .with_context(|| format!("Failed to commit migration {}", self.version))
    }
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "server_resources",
    sql: include_str!("migrations/001_initial.sql"),
}];

pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (creating if needed) the database file at `path` and migrate it.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create database directory {}", dir.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Cannot open database {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        debug!(path = %path.display(), "[Database] Opened");
        Self::migrated(conn, Some(path.to_path_buf()))
    }

    /// Private in-memory database, gone when dropped
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Cannot open in-memory database")?;
        debug!("[Database] Opened in-memory");
        Self::migrated(conn, None)
    }

    fn migrated(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        let db = Self { conn, path };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );",
        )?;

        let applied = self.schema_version()?;
        let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
        if pending.is_empty() {
            debug!(version = applied, "[Database] Schema up to date");
            return Ok(());
        }

        for migration in pending {
            info!(
                version = migration.version,
                name = migration.name,
                "[Database] Applying migration"
            );
            migration.apply(&self.conn)?;
        }
        Ok(())
    }

    /// Highest applied migration, 0 for a fresh database
    pub fn schema_version(&self) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .context("Cannot read schema version")
    }

    /// File backing this database, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
