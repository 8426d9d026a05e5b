//! SQLite implementation of ResourceStore.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mcpgate_core::{ResourceStore, ServerResource, TransportKind};
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;
use tracing::warn;

use crate::Database;

/// SQLite-backed implementation of ResourceStore.
pub struct SqliteResourceStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteResourceStore {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Parse a datetime string to DateTime<Utc>.
    fn parse_datetime(s: &str) -> DateTime<Utc> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return dt.with_timezone(&Utc);
        }
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return dt.and_utc();
        }
        Utc::now()
    }

    /// Parse a JSON column, falling back to the empty value on corrupt data.
    fn parse_json<T: serde::de::DeserializeOwned + Default>(name: &str, column: &str, s: &str) -> T {
        serde_json::from_str(s).unwrap_or_else(|e| {
            warn!(
                server = name,
                column,
                error = %e,
                "[SqliteResourceStore] Ignoring malformed JSON column"
            );
            T::default()
        })
    }

    const SELECT_COLUMNS: &'static str =
        "name, transport_type, url, command, args, env, docker_image, docker_ports,
         required_roles, is_enabled, created_by, created_at, updated_at";

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ServerResource> {
        let name: String = row.get(0)?;
        let transport: String = row.get(1)?;
        let args: String = row.get(4)?;
        let env: String = row.get(5)?;
        let docker_ports: String = row.get(7)?;
        let required_roles: String = row.get(8)?;
        let created_at: String = row.get(11)?;
        let updated_at: String = row.get(12)?;

        Ok(ServerResource {
            transport: TransportKind::from(transport),
            url: row.get(2)?,
            command: row.get(3)?,
            args: Self::parse_json::<Vec<String>>(&name, "args", &args),
            env: Self::parse_json::<HashMap<String, String>>(&name, "env", &env),
            docker_image: row.get(6)?,
            docker_ports: Self::parse_json::<BTreeMap<String, u16>>(
                &name,
                "docker_ports",
                &docker_ports,
            ),
            required_roles: Self::parse_json::<BTreeSet<String>>(
                &name,
                "required_roles",
                &required_roles,
            ),
            is_enabled: row.get(9)?,
            created_by: row.get(10)?,
            created_at: Self::parse_datetime(&created_at),
            updated_at: Self::parse_datetime(&updated_at),
            name,
        })
    }
}

#[async_trait]
impl ResourceStore for SqliteResourceStore {
    async fn upsert(&self, resource: &ServerResource) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute(
            "INSERT INTO server_resources (name, transport_type, url, command, args, env, docker_image,
                docker_ports, required_roles, is_enabled, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(name) DO UPDATE SET
                transport_type = excluded.transport_type,
                url = excluded.url,
                command = excluded.command,
                args = excluded.args,
                env = excluded.env,
                docker_image = excluded.docker_image,
                docker_ports = excluded.docker_ports,
                required_roles = excluded.required_roles,
                is_enabled = excluded.is_enabled,
                created_by = excluded.created_by,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
            params![
                resource.name,
                resource.transport.as_str(),
                resource.url,
                resource.command,
                serde_json::to_string(&resource.args)?,
                serde_json::to_string(&resource.env)?,
                resource.docker_image,
                serde_json::to_string(&resource.docker_ports)?,
                serde_json::to_string(&resource.required_roles)?,
                resource.is_enabled,
                resource.created_by,
                resource.created_at.to_rfc3339(),
                resource.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<ServerResource>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM server_resources WHERE name = ?1",
            Self::SELECT_COLUMNS
        ))?;

        let resource = stmt.query_row([name], Self::map_row).optional()?;

        Ok(resource)
    }

    async fn list_all(&self) -> Result<Vec<ServerResource>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM server_resources ORDER BY name",
            Self::SELECT_COLUMNS
        ))?;

        let resources = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(resources)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute("DELETE FROM server_resources WHERE name = ?1", [name])?;
        Ok(())
    }

    async fn list_enabled(&self) -> Result<Vec<ServerResource>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM server_resources WHERE is_enabled = 1 ORDER BY name",
            Self::SELECT_COLUMNS
        ))?;

        let resources = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(resources)
    }

    async fn count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM server_resources", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
