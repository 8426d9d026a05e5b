//! Shared test utilities and fixtures for mcpgate integration tests.

pub use mcpgate_core::{Caller, DomainEvent, ServerResource, TransportKind};

/// Mock implementations of the gateway's seams
pub mod mocks;
pub use mocks::{MockCompositor, MockConnector, MockContainerManager, MockPool, SharedAggregate};

/// Event testing utilities
pub mod events {
    use mcpgate_core::{DomainEvent, EventReceiver};
    use std::time::Duration;

    /// Collect events from a receiver until `timeout` passes or the channel ends
    pub async fn collect_events(mut rx: EventReceiver, timeout: Duration) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }

            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Ok(event)) => events.push(event),
                Ok(Err(_)) => break, // Channel closed or lagged
                Err(_) => break,     // Timeout
            }
        }

        events
    }

    /// Wait for the first event matching `predicate`
    pub async fn wait_for_event<F>(
        rx: &mut EventReceiver,
        timeout: Duration,
        predicate: F,
    ) -> Option<DomainEvent>
    where
        F: Fn(&DomainEvent) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }

            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Ok(event)) if predicate(&event) => return Some(event),
                Ok(Ok(_)) => continue,
                Ok(Err(_)) => return None,
                Err(_) => return None,
            }
        }
    }

    /// Names of events in order, e.g. `["server_created:github"]`
    pub fn event_log(events: &[DomainEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| format!("{}:{}", e.type_name(), e.server_name()))
            .collect()
    }
}

/// Test fixture utilities
pub mod fixtures {
    use mcpgate_core::{Caller, ServerResource};
    use std::collections::BTreeMap;

    pub const OWNER: &str = "user1";

    /// Streamable HTTP resource at `http://<name>.test/mcp`
    pub fn http_server(name: &str) -> ServerResource {
        ServerResource::streamable_http(name, format!("http://{}.test/mcp", name), OWNER)
    }

    pub fn stdio_server(name: &str) -> ServerResource {
        ServerResource::stdio(
            name,
            "npx",
            vec!["-y".to_string(), format!("@test/{}", name)],
            OWNER,
        )
    }

    /// Docker-backed resource exposing port 8080
    pub fn docker_server(name: &str) -> ServerResource {
        let mut ports = BTreeMap::new();
        ports.insert("8080/tcp".to_string(), 8080);
        ServerResource::streamable_http(name, "http://localhost:8080/mcp", OWNER)
            .with_docker(format!("ghcr.io/test/{}:latest", name), ports)
    }

    /// `http_server(name)` restricted to `roles`
    pub fn gated_server(name: &str, roles: &[&str]) -> ServerResource {
        http_server(name).with_required_roles(roles.iter().copied())
    }

    pub fn caller(user_id: &str, roles: &[&str]) -> Caller {
        Caller::new(user_id).with_roles(roles.iter().copied())
    }

    pub fn admin() -> Caller {
        caller("root", &["admin"])
    }
}

/// Database test helpers
pub mod db {
    use mcpgate_storage::{Database, SqliteResourceStore, DATABASE_FILE};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    /// A database in a temporary directory, removed on drop
    pub struct TestDatabase {
        pub db: Arc<Mutex<Database>>,
        _temp_dir: TempDir,
        db_path: PathBuf,
    }

    impl TestDatabase {
        pub fn new() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let db_path = temp_dir.path().join(DATABASE_FILE);
            let db = Database::open(&db_path).expect("Failed to open test database");
            Self {
                db: Arc::new(Mutex::new(db)),
                db_path,
                _temp_dir: temp_dir,
            }
        }

        /// Create an in-memory database for fast tests
        pub fn in_memory() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let db = Database::open_in_memory().expect("Failed to open in-memory database");
            Self {
                db: Arc::new(Mutex::new(db)),
                db_path: PathBuf::new(),
                _temp_dir: temp_dir,
            }
        }

        pub fn store(&self) -> SqliteResourceStore {
            SqliteResourceStore::new(self.db.clone())
        }

        pub fn path(&self) -> &Path {
            self._temp_dir.path()
        }

        pub fn db_path(&self) -> &Path {
            &self.db_path
        }
    }

    impl Default for TestDatabase {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Async test helpers
pub mod async_helpers {
    use std::time::Duration;
    use tokio::time::timeout;

    /// Run an async operation with a timeout
    pub async fn with_timeout<F, T>(duration: Duration, f: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        timeout(duration, f).await.expect("Operation timed out")
    }

    /// Poll `check` until it returns true or `duration` passes
    pub async fn eventually<F, Fut>(duration: Duration, mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + duration;
        while tokio::time::Instant::now() < deadline {
            if check().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check().await
    }

    /// Default test timeout (5 seconds)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
}
