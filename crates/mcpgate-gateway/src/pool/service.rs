//! Pool Service - resource-name keyed connection pool
//!
//! Two maps:
//! - `live`: established sessions, read lock-free on the fast path
//! - `slots`: one per name, serializing connection attempts for that name
//!
//! A failed attempt is not shared: callers queued on the same slot try again
//! in turn once the slot is released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use mcpgate_core::ResourceStore;
use tracing::{debug, info, warn};

use super::connection::{Connector, HealthState, McpConnection, PooledConnection};
use super::{ConnectionPool, ConnectionSnapshot, HealthSweep, PoolConfig, PoolError};
use crate::proxy::BackendProxy;

#[derive(Default)]
struct PoolSlot {
    lock: tokio::sync::Mutex<()>,
    connecting: AtomicBool,
    evicted: AtomicBool,
}

pub struct McpConnectionPool {
    store: Arc<dyn ResourceStore>,
    connector: Arc<dyn Connector>,
    config: PoolConfig,
    live: DashMap<String, Arc<PooledConnection>>,
    slots: DashMap<String, Arc<PoolSlot>>,
}

impl McpConnectionPool {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        connector: Arc<dyn Connector>,
        config: PoolConfig,
    ) -> Self {
        Self {
            store,
            connector,
            config,
            live: DashMap::new(),
            slots: DashMap::new(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Health of every pool entry, including in-flight connects
    pub fn snapshot(&self) -> Vec<ConnectionSnapshot> {
        let mut entries: Vec<ConnectionSnapshot> = self
            .live
            .iter()
            .map(|e| ConnectionSnapshot {
                name: e.key().clone(),
                health: e.value().health(),
                failures: e.value().failures(),
            })
            .collect();

        for slot in self.slots.iter() {
            if slot.value().connecting.load(Ordering::Acquire) && !self.live.contains_key(slot.key())
            {
                entries.push(ConnectionSnapshot {
                    name: slot.key().clone(),
                    health: HealthState::Connecting,
                    failures: 0,
                });
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Slots currently tracked, idle ones included
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Forget `slot` unless someone else is queued on it
    fn release_slot(&self, name: &str, slot: &Arc<PoolSlot>) {
        // One reference in the map, one held by the caller
        self.slots
            .remove_if(name, |_, s| Arc::ptr_eq(s, slot) && Arc::strong_count(s) == 2);
    }

    fn live_entry(&self, name: &str) -> Option<Arc<PooledConnection>> {
        self.live.get(name).map(|e| e.value().clone())
    }

    async fn connect(&self, name: &str) -> Result<Arc<dyn McpConnection>, PoolError> {
        let resource = self
            .store
            .get(name)
            .await
            .map_err(PoolError::Store)?
            .ok_or_else(|| PoolError::UnknownServer(name.to_string()))?;

        if !resource.is_enabled {
            return Err(PoolError::Disabled(name.to_string()));
        }

        let proxy = BackendProxy::from_resource(&resource).map_err(|source| {
            PoolError::InvalidTarget {
                name: name.to_string(),
                source,
            }
        })?;

        debug!(server = %name, proxy = %proxy.description(), "[Pool] Connecting");

        let timeout = self.config.connect_timeout;
        match tokio::time::timeout(timeout, self.connector.connect(name, &proxy)).await {
            Ok(Ok(connection)) => Ok(connection),
            Ok(Err(source)) => Err(PoolError::Connect {
                name: name.to_string(),
                source,
            }),
            Err(_) => Err(PoolError::Timeout {
                name: name.to_string(),
                timeout,
            }),
        }
    }

    async fn close_quietly(name: &str, connection: &Arc<dyn McpConnection>) {
        if let Err(e) = connection.close().await {
            warn!(server = %name, error = %e, "[Pool] Failed to close connection");
        }
    }
}

#[async_trait]
impl ConnectionPool for McpConnectionPool {
    async fn get_or_create(&self, name: &str) -> Result<Arc<PooledConnection>, PoolError> {
        if let Some(existing) = self.live_entry(name) {
            return Ok(existing);
        }

        let slot = self
            .slots
            .entry(name.to_string())
            .or_default()
            .value()
            .clone();

        let _guard = slot.lock.lock().await;

        // Another caller may have connected while we queued
        if let Some(existing) = self.live_entry(name) {
            return Ok(existing);
        }
        if slot.evicted.load(Ordering::Acquire) {
            return Err(PoolError::Evicted(name.to_string()));
        }

        slot.connecting.store(true, Ordering::Release);
        let result = self.connect(name).await;
        slot.connecting.store(false, Ordering::Release);

        let connection = match result {
            Ok(connection) => connection,
            Err(e) => {
                warn!(server = %name, error = %e, "[Pool] Connection attempt failed");
                if matches!(e, PoolError::UnknownServer(_) | PoolError::Disabled(_)) {
                    self.release_slot(name, &slot);
                }
                return Err(e);
            }
        };

        // Evicted while connecting; a newer slot may already own the name
        if slot.evicted.load(Ordering::Acquire) {
            Self::close_quietly(name, &connection).await;
            info!(server = %name, "[Pool] Discarded connection evicted mid-connect");
            return Err(PoolError::Evicted(name.to_string()));
        }

        let pooled = Arc::new(PooledConnection::new(name, connection));
        let winner = self
            .live
            .entry(name.to_string())
            .or_insert_with(|| pooled.clone())
            .value()
            .clone();
        if !Arc::ptr_eq(&winner, &pooled) {
            Self::close_quietly(name, pooled.connection()).await;
            debug!(server = %name, "[Pool] Name already pooled, closed the new session");
            return Ok(winner);
        }

        // `evict` flags the slot before clearing `live`, so one of the two
        // sides always sees the other.
        if slot.evicted.load(Ordering::Acquire) {
            self.live.remove_if(name, |_, v| Arc::ptr_eq(v, &pooled));
            Self::close_quietly(name, pooled.connection()).await;
            info!(server = %name, "[Pool] Discarded connection evicted mid-connect");
            return Err(PoolError::Evicted(name.to_string()));
        }

        info!(server = %name, "[Pool] Connection established");
        Ok(pooled)
    }

    async fn health_check(&self) -> anyhow::Result<HealthSweep> {
        let entries: Vec<Arc<PooledConnection>> =
            self.live.iter().map(|e| e.value().clone()).collect();

        let probe_timeout = self.config.probe_timeout;
        let probes = entries.into_iter().map(|conn| async move {
            let result = match tokio::time::timeout(probe_timeout, conn.connection().ping()).await
            {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("probe timed out after {:?}", probe_timeout)),
            };
            (conn, result)
        });
        let results = join_all(probes).await;

        let threshold = self.config.failure_threshold.get();
        let mut sweep = HealthSweep {
            probed: results.len(),
            ..Default::default()
        };

        for (conn, result) in results {
            match result {
                Ok(()) => {
                    conn.record_success();
                    sweep.healthy += 1;
                }
                Err(e) => {
                    let failures = conn.record_failure();
                    sweep.unhealthy += 1;
                    warn!(
                        server = %conn.name(),
                        failures,
                        threshold,
                        error = %e,
                        "[Pool] Health probe failed"
                    );

                    if failures >= threshold {
                        let removed = self
                            .live
                            .remove_if(conn.name(), |_, v| Arc::ptr_eq(v, &conn))
                            .is_some();
                        if removed {
                            Self::close_quietly(conn.name(), conn.connection()).await;
                            info!(
                                server = %conn.name(),
                                failures,
                                "[Pool] Evicted unhealthy connection"
                            );
                            sweep.evicted.push(conn.name().to_string());
                        }
                    }
                }
            }
        }

        debug!(
            probed = sweep.probed,
            healthy = sweep.healthy,
            unhealthy = sweep.unhealthy,
            evicted = sweep.evicted.len(),
            "[Pool] Health sweep complete"
        );
        Ok(sweep)
    }

    async fn evict(&self, name: &str) -> anyhow::Result<()> {
        if let Some((_, slot)) = self.slots.remove(name) {
            slot.evicted.store(true, Ordering::Release);
        }

        if let Some((_, pooled)) = self.live.remove(name) {
            Self::close_quietly(name, pooled.connection()).await;
            info!(server = %name, "[Pool] Evicted connection");
        }
        Ok(())
    }

    fn active_count(&self) -> usize {
        self.live.len()
    }

    fn pooled_names(&self) -> Vec<String> {
        self.live.iter().map(|e| e.key().clone()).collect()
    }
}
