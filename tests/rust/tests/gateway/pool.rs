//! McpConnectionPool tests
//!
//! Single-flight connects, threshold eviction and evict races, using a
//! counting connector instead of real backends.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use mcpgate_core::{InMemoryResourceStore, ResourceStore};
use mcpgate_gateway::pool::{
    ConnectionPool, HealthState, McpConnectionPool, PoolConfig, PoolError,
};
use pretty_assertions::assert_eq;
use tests::fixtures;
use tests::mocks::MockConnector;

fn config(threshold: u32) -> PoolConfig {
    PoolConfig::new(NonZeroU32::new(threshold).unwrap())
        .with_connect_timeout(Duration::from_secs(2))
        .with_probe_timeout(Duration::from_millis(200))
}

fn pool_with(connector: Arc<MockConnector>, threshold: u32) -> Arc<McpConnectionPool> {
    let store = Arc::new(InMemoryResourceStore::with_resources([
        fixtures::http_server("github"),
        fixtures::stdio_server("fs"),
        fixtures::http_server("off").with_enabled(false),
    ]));
    Arc::new(McpConnectionPool::new(store, connector, config(threshold)))
}

// ============================================================================
// Connecting
// ============================================================================

#[tokio::test]
async fn test_concurrent_callers_share_one_connect() {
    let connector = Arc::new(MockConnector::new().with_delay(Duration::from_millis(50)));
    let pool = pool_with(connector.clone(), 3);

    let results = join_all((0..8).map(|_| {
        let pool = pool.clone();
        async move { pool.get_or_create("github").await }
    }))
    .await;

    let first = results[0].as_ref().unwrap().clone();
    for result in &results {
        assert!(Arc::ptr_eq(result.as_ref().unwrap(), &first));
    }
    assert_eq!(connector.attempts(), 1);
    assert_eq!(connector.peak_in_flight(), 1);
    assert_eq!(pool.active_count(), 1);
}

#[tokio::test]
async fn test_different_names_connect_independently() {
    let connector = Arc::new(MockConnector::new().with_delay(Duration::from_millis(50)));
    let pool = pool_with(connector.clone(), 3);

    let (a, b) = tokio::join!(pool.get_or_create("github"), pool.get_or_create("fs"));
    a.unwrap();
    b.unwrap();

    assert_eq!(connector.attempts(), 2);
    let mut names = pool.pooled_names();
    names.sort();
    assert_eq!(names, vec!["fs", "github"]);
}

#[tokio::test]
async fn test_failed_connect_is_not_cached() {
    let connector = Arc::new(MockConnector::new());
    let pool = pool_with(connector.clone(), 3);

    connector.set_failing(true);
    let err = pool.get_or_create("github").await.unwrap_err();
    assert!(matches!(err, PoolError::Connect { .. }));
    assert_eq!(pool.active_count(), 0);

    connector.set_failing(false);
    pool.get_or_create("github").await.unwrap();
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test]
async fn test_unknown_and_disabled_never_connect() {
    let connector = Arc::new(MockConnector::new());
    let pool = pool_with(connector.clone(), 3);

    assert!(matches!(
        pool.get_or_create("ghost").await.unwrap_err(),
        PoolError::UnknownServer(_)
    ));
    assert!(matches!(
        pool.get_or_create("off").await.unwrap_err(),
        PoolError::Disabled(_)
    ));
    assert_eq!(connector.attempts(), 0);
    assert_eq!(pool.slot_count(), 0);
}

#[tokio::test]
async fn test_connect_timeout() {
    let connector = Arc::new(MockConnector::new().with_delay(Duration::from_millis(500)));
    let store = Arc::new(InMemoryResourceStore::with_resources([fixtures::http_server(
        "slow",
    )]));
    let pool = McpConnectionPool::new(
        store,
        connector,
        config(3).with_connect_timeout(Duration::from_millis(50)),
    );

    let err = pool.get_or_create("slow").await.unwrap_err();
    assert!(matches!(err, PoolError::Timeout { .. }));
    assert_eq!(pool.active_count(), 0);
}

#[tokio::test]
async fn test_evict_during_connect_discards_session() {
    let connector = Arc::new(MockConnector::new().with_delay(Duration::from_millis(100)));
    let pool = pool_with(connector.clone(), 3);

    let pending = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.get_or_create("github").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    pool.evict("github").await.unwrap();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, PoolError::Evicted(_)));
    assert_eq!(pool.active_count(), 0);
    assert_eq!(connector.closed(), 1);

    // A fresh request after the eviction connects again
    pool.get_or_create("github").await.unwrap();
    assert_eq!(pool.active_count(), 1);
}

#[tokio::test]
async fn test_stale_connect_never_replaces_newer_session() {
    let connector = Arc::new(MockConnector::new().with_delays([
        Duration::from_millis(200),
        Duration::from_millis(10),
    ]));
    let pool = pool_with(connector.clone(), 3);

    let stale = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.get_or_create("github").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    pool.evict("github").await.unwrap();

    let fresh = pool.get_or_create("github").await.unwrap();
    assert_eq!(pool.active_count(), 1);

    let err = stale.await.unwrap().unwrap_err();
    assert!(matches!(err, PoolError::Evicted(_)));

    // Only the stale session was closed; the fresh one is still pooled
    assert_eq!(connector.closed(), 1);
    assert_eq!(pool.active_count(), 1);
    let pooled = pool.get_or_create("github").await.unwrap();
    assert!(Arc::ptr_eq(&pooled, &fresh));
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test]
async fn test_rejected_names_leave_no_slot() {
    let pool = pool_with(Arc::new(MockConnector::new()), 3);

    for i in 0..20 {
        let _ = pool.get_or_create(&format!("ghost-{}", i)).await;
        let _ = pool.get_or_create("off").await;
    }
    assert_eq!(pool.slot_count(), 0);

    pool.get_or_create("github").await.unwrap();
    assert_eq!(pool.slot_count(), 1);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_threshold_failures_evict() {
    let connector = Arc::new(MockConnector::new());
    let pool = pool_with(connector.clone(), 2);
    pool.get_or_create("github").await.unwrap();

    connector.set_healthy(false);

    let sweep = pool.health_check().await.unwrap();
    assert_eq!(sweep.unhealthy, 1);
    assert!(sweep.evicted.is_empty());
    assert_eq!(pool.snapshot()[0].health, HealthState::Unhealthy);

    let sweep = pool.health_check().await.unwrap();
    assert_eq!(sweep.evicted, vec!["github"]);
    assert_eq!(pool.active_count(), 0);
    assert_eq!(connector.closed(), 1);
}

#[tokio::test]
async fn test_recovery_resets_failure_count() {
    let connector = Arc::new(MockConnector::new());
    let pool = pool_with(connector.clone(), 2);
    pool.get_or_create("github").await.unwrap();

    connector.set_healthy(false);
    pool.health_check().await.unwrap();
    connector.set_healthy(true);
    pool.health_check().await.unwrap();
    connector.set_healthy(false);
    let sweep = pool.health_check().await.unwrap();

    // Failures were not consecutive
    assert!(sweep.evicted.is_empty());
    assert_eq!(pool.snapshot()[0].failures, 1);
}

#[tokio::test]
async fn test_health_check_on_empty_pool() {
    let pool = pool_with(Arc::new(MockConnector::new()), 1);

    let sweep = pool.health_check().await.unwrap();

    assert_eq!(sweep.probed, 0);
    assert!(pool.snapshot().is_empty());
}

#[tokio::test]
async fn test_evict_unknown_is_ok() {
    let pool = pool_with(Arc::new(MockConnector::new()), 1);
    pool.evict("ghost").await.unwrap();
    assert_eq!(pool.active_count(), 0);
}

#[tokio::test]
async fn test_store_is_reread_on_connect() {
    let connector = Arc::new(MockConnector::new());
    let store = Arc::new(InMemoryResourceStore::new());
    let pool = McpConnectionPool::new(store.clone(), connector, config(1));

    assert!(matches!(
        pool.get_or_create("late").await.unwrap_err(),
        PoolError::UnknownServer(_)
    ));

    store.upsert(&fixtures::http_server("late")).await.unwrap();
    pool.get_or_create("late").await.unwrap();
}
