//! Mock implementations for testing
//!
//! Hand-written doubles for the gateway's seams. Mocks that take part in
//! ordering tests share a [`CallLog`] so their calls can be compared across
//! collaborators.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;

use mcpgate_core::{ContainerManager, ContainerStatus, ServerResource};
use mcpgate_gateway::aggregate::{
    AggregateError, AggregateGateway, MountedProxy, NamespacedAggregate,
};
use mcpgate_gateway::compositor::{Compositor, CompositorError, MountOutcome};
use mcpgate_gateway::pool::{
    ConnectionPool, Connector, HealthSweep, McpConnection, PoolError, PooledConnection,
};
use mcpgate_gateway::proxy::BackendProxy;

/// Ordered record of calls made across mocks
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(log: &Option<CallLog>, entry: String) {
    if let Some(log) = log {
        log.lock().push(entry);
    }
}

// ============================================================================
// MockConnection / MockConnector
// ============================================================================

/// Connection whose probe result is controlled by a shared flag
pub struct MockConnection {
    healthy: Arc<AtomicBool>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl McpConnection for MockConnection {
    async fn ping(&self) -> anyhow::Result<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(anyhow!("backend not responding"))
        }
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector that counts attempts and tracks peak concurrency
#[derive(Default)]
pub struct MockConnector {
    delay: Duration,
    delays: Mutex<VecDeque<Duration>>,
    fail: AtomicBool,
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    healthy: Arc<AtomicBool>,
    closed: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new() -> Self {
        let connector = Self::default();
        connector.healthy.store(true, Ordering::SeqCst);
        connector
    }

    /// Hold every connect for `delay` before completing
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Per-attempt delays, consumed in order; `with_delay` applies after
    pub fn with_delays(self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.delays.lock().extend(delays);
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make every connection handed out so far (and later) pass or fail probes
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _name: &str,
        _proxy: &BackendProxy,
    ) -> anyhow::Result<Arc<dyn McpConnection>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.lock().pop_front().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }

        Ok(Arc::new(MockConnection {
            healthy: self.healthy.clone(),
            closed: self.closed.clone(),
        }))
    }
}

// ============================================================================
// MockPool
// ============================================================================

#[derive(Default)]
pub struct MockPool {
    log: Option<CallLog>,
    pooled: Mutex<BTreeSet<String>>,
    evicted: Mutex<Vec<String>>,
    fail_health: AtomicBool,
    fail_evict: AtomicBool,
}

impl MockPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_pooled<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pooled.lock().extend(names.into_iter().map(Into::into));
        self
    }

    pub fn set_health_failing(&self, fail: bool) {
        self.fail_health.store(fail, Ordering::SeqCst);
    }

    pub fn set_evict_failing(&self, fail: bool) {
        self.fail_evict.store(fail, Ordering::SeqCst);
    }

    /// Every name passed to `evict`, in call order
    pub fn evicted(&self) -> Vec<String> {
        self.evicted.lock().clone()
    }
}

#[async_trait]
impl ConnectionPool for MockPool {
    async fn get_or_create(&self, name: &str) -> Result<Arc<PooledConnection>, PoolError> {
        self.pooled.lock().insert(name.to_string());
        let connection = MockConnection {
            healthy: Arc::new(AtomicBool::new(true)),
            closed: Arc::new(AtomicUsize::new(0)),
        };
        Ok(Arc::new(PooledConnection::new(name, Arc::new(connection))))
    }

    async fn health_check(&self) -> anyhow::Result<HealthSweep> {
        if self.fail_health.load(Ordering::SeqCst) {
            return Err(anyhow!("pool unavailable"));
        }
        let probed = self.pooled.lock().len();
        Ok(HealthSweep {
            probed,
            healthy: probed,
            ..Default::default()
        })
    }

    async fn evict(&self, name: &str) -> anyhow::Result<()> {
        record(&self.log, format!("evict:{}", name));
        self.evicted.lock().push(name.to_string());
        if self.fail_evict.load(Ordering::SeqCst) {
            return Err(anyhow!("evict failed"));
        }
        self.pooled.lock().remove(name);
        Ok(())
    }

    fn active_count(&self) -> usize {
        self.pooled.lock().len()
    }

    fn pooled_names(&self) -> Vec<String> {
        self.pooled.lock().iter().cloned().collect()
    }
}

// ============================================================================
// MockContainerManager
// ============================================================================

#[derive(Default)]
pub struct MockContainerManager {
    log: Option<CallLog>,
    running: Mutex<HashMap<String, String>>,
    unreachable: AtomicBool,
    fail_start: AtomicBool,
    broken: Mutex<BTreeSet<String>>,
}

impl MockContainerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Backend answers no calls at all
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_start_failing(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// `get_status(name)` errors for this name only
    pub fn break_status(&self, name: &str) {
        self.broken.lock().insert(name.to_string());
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.lock().contains_key(name)
    }

    fn check_reachable(&self) -> anyhow::Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(anyhow!("Cannot connect to the Docker daemon"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContainerManager for MockContainerManager {
    async fn ping(&self) -> anyhow::Result<()> {
        self.check_reachable()
    }

    async fn start_server(&self, resource: &ServerResource) -> anyhow::Result<String> {
        record(&self.log, format!("start:{}", resource.name));
        self.check_reachable()?;
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(anyhow!("image pull failed"));
        }
        let id = format!("ctr-{}", resource.name);
        self.running
            .lock()
            .insert(resource.name.clone(), id.clone());
        Ok(id)
    }

    async fn stop_server(&self, name: &str) -> anyhow::Result<()> {
        record(&self.log, format!("stop:{}", name));
        self.check_reachable()?;
        self.running.lock().remove(name);
        Ok(())
    }

    async fn get_status(&self, name: &str) -> anyhow::Result<ContainerStatus> {
        self.check_reachable()?;
        if self.broken.lock().contains(name) {
            return Err(anyhow!("inspect failed for {}", name));
        }
        Ok(match self.running.lock().get(name) {
            Some(id) => ContainerStatus::running(id.clone()),
            None => ContainerStatus::not_running("exited"),
        })
    }
}

// ============================================================================
// MockCompositor
// ============================================================================

#[derive(Default)]
pub struct MockCompositor {
    log: Option<CallLog>,
    mounted: Mutex<BTreeSet<String>>,
    fail_unmount: AtomicBool,
}

impl MockCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn set_unmount_failing(&self, fail: bool) {
        self.fail_unmount.store(fail, Ordering::SeqCst);
    }

    pub fn mounted(&self) -> BTreeSet<String> {
        self.mounted.lock().clone()
    }
}

#[async_trait]
impl Compositor for MockCompositor {
    async fn mount_server(
        &self,
        resource: &ServerResource,
    ) -> Result<MountOutcome, CompositorError> {
        record(&self.log, format!("mount:{}", resource.name));
        if !resource.is_enabled {
            return Ok(MountOutcome::SkippedDisabled);
        }
        let mut mounted = self.mounted.lock();
        if !mounted.insert(resource.name.clone()) {
            return Err(CompositorError::AlreadyMounted(resource.name.clone()));
        }
        Ok(MountOutcome::Mounted {
            position: mounted.len() - 1,
        })
    }

    async fn unmount_server(&self, name: &str) -> Result<(), CompositorError> {
        record(&self.log, format!("unmount:{}", name));
        if self.fail_unmount.load(Ordering::SeqCst) {
            return Err(CompositorError::Aggregate(AggregateError::Rejected {
                namespace: name.to_string(),
                reason: "aggregate is read-only".to_string(),
            }));
        }
        self.mounted.lock().remove(name);
        Ok(())
    }

    async fn mounted_names(&self) -> BTreeSet<String> {
        self.mounted()
    }
}

// ============================================================================
// SharedAggregate
// ============================================================================

/// Aggregate the test keeps a handle to, so it can be mutated behind the
/// compositor's back
#[derive(Clone, Default)]
pub struct SharedAggregate(pub Arc<Mutex<NamespacedAggregate>>);

impl SharedAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.0
            .lock()
            .entries()
            .iter()
            .map(|e| e.namespace.clone())
            .collect()
    }
}

impl AggregateGateway for SharedAggregate {
    fn append(&mut self, proxy: BackendProxy, namespace: &str) -> Result<usize, AggregateError> {
        self.0.lock().append(proxy, namespace)
    }

    fn pop(&mut self, position: usize) -> Result<MountedProxy, AggregateError> {
        self.0.lock().pop(position)
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }

    fn set_enabled(&mut self, position: usize, enabled: bool) -> Result<(), AggregateError> {
        self.0.lock().set_enabled(position, enabled)
    }

    fn namespace_at(&self, position: usize) -> Option<String> {
        self.0.lock().namespace_at(position)
    }

    fn visible_namespaces(&self) -> Vec<String> {
        self.0.lock().visible_namespaces()
    }
}
