//! Lifecycle Event Handler - drives the lifecycle hooks from domain events
//!
//! `ServerAppService` only touches the registry; this consumer turns the
//! events it emits into container, mount and pool side effects.
//!
//! The bus is lossy. When the receiver lags, the skipped events are gone, so
//! the handler drops whatever is still queued and reconciles the mounts with
//! the store instead. Events are emitted after the store write, so the store
//! already reflects everything that was dropped.

use std::sync::Arc;

use mcpgate_core::{ContainerManager, DomainEvent, EventReceiver, ResourceStore};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::compositor::Compositor;
use crate::lifecycle;
use crate::pool::ConnectionPool;

pub struct LifecycleEventHandler {
    store: Arc<dyn ResourceStore>,
    compositor: Arc<dyn Compositor>,
    pool: Arc<dyn ConnectionPool>,
    containers: Option<Arc<dyn ContainerManager>>,
}

impl LifecycleEventHandler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        compositor: Arc<dyn Compositor>,
        pool: Arc<dyn ConnectionPool>,
        containers: Option<Arc<dyn ContainerManager>>,
    ) -> Self {
        Self {
            store,
            compositor,
            pool,
            containers,
        }
    }

    /// Start listening to domain events.
    ///
    /// Events are handled one at a time, in emission order. The task ends
    /// when the channel closes or `cancel` fires.
    pub fn start(
        self: Arc<Self>,
        mut rx: EventReceiver,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("[LifecycleHandler] Started listening for domain events");

            loop {
                let received = tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => received,
                };

                match received {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "[LifecycleHandler] Lagged behind, reconciling with the store");
                        Self::drain(&mut rx);
                        self.reconcile().await;
                    }
                    Err(RecvError::Closed) => {
                        warn!("[LifecycleHandler] Domain event channel closed");
                        break;
                    }
                }
            }

            info!("[LifecycleHandler] Stopped listening for domain events");
        })
    }

    /// Discard queued events; the store supersedes them
    fn drain(rx: &mut EventReceiver) {
        let mut dropped = 0usize;
        loop {
            match rx.try_recv() {
                Ok(_) => dropped += 1,
                Err(TryRecvError::Lagged(n)) => dropped += n as usize,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        debug!(dropped, "[LifecycleHandler] Dropped queued events");
    }

    /// Rebuild mounts from the store
    pub async fn reconcile(&self) -> lifecycle::ReconcileSummary {
        lifecycle::reconcile(
            self.store.as_ref(),
            self.compositor.as_ref(),
            self.pool.as_ref(),
            self.containers.as_deref(),
        )
        .await
    }

    /// Handle a single domain event
    pub async fn handle_event(&self, event: DomainEvent) {
        debug!(
            event_type = event.type_name(),
            server = %event.server_name(),
            "[LifecycleHandler] Handling event"
        );

        let containers = self.containers.as_deref();
        match event {
            DomainEvent::ServerCreated { resource } => {
                lifecycle::on_server_created(&resource, self.compositor.as_ref(), containers).await;
            }
            DomainEvent::ServerUpdated { resource } => {
                lifecycle::on_server_updated(&resource, self.compositor.as_ref(), self.pool.as_ref())
                    .await;
            }
            DomainEvent::ServerDeleted { name } => {
                lifecycle::on_server_deleted(
                    &name,
                    self.compositor.as_ref(),
                    self.pool.as_ref(),
                    containers,
                )
                .await;
            }
        }
    }
}
