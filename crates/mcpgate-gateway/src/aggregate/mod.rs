//! Aggregate gateway primitive
//!
//! An ordered list of namespaced proxies. The only removal it supports is
//! positional (`pop(position)`); there is no removal by namespace. Callers that
//! need identity-based removal keep their own index table (see
//! [`GatewayCompositor`](crate::compositor::GatewayCompositor)).

use thiserror::Error;

use crate::proxy::BackendProxy;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("Position {position} out of range (len {len})")]
    StaleIndex { position: usize, len: usize },

    #[error("Aggregate rejected '{namespace}': {reason}")]
    Rejected { namespace: String, reason: String },
}

/// One entry in the aggregate's ordered list
#[derive(Debug, Clone)]
pub struct MountedProxy {
    pub namespace: String,
    pub proxy: BackendProxy,
    pub enabled: bool,
}

/// The aggregation primitive the compositor mounts onto
pub trait AggregateGateway: Send + Sync {
    /// Append a proxy under `namespace`, returning its position
    fn append(&mut self, proxy: BackendProxy, namespace: &str) -> Result<usize, AggregateError>;

    /// Remove the proxy at `position`; later entries shift down by one
    fn pop(&mut self, position: usize) -> Result<MountedProxy, AggregateError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Toggle visibility of the proxy at `position` without removing it
    fn set_enabled(&mut self, position: usize, enabled: bool) -> Result<(), AggregateError>;

    fn namespace_at(&self, position: usize) -> Option<String>;

    /// Namespaces of enabled entries, in position order
    fn visible_namespaces(&self) -> Vec<String>;
}

/// In-process aggregate backed by a `Vec`
#[derive(Debug, Default)]
pub struct NamespacedAggregate {
    entries: Vec<MountedProxy>,
}

impl NamespacedAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[MountedProxy] {
        &self.entries
    }

    fn stale(&self, position: usize) -> AggregateError {
        AggregateError::StaleIndex {
            position,
            len: self.entries.len(),
        }
    }
}

impl AggregateGateway for NamespacedAggregate {
    fn append(&mut self, proxy: BackendProxy, namespace: &str) -> Result<usize, AggregateError> {
        self.entries.push(MountedProxy {
            namespace: namespace.to_string(),
            proxy,
            enabled: true,
        });
        Ok(self.entries.len() - 1)
    }

    fn pop(&mut self, position: usize) -> Result<MountedProxy, AggregateError> {
        if position >= self.entries.len() {
            return Err(self.stale(position));
        }
        Ok(self.entries.remove(position))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn set_enabled(&mut self, position: usize, enabled: bool) -> Result<(), AggregateError> {
        let stale = self.stale(position);
        let entry = self.entries.get_mut(position).ok_or(stale)?;
        entry.enabled = enabled;
        Ok(())
    }

    fn namespace_at(&self, position: usize) -> Option<String> {
        self.entries.get(position).map(|e| e.namespace.clone())
    }

    fn visible_namespaces(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.namespace.clone())
            .collect()
    }
}
