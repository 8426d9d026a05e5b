//! Request-level error taxonomy
//!
//! Only these errors are meant to reach a caller. Infrastructure failures
//! (containers, pool, aggregate) are absorbed where they happen and logged.

use thiserror::Error;

/// A resource description that cannot be accepted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Missing required field for {transport} transport: {field}")]
    MissingTransportField {
        transport: String,
        field: &'static str,
    },

    #[error("Unsupported transport type: {0}")]
    UnsupportedTransport(String),

    #[error("Invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Failure of a registry operation
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Forbidden: insufficient permissions for '{name}'")]
    Forbidden { name: String },

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl ResourceError {
    pub fn not_found(name: impl Into<String>) -> Self {
        ResourceError::NotFound(name.into())
    }

    pub fn forbidden(name: impl Into<String>) -> Self {
        ResourceError::Forbidden { name: name.into() }
    }

    /// Whether the error is the caller's fault rather than the gateway's
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ResourceError::Storage(_))
    }
}

pub type ResourceResult<T> = std::result::Result<T, ResourceError>;
