//! # mcpgate Core Library
//!
//! Domain logic, entities, and business rules for the mcpgate gateway.
//!
//! ## Modules
//!
//! - `domain` - Core entities (ServerResource, Caller) and the access policy
//! - `registry` - Public MCP registry types and install conversion
//! - `repository` - Data access traits
//! - `service` - Ports to external collaborators and the registry client
//! - `application` - Application services with event emission
//! - `event_bus` - Central event distribution system

pub mod application;
pub mod domain;
pub mod event_bus;
pub mod registry;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use domain::*;
pub use repository::*;
pub use service::*;

pub use application::{ServerAppService, ServerDraft, ServerPatch, ServerStatusReport};
pub use event_bus::{EventBus, EventReceiver, EventSender};
