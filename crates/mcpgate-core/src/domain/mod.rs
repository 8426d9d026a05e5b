//! Domain entities, value objects, and events
//!
//! - `ServerResource` / `TransportKind`: a registered backend server
//! - `Caller` / `Operation`: who is asking, and for what
//! - `DomainEvent`: registry changes for event-driven consumers

pub mod access;
mod error;
mod event;
mod resource;

pub use access::{can_access, Caller, Operation, ADMIN_ROLE};
pub use error::{ResourceError, ResourceResult, ValidationError};
pub use event::DomainEvent;
pub use resource::{ServerResource, TransportKind};
