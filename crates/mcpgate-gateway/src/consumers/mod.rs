//! Event Consumers - Domain event handlers
//!
//! Consumers subscribe to DomainEvents from the EventBus and react based on their
//! specific context:
//!
//! - **LifecycleEventHandler**: containers, mounts and pool eviction for
//!   created/updated/deleted servers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            EventBus (DomainEvent)           │
//! └─────────────────────────────────────────────┘
//!                       │
//!                       ▼
//!             ┌───────────────────┐
//!             │ LifecycleHandler  │
//!             └───────────────────┘
//!              │        │        │
//!              ▼        ▼        ▼
//!         containers  mounts   pool
//! ```

mod lifecycle_handler;

pub use lifecycle_handler::LifecycleEventHandler;
