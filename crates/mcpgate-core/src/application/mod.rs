//! Application Services - Orchestration layer with event emission
//!
//! Application services sit between the presentation layer (HTTP handlers)
//! and the domain layer (repositories, domain services). They:
//!
//! 1. **Validate** inputs and enforce access rules
//! 2. **Persist** through the repository traits
//! 3. **Emit events** after successful operations via the event bus

mod server;

pub use server::{ServerAppService, ServerDraft, ServerPatch, ServerStatusReport};
