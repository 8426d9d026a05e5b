//! MCP registry discovery
//!
//! Wire types of the public registry and their conversion into
//! [`ServerResource`](crate::domain::ServerResource)s. The HTTP client lives in
//! [`crate::service::RegistryClient`].

mod install;
mod types;

pub use install::resource_from_entry;
pub use types::*;
