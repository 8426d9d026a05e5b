//! Access policy for server resources
//!
//! One policy function decides every read/write on a [`ServerResource`].
//! It is pure: no I/O, no locking.

use serde::{Deserialize, Serialize};

use super::resource::ServerResource;

/// Role that bypasses every resource check
pub const ADMIN_ROLE: &str = "admin";

/// Kind of access being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Write,
}

/// Identity of whoever is calling into the registry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Caller {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

/// Decide whether `caller` may perform `operation` on `resource`.
///
/// - read: public resources, any matching role, the creator, or admin
/// - write: the creator or admin, whatever `required_roles` says
pub fn can_access(caller: &Caller, resource: &ServerResource, operation: Operation) -> bool {
    if caller.is_admin() || caller.user_id == resource.created_by {
        return true;
    }

    match operation {
        Operation::Read => {
            resource.required_roles.is_empty()
                || caller
                    .roles
                    .iter()
                    .any(|role| resource.required_roles.contains(role))
        }
        Operation::Write => false,
    }
}
