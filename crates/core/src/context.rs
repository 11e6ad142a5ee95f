//! Per-request actor context, passed explicitly into every workflow call.

use serde::{Deserialize, Serialize};

use crate::permissions::Permissions;

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Actor, organization and permissions bundled for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub actor: Actor,
    pub organization: String,
    pub permissions: Permissions,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, organization: impl Into<String>, permissions: Permissions) -> Self {
        Self {
            actor: Actor {
                user_id: user_id.into(),
                email: None,
            },
            organization: organization.into(),
            permissions,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.actor.email = Some(email.into());
        self
    }

    pub fn user_id(&self) -> &str {
        &self.actor.user_id
    }
}
