use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;

use crate::config::BootstrapAdmin;
use crate::role::Role;
use crate::util::contains_ignore_case;

pub static USER_COLLECTION_NAME: &str = "flowUsers";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    /// Shared login secret, stored as entered.
    pub code: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn new(username: impl ToString, code: impl ToString, role: Role) -> User {
        let id = Uuid::new_v4().to_string();
        tracing::info!("Creating a new user with id: {}", id);

        User {
            id,
            username: username.to_string(),
            code: code.to_string(),
            is_admin: false,
            role,
        }
    }

    /// The configured superuser. Its id is derived from the username so every
    /// start-up seeds the same record.
    pub fn bootstrap_admin(admin: &BootstrapAdmin) -> User {
        User {
            id: bootstrap_admin_id(&admin.username),
            username: admin.username.clone(),
            code: admin.code.clone(),
            is_admin: true,
            role: Role::Admin,
        }
    }

    /// Role used for every authorization decision. The `isAdmin` flag wins over
    /// whatever `role` says.
    pub fn effective_role(&self) -> Role {
        if self.is_admin {
            Role::Admin
        } else {
            self.role
        }
    }

    pub fn matches(&self, query: &str) -> bool {
        contains_ignore_case(&self.username, query) || self.id.contains(query)
    }
}

pub fn bootstrap_admin_id(username: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, username.as_bytes()).to_string()
}

/// User as shown to other users; never carries the login code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub is_admin: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id.clone(),
            username: user.username.clone(),
            role: user.effective_role(),
            is_admin: user.effective_role() == Role::Admin,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse::from(&user)
    }
}
