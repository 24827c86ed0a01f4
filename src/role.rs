use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    /// Indicates whether user with role can schedule new classes
    pub fn can_schedule(self) -> bool {
        match self {
            Role::Admin | Role::Teacher => true,
            Role::Student => false,
        }
    }

    /// Indicates whether user with role can create accounts with role `other`
    pub fn can_create(self, other: Role) -> bool {
        match self {
            Role::Admin => true,
            Role::Teacher => other == Role::Student,
            Role::Student => false,
        }
    }

    pub fn can_manage_accounts(self) -> bool {
        matches!(self, Role::Admin)
    }
}

// Records saved before roles existed were all students.
impl std::default::Default for Role {
    fn default() -> Self {
        Role::Student
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Teacher => write!(f, "teacher"),
            Role::Student => write!(f, "student"),
        }
    }
}
