use serde::{Deserialize, Serialize};

use crate::database::error::DomainError;
use crate::database::schema::{User, UserRole};

use super::permissions::ActionType;

/// Who is making the request. There are no sessions or tokens: every
/// request carries a username and the caller resolves it against the user
/// table (`actions::resolve_identity`) before anything gated runs.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Identity {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl Identity {
    pub fn authorize(&self, action: ActionType) -> Result<(), DomainError> {
        if !action.permits(self) {
            return Err(DomainError::Forbidden(String::from(
                "You don't have permission to perform this action",
            )));
        }
        Ok(())
    }
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            is_admin: user.role == UserRole::Admin,
            role: user.role,
        }
    }
}
