use crate::database::schema::UserRole;

use super::identity::Identity;

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnInteractions,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnInteractions,
            ActionType::ManageAllRecipes,
        ],
    ),
];

#[derive(Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    /// Likes, favorites, ratings, comments in the requester's own name.
    ManageOwnInteractions,

    ManageAllRecipes,
}

impl ActionType {
    pub fn permits(self, identity: &Identity) -> bool {
        let role = &identity.role;

        ACTION_TABLE
            .iter()
            .find_map(|(uid, actions)| {
                if role != uid {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: UserRole) -> Identity {
        Identity {
            user_id: 1,
            username: String::from("maija"),
            is_admin: role == UserRole::Admin,
            role,
        }
    }

    #[test]
    fn plain_users_cannot_manage_all_recipes() {
        let user = identity(UserRole::User);
        assert!(ActionType::ManageOwnRecipes.permits(&user));
        assert!(!ActionType::ManageAllRecipes.permits(&user));
        assert!(user.authorize(ActionType::ManageAllRecipes).is_err());
    }

    #[test]
    fn admins_pass_every_gate() {
        let admin = identity(UserRole::Admin);
        assert!(ActionType::ManageAllRecipes.permits(&admin));
        assert!(admin.authorize(ActionType::ManageOwnInteractions).is_ok());
    }
}
