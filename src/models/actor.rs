use crate::entities::{sea_orm_active_enums::Role, users};

/// The authenticated caller of a request, loaded fresh from the database so
/// role changes and suspensions take effect without re-issuing tokens.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: i32,
    pub utorid: String,
    pub role: Role,
    pub verified: bool,
    pub suspicious: bool,
}

impl Actor {
    #[must_use]
    pub const fn is_at_least(&self, role: Role) -> bool {
        self.role.at_least(role)
    }

    #[must_use]
    pub const fn is_manager(&self) -> bool {
        self.is_at_least(Role::Manager)
    }
}

impl From<&users::Model> for Actor {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            utorid: user.utorid.clone(),
            role: user.role,
            verified: user.verified,
            suspicious: user.suspicious,
        }
    }
}
