//! Domain service for user accounts: cashier registration, profiles and
//! manager administration.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::entities::{sea_orm_active_enums::Role, users};
use crate::models::{Actor, Page, PageRequest};
use crate::services::promotion_service::PromotionView;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User {0} not found")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Full account view for the account owner and managers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i32,
    pub utorid: String,
    pub name: String,
    pub email: String,
    pub birthday: Option<String>,
    pub role: Role,
    pub points: i64,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub verified: bool,
    pub activated: bool,
    pub suspicious: bool,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotions: Option<Vec<PromotionView>>,
}

impl From<users::Model> for UserView {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            utorid: user.utorid,
            name: user.name,
            email: user.email,
            birthday: user.birthday,
            role: user.role,
            points: user.points,
            created_at: user.created_at,
            last_login: user.last_login,
            verified: user.verified,
            activated: user.activated,
            suspicious: user.suspicious,
            avatar_url: user.avatar_url,
            promotions: None,
        }
    }
}

/// What a cashier may see about a customer at the till.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    pub id: i32,
    pub utorid: String,
    pub name: String,
    pub points: i64,
    pub verified: bool,
    pub promotions: Vec<PromotionView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UserLookup {
    Full(Box<UserView>),
    Customer(CustomerView),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub id: i32,
    pub utorid: String,
    pub name: String,
    pub email: String,
    pub verified: bool,
    pub expires_at: DateTime<Utc>,
    pub reset_token: String,
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub utorid: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub birthday: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AdminUpdate {
    pub email: Option<String>,
    pub verified: Option<bool>,
    pub suspicious: Option<bool>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub verified: Option<bool>,
    pub activated: Option<bool>,
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Registers a customer at the till. The account is activated through
    /// the returned reset token.
    async fn register(&self, input: RegisterInput) -> Result<RegisteredUser, UserError>;

    async fn list(&self, query: UserQuery, page: PageRequest) -> Result<Page<UserView>, UserError>;

    async fn me(&self, actor: &Actor) -> Result<UserView, UserError>;

    async fn update_me(&self, actor: &Actor, update: ProfileUpdate) -> Result<UserView, UserError>;

    /// # Errors
    ///
    /// Returns [`UserError::Forbidden`] when `old` does not match.
    async fn change_password(&self, actor: &Actor, old: &str, new: &str) -> Result<(), UserError>;

    /// Cashiers get a [`CustomerView`]; managers get the full account.
    async fn get(&self, actor: &Actor, id: i32) -> Result<UserLookup, UserError>;

    async fn update(&self, actor: &Actor, id: i32, update: AdminUpdate)
    -> Result<UserView, UserError>;
}
