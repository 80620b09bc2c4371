use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::entities::{prelude::*, sea_orm_active_enums::Role, users};
use crate::models::{Page, PageRequest};

/// Fields for a new account. Everything not listed starts at its zero value.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub utorid: String,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub verified: bool,
    pub activated: bool,
    pub reset_token: Option<String>,
    pub reset_expires_at: Option<DateTime<Utc>>,
    pub verification_token: Option<String>,
    pub google_sub: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Substring of utorid or display name.
    pub name: Option<String>,
    pub role: Option<Role>,
    pub verified: Option<bool>,
    pub activated: Option<bool>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<users::Model>> {
        Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")
    }

    pub async fn get_by_utorid(&self, utorid: &str) -> Result<Option<users::Model>> {
        self.find_one(users::Column::Utorid, utorid).await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        self.find_one(users::Column::Email, &email.to_lowercase()).await
    }

    pub async fn get_by_reset_token(&self, token: &str) -> Result<Option<users::Model>> {
        self.find_one(users::Column::ResetToken, token).await
    }

    pub async fn get_by_verification_token(&self, token: &str) -> Result<Option<users::Model>> {
        self.find_one(users::Column::VerificationToken, token).await
    }

    pub async fn get_by_google_sub(&self, subject: &str) -> Result<Option<users::Model>> {
        self.find_one(users::Column::GoogleSub, subject).await
    }

    async fn find_one(&self, column: users::Column, value: &str) -> Result<Option<users::Model>> {
        Users::find()
            .filter(column.eq(value))
            .one(&self.conn)
            .await
            .with_context(|| format!("Failed to query user by {column:?}"))
    }

    pub async fn insert(&self, new_user: NewUser) -> Result<users::Model> {
        let active = users::ActiveModel {
            utorid: Set(new_user.utorid),
            name: Set(new_user.name),
            email: Set(new_user.email.to_lowercase()),
            password_hash: Set(new_user.password_hash),
            role: Set(new_user.role),
            points: Set(0),
            verified: Set(new_user.verified),
            activated: Set(new_user.activated),
            suspicious: Set(false),
            birthday: Set(None),
            avatar_url: Set(None),
            reset_token: Set(new_user.reset_token),
            reset_expires_at: Set(new_user.reset_expires_at),
            verification_token: Set(new_user.verification_token),
            google_sub: Set(new_user.google_sub),
            created_at: Set(Utc::now()),
            last_login: Set(None),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")
    }

    pub async fn update(&self, active: users::ActiveModel) -> Result<users::Model> {
        active
            .update(&self.conn)
            .await
            .context("Failed to update user")
    }

    pub async fn list(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<users::Model>> {
        let mut query = Users::find().order_by_asc(users::Column::Id);

        if let Some(name) = &filter.name {
            query = query.filter(
                Condition::any()
                    .add(users::Column::Utorid.contains(name))
                    .add(users::Column::Name.contains(name)),
            );
        }
        if let Some(role) = filter.role {
            query = query.filter(users::Column::Role.eq(role));
        }
        if let Some(verified) = filter.verified {
            query = query.filter(users::Column::Verified.eq(verified));
        }
        if let Some(activated) = filter.activated {
            query = query.filter(users::Column::Activated.eq(activated));
        }

        let paginator = query.paginate(&self.conn, page.limit);
        let count = paginator.num_items().await?;
        let results = paginator.fetch_page(page.index()).await?;

        Ok(Page { count, results })
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(Users::find().count(&self.conn).await?)
    }
}
