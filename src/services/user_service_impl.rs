//! `SeaORM` implementation of the `UserService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::{IntoActiveModel, Set};
use tracing::info;
use uuid::Uuid;

use crate::auth::{hash_password, validate_password_policy, verify_password};
use crate::clients::email::{Mailer, deliver, templates};
use crate::config::AuthConfig;
use crate::db::{NewUser, Store, UserFilter};
use crate::entities::{sea_orm_active_enums::Role, users};
use crate::models::{Actor, Page, PageRequest};
use crate::services::promotion_service::PromotionView;
use crate::services::user_service::{
    AdminUpdate, CustomerView, ProfileUpdate, RegisterInput, RegisteredUser, UserError,
    UserLookup, UserQuery, UserService, UserView,
};

pub struct SeaOrmUserService {
    store: Store,
    mailer: Arc<dyn Mailer>,
    config: AuthConfig,
    frontend_url: String,
}

impl SeaOrmUserService {
    #[must_use]
    pub fn new(store: Store, mailer: Arc<dyn Mailer>, config: AuthConfig, frontend_url: String) -> Self {
        Self {
            store,
            mailer,
            config,
            frontend_url,
        }
    }

    async fn load(&self, id: i32) -> Result<users::Model, UserError> {
        self.store
            .users()
            .get(id)
            .await?
            .ok_or_else(|| UserError::NotFound(id.to_string()))
    }

    async fn ensure_email_free(&self, email: &str, owner: Option<i32>) -> Result<(), UserError> {
        match self.store.users().get_by_email(email).await? {
            Some(existing) if Some(existing.id) != owner => Err(UserError::Conflict(
                "Email address is already in use".to_string(),
            )),
            _ => Ok(()),
        }
    }

    async fn available_promotions(&self, user_id: i32) -> Result<Vec<PromotionView>, UserError> {
        Ok(self
            .store
            .promotions()
            .available_onetime(user_id)
            .await?
            .into_iter()
            .map(PromotionView::from)
            .collect())
    }
}

/// Roles `actor` may assign. Managers hand out till access; anything
/// above that needs a superuser.
const fn may_assign(actor: Role, role: Role) -> bool {
    match actor {
        Role::Superuser => true,
        Role::Manager => matches!(role, Role::Regular | Role::Cashier),
        _ => false,
    }
}

#[async_trait]
impl UserService for SeaOrmUserService {
    async fn register(&self, input: RegisterInput) -> Result<RegisteredUser, UserError> {
        let users = self.store.users();
        if users.get_by_utorid(&input.utorid).await?.is_some() {
            return Err(UserError::Conflict(format!(
                "User with utorid {} already exists",
                input.utorid
            )));
        }
        self.ensure_email_free(&input.email, None).await?;

        let reset_token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::days(self.config.reset_token_ttl_days);

        let user = users
            .insert(NewUser {
                utorid: input.utorid,
                name: input.name,
                email: input.email,
                password_hash: None,
                role: Role::Regular,
                verified: false,
                activated: false,
                reset_token: Some(reset_token.clone()),
                reset_expires_at: Some(expires_at),
                verification_token: None,
                google_sub: None,
            })
            .await?;

        info!(user_id = user.id, utorid = %user.utorid, "Customer registered");

        let link = format!(
            "{}/reset/{reset_token}",
            self.frontend_url.trim_end_matches('/')
        );
        deliver(
            &self.mailer,
            templates::welcome(&user.email, &user.name, Some(&link)),
        )
        .await;

        Ok(RegisteredUser {
            id: user.id,
            utorid: user.utorid,
            name: user.name,
            email: user.email,
            verified: user.verified,
            expires_at,
            reset_token,
        })
    }

    async fn list(&self, query: UserQuery, page: PageRequest) -> Result<Page<UserView>, UserError> {
        let filter = UserFilter {
            name: query.name,
            role: query.role,
            verified: query.verified,
            activated: query.activated,
        };
        let page = self.store.users().list(&filter, page).await?;
        Ok(page.map(UserView::from))
    }

    async fn me(&self, actor: &Actor) -> Result<UserView, UserError> {
        let user = self.load(actor.id).await?;
        let mut view = UserView::from(user);
        view.promotions = Some(self.available_promotions(actor.id).await?);
        Ok(view)
    }

    async fn update_me(&self, actor: &Actor, update: ProfileUpdate) -> Result<UserView, UserError> {
        let user = self.load(actor.id).await?;

        if let Some(email) = &update.email {
            self.ensure_email_free(email, Some(user.id)).await?;
        }

        let mut active = user.into_active_model();
        if let Some(name) = update.name {
            active.name = Set(name);
        }
        if let Some(email) = update.email {
            active.email = Set(email.to_lowercase());
        }
        if let Some(birthday) = update.birthday {
            active.birthday = Set(Some(birthday));
        }
        if let Some(avatar_url) = update.avatar_url {
            active.avatar_url = Set(Some(avatar_url));
        }

        let user = self.store.users().update(active).await?;
        Ok(user.into())
    }

    async fn change_password(&self, actor: &Actor, old: &str, new: &str) -> Result<(), UserError> {
        let user = self.load(actor.id).await?;

        let matches = match user.password_hash.as_deref() {
            Some(hash) => verify_password(old, hash).await?,
            None => false,
        };
        if !matches {
            return Err(UserError::Forbidden(
                "Current password is incorrect".to_string(),
            ));
        }

        validate_password_policy(new).map_err(UserError::Validation)?;
        let password_hash = hash_password(new, &self.config).await?;

        let mut active = user.into_active_model();
        active.password_hash = Set(Some(password_hash));
        self.store.users().update(active).await?;

        info!(user_id = actor.id, "Password changed");
        Ok(())
    }

    async fn get(&self, actor: &Actor, id: i32) -> Result<UserLookup, UserError> {
        let user = self.load(id).await?;

        if actor.is_manager() {
            let mut view = UserView::from(user);
            view.promotions = Some(self.available_promotions(id).await?);
            return Ok(UserLookup::Full(Box::new(view)));
        }

        Ok(UserLookup::Customer(CustomerView {
            promotions: self.available_promotions(id).await?,
            id: user.id,
            utorid: user.utorid,
            name: user.name,
            points: user.points,
            verified: user.verified,
        }))
    }

    async fn update(
        &self,
        actor: &Actor,
        id: i32,
        update: AdminUpdate,
    ) -> Result<UserView, UserError> {
        let user = self.load(id).await?;

        if update.verified == Some(false) {
            return Err(UserError::Validation(
                "verified can only be set to true".to_string(),
            ));
        }

        if let Some(role) = update.role {
            if !may_assign(actor.role, role) || !may_assign(actor.role, user.role) {
                return Err(UserError::Forbidden(format!(
                    "{} accounts cannot assign the {role} role to this user",
                    actor.role
                )));
            }
        }

        if let Some(email) = &update.email {
            self.ensure_email_free(email, Some(user.id)).await?;
        }

        let mut active = user.into_active_model();
        if let Some(email) = update.email {
            active.email = Set(email.to_lowercase());
        }
        if let Some(verified) = update.verified {
            active.verified = Set(verified);
        }
        if let Some(suspicious) = update.suspicious {
            active.suspicious = Set(suspicious);
        }
        if let Some(role) = update.role {
            active.role = Set(role);
            if role == Role::Cashier {
                active.suspicious = Set(false);
            }
        }

        let user = self.store.users().update(active).await?;
        info!(user_id = user.id, updated_by = actor.id, "User updated");
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_role_assignment_is_limited() {
        assert!(may_assign(Role::Manager, Role::Cashier));
        assert!(may_assign(Role::Manager, Role::Regular));
        assert!(!may_assign(Role::Manager, Role::Manager));
        assert!(!may_assign(Role::Manager, Role::Superuser));
        assert!(!may_assign(Role::Cashier, Role::Regular));
    }

    #[test]
    fn test_superuser_may_assign_any_role() {
        for role in [
            Role::Regular,
            Role::Organizer,
            Role::Cashier,
            Role::Manager,
            Role::Superuser,
        ] {
            assert!(may_assign(Role::Superuser, role));
        }
    }
}
