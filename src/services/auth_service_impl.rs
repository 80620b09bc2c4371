//! `SeaORM` implementation of the `AuthService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::{IntoActiveModel, Set};
use tracing::info;
use uuid::Uuid;

use crate::auth::{
    JwtService, generate_one_time_token, hash_password, validate_password_policy, verify_password,
};
use crate::clients::email::{Mailer, deliver, templates};
use crate::clients::google::IdTokenVerifier;
use crate::config::AuthConfig;
use crate::db::{NewUser, Store};
use crate::entities::{sea_orm_active_enums::Role, users};
use crate::models::Actor;
use crate::services::auth_service::{
    AuthError, AuthService, ResetIssued, SignupInput, TokenResult,
};

const UTORID_MIN_LEN: usize = 7;
const UTORID_MAX_LEN: usize = 8;

pub struct SeaOrmAuthService {
    store: Store,
    jwt: JwtService,
    mailer: Arc<dyn Mailer>,
    google: Arc<dyn IdTokenVerifier>,
    config: AuthConfig,
    frontend_url: String,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        jwt: JwtService,
        mailer: Arc<dyn Mailer>,
        google: Arc<dyn IdTokenVerifier>,
        config: AuthConfig,
        frontend_url: String,
    ) -> Self {
        Self {
            store,
            jwt,
            mailer,
            google,
            config,
            frontend_url,
        }
    }

    fn link(&self, path: &str) -> String {
        format!("{}/{path}", self.frontend_url.trim_end_matches('/'))
    }

    async fn issue(&self, user: users::Model) -> Result<TokenResult, AuthError> {
        let mut active = user.into_active_model();
        active.last_login = Set(Some(Utc::now()));
        let user = self.store.users().update(active).await?;

        let issued = self.jwt.issue(&user)?;
        Ok(TokenResult {
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    async fn unused_utorid(&self, email: &str) -> Result<String, AuthError> {
        let local = email.split('@').next().unwrap_or_default();
        for candidate in utorid_candidates(local) {
            if self.store.users().get_by_utorid(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(AuthError::Conflict(
            "Could not derive an unused utorid for this account".to_string(),
        ))
    }
}

/// Utorids to try for a just-in-time account, derived from the email local
/// part: the base name first, then numbered variants.
pub fn utorid_candidates(local_part: &str) -> impl Iterator<Item = String> {
    let mut base: String = local_part
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(UTORID_MAX_LEN)
        .collect();
    while base.len() < UTORID_MIN_LEN {
        base.push('0');
    }

    let stem: String = base.chars().take(UTORID_MAX_LEN - 2).collect();
    std::iter::once(base).chain((1..100).map(move |n| format!("{stem}{n:02}")))
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn signup(&self, input: SignupInput) -> Result<users::Model, AuthError> {
        validate_password_policy(&input.password).map_err(AuthError::Validation)?;

        let users = self.store.users();
        if users.get_by_utorid(&input.utorid).await?.is_some() {
            return Err(AuthError::Conflict(format!(
                "User with utorid {} already exists",
                input.utorid
            )));
        }
        if users.get_by_email(&input.email).await?.is_some() {
            return Err(AuthError::Conflict(
                "Email address is already in use".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password, &self.config).await?;
        let verification_token = generate_one_time_token();

        let user = users
            .insert(NewUser {
                utorid: input.utorid,
                name: input.name,
                email: input.email,
                password_hash: Some(password_hash),
                role: Role::Regular,
                verified: false,
                activated: true,
                reset_token: None,
                reset_expires_at: None,
                verification_token: Some(verification_token.clone()),
                google_sub: None,
            })
            .await?;

        info!(user_id = user.id, utorid = %user.utorid, "User signed up");

        deliver(
            &self.mailer,
            templates::welcome(&user.email, &user.name, None),
        )
        .await;
        deliver(
            &self.mailer,
            templates::verification(
                &user.email,
                &user.name,
                &self.link(&format!("verify/{verification_token}")),
            ),
        )
        .await;

        Ok(user)
    }

    async fn verify_email(&self, token: &str) -> Result<users::Model, AuthError> {
        let user = self
            .store
            .users()
            .get_by_verification_token(token)
            .await?
            .ok_or_else(|| AuthError::NotFound("Verification token not found".to_string()))?;

        let mut active = user.into_active_model();
        active.verified = Set(true);
        active.verification_token = Set(None);

        Ok(self.store.users().update(active).await?)
    }

    async fn login(&self, utorid: &str, password: &str) -> Result<TokenResult, AuthError> {
        let user = self
            .store
            .users()
            .get_by_utorid(utorid)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let Some(hash) = user.password_hash.as_deref().filter(|_| user.activated) else {
            return Err(AuthError::Unauthorized(
                "Account has not been activated".to_string(),
            ));
        };

        if !verify_password(password, hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = user.id, "User logged in");
        self.issue(user).await
    }

    async fn login_with_google(&self, credential: &str) -> Result<TokenResult, AuthError> {
        let identity = self.google.verify(credential).await?;

        let domain = format!("@{}", self.config.email_domain);
        if !identity.email.ends_with(&domain) {
            return Err(AuthError::Unauthorized(format!(
                "Google account must use a {domain} address"
            )));
        }

        let users = self.store.users();

        if let Some(user) = users.get_by_google_sub(&identity.subject).await? {
            return self.issue(user).await;
        }

        if let Some(user) = users.get_by_email(&identity.email).await? {
            let mut active = user.into_active_model();
            active.google_sub = Set(Some(identity.subject));
            active.verified = Set(true);
            let user = users.update(active).await?;
            info!(user_id = user.id, "Linked Google account");
            return self.issue(user).await;
        }

        let utorid = self.unused_utorid(&identity.email).await?;
        let name = identity
            .name
            .filter(|n| !n.trim().is_empty())
            .map_or_else(|| utorid.clone(), |n| n.chars().take(50).collect());

        let user = users
            .insert(NewUser {
                utorid,
                name,
                email: identity.email,
                password_hash: None,
                role: Role::Regular,
                verified: true,
                activated: true,
                reset_token: None,
                reset_expires_at: None,
                verification_token: None,
                google_sub: Some(identity.subject),
            })
            .await?;

        info!(user_id = user.id, utorid = %user.utorid, "Created account from Google sign-in");
        self.issue(user).await
    }

    async fn request_reset(&self, utorid: &str) -> Result<ResetIssued, AuthError> {
        let user = self
            .store
            .users()
            .get_by_utorid(utorid)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("User {utorid} not found")))?;

        let reset_token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::days(self.config.reset_token_ttl_days);

        let mut active = user.into_active_model();
        active.reset_token = Set(Some(reset_token.clone()));
        active.reset_expires_at = Set(Some(expires_at));
        let user = self.store.users().update(active).await?;

        deliver(
            &self.mailer,
            templates::password_reset(
                &user.email,
                &user.name,
                &self.link(&format!("reset/{reset_token}")),
                expires_at,
            ),
        )
        .await;

        Ok(ResetIssued {
            reset_token,
            expires_at,
        })
    }

    async fn complete_reset(
        &self,
        token: &str,
        utorid: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .store
            .users()
            .get_by_reset_token(token)
            .await?
            .ok_or_else(|| AuthError::NotFound("Reset token not found".to_string()))?;

        if user.reset_expires_at.is_none_or(|expires| expires <= Utc::now()) {
            return Err(AuthError::Expired("Reset token has expired".to_string()));
        }

        if user.utorid != utorid {
            return Err(AuthError::Unauthorized(
                "Reset token does not belong to this user".to_string(),
            ));
        }

        validate_password_policy(password).map_err(AuthError::Validation)?;
        let password_hash = hash_password(password, &self.config).await?;

        let mut active = user.into_active_model();
        active.password_hash = Set(Some(password_hash));
        active.activated = Set(true);
        active.reset_token = Set(None);
        active.reset_expires_at = Set(None);
        let user = self.store.users().update(active).await?;

        info!(user_id = user.id, "Password reset completed");
        Ok(())
    }

    async fn authenticate(&self, token: &str) -> Result<Actor, AuthError> {
        let claims = self.jwt.verify(token)?;
        let user_id = claims.user_id()?;

        let user = self
            .store
            .users()
            .get(user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("User no longer exists".to_string()))?;

        Ok(Actor::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utorid_candidates_from_long_local_part() {
        let mut candidates = utorid_candidates("jane.doe.smith");
        assert_eq!(candidates.next().as_deref(), Some("janedoes"));
        assert_eq!(candidates.next().as_deref(), Some("janedo01"));
        assert_eq!(candidates.next().as_deref(), Some("janedo02"));
    }

    #[test]
    fn test_utorid_candidates_pads_short_names() {
        let first = utorid_candidates("li").next().unwrap();
        assert_eq!(first, "li00000");
        assert!((UTORID_MIN_LEN..=UTORID_MAX_LEN).contains(&first.len()));
    }

    #[test]
    fn test_utorid_candidates_are_bounded() {
        assert_eq!(utorid_candidates("someone").count(), 100);
        assert!(utorid_candidates("someone").all(|c| c.len() <= UTORID_MAX_LEN));
    }
}
