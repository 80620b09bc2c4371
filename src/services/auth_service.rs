//! Domain service for authentication.
//!
//! Covers self-service signup, email verification, password and Google
//! login, and the password reset flow. Bearer tokens are resolved back to
//! an [`Actor`] here as well.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::auth::JwtError;
use crate::clients::google::GoogleAuthError;
use crate::entities::users;
use crate::models::Actor;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Expired(String),

    #[error(transparent)]
    Google(#[from] GoogleAuthError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::GenerationFailed(msg) => Self::Internal(msg),
            other => Self::Unauthorized(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub utorid: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

/// A signed access token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResult {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetIssued {
    pub reset_token: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an activated, unverified regular account and emails a
    /// verification link.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] if the utorid or email is taken.
    async fn signup(&self, input: SignupInput) -> Result<users::Model, AuthError>;

    async fn verify_email(&self, token: &str) -> Result<users::Model, AuthError>;

    async fn login(&self, utorid: &str, password: &str) -> Result<TokenResult, AuthError>;

    /// Signs in with a Google ID token, creating the account on first use.
    async fn login_with_google(&self, credential: &str) -> Result<TokenResult, AuthError>;

    async fn request_reset(&self, utorid: &str) -> Result<ResetIssued, AuthError>;

    /// Consumes a reset token and sets a new password.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotFound`] for an unknown token
    /// - [`AuthError::Expired`] once the token's lifetime has passed
    /// - [`AuthError::Unauthorized`] if the utorid does not own the token
    async fn complete_reset(
        &self,
        token: &str,
        utorid: &str,
        password: &str,
    ) -> Result<(), AuthError>;

    /// Resolves a bearer token to the current state of its user.
    async fn authenticate(&self, token: &str) -> Result<Actor, AuthError>;
}
