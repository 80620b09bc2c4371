use axum::{
    Json,
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::validation::{validate_email, validate_name, validate_utorid};
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::clients::google::GoogleAuthError;
use crate::entities::sea_orm_active_enums::Role;
use crate::models::Actor;
use crate::services::{AuthError, ResetIssued, SignupInput, TokenResult};

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::unauthorized("Invalid utorid or password"),
            AuthError::Unauthorized(msg) => Self::Unauthorized(msg),
            AuthError::NotFound(msg) => Self::NotFound(msg),
            AuthError::Conflict(msg) => Self::Conflict(msg),
            AuthError::Validation(msg) => Self::validation(msg),
            AuthError::Expired(msg) => Self::Gone(msg),
            AuthError::Google(GoogleAuthError::NotConfigured) => {
                Self::validation("Google sign-in is not configured")
            }
            AuthError::Google(GoogleAuthError::InvalidToken(msg)) => Self::Unauthorized(msg),
            AuthError::Google(GoogleAuthError::Upstream(message)) => Self::ExternalApiError {
                service: "Google".to_string(),
                message,
            },
            AuthError::Internal(msg) => Self::internal(msg),
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct SignupRequest {
    pub utorid: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub utorid: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct GoogleLoginRequest {
    pub credential: String,
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub utorid: String,
}

#[derive(Deserialize)]
pub struct CompleteResetRequest {
    pub utorid: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub id: i32,
    pub utorid: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves `Authorization: Bearer <jwt>` to an [`Actor`] extension.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_bearer(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

    let actor = state.shared.auth_service.authenticate(token).await?;
    tracing::Span::current().record("user_id", actor.id);

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Rejects callers below `role`.
pub fn require_role(actor: &Actor, role: Role) -> Result<(), ApiError> {
    if actor.is_at_least(role) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "This action requires {role} clearance"
        )))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = SignupInput {
        utorid: validate_utorid(&payload.utorid)?,
        name: validate_name(&payload.name)?,
        email: validate_email(&payload.email, &state.config().auth.email_domain)?,
        password: payload.password,
    };

    let user = state.shared.auth_service.signup(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SignupResponse {
            id: user.id,
            utorid: user.utorid,
            name: user.name,
            email: user.email,
            role: user.role,
            verified: user.verified,
            created_at: user.created_at,
        })),
    ))
}

/// POST /auth/verify/{token}
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user = state.shared.auth_service.verify_email(&token).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Email verified for {}",
        user.utorid
    )))))
}

/// POST /auth/tokens
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<TokenResult>>, ApiError> {
    if payload.utorid.trim().is_empty() {
        return Err(ApiError::validation("utorid is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("password is required"));
    }

    let token = state
        .shared
        .auth_service
        .login(&payload.utorid.trim().to_lowercase(), &payload.password)
        .await?;

    Ok(Json(ApiResponse::success(token)))
}

/// POST /auth/google
pub async fn google_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GoogleLoginRequest>,
) -> Result<Json<ApiResponse<TokenResult>>, ApiError> {
    if payload.credential.is_empty() {
        return Err(ApiError::validation("credential is required"));
    }

    let token = state
        .shared
        .auth_service
        .login_with_google(&payload.credential)
        .await?;

    Ok(Json(ApiResponse::success(token)))
}

/// POST /auth/resets
pub async fn request_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ResetIssued>>), ApiError> {
    let utorid = validate_utorid(&payload.utorid)?;
    let issued = state.shared.auth_service.request_reset(&utorid).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(issued))))
}

/// POST /auth/resets/{token}
pub async fn complete_reset(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(payload): Json<CompleteResetRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .shared
        .auth_service
        .complete_reset(
            &token,
            &payload.utorid.trim().to_lowercase(),
            &payload.password,
        )
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password has been reset",
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn test_require_role_follows_clearance() {
        let actor = |role| Actor {
            id: 1,
            utorid: "someone1".to_string(),
            role,
            verified: true,
            suspicious: false,
        };

        assert!(require_role(&actor(Role::Manager), Role::Cashier).is_ok());
        assert!(require_role(&actor(Role::Cashier), Role::Manager).is_err());
        assert!(require_role(&actor(Role::Organizer), Role::Regular).is_ok());
        assert!(require_role(&actor(Role::Organizer), Role::Cashier).is_err());
    }
}
