use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::require_role;
use super::validation::{
    validate_avatar_url, validate_birthday, validate_email, validate_id, validate_name,
    validate_page, validate_utorid,
};
use super::{ApiError, ApiResponse, AppState, MessageResponse, PageParams};
use crate::entities::sea_orm_active_enums::Role;
use crate::models::{Actor, Page};
use crate::services::{
    AdminUpdate, ProfileUpdate, RegisterInput, RegisteredUser, UserError, UserLookup, UserQuery,
    UserView,
};

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(id) => Self::not_found("User", id),
            UserError::Validation(msg) => Self::validation(msg),
            UserError::Forbidden(msg) => Self::Forbidden(msg),
            UserError::Conflict(msg) => Self::Conflict(msg),
            UserError::Internal(msg) => Self::internal(msg),
        }
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub utorid: String,
    pub name: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct UserListQuery {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub verified: Option<bool>,
    pub activated: Option<bool>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub birthday: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old: String,
    pub new: String,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub verified: Option<bool>,
    pub suspicious: Option<bool>,
    pub role: Option<Role>,
}

/// POST /users
pub async fn register(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegisteredUser>>), ApiError> {
    require_role(&actor, Role::Cashier)?;

    let input = RegisterInput {
        utorid: validate_utorid(&payload.utorid)?,
        name: validate_name(&payload.name)?,
        email: validate_email(&payload.email, &state.config().auth.email_domain)?,
    };

    let user = state.shared.user_service.register(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<ApiResponse<Page<UserView>>>, ApiError> {
    require_role(&actor, Role::Manager)?;
    let page = validate_page(PageParams {
        page: query.page,
        limit: query.limit,
    })?;

    let users = state
        .shared
        .user_service
        .list(
            UserQuery {
                name: query.name.filter(|n| !n.is_empty()),
                role: query.role,
                verified: query.verified,
                activated: query.activated,
            },
            page,
        )
        .await?;

    Ok(Json(ApiResponse::success(users)))
}

/// GET /users/me
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ApiResponse<UserView>>, ApiError> {
    let user = state.shared.user_service.me(&actor).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// PATCH /users/me
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<UpdateMeRequest>,
) -> Result<Json<ApiResponse<UserView>>, ApiError> {
    let domain = &state.config().auth.email_domain;

    let update = ProfileUpdate {
        name: payload.name.as_deref().map(validate_name).transpose()?,
        email: payload
            .email
            .as_deref()
            .map(|e| validate_email(e, domain))
            .transpose()?,
        birthday: payload.birthday.as_deref().map(validate_birthday).transpose()?,
        avatar_url: payload
            .avatar_url
            .as_deref()
            .map(validate_avatar_url)
            .transpose()?,
    };

    if update.name.is_none()
        && update.email.is_none()
        && update.birthday.is_none()
        && update.avatar_url.is_none()
    {
        return Err(ApiError::validation("No fields to update"));
    }

    let user = state.shared.user_service.update_me(&actor, update).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// PATCH /users/me/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .shared
        .user_service
        .change_password(&actor, &payload.old, &payload.new)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password updated",
    ))))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserLookup>>, ApiError> {
    require_role(&actor, Role::Cashier)?;
    let id = validate_id(id)?;

    let user = state.shared.user_service.get(&actor, id).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// PATCH /users/{id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&actor, Role::Manager)?;
    let id = validate_id(id)?;

    let update = AdminUpdate {
        email: payload
            .email
            .as_deref()
            .map(|e| validate_email(e, &state.config().auth.email_domain))
            .transpose()?,
        verified: payload.verified,
        suspicious: payload.suspicious,
        role: payload.role,
    };

    if update.email.is_none()
        && update.verified.is_none()
        && update.suspicious.is_none()
        && update.role.is_none()
    {
        return Err(ApiError::validation("No fields to update"));
    }

    let user = state.shared.user_service.update(&actor, id, update).await?;
    Ok(Json(ApiResponse::success(user)))
}
