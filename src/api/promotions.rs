use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::require_role;
use super::validation::{require_text, validate_id, validate_page};
use super::{ApiError, ApiResponse, AppState, PageParams};
use crate::entities::sea_orm_active_enums::{PromotionKind, Role};
use crate::models::{Actor, Page};
use crate::services::{
    PromotionError, PromotionInput, PromotionQuery, PromotionUpdate, PromotionView,
};

impl From<PromotionError> for ApiError {
    fn from(err: PromotionError) -> Self {
        match err {
            PromotionError::NotFound(id) => Self::not_found("Promotion", id),
            PromotionError::Validation(msg) => Self::validation(msg),
            PromotionError::Forbidden(msg) => Self::Forbidden(msg),
            PromotionError::Internal(msg) => Self::internal(msg),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromotionRequest {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: PromotionKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_spending: Option<f64>,
    pub rate: Option<f64>,
    pub points: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePromotionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<PromotionKind>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub min_spending: Option<f64>,
    pub rate: Option<f64>,
    pub points: Option<i64>,
}

#[derive(Deserialize)]
pub struct PromotionListQuery {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<PromotionKind>,
    pub started: Option<bool>,
    pub ended: Option<bool>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// POST /promotions
pub async fn create_promotion(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreatePromotionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PromotionView>>), ApiError> {
    require_role(&actor, Role::Manager)?;

    let input = PromotionInput {
        name: require_text("name", &payload.name)?,
        description: require_text("description", &payload.description)?,
        kind: payload.kind,
        start_time: payload.start_time,
        end_time: payload.end_time,
        min_spending: payload.min_spending,
        rate: payload.rate,
        points: payload.points,
    };

    let promotion = state.shared.promotion_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(promotion))))
}

/// GET /promotions
pub async fn list_promotions(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<PromotionListQuery>,
) -> Result<Json<ApiResponse<Page<PromotionView>>>, ApiError> {
    let page = validate_page(PageParams {
        page: query.page,
        limit: query.limit,
    })?;

    if query.started.is_some() && query.ended.is_some() {
        return Err(ApiError::validation("started and ended cannot be combined"));
    }

    let query = PromotionQuery {
        name: query.name.filter(|s| !s.is_empty()),
        kind: query.kind,
        started: query.started,
        ended: query.ended,
    };

    let promotions = state
        .shared
        .promotion_service
        .list(&actor, query, page)
        .await?;
    Ok(Json(ApiResponse::success(promotions)))
}

/// GET /promotions/{id}
pub async fn get_promotion(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<PromotionView>>, ApiError> {
    let id = validate_id(id)?;
    let promotion = state.shared.promotion_service.get(&actor, id).await?;
    Ok(Json(ApiResponse::success(promotion)))
}

/// PATCH /promotions/{id}
pub async fn update_promotion(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdatePromotionRequest>,
) -> Result<Json<ApiResponse<PromotionView>>, ApiError> {
    require_role(&actor, Role::Manager)?;
    let id = validate_id(id)?;

    let update = PromotionUpdate {
        name: payload
            .name
            .as_deref()
            .map(|v| require_text("name", v))
            .transpose()?,
        description: payload
            .description
            .as_deref()
            .map(|v| require_text("description", v))
            .transpose()?,
        kind: payload.kind,
        start_time: payload.start_time,
        end_time: payload.end_time,
        min_spending: payload.min_spending,
        rate: payload.rate,
        points: payload.points,
    };

    let promotion = state.shared.promotion_service.update(id, update).await?;
    Ok(Json(ApiResponse::success(promotion)))
}

/// DELETE /promotions/{id}
pub async fn delete_promotion(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    require_role(&actor, Role::Manager)?;
    let id = validate_id(id)?;

    state.shared.promotion_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
