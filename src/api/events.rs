use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::require_role;
use super::types::double_option;
use super::validation::{require_text, validate_id, validate_page, validate_utorid};
use super::{ApiError, ApiResponse, AppState, MessageResponse, PageParams};
use crate::entities::sea_orm_active_enums::Role;
use crate::models::{Actor, Page};
use crate::services::{
    AwardInput, EventError, EventInput, EventListItem, EventQuery, EventUpdate, EventView,
    GuestAdded,
};

impl From<EventError> for ApiError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::NotFound(msg) => Self::NotFound(msg),
            EventError::Validation(msg) => Self::validation(msg),
            EventError::Forbidden(msg) => Self::Forbidden(msg),
            EventError::Gone(msg) => Self::Gone(msg),
            EventError::Internal(msg) => Self::internal(msg),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub points: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub capacity: Option<Option<i32>>,
    pub points: Option<i64>,
    pub published: Option<bool>,
}

impl UpdateEventRequest {
    fn into_update(self) -> Result<EventUpdate, ApiError> {
        if self.published == Some(false) {
            return Err(ApiError::validation("published can only be set to true"));
        }

        Ok(EventUpdate {
            name: self.name.as_deref().map(|v| require_text("name", v)).transpose()?,
            description: self
                .description
                .as_deref()
                .map(|v| require_text("description", v))
                .transpose()?,
            location: self
                .location
                .as_deref()
                .map(|v| require_text("location", v))
                .transpose()?,
            start_time: self.start_time,
            end_time: self.end_time,
            capacity: self.capacity,
            points: self.points,
            published: self.published,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListQuery {
    pub name: Option<String>,
    pub location: Option<String>,
    pub started: Option<bool>,
    pub ended: Option<bool>,
    #[serde(default)]
    pub show_full: bool,
    pub published: Option<bool>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Deserialize)]
pub struct UtoridRequest {
    pub utorid: String,
}

#[derive(Deserialize)]
pub struct MemberPath {
    pub id: i32,
    pub user_id: i32,
}

#[derive(Deserialize)]
pub struct AwardRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub utorid: Option<String>,
    pub amount: i64,
    #[serde(default)]
    pub remark: String,
}

/// POST /events
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EventView>>), ApiError> {
    require_role(&actor, Role::Manager)?;

    let input = EventInput {
        name: require_text("name", &payload.name)?,
        description: require_text("description", &payload.description)?,
        location: require_text("location", &payload.location)?,
        start_time: payload.start_time,
        end_time: payload.end_time,
        capacity: payload.capacity,
        points: payload.points,
    };

    let event = state.shared.event_service.create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(event))))
}

/// GET /events
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<EventListQuery>,
) -> Result<Json<ApiResponse<Page<EventListItem>>>, ApiError> {
    let page = validate_page(PageParams {
        page: query.page,
        limit: query.limit,
    })?;

    let query = EventQuery {
        name: query.name.filter(|s| !s.is_empty()),
        location: query.location.filter(|s| !s.is_empty()),
        started: query.started,
        ended: query.ended,
        show_full: query.show_full,
        published: query.published,
    };

    let events = state.shared.event_service.list(&actor, query, page).await?;
    Ok(Json(ApiResponse::success(events)))
}

/// GET /events/{id}
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<EventView>>, ApiError> {
    let id = validate_id(id)?;
    let event = state.shared.event_service.get(&actor, id).await?;
    Ok(Json(ApiResponse::success(event)))
}

/// PATCH /events/{id}
pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateEventRequest>,
) -> Result<Json<ApiResponse<EventView>>, ApiError> {
    let id = validate_id(id)?;
    let update = payload.into_update()?;

    let event = state
        .shared
        .event_service
        .update(&actor, id, update)
        .await?;
    Ok(Json(ApiResponse::success(event)))
}

/// DELETE /events/{id}
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    require_role(&actor, Role::Manager)?;
    let id = validate_id(id)?;

    state.shared.event_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /events/{id}/organizers
pub async fn add_organizer(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    Json(payload): Json<UtoridRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EventView>>), ApiError> {
    require_role(&actor, Role::Manager)?;
    let id = validate_id(id)?;
    let utorid = validate_utorid(&payload.utorid)?;

    let event = state.shared.event_service.add_organizer(id, &utorid).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(event))))
}

/// DELETE /events/{id}/organizers/{userId}
pub async fn remove_organizer(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(path): Path<MemberPath>,
) -> Result<StatusCode, ApiError> {
    require_role(&actor, Role::Manager)?;
    let id = validate_id(path.id)?;
    let user_id = validate_id(path.user_id)?;

    state
        .shared
        .event_service
        .remove_organizer(id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /events/{id}/guests
pub async fn add_guest(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    Json(payload): Json<UtoridRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GuestAdded>>), ApiError> {
    let id = validate_id(id)?;
    let utorid = validate_utorid(&payload.utorid)?;

    let added = state
        .shared
        .event_service
        .add_guest(&actor, id, &utorid)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(added))))
}

/// DELETE /events/{id}/guests/{userId}
pub async fn remove_guest(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(path): Path<MemberPath>,
) -> Result<StatusCode, ApiError> {
    require_role(&actor, Role::Manager)?;
    let id = validate_id(path.id)?;
    let user_id = validate_id(path.user_id)?;

    state.shared.event_service.remove_guest(id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /events/{id}/guests/me
pub async fn rsvp(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
) -> Result<(StatusCode, Json<ApiResponse<GuestAdded>>), ApiError> {
    let id = validate_id(id)?;
    let added = state.shared.event_service.rsvp(&actor, id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(added))))
}

/// DELETE /events/{id}/guests/me
pub async fn cancel_rsvp(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let id = validate_id(id)?;
    state.shared.event_service.cancel_rsvp(&actor, id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "RSVP cancelled",
    ))))
}

/// POST /events/{id}/transactions
///
/// Responds with the single award row when a `utorid` is given, otherwise
/// with one row per guest.
pub async fn award_points(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    Json(payload): Json<AwardRequest>,
) -> Result<Response, ApiError> {
    let id = validate_id(id)?;
    if payload.kind.as_deref().is_some_and(|k| k != "event") {
        return Err(ApiError::validation("type must be event"));
    }

    let utorid = payload
        .utorid
        .as_deref()
        .map(validate_utorid)
        .transpose()?;
    let single = utorid.is_some();

    let rows = state
        .shared
        .event_service
        .award(
            &actor,
            id,
            AwardInput {
                utorid,
                amount: payload.amount,
                remark: payload.remark,
            },
        )
        .await?;

    if single && let Some(row) = rows.first() {
        return Ok((StatusCode::CREATED, Json(ApiResponse::success(row.clone()))).into_response());
    }
    Ok((StatusCode::CREATED, Json(ApiResponse::success(rows))).into_response())
}
