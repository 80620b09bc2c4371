use axum::{Extension, Json, extract::State};
use chrono::Utc;
use std::sync::Arc;

use super::auth::require_role;
use super::{ApiError, ApiResponse, AppState};
use crate::db::ManagerStats;
use crate::entities::sea_orm_active_enums::Role;
use crate::models::Actor;

/// GET /manager/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ApiResponse<ManagerStats>>, ApiError> {
    require_role(&actor, Role::Manager)?;

    let stats = state.store().stats().manager(Utc::now()).await?;
    Ok(Json(ApiResponse::success(stats)))
}
