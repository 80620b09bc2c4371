use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::require_role;
use super::validation::{parse_timestamp, validate_id, validate_page, validate_utorid};
use super::{ApiError, ApiResponse, AppState, PageParams};
use crate::db::{AmountOperator, CashierStats};
use crate::entities::sea_orm_active_enums::{Role, TransactionKind};
use crate::models::{Actor, Page, PageRequest};
use crate::services::{
    AdjustmentInput, PurchaseInput, RedemptionInput, TransactionError, TransactionQuery,
    TransactionView, TransferInput,
};

impl From<TransactionError> for ApiError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::NotFound(msg) => Self::NotFound(msg),
            TransactionError::Validation(msg) => Self::validation(msg),
            TransactionError::Forbidden(msg) => Self::Forbidden(msg),
            TransactionError::Internal(msg) => Self::internal(msg),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub utorid: String,
    pub spent: Option<f64>,
    pub amount: Option<i64>,
    pub related_id: Option<i32>,
    #[serde(default)]
    pub promotion_ids: Vec<i32>,
    #[serde(default)]
    pub remark: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRequest {
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    pub amount: i64,
    #[serde(default)]
    pub promotion_ids: Vec<i32>,
    #[serde(default)]
    pub remark: String,
}

#[derive(Deserialize)]
pub struct TransferRequest {
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    pub amount: i64,
    #[serde(default)]
    pub remark: String,
}

#[derive(Deserialize)]
pub struct SuspiciousRequest {
    pub suspicious: bool,
}

#[derive(Deserialize)]
pub struct ProcessedRequest {
    pub processed: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionListQuery {
    pub name: Option<String>,
    pub created_by: Option<String>,
    pub suspicious: Option<bool>,
    pub processed: Option<bool>,
    pub promotion_id: Option<i32>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    pub related_id: Option<i32>,
    pub amount: Option<i64>,
    pub operator: Option<String>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl TransactionListQuery {
    fn into_parts(self) -> Result<(TransactionQuery, PageRequest), ApiError> {
        let page = validate_page(PageParams {
            page: self.page,
            limit: self.limit,
        })?;

        let amount = match (self.amount, self.operator.as_deref()) {
            (None, None) => None,
            (Some(amount), Some("gte")) => Some((AmountOperator::Gte, amount)),
            (Some(amount), Some("lte")) => Some((AmountOperator::Lte, amount)),
            (Some(_), None) => {
                return Err(ApiError::validation("amount requires operator (gte or lte)"));
            }
            (None, Some(_)) => return Err(ApiError::validation("operator requires amount")),
            (Some(_), Some(other)) => {
                return Err(ApiError::validation(format!(
                    "Invalid operator: {other}. Use gte or lte"
                )));
            }
        };

        if self.related_id.is_some() && self.kind.is_none() {
            return Err(ApiError::validation("relatedId requires type"));
        }

        let query = TransactionQuery {
            name: self.name.filter(|s| !s.is_empty()),
            created_by: self.created_by.filter(|s| !s.is_empty()),
            suspicious: self.suspicious,
            processed: self.processed,
            promotion_id: self.promotion_id,
            kind: self.kind,
            related_id: self.related_id,
            amount,
            after: self
                .after
                .as_deref()
                .map(|v| parse_timestamp("after", v))
                .transpose()?,
            before: self
                .before
                .as_deref()
                .map(|v| parse_timestamp("before", v))
                .transpose()?,
        };

        Ok((query, page))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashierStatsQuery {
    pub cashier_id: Option<i32>,
}

/// POST /transactions
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionView>>), ApiError> {
    require_role(&actor, Role::Cashier)?;
    let utorid = validate_utorid(&payload.utorid)?;
    let service = &state.shared.transaction_service;

    let transaction = match payload.kind {
        TransactionKind::Purchase => {
            let spent = payload
                .spent
                .ok_or_else(|| ApiError::validation("spent is required for purchases"))?;

            service
                .create_purchase(
                    &actor,
                    PurchaseInput {
                        utorid,
                        spent,
                        promotion_ids: payload.promotion_ids,
                        remark: payload.remark,
                    },
                )
                .await?
        }
        TransactionKind::Adjustment => {
            require_role(&actor, Role::Manager)?;
            let amount = payload
                .amount
                .ok_or_else(|| ApiError::validation("amount is required for adjustments"))?;
            let related_id = payload
                .related_id
                .ok_or_else(|| ApiError::validation("relatedId is required for adjustments"))?;

            service
                .create_adjustment(
                    &actor,
                    AdjustmentInput {
                        utorid,
                        amount,
                        related_id,
                        promotion_ids: payload.promotion_ids,
                        remark: payload.remark,
                    },
                )
                .await?
        }
        other => {
            return Err(ApiError::validation(format!(
                "Cannot create {other:?} transactions here; use purchase or adjustment"
            )));
        }
    };

    Ok((StatusCode::CREATED, Json(ApiResponse::success(transaction))))
}

/// POST /users/me/transactions
pub async fn create_redemption(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<RedemptionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionView>>), ApiError> {
    if payload
        .kind
        .is_some_and(|k| k != TransactionKind::Redemption)
    {
        return Err(ApiError::validation("type must be redemption"));
    }

    let transaction = state
        .shared
        .transaction_service
        .create_redemption(
            &actor,
            RedemptionInput {
                amount: payload.amount,
                promotion_ids: payload.promotion_ids,
                remark: payload.remark,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(transaction))))
}

/// POST /users/{id}/transactions
pub async fn transfer(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    Json(payload): Json<TransferRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionView>>), ApiError> {
    let recipient_id = validate_id(id)?;
    if payload.kind.is_some_and(|k| k != TransactionKind::Transfer) {
        return Err(ApiError::validation("type must be transfer"));
    }

    let transaction = state
        .shared
        .transaction_service
        .transfer(
            &actor,
            recipient_id,
            TransferInput {
                amount: payload.amount,
                remark: payload.remark,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(transaction))))
}

/// GET /transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<ApiResponse<Page<TransactionView>>>, ApiError> {
    require_role(&actor, Role::Manager)?;
    let (query, page) = query.into_parts()?;

    let transactions = state
        .shared
        .transaction_service
        .list(query, page)
        .await?;
    Ok(Json(ApiResponse::success(transactions)))
}

/// GET /users/me/transactions
pub async fn list_my_transactions(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<ApiResponse<Page<TransactionView>>>, ApiError> {
    let (query, page) = query.into_parts()?;

    let transactions = state
        .shared
        .transaction_service
        .list_for_user(&actor, query, page)
        .await?;
    Ok(Json(ApiResponse::success(transactions)))
}

/// GET /transactions/{id}
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<TransactionView>>, ApiError> {
    require_role(&actor, Role::Manager)?;
    let id = validate_id(id)?;

    let transaction = state.shared.transaction_service.get(id).await?;
    Ok(Json(ApiResponse::success(transaction)))
}

/// PATCH /transactions/{id}/suspicious
pub async fn set_suspicious(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    Json(payload): Json<SuspiciousRequest>,
) -> Result<Json<ApiResponse<TransactionView>>, ApiError> {
    require_role(&actor, Role::Manager)?;
    let id = validate_id(id)?;

    let transaction = state
        .shared
        .transaction_service
        .set_suspicious(id, payload.suspicious)
        .await?;
    Ok(Json(ApiResponse::success(transaction)))
}

/// PATCH /transactions/{id}/processed
pub async fn process_redemption(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    Json(payload): Json<ProcessedRequest>,
) -> Result<Json<ApiResponse<TransactionView>>, ApiError> {
    require_role(&actor, Role::Cashier)?;
    let id = validate_id(id)?;

    if !payload.processed {
        return Err(ApiError::validation("processed can only be set to true"));
    }

    let transaction = state
        .shared
        .transaction_service
        .process_redemption(&actor, id)
        .await?;
    Ok(Json(ApiResponse::success(transaction)))
}

/// GET /transactions/cashier-stats
pub async fn cashier_stats(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<CashierStatsQuery>,
) -> Result<Json<ApiResponse<CashierStats>>, ApiError> {
    require_role(&actor, Role::Cashier)?;

    let cashier_id = match query.cashier_id {
        Some(id) if id != actor.id => {
            require_role(&actor, Role::Manager)?;
            validate_id(id)?
        }
        _ => actor.id,
    };

    let stats = state.store().stats().cashier(cashier_id).await?;
    Ok(Json(ApiResponse::success(stats)))
}
