//! Domain service for the points ledger.
//!
//! Purchases and adjustments are recorded by staff, redemptions and
//! transfers by the account owner. Balance changes themselves are applied
//! by the ledger repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::{AmountOperator, LedgerError, TransactionRecord};
use crate::entities::sea_orm_active_enums::TransactionKind;
use crate::models::{Actor, Page, PageRequest};

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("{0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for TransactionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<LedgerError> for TransactionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound => Self::NotFound("Record not found".to_string()),
            LedgerError::Db(e) => Self::Internal(e.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: i32,
    pub utorid: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Signed change to the owner's balance.
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i32>,
    pub promotion_ids: Vec<i32>,
    pub bonus_points: i64,
    pub suspicious: bool,
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<String>,
    pub remark: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionRecord> for TransactionView {
    fn from(record: TransactionRecord) -> Self {
        let row = record.transaction;
        Self {
            id: row.id,
            utorid: record.utorid,
            kind: row.kind,
            amount: row.points_delta,
            spent: row.spent,
            related_id: row.related_id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            event_id: row.event_id,
            promotion_ids: record.promotion_ids,
            bonus_points: record.bonus_points,
            suspicious: row.suspicious,
            processed: row.processed,
            processed_by: record.processed_by,
            remark: row.remark,
            created_by: record.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PurchaseInput {
    pub utorid: String,
    pub spent: f64,
    pub promotion_ids: Vec<i32>,
    pub remark: String,
}

#[derive(Debug, Clone)]
pub struct AdjustmentInput {
    pub utorid: String,
    pub amount: i64,
    pub related_id: i32,
    pub promotion_ids: Vec<i32>,
    pub remark: String,
}

#[derive(Debug, Clone)]
pub struct RedemptionInput {
    pub amount: i64,
    pub promotion_ids: Vec<i32>,
    pub remark: String,
}

#[derive(Debug, Clone)]
pub struct TransferInput {
    pub amount: i64,
    pub remark: String,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub name: Option<String>,
    pub created_by: Option<String>,
    pub suspicious: Option<bool>,
    pub processed: Option<bool>,
    pub promotion_id: Option<i32>,
    pub kind: Option<TransactionKind>,
    pub related_id: Option<i32>,
    pub amount: Option<(AmountOperator, i64)>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
pub trait TransactionService: Send + Sync {
    /// Records a purchase for a customer and credits the points earned,
    /// including every applicable promotion bonus.
    async fn create_purchase(
        &self,
        actor: &Actor,
        input: PurchaseInput,
    ) -> Result<TransactionView, TransactionError>;

    async fn create_adjustment(
        &self,
        actor: &Actor,
        input: AdjustmentInput,
    ) -> Result<TransactionView, TransactionError>;

    /// Requests a redemption. The balance is debited when a cashier
    /// processes it.
    async fn create_redemption(
        &self,
        actor: &Actor,
        input: RedemptionInput,
    ) -> Result<TransactionView, TransactionError>;

    /// Sends points to another user. Returns the sender's ledger row.
    async fn transfer(
        &self,
        actor: &Actor,
        recipient_id: i32,
        input: TransferInput,
    ) -> Result<TransactionView, TransactionError>;

    async fn list(
        &self,
        query: TransactionQuery,
        page: PageRequest,
    ) -> Result<Page<TransactionView>, TransactionError>;

    async fn list_for_user(
        &self,
        actor: &Actor,
        query: TransactionQuery,
        page: PageRequest,
    ) -> Result<Page<TransactionView>, TransactionError>;

    async fn get(&self, id: i32) -> Result<TransactionView, TransactionError>;

    async fn set_suspicious(
        &self,
        id: i32,
        suspicious: bool,
    ) -> Result<TransactionView, TransactionError>;

    async fn process_redemption(
        &self,
        actor: &Actor,
        id: i32,
    ) -> Result<TransactionView, TransactionError>;
}
