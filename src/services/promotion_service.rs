//! Domain service for promotions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::entities::{promotions, sea_orm_active_enums::PromotionKind};
use crate::models::{Actor, Page, PageRequest};

#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("Promotion {0} not found")]
    NotFound(i32),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for PromotionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionView {
    pub id: i32,
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

impl From<promotions::Model> for PromotionView {
    fn from(model: promotions::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            kind: model.kind,
            start_time: model.start_time,
            end_time: model.end_time,
            min_spending: model.min_spending,
            rate: model.rate,
            points: model.points,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromotionInput {
    pub name: String,
    pub description: String,
    pub kind: PromotionKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_spending: Option<f64>,
    pub rate: Option<f64>,
    pub points: Option<i64>,
}

/// Partial update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct PromotionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<PromotionKind>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub min_spending: Option<f64>,
    pub rate: Option<f64>,
    pub points: Option<i64>,
}

impl PromotionUpdate {
    /// Whether anything other than the end time is being changed.
    #[must_use]
    pub const fn touches_frozen_fields(&self) -> bool {
        self.name.is_some()
            || self.description.is_some()
            || self.kind.is_some()
            || self.start_time.is_some()
            || self.min_spending.is_some()
            || self.rate.is_some()
            || self.points.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromotionQuery {
    pub name: Option<String>,
    pub kind: Option<PromotionKind>,
    pub started: Option<bool>,
    pub ended: Option<bool>,
}

#[async_trait::async_trait]
pub trait PromotionService: Send + Sync {
    async fn create(&self, input: PromotionInput) -> Result<PromotionView, PromotionError>;

    /// Regular users only see active promotions they can still use.
    async fn list(
        &self,
        actor: &Actor,
        query: PromotionQuery,
        page: PageRequest,
    ) -> Result<Page<PromotionView>, PromotionError>;

    async fn get(&self, actor: &Actor, id: i32) -> Result<PromotionView, PromotionError>;

    /// # Errors
    ///
    /// Ended promotions cannot be edited, and started ones only accept a new
    /// end time.
    async fn update(
        &self,
        id: i32,
        update: PromotionUpdate,
    ) -> Result<PromotionView, PromotionError>;

    async fn delete(&self, id: i32) -> Result<(), PromotionError>;
}
