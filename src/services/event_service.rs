//! Domain service for events, their organizers and guest lists.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::LedgerError;
use crate::entities::users;
use crate::models::{Actor, Page, PageRequest};
use crate::services::transaction_service::TransactionView;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("{0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Gone(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for EventError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<LedgerError> for EventError {
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
pub struct UserBrief {
    pub id: i32,
    pub utorid: String,
    pub name: String,
}

impl From<users::Model> for UserBrief {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            utorid: user.utorid,
            name: user.name,
        }
    }
}

/// Single event. Staff fields are omitted for regular viewers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub num_guests: u64,
    pub organizers: Vec<UserBrief>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guests: Option<Vec<UserBrief>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_remain: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_awarded: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListItem {
    pub id: i32,
    pub name: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub num_guests: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_remain: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_awarded: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestAdded {
    pub id: i32,
    pub name: String,
    pub location: String,
    pub guest_added: UserBrief,
    pub num_guests: u64,
}

#[derive(Debug, Clone)]
pub struct EventInput {
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub points: i64,
}

#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// `Some(None)` removes the limit.
    pub capacity: Option<Option<i32>>,
    pub points: Option<i64>,
    pub published: Option<bool>,
}

impl EventUpdate {
    #[must_use]
    pub const fn touches_schedule(&self) -> bool {
        self.name.is_some()
            || self.description.is_some()
            || self.location.is_some()
            || self.start_time.is_some()
            || self.capacity.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub name: Option<String>,
    pub location: Option<String>,
    pub started: Option<bool>,
    pub ended: Option<bool>,
    pub show_full: bool,
    pub published: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct AwardInput {
    /// Single guest to award; every guest when `None`.
    pub utorid: Option<String>,
    pub amount: i64,
    pub remark: String,
}

#[async_trait::async_trait]
pub trait EventService: Send + Sync {
    async fn create(&self, actor: &Actor, input: EventInput) -> Result<EventView, EventError>;

    async fn list(
        &self,
        actor: &Actor,
        query: EventQuery,
        page: PageRequest,
    ) -> Result<Page<EventListItem>, EventError>;

    /// Unpublished events are hidden from everyone except managers and the
    /// event's organizers.
    async fn get(&self, actor: &Actor, id: i32) -> Result<EventView, EventError>;

    async fn update(
        &self,
        actor: &Actor,
        id: i32,
        update: EventUpdate,
    ) -> Result<EventView, EventError>;

    async fn delete(&self, id: i32) -> Result<(), EventError>;

    async fn add_organizer(&self, id: i32, utorid: &str) -> Result<EventView, EventError>;

    async fn remove_organizer(&self, id: i32, user_id: i32) -> Result<(), EventError>;

    async fn add_guest(
        &self,
        actor: &Actor,
        id: i32,
        utorid: &str,
    ) -> Result<GuestAdded, EventError>;

    async fn remove_guest(&self, id: i32, user_id: i32) -> Result<(), EventError>;

    async fn rsvp(&self, actor: &Actor, id: i32) -> Result<GuestAdded, EventError>;

    async fn cancel_rsvp(&self, actor: &Actor, id: i32) -> Result<(), EventError>;

    /// Awards points from the event's pool to one or all guests.
    async fn award(
        &self,
        actor: &Actor,
        id: i32,
        input: AwardInput,
    ) -> Result<Vec<TransactionView>, EventError>;
}
