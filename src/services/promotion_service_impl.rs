//! `SeaORM` implementation of the `PromotionService` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{IntoActiveModel, Set};
use tracing::info;

use crate::db::{NewPromotion, PromotionFilter, Store};
use crate::models::{Actor, Page, PageRequest};
use crate::services::promotion_service::{
    PromotionError, PromotionInput, PromotionQuery, PromotionService, PromotionUpdate,
    PromotionView,
};

pub struct SeaOrmPromotionService {
    store: Store,
}

impl SeaOrmPromotionService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

fn check_amounts(
    min_spending: Option<f64>,
    rate: Option<f64>,
    points: Option<i64>,
) -> Result<(), PromotionError> {
    if min_spending.is_some_and(|v| !v.is_finite() || v < 0.0) {
        return Err(PromotionError::Validation(
            "minSpending must be a non-negative number".to_string(),
        ));
    }
    if rate.is_some_and(|v| !v.is_finite() || v < 0.0) {
        return Err(PromotionError::Validation(
            "rate must be a non-negative number".to_string(),
        ));
    }
    if points.is_some_and(|v| v < 0) {
        return Err(PromotionError::Validation(
            "points must be a non-negative integer".to_string(),
        ));
    }
    Ok(())
}

fn check_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), PromotionError> {
    if end <= start {
        return Err(PromotionError::Validation(
            "endTime must be after startTime".to_string(),
        ));
    }
    if end <= now {
        return Err(PromotionError::Validation(
            "endTime cannot be in the past".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl PromotionService for SeaOrmPromotionService {
    async fn create(&self, input: PromotionInput) -> Result<PromotionView, PromotionError> {
        let now = Utc::now();
        if input.start_time < now {
            return Err(PromotionError::Validation(
                "startTime cannot be in the past".to_string(),
            ));
        }
        check_window(input.start_time, input.end_time, now)?;
        check_amounts(input.min_spending, input.rate, input.points)?;

        let promotion = self
            .store
            .promotions()
            .create(NewPromotion {
                name: input.name,
                description: input.description,
                kind: input.kind,
                start_time: input.start_time,
                end_time: input.end_time,
                min_spending: input.min_spending,
                rate: input.rate,
                points: input.points,
            })
            .await?;

        info!(promotion_id = promotion.id, kind = ?promotion.kind, "Promotion created");
        Ok(promotion.into())
    }

    async fn list(
        &self,
        actor: &Actor,
        query: PromotionQuery,
        page: PageRequest,
    ) -> Result<Page<PromotionView>, PromotionError> {
        if query.started.is_some() && query.ended.is_some() {
            return Err(PromotionError::Validation(
                "started and ended cannot be combined".to_string(),
            ));
        }

        let filter = if actor.is_manager() {
            PromotionFilter {
                name: query.name,
                kind: query.kind,
                started: query.started,
                ended: query.ended,
                available_to: None,
            }
        } else {
            PromotionFilter {
                name: query.name,
                kind: query.kind,
                available_to: Some(actor.id),
                ..Default::default()
            }
        };

        let page = self.store.promotions().list(&filter, page).await?;
        Ok(page.map(PromotionView::from))
    }

    async fn get(&self, actor: &Actor, id: i32) -> Result<PromotionView, PromotionError> {
        let promotion = self
            .store
            .promotions()
            .get(id)
            .await?
            .ok_or(PromotionError::NotFound(id))?;

        if !actor.is_manager() && !promotion.is_active_at(Utc::now()) {
            return Err(PromotionError::NotFound(id));
        }

        Ok(promotion.into())
    }

    async fn update(
        &self,
        id: i32,
        update: PromotionUpdate,
    ) -> Result<PromotionView, PromotionError> {
        let repo = self.store.promotions();
        let promotion = repo.get(id).await?.ok_or(PromotionError::NotFound(id))?;
        let now = Utc::now();

        if promotion.end_time <= now {
            return Err(PromotionError::Validation(
                "Promotion has already ended".to_string(),
            ));
        }
        if promotion.start_time <= now && update.touches_frozen_fields() {
            return Err(PromotionError::Validation(
                "Only endTime can be changed once a promotion has started".to_string(),
            ));
        }
        if update.start_time.is_some_and(|start| start < now) {
            return Err(PromotionError::Validation(
                "startTime cannot be in the past".to_string(),
            ));
        }

        let start = update.start_time.unwrap_or(promotion.start_time);
        let end = update.end_time.unwrap_or(promotion.end_time);
        check_window(start, end, now)?;
        check_amounts(update.min_spending, update.rate, update.points)?;

        let mut active = promotion.into_active_model();
        if let Some(name) = update.name {
            active.name = Set(name);
        }
        if let Some(description) = update.description {
            active.description = Set(description);
        }
        if let Some(kind) = update.kind {
            active.kind = Set(kind);
        }
        if let Some(start_time) = update.start_time {
            active.start_time = Set(start_time);
        }
        if let Some(end_time) = update.end_time {
            active.end_time = Set(end_time);
        }
        if let Some(min_spending) = update.min_spending {
            active.min_spending = Set(Some(min_spending));
        }
        if let Some(rate) = update.rate {
            active.rate = Set(Some(rate));
        }
        if let Some(points) = update.points {
            active.points = Set(Some(points));
        }

        Ok(repo.update(active).await?.into())
    }

    async fn delete(&self, id: i32) -> Result<(), PromotionError> {
        let repo = self.store.promotions();
        let promotion = repo.get(id).await?.ok_or(PromotionError::NotFound(id))?;

        if promotion.start_time <= Utc::now() {
            return Err(PromotionError::Forbidden(
                "Promotions cannot be deleted once they have started".to_string(),
            ));
        }

        repo.delete(id).await?;
        info!(promotion_id = id, "Promotion deleted");
        Ok(())
    }
}
