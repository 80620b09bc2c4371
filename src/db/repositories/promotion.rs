use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::entities::{
    prelude::*, promotion_usages, promotions, sea_orm_active_enums::PromotionKind,
};
use crate::models::{Page, PageRequest};

#[derive(Debug, Clone)]
pub struct NewPromotion {
    pub name: String,
    pub description: String,
    pub kind: PromotionKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_spending: Option<f64>,
    pub rate: Option<f64>,
    pub points: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct PromotionFilter {
    pub name: Option<String>,
    pub kind: Option<PromotionKind>,
    pub started: Option<bool>,
    pub ended: Option<bool>,
    /// Only promotions active now that this user has not consumed.
    pub available_to: Option<i32>,
}

pub struct PromotionRepository {
    conn: DatabaseConnection,
}

impl PromotionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, new_promotion: NewPromotion) -> Result<promotions::Model> {
        promotions::ActiveModel {
            name: Set(new_promotion.name),
            description: Set(new_promotion.description),
            kind: Set(new_promotion.kind),
            start_time: Set(new_promotion.start_time),
            end_time: Set(new_promotion.end_time),
            min_spending: Set(new_promotion.min_spending),
            rate: Set(new_promotion.rate),
            points: Set(new_promotion.points),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert promotion")
    }

    pub async fn get(&self, id: i32) -> Result<Option<promotions::Model>> {
        Promotions::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query promotion")
    }

    pub async fn update(&self, active: promotions::ActiveModel) -> Result<promotions::Model> {
        active
            .update(&self.conn)
            .await
            .context("Failed to update promotion")
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Promotions::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn list(
        &self,
        filter: &PromotionFilter,
        page: PageRequest,
    ) -> Result<Page<promotions::Model>> {
        let now = Utc::now();
        let mut cond = Condition::all();

        if let Some(name) = &filter.name {
            cond = cond.add(promotions::Column::Name.contains(name));
        }
        if let Some(kind) = filter.kind {
            cond = cond.add(promotions::Column::Kind.eq(kind));
        }
        match filter.started {
            Some(true) => cond = cond.add(promotions::Column::StartTime.lte(now)),
            Some(false) => cond = cond.add(promotions::Column::StartTime.gt(now)),
            None => {}
        }
        match filter.ended {
            Some(true) => cond = cond.add(promotions::Column::EndTime.lte(now)),
            Some(false) => cond = cond.add(promotions::Column::EndTime.gt(now)),
            None => {}
        }
        if let Some(user_id) = filter.available_to {
            cond = cond.add(Self::available_condition(user_id, now));
        }

        let paginator = Promotions::find()
            .filter(cond)
            .order_by_asc(promotions::Column::EndTime)
            .order_by_asc(promotions::Column::Id)
            .paginate(&self.conn, page.limit);

        let count = paginator.num_items().await?;
        let results = paginator.fetch_page(page.index()).await?;

        Ok(Page { count, results })
    }

    /// Active now and not yet consumed by the user. Automatic promotions are
    /// never consumed.
    fn available_condition(user_id: i32, now: DateTime<Utc>) -> Condition {
        Condition::all()
            .add(promotions::Column::StartTime.lte(now))
            .add(promotions::Column::EndTime.gt(now))
            .add(
                promotions::Column::Id.not_in_subquery(
                    Query::select()
                        .column(promotion_usages::Column::PromotionId)
                        .from(PromotionUsages)
                        .and_where(promotion_usages::Column::UserId.eq(user_id))
                        .to_owned(),
                ),
            )
    }

    /// Automatic promotions active at `now`.
    pub async fn active_automatic(&self, now: DateTime<Utc>) -> Result<Vec<promotions::Model>> {
        Ok(Promotions::find()
            .filter(promotions::Column::Kind.eq(PromotionKind::Automatic))
            .filter(promotions::Column::StartTime.lte(now))
            .filter(promotions::Column::EndTime.gt(now))
            .order_by_asc(promotions::Column::Id)
            .all(&self.conn)
            .await?)
    }

    /// One-time promotions the user could still use right now.
    pub async fn available_onetime(&self, user_id: i32) -> Result<Vec<promotions::Model>> {
        Ok(Promotions::find()
            .filter(promotions::Column::Kind.eq(PromotionKind::Onetime))
            .filter(Self::available_condition(user_id, Utc::now()))
            .order_by_asc(promotions::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn get_many(&self, ids: &[i32]) -> Result<Vec<promotions::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(Promotions::find()
            .filter(promotions::Column::Id.is_in(ids.to_vec()))
            .all(&self.conn)
            .await?)
    }

    pub async fn is_used(&self, user_id: i32, promotion_id: i32) -> Result<bool> {
        Ok(PromotionUsages::find_by_id((user_id, promotion_id))
            .one(&self.conn)
            .await?
            .is_some())
    }
}
