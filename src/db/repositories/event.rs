use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::entities::{event_guests, event_organizers, events, prelude::*, users};
use crate::models::{Page, PageRequest};

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub points: i64,
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub name: Option<String>,
    pub location: Option<String>,
    pub started: Option<bool>,
    pub ended: Option<bool>,
    pub published: Option<bool>,
    /// Include events whose guest list has reached capacity.
    pub show_full: bool,
}

#[derive(Debug, Clone)]
pub struct EventSummary {
    pub event: events::Model,
    pub guest_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestAdd {
    Added,
    AlreadyGuest,
    Full,
}

pub struct EventRepository {
    conn: DatabaseConnection,
}

impl EventRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, new_event: NewEvent) -> Result<events::Model> {
        events::ActiveModel {
            name: Set(new_event.name),
            description: Set(new_event.description),
            location: Set(new_event.location),
            start_time: Set(new_event.start_time),
            end_time: Set(new_event.end_time),
            capacity: Set(new_event.capacity),
            points_total: Set(new_event.points),
            points_remain: Set(new_event.points),
            points_awarded: Set(0),
            published: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert event")
    }

    pub async fn get(&self, id: i32) -> Result<Option<events::Model>> {
        Events::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query event")
    }

    /// Saves field edits and, when given, a new point total in one
    /// transaction. The remaining pool is recomputed from the points already
    /// awarded at write time. Returns `None` when the new total is below
    /// that amount.
    pub async fn update(
        &self,
        id: i32,
        active: events::ActiveModel,
        points_total: Option<i64>,
    ) -> Result<Option<events::Model>> {
        let txn = self.conn.begin().await?;

        if let Some(total) = points_total {
            let resized = Events::update_many()
                .col_expr(events::Column::PointsTotal, Expr::value(total))
                .col_expr(
                    events::Column::PointsRemain,
                    Expr::val(total).sub(Expr::col(events::Column::PointsAwarded)),
                )
                .filter(events::Column::Id.eq(id))
                .filter(events::Column::PointsAwarded.lte(total))
                .exec(&txn)
                .await?;

            if resized.rows_affected == 0 {
                return Ok(None);
            }
        }

        if active.is_changed() {
            active
                .update(&txn)
                .await
                .context("Failed to update event")?;
        }

        let event = Events::find_by_id(id).one(&txn).await?;
        txn.commit().await?;
        Ok(event)
    }

    /// Deletes an event that is unpublished and has awarded nothing.
    /// Returns `false` when no such event exists.
    pub async fn delete_unused(&self, id: i32) -> Result<bool> {
        let result = Events::delete_many()
            .filter(events::Column::Id.eq(id))
            .filter(events::Column::Published.eq(false))
            .filter(events::Column::PointsAwarded.eq(0))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn list(&self, filter: &EventFilter, page: PageRequest) -> Result<Page<EventSummary>> {
        let now = Utc::now();
        let mut cond = Condition::all();

        if let Some(name) = &filter.name {
            cond = cond.add(events::Column::Name.contains(name));
        }
        if let Some(location) = &filter.location {
            cond = cond.add(events::Column::Location.contains(location));
        }
        match filter.started {
            Some(true) => cond = cond.add(events::Column::StartTime.lte(now)),
            Some(false) => cond = cond.add(events::Column::StartTime.gt(now)),
            None => {}
        }
        match filter.ended {
            Some(true) => cond = cond.add(events::Column::EndTime.lte(now)),
            Some(false) => cond = cond.add(events::Column::EndTime.gt(now)),
            None => {}
        }
        if let Some(published) = filter.published {
            cond = cond.add(events::Column::Published.eq(published));
        }
        if !filter.show_full {
            cond = cond.add(
                Condition::any()
                    .add(events::Column::Capacity.is_null())
                    .add(Expr::col((Events, events::Column::Capacity)).gt(Expr::cust(
                        "(SELECT COUNT(*) FROM event_guests WHERE event_guests.event_id = events.id)",
                    ))),
            );
        }

        let paginator = Events::find()
            .filter(cond)
            .order_by_asc(events::Column::StartTime)
            .order_by_asc(events::Column::Id)
            .paginate(&self.conn, page.limit);

        let count = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.index()).await?;

        let ids: Vec<i32> = rows.iter().map(|e| e.id).collect();
        let counts = self.guest_counts(&ids).await?;

        let results = rows
            .into_iter()
            .map(|event| EventSummary {
                guest_count: counts.get(&event.id).copied().unwrap_or(0),
                event,
            })
            .collect();

        Ok(Page { count, results })
    }

    pub async fn guest_counts(&self, event_ids: &[i32]) -> Result<HashMap<i32, u64>> {
        if event_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(i32, i64)> = EventGuests::find()
            .select_only()
            .column(event_guests::Column::EventId)
            .column_as(event_guests::Column::UserId.count(), "count")
            .filter(event_guests::Column::EventId.is_in(event_ids.to_vec()))
            .group_by(event_guests::Column::EventId)
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, count)| (id, u64::try_from(count).unwrap_or(0)))
            .collect())
    }

    pub async fn guest_count(&self, event_id: i32) -> Result<u64> {
        Ok(EventGuests::find()
            .filter(event_guests::Column::EventId.eq(event_id))
            .count(&self.conn)
            .await?)
    }

    pub async fn organizers(&self, event_id: i32) -> Result<Vec<users::Model>> {
        Ok(Users::find()
            .filter(
                users::Column::Id.in_subquery(
                    Query::select()
                        .column(event_organizers::Column::UserId)
                        .from(EventOrganizers)
                        .and_where(event_organizers::Column::EventId.eq(event_id))
                        .to_owned(),
                ),
            )
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn guests(&self, event_id: i32) -> Result<Vec<users::Model>> {
        Ok(Users::find()
            .filter(
                users::Column::Id.in_subquery(
                    Query::select()
                        .column(event_guests::Column::UserId)
                        .from(EventGuests)
                        .and_where(event_guests::Column::EventId.eq(event_id))
                        .to_owned(),
                ),
            )
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn guest_ids(&self, event_id: i32) -> Result<Vec<i32>> {
        Ok(EventGuests::find()
            .select_only()
            .column(event_guests::Column::UserId)
            .filter(event_guests::Column::EventId.eq(event_id))
            .order_by_asc(event_guests::Column::UserId)
            .into_tuple()
            .all(&self.conn)
            .await?)
    }

    pub async fn is_organizer(&self, event_id: i32, user_id: i32) -> Result<bool> {
        Ok(EventOrganizers::find_by_id((event_id, user_id))
            .one(&self.conn)
            .await?
            .is_some())
    }

    pub async fn is_guest(&self, event_id: i32, user_id: i32) -> Result<bool> {
        Ok(EventGuests::find_by_id((event_id, user_id))
            .one(&self.conn)
            .await?
            .is_some())
    }

    /// Returns `false` when the user already organizes the event.
    pub async fn add_organizer(&self, event_id: i32, user_id: i32) -> Result<bool> {
        let inserted = EventOrganizers::insert(event_organizers::ActiveModel {
            event_id: Set(event_id),
            user_id: Set(user_id),
            added_at: Set(Utc::now()),
        })
        .on_conflict(
            OnConflict::columns([
                event_organizers::Column::EventId,
                event_organizers::Column::UserId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&self.conn)
        .await?;

        Ok(inserted > 0)
    }

    pub async fn remove_organizer(&self, event_id: i32, user_id: i32) -> Result<bool> {
        let result = EventOrganizers::delete_by_id((event_id, user_id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Adds a guest unless the event is at capacity. The insert comes first
    /// and is rolled back when it would overfill the event.
    pub async fn add_guest(&self, event_id: i32, user_id: i32) -> Result<GuestAdd> {
        let txn = self.conn.begin().await?;

        let inserted = EventGuests::insert(event_guests::ActiveModel {
            event_id: Set(event_id),
            user_id: Set(user_id),
            added_at: Set(Utc::now()),
        })
        .on_conflict(
            OnConflict::columns([event_guests::Column::EventId, event_guests::Column::UserId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

        if inserted == 0 {
            return Ok(GuestAdd::AlreadyGuest);
        }

        let event = Events::find_by_id(event_id)
            .one(&txn)
            .await?
            .context("Event not found")?;

        if let Some(capacity) = event.capacity {
            let current = EventGuests::find()
                .filter(event_guests::Column::EventId.eq(event_id))
                .count(&txn)
                .await?;
            if current > u64::try_from(capacity).unwrap_or(0) {
                return Ok(GuestAdd::Full);
            }
        }

        txn.commit().await?;
        Ok(GuestAdd::Added)
    }

    pub async fn remove_guest(&self, event_id: i32, user_id: i32) -> Result<bool> {
        let result = EventGuests::delete_by_id((event_id, user_id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
