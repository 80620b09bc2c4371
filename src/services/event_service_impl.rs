//! `SeaORM` implementation of the `EventService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{IntoActiveModel, Set};
use tracing::info;

use crate::clients::email::{Mailer, deliver, templates};
use crate::db::{EventFilter, GuestAdd, NewEvent, Store};
use crate::entities::{events, users};
use crate::models::{Actor, Page, PageRequest};
use crate::services::event_service::{
    AwardInput, EventError, EventInput, EventListItem, EventQuery, EventService, EventUpdate,
    EventView, GuestAdded, UserBrief,
};
use crate::services::transaction_service::TransactionView;

pub struct SeaOrmEventService {
    store: Store,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
}

impl SeaOrmEventService {
    #[must_use]
    pub fn new(store: Store, mailer: Arc<dyn Mailer>, frontend_url: String) -> Self {
        Self {
            store,
            mailer,
            frontend_url,
        }
    }

    async fn load(&self, id: i32) -> Result<events::Model, EventError> {
        self.store
            .events()
            .get(id)
            .await?
            .ok_or_else(|| EventError::NotFound(format!("Event {id} not found")))
    }

    async fn user_by_utorid(&self, utorid: &str) -> Result<users::Model, EventError> {
        self.store
            .users()
            .get_by_utorid(utorid)
            .await?
            .ok_or_else(|| EventError::NotFound(format!("User {utorid} not found")))
    }

    async fn can_manage(&self, actor: &Actor, event_id: i32) -> Result<bool, EventError> {
        if actor.is_manager() {
            return Ok(true);
        }
        Ok(self.store.events().is_organizer(event_id, actor.id).await?)
    }

    async fn require_manage(&self, actor: &Actor, event_id: i32) -> Result<(), EventError> {
        if self.can_manage(actor, event_id).await? {
            Ok(())
        } else {
            Err(EventError::Forbidden(
                "Only managers and event organizers can do this".to_string(),
            ))
        }
    }

    async fn detail(&self, event: events::Model, staff: bool) -> Result<EventView, EventError> {
        let repo = self.store.events();
        let organizers = repo.organizers(event.id).await?;
        let guests = repo.guests(event.id).await?;

        Ok(EventView {
            id: event.id,
            name: event.name,
            description: event.description,
            location: event.location,
            start_time: event.start_time,
            end_time: event.end_time,
            capacity: event.capacity,
            num_guests: guests.len() as u64,
            organizers: organizers.into_iter().map(UserBrief::from).collect(),
            guests: staff.then(|| guests.into_iter().map(UserBrief::from).collect()),
            points_remain: staff.then_some(event.points_remain),
            points_awarded: staff.then_some(event.points_awarded),
            published: staff.then_some(event.published),
        })
    }

    async fn admit(&self, event: &events::Model, user: users::Model) -> Result<GuestAdded, EventError> {
        let repo = self.store.events();

        if event.end_time <= Utc::now() {
            return Err(EventError::Gone("Event has already ended".to_string()));
        }
        if repo.is_organizer(event.id, user.id).await? {
            return Err(EventError::Validation(
                "Organizers cannot be guests of their own event".to_string(),
            ));
        }

        match repo.add_guest(event.id, user.id).await? {
            GuestAdd::Added => {}
            GuestAdd::AlreadyGuest => {
                return Err(EventError::Validation(format!(
                    "{} is already on the guest list",
                    user.utorid
                )));
            }
            GuestAdd::Full => return Err(EventError::Gone("Event is full".to_string())),
        }

        let num_guests = repo.guest_count(event.id).await?;
        info!(event_id = event.id, user_id = user.id, "Guest added");

        Ok(GuestAdded {
            id: event.id,
            name: event.name.clone(),
            location: event.location.clone(),
            guest_added: user.into(),
            num_guests,
        })
    }
}

#[async_trait]
impl EventService for SeaOrmEventService {
    async fn create(&self, actor: &Actor, input: EventInput) -> Result<EventView, EventError> {
        let now = Utc::now();
        if input.start_time < now {
            return Err(EventError::Validation(
                "startTime cannot be in the past".to_string(),
            ));
        }
        if input.end_time <= input.start_time {
            return Err(EventError::Validation(
                "endTime must be after startTime".to_string(),
            ));
        }
        if input.capacity.is_some_and(|c| c <= 0) {
            return Err(EventError::Validation(
                "capacity must be a positive integer".to_string(),
            ));
        }
        if input.points <= 0 {
            return Err(EventError::Validation(
                "points must be a positive integer".to_string(),
            ));
        }

        let event = self
            .store
            .events()
            .create(NewEvent {
                name: input.name,
                description: input.description,
                location: input.location,
                start_time: input.start_time,
                end_time: input.end_time,
                capacity: input.capacity,
                points: input.points,
            })
            .await?;

        info!(event_id = event.id, created_by = actor.id, "Event created");
        self.detail(event, true).await
    }

    async fn list(
        &self,
        actor: &Actor,
        query: EventQuery,
        page: PageRequest,
    ) -> Result<Page<EventListItem>, EventError> {
        if query.started.is_some() && query.ended.is_some() {
            return Err(EventError::Validation(
                "started and ended cannot be combined".to_string(),
            ));
        }

        let staff = actor.is_manager();
        let filter = EventFilter {
            name: query.name,
            location: query.location,
            started: query.started,
            ended: query.ended,
            published: if staff { query.published } else { Some(true) },
            show_full: query.show_full,
        };

        let page = self.store.events().list(&filter, page).await?;
        Ok(page.map(|summary| {
            let event = summary.event;
            EventListItem {
                id: event.id,
                name: event.name,
                location: event.location,
                start_time: event.start_time,
                end_time: event.end_time,
                capacity: event.capacity,
                num_guests: summary.guest_count,
                points_remain: staff.then_some(event.points_remain),
                points_awarded: staff.then_some(event.points_awarded),
                published: staff.then_some(event.published),
            }
        }))
    }

    async fn get(&self, actor: &Actor, id: i32) -> Result<EventView, EventError> {
        let event = self.load(id).await?;
        let staff = self.can_manage(actor, id).await?;

        if !staff && !event.published {
            return Err(EventError::NotFound(format!("Event {id} not found")));
        }

        self.detail(event, staff).await
    }

    async fn update(
        &self,
        actor: &Actor,
        id: i32,
        update: EventUpdate,
    ) -> Result<EventView, EventError> {
        self.require_manage(actor, id).await?;
        let event = self.load(id).await?;
        let now = Utc::now();

        if !actor.is_manager() && (update.points.is_some() || update.published.is_some()) {
            return Err(EventError::Forbidden(
                "Only managers can change points or publish events".to_string(),
            ));
        }
        if event.start_time <= now && update.touches_schedule() {
            return Err(EventError::Validation(
                "Event details cannot change once it has started".to_string(),
            ));
        }
        if event.end_time <= now && update.end_time.is_some() {
            return Err(EventError::Validation(
                "Event has already ended".to_string(),
            ));
        }
        if update.start_time.is_some_and(|start| start < now) {
            return Err(EventError::Validation(
                "startTime cannot be in the past".to_string(),
            ));
        }
        if update.end_time.is_some_and(|end| end < now) {
            return Err(EventError::Validation(
                "endTime cannot be in the past".to_string(),
            ));
        }

        let start = update.start_time.unwrap_or(event.start_time);
        let end = update.end_time.unwrap_or(event.end_time);
        if end <= start {
            return Err(EventError::Validation(
                "endTime must be after startTime".to_string(),
            ));
        }

        if let Some(Some(capacity)) = update.capacity {
            if capacity <= 0 {
                return Err(EventError::Validation(
                    "capacity must be a positive integer".to_string(),
                ));
            }
            let guests = self.store.events().guest_count(id).await?;
            if u64::try_from(capacity).unwrap_or(0) < guests {
                return Err(EventError::Validation(format!(
                    "capacity cannot be lower than the current guest count ({guests})"
                )));
            }
        }

        if let Some(points) = update.points {
            if points < event.points_awarded {
                return Err(EventError::Validation(format!(
                    "points cannot be lower than the {} already awarded",
                    event.points_awarded
                )));
            }
        }

        if update.published == Some(false) {
            return Err(EventError::Validation(
                "published can only be set to true".to_string(),
            ));
        }

        let mut active = event.into_active_model();
        if let Some(name) = update.name {
            active.name = Set(name);
        }
        if let Some(description) = update.description {
            active.description = Set(description);
        }
        if let Some(location) = update.location {
            active.location = Set(location);
        }
        if let Some(start_time) = update.start_time {
            active.start_time = Set(start_time);
        }
        if let Some(end_time) = update.end_time {
            active.end_time = Set(end_time);
        }
        if let Some(capacity) = update.capacity {
            active.capacity = Set(capacity);
        }
        if let Some(published) = update.published {
            active.published = Set(published);
        }

        let event = self
            .store
            .events()
            .update(id, active, update.points)
            .await?
            .ok_or_else(|| {
                EventError::Validation(
                    "points cannot be lower than the points already awarded".to_string(),
                )
            })?;
        info!(event_id = event.id, updated_by = actor.id, "Event updated");
        self.detail(event, true).await
    }

    async fn delete(&self, id: i32) -> Result<(), EventError> {
        let event = self.load(id).await?;
        if event.published {
            return Err(EventError::Validation(
                "Published events cannot be deleted".to_string(),
            ));
        }
        if event.points_awarded > 0 {
            return Err(EventError::Validation(
                "Events that have awarded points cannot be deleted".to_string(),
            ));
        }

        if !self.store.events().delete_unused(id).await? {
            return Err(EventError::Validation(
                "Event was published or awarded points and cannot be deleted".to_string(),
            ));
        }
        info!(event_id = id, "Event deleted");
        Ok(())
    }

    async fn add_organizer(&self, id: i32, utorid: &str) -> Result<EventView, EventError> {
        let event = self.load(id).await?;
        let user = self.user_by_utorid(utorid).await?;
        let repo = self.store.events();

        if event.end_time <= Utc::now() {
            return Err(EventError::Gone("Event has already ended".to_string()));
        }
        if repo.is_guest(id, user.id).await? {
            return Err(EventError::Validation(format!(
                "{utorid} is a guest of this event; remove them first"
            )));
        }

        repo.add_organizer(id, user.id).await?;
        info!(event_id = id, user_id = user.id, "Organizer added");
        self.detail(event, true).await
    }

    async fn remove_organizer(&self, id: i32, user_id: i32) -> Result<(), EventError> {
        self.load(id).await?;
        if !self.store.events().remove_organizer(id, user_id).await? {
            return Err(EventError::NotFound(format!(
                "User {user_id} does not organize event {id}"
            )));
        }
        Ok(())
    }

    async fn add_guest(
        &self,
        actor: &Actor,
        id: i32,
        utorid: &str,
    ) -> Result<GuestAdded, EventError> {
        self.require_manage(actor, id).await?;
        let event = self.load(id).await?;

        if !actor.is_manager() && !event.published {
            return Err(EventError::NotFound(format!("Event {id} not found")));
        }

        let user = self.user_by_utorid(utorid).await?;
        let email = user.email.clone();
        let name = user.name.clone();
        let added = self.admit(&event, user).await?;

        let link = format!(
            "{}/events/{}",
            self.frontend_url.trim_end_matches('/'),
            event.id
        );
        deliver(
            &self.mailer,
            templates::event_invite(
                &email,
                &name,
                &event.name,
                &event.location,
                event.start_time,
                &link,
            ),
        )
        .await;

        Ok(added)
    }

    async fn remove_guest(&self, id: i32, user_id: i32) -> Result<(), EventError> {
        self.load(id).await?;
        if !self.store.events().remove_guest(id, user_id).await? {
            return Err(EventError::NotFound(format!(
                "User {user_id} is not a guest of event {id}"
            )));
        }
        Ok(())
    }

    async fn rsvp(&self, actor: &Actor, id: i32) -> Result<GuestAdded, EventError> {
        let event = self.load(id).await?;
        if !event.published {
            return Err(EventError::NotFound(format!("Event {id} not found")));
        }

        let user = self
            .store
            .users()
            .get(actor.id)
            .await?
            .ok_or_else(|| EventError::NotFound(format!("User {} not found", actor.id)))?;

        self.admit(&event, user).await
    }

    async fn cancel_rsvp(&self, actor: &Actor, id: i32) -> Result<(), EventError> {
        let event = self.load(id).await?;
        if event.end_time <= Utc::now() {
            return Err(EventError::Gone("Event has already ended".to_string()));
        }

        if !self.store.events().remove_guest(id, actor.id).await? {
            return Err(EventError::NotFound(
                "You are not on the guest list".to_string(),
            ));
        }
        info!(event_id = id, user_id = actor.id, "Guest cancelled RSVP");
        Ok(())
    }

    async fn award(
        &self,
        actor: &Actor,
        id: i32,
        input: AwardInput,
    ) -> Result<Vec<TransactionView>, EventError> {
        self.require_manage(actor, id).await?;
        self.load(id).await?;

        if input.amount <= 0 {
            return Err(EventError::Validation(
                "amount must be a positive integer".to_string(),
            ));
        }

        let repo = self.store.events();
        let recipients = match &input.utorid {
            Some(utorid) => {
                let user = self.user_by_utorid(utorid).await?;
                if !repo.is_guest(id, user.id).await? {
                    return Err(EventError::Validation(format!(
                        "{utorid} is not a guest of this event"
                    )));
                }
                vec![user.id]
            }
            None => repo.guest_ids(id).await?,
        };

        if recipients.is_empty() {
            return Err(EventError::Validation(
                "Event has no guests to award".to_string(),
            ));
        }

        let ledger = self.store.ledger();
        let rows = ledger
            .award_event(id, &recipients, input.amount, &input.remark, actor.id)
            .await?;

        info!(
            event_id = id,
            guests = rows.len(),
            amount = input.amount,
            "Event points awarded"
        );

        Ok(ledger
            .enrich(rows)
            .await?
            .into_iter()
            .map(TransactionView::from)
            .collect())
    }
}
