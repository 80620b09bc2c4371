//! Demo data for local development.
//!
//! Accounts are inserted directly; everything that moves points goes through
//! the services so balances, pools and promotion usage stay consistent.

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::auth::{hash_password, validate_password_policy};
use crate::clients::email::LogMailer;
use crate::clients::google::GoogleTokenInfoClient;
use crate::clients::build_http_client;
use crate::config::Config;
use crate::db::{NewPromotion, NewUser, Store};
use crate::entities::sea_orm_active_enums::{PromotionKind, Role};
use crate::models::Actor;
use crate::services::{
    AdjustmentInput, AwardInput, EventInput, EventUpdate, PurchaseInput, RedemptionInput,
    TransferInput,
};
use crate::state::SharedState;

const ACCOUNTS: &[(&str, &str, Role)] = &[
    ("manager1", "Morgan Manager", Role::Manager),
    ("cashier1", "Casey Cashier", Role::Cashier),
    ("clubs001", "Campus Clubs", Role::Organizer),
    ("alice001", "Alice Nguyen", Role::Regular),
    ("bobsmith", "Bob Smith", Role::Regular),
    ("chenchar", "Charlie Chen", Role::Regular),
    ("dianaprn", "Diana Prince", Role::Regular),
];

async fn create_account(
    store: &Store,
    config: &Config,
    password: &str,
    (utorid, name, role): (&str, &str, Role),
) -> anyhow::Result<Actor> {
    let password_hash = hash_password(password, &config.auth).await?;
    let user = store
        .users()
        .insert(NewUser {
            utorid: utorid.to_string(),
            name: name.to_string(),
            email: format!("{utorid}@{}", config.auth.email_domain),
            password_hash: Some(password_hash),
            role,
            verified: true,
            activated: true,
            reset_token: None,
            reset_expires_at: None,
            verification_token: None,
            google_sub: None,
        })
        .await?;
    Ok(Actor::from(&user))
}

pub async fn cmd_seed(config: Config, password: &str) -> anyhow::Result<()> {
    validate_password_policy(password).map_err(anyhow::Error::msg)?;

    // Outgoing mail is logged only while seeding.
    let http_client = build_http_client(config.email.request_timeout_seconds)?;
    let google = Arc::new(GoogleTokenInfoClient::new(
        http_client,
        config.auth.google_tokeninfo_url.clone(),
        config.auth.google_client_id.clone(),
    ));
    let state = SharedState::with_clients(config, Arc::new(LogMailer), google).await?;
    let store = &state.store;

    if store.users().count().await? > 1 {
        anyhow::bail!("Database already has accounts; seed only a fresh database");
    }

    let mut actors = Vec::with_capacity(ACCOUNTS.len());
    for account in ACCOUNTS {
        actors.push(create_account(store, &state.config, password, *account).await?);
    }
    let [manager, cashier, club, alice, bob, charlie, diana] = actors.as_slice() else {
        anyhow::bail!("Unexpected demo account list");
    };
    println!("Created {} demo accounts", ACCOUNTS.len());

    let now = Utc::now();
    let promotions = store.promotions();
    promotions
        .create(NewPromotion {
            name: "Double Week".to_string(),
            description: "Extra point per dollar on purchases over $20".to_string(),
            kind: PromotionKind::Automatic,
            start_time: now - Duration::days(1),
            end_time: now + Duration::days(6),
            min_spending: Some(20.0),
            rate: Some(0.01),
            points: None,
        })
        .await?;
    let welcome = promotions
        .create(NewPromotion {
            name: "Welcome Bonus".to_string(),
            description: "100 bonus points on one purchase".to_string(),
            kind: PromotionKind::Onetime,
            start_time: now - Duration::days(1),
            end_time: now + Duration::days(30),
            min_spending: None,
            rate: None,
            points: Some(100),
        })
        .await?;
    promotions
        .create(NewPromotion {
            name: "Exam Season".to_string(),
            description: "Bonus points during finals".to_string(),
            kind: PromotionKind::Automatic,
            start_time: now + Duration::days(14),
            end_time: now + Duration::days(28),
            min_spending: Some(10.0),
            rate: None,
            points: Some(25),
        })
        .await?;
    println!("Created 3 promotions");

    let ledger = &state.transaction_service;
    let mut first_purchase = None;
    for (customer, spent) in [(alice, 60.0), (bob, 25.5), (charlie, 12.0), (diana, 41.25)] {
        let row = ledger
            .create_purchase(
                cashier,
                PurchaseInput {
                    utorid: customer.utorid.clone(),
                    spent,
                    promotion_ids: Vec::new(),
                    remark: "Campus store".to_string(),
                },
            )
            .await?;
        first_purchase.get_or_insert(row.id);
    }
    ledger
        .create_purchase(
            cashier,
            PurchaseInput {
                utorid: charlie.utorid.clone(),
                spent: 8.0,
                promotion_ids: vec![welcome.id],
                remark: "Coffee".to_string(),
            },
        )
        .await?;

    if let Some(related_id) = first_purchase {
        ledger
            .create_adjustment(
                manager,
                AdjustmentInput {
                    utorid: alice.utorid.clone(),
                    amount: -10,
                    related_id,
                    promotion_ids: Vec::new(),
                    remark: "Returned item".to_string(),
                },
            )
            .await?;
    }

    ledger
        .transfer(
            alice,
            bob.id,
            TransferInput {
                amount: 50,
                remark: "Lunch".to_string(),
            },
        )
        .await?;

    let redemption = ledger
        .create_redemption(
            alice,
            RedemptionInput {
                amount: 100,
                promotion_ids: Vec::new(),
                remark: "Hoodie".to_string(),
            },
        )
        .await?;
    ledger.process_redemption(cashier, redemption.id).await?;
    ledger
        .create_redemption(
            bob,
            RedemptionInput {
                amount: 40,
                promotion_ids: Vec::new(),
                remark: "Water bottle".to_string(),
            },
        )
        .await?;
    println!("Recorded purchases, an adjustment, a transfer and redemptions");

    let events = &state.event_service;
    let fair = events
        .create(
            manager,
            EventInput {
                name: "Club Fair".to_string(),
                description: "Meet every student club on campus".to_string(),
                location: "Hart House".to_string(),
                start_time: now + Duration::days(3),
                end_time: now + Duration::days(3) + Duration::hours(4),
                capacity: Some(200),
                points: 500,
            },
        )
        .await?;
    events.add_organizer(fair.id, &club.utorid).await?;
    events
        .update(
            manager,
            fair.id,
            EventUpdate {
                published: Some(true),
                ..Default::default()
            },
        )
        .await?;
    for guest in [alice, bob, charlie] {
        events.add_guest(club, fair.id, &guest.utorid).await?;
    }
    events.rsvp(diana, fair.id).await?;
    events
        .award(
            club,
            fair.id,
            AwardInput {
                utorid: None,
                amount: 20,
                remark: "Thanks for coming".to_string(),
            },
        )
        .await?;

    let draft = events
        .create(
            manager,
            EventInput {
                name: "Hackathon Kickoff".to_string(),
                description: "Team formation and talks".to_string(),
                location: "Bahen Centre".to_string(),
                start_time: now + Duration::days(21),
                end_time: now + Duration::days(22),
                capacity: None,
                points: 1000,
            },
        )
        .await?;
    events.add_organizer(draft.id, &club.utorid).await?;
    println!("Created a published and an unpublished event");

    println!();
    println!("Demo accounts (password: {password}):");
    for (utorid, _, role) in ACCOUNTS {
        println!("  {utorid:<10} {role}");
    }

    Ok(())
}
