mod common;

use axum::http::StatusCode;
use campus_loyalty::entities::events;
use chrono::{Duration, Utc};
use common::{TestApp, spawn_app};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::task::JoinSet;

async fn create_event(app: &TestApp, manager: &str, capacity: Option<i64>, points: i64) -> i64 {
    let start = Utc::now() + Duration::days(2);
    let (status, body) = app
        .post(
            "/events",
            manager,
            json!({
                "name": "Board Game Night",
                "description": "Bring a friend",
                "location": "Sidney Smith 1069",
                "startTime": start.to_rfc3339(),
                "endTime": (start + Duration::hours(3)).to_rfc3339(),
                "capacity": capacity,
                "points": points,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_i64().unwrap()
}

async fn publish(app: &TestApp, manager: &str, id: i64) {
    let (status, body) = app
        .patch(&format!("/events/{id}"), manager, json!({ "published": true }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

fn count(body: &Value) -> i64 {
    body["data"]["count"].as_i64().unwrap()
}

#[tokio::test]
async fn test_publication_controls_visibility() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, regular) = app.create_user(&admin, "viewer01", "regular").await;

    let start = Utc::now() + Duration::days(1);
    let (status, _) = app
        .post(
            "/events",
            &regular,
            json!({
                "name": "Nope",
                "description": "x",
                "location": "y",
                "startTime": start.to_rfc3339(),
                "endTime": (start + Duration::hours(1)).to_rfc3339(),
                "points": 10,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let id = create_event(&app, &admin, None, 100).await;

    let (_, body) = app.get("/events", &regular).await;
    assert_eq!(count(&body), 0);
    let (status, _) = app.get(&format!("/events/{id}"), &regular).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    publish(&app, &admin, id).await;

    let (_, body) = app.get("/events", &regular).await;
    assert_eq!(count(&body), 1);
    assert!(body["data"]["results"][0].get("pointsRemain").is_none());

    let (status, body) = app.get(&format!("/events/{id}"), &regular).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("guests").is_none());

    let (_, body) = app.get(&format!("/events/{id}"), &admin).await;
    assert_eq!(body["data"]["pointsRemain"], 100);
    assert_eq!(body["data"]["guests"], json!([]));

    let (status, _) = app
        .patch(&format!("/events/{id}"), &admin, json!({ "published": false }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/events?started=true&ended=false", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_organizers_manage_guests_but_not_points() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, club) = app.create_user(&admin, "clubs001", "organizer").await;
    let (_, outsider) = app.create_user(&admin, "outside1", "regular").await;
    let (alice_id, _) = app.create_user(&admin, "alice001", "regular").await;

    let id = create_event(&app, &admin, None, 200).await;
    publish(&app, &admin, id).await;

    let (status, _) = app
        .post(
            &format!("/events/{id}/organizers"),
            &club,
            json!({ "utorid": "clubs001" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            &format!("/events/{id}/organizers"),
            &admin,
            json!({ "utorid": "clubs001" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["organizers"][0]["utorid"], "clubs001");

    let (status, body) = app
        .patch(
            &format!("/events/{id}"),
            &club,
            json!({ "description": "Snacks provided" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["description"], "Snacks provided");

    let (status, _) = app
        .patch(&format!("/events/{id}"), &club, json!({ "points": 500 }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .patch(&format!("/events/{id}"), &outsider, json!({ "name": "Mine" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            &format!("/events/{id}/guests"),
            &club,
            json!({ "utorid": "alice001" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["guestAdded"]["id"], alice_id);
    assert_eq!(body["data"]["numGuests"], 1);

    let invite = app
        .mailer
        .last_to("alice001@mail.utoronto.ca")
        .expect("invite sent");
    assert!(invite.subject.contains("Board Game Night"));

    // A user cannot hold both roles on one event.
    let (status, _) = app
        .post(
            &format!("/events/{id}/guests"),
            &club,
            json!({ "utorid": "clubs001" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            &format!("/events/{id}/organizers"),
            &admin,
            json!({ "utorid": "alice001" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .delete(&format!("/events/{id}/guests/{alice_id}"), &club)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .delete(&format!("/events/{id}/guests/{alice_id}"), &admin)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_rsvp_respects_capacity_and_end_time() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, alice) = app.create_user(&admin, "alice001", "regular").await;
    let (_, bob) = app.create_user(&admin, "bobsmith", "regular").await;

    let id = create_event(&app, &admin, Some(1), 50).await;

    let (status, _) = app
        .send("POST", &format!("/events/{id}/guests/me"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    publish(&app, &admin, id).await;

    let (status, body) = app
        .send("POST", &format!("/events/{id}/guests/me"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, _) = app
        .send("POST", &format!("/events/{id}/guests/me"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send("POST", &format!("/events/{id}/guests/me"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::GONE);

    // Full events are hidden unless asked for.
    let (_, body) = app.get("/events", &bob).await;
    assert_eq!(count(&body), 0);
    let (_, body) = app.get("/events?showFull=true", &bob).await;
    assert_eq!(count(&body), 1);

    // Capacity cannot drop below the guest count, but may be lifted.
    let (status, _) = app
        .patch(&format!("/events/{id}"), &admin, json!({ "capacity": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = app
        .patch(&format!("/events/{id}"), &admin, json!({ "capacity": null }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["capacity"], Value::Null);

    let (status, _) = app
        .send("DELETE", &format!("/events/{id}/guests/me"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let event = events::Entity::find_by_id(i32::try_from(id).unwrap())
        .one(&app.shared.store.conn)
        .await
        .unwrap()
        .unwrap();
    let mut active: events::ActiveModel = event.into();
    active.start_time = Set(Utc::now() - Duration::hours(3));
    active.end_time = Set(Utc::now() - Duration::hours(1));
    active.update(&app.shared.store.conn).await.unwrap();

    let (status, _) = app
        .send("POST", &format!("/events/{id}/guests/me"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn test_awards_draw_from_the_event_pool() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, club) = app.create_user(&admin, "clubs001", "organizer").await;
    let (_, alice) = app.create_user(&admin, "alice001", "regular").await;
    let (_, bob) = app.create_user(&admin, "bobsmith", "regular").await;
    app.create_user(&admin, "stranger", "regular").await;

    let id = create_event(&app, &admin, None, 100).await;
    publish(&app, &admin, id).await;
    app.post(
        &format!("/events/{id}/organizers"),
        &admin,
        json!({ "utorid": "clubs001" }),
    )
    .await;
    for token in [&alice, &bob] {
        let (status, _) = app
            .send("POST", &format!("/events/{id}/guests/me"), Some(token), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _) = app
        .post(
            &format!("/events/{id}/transactions"),
            &alice,
            json!({ "type": "event", "amount": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            &format!("/events/{id}/transactions"),
            &club,
            json!({ "type": "event", "amount": 30, "remark": "thanks" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["type"] == "event" && r["amount"] == 30));

    assert_eq!(app.points(&alice).await, 30);
    assert_eq!(app.points(&bob).await, 30);

    let (_, event) = app.get(&format!("/events/{id}"), &admin).await;
    assert_eq!(event["data"]["pointsRemain"], 40);
    assert_eq!(event["data"]["pointsAwarded"], 60);

    // 2 x 30 no longer fits in the remaining pool.
    let (status, _) = app
        .post(
            &format!("/events/{id}/transactions"),
            &club,
            json!({ "type": "event", "amount": 30 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            &format!("/events/{id}/transactions"),
            &club,
            json!({ "type": "event", "utorid": "alice001", "amount": 40 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["utorid"], "alice001");
    assert_eq!(app.points(&alice).await, 70);

    let (status, _) = app
        .post(
            &format!("/events/{id}/transactions"),
            &club,
            json!({ "type": "event", "utorid": "stranger", "amount": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Lowering the pool below what was already awarded is rejected.
    let (status, _) = app
        .patch(&format!("/events/{id}"), &admin, json!({ "points": 50 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_unpublished_events_can_be_deleted() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let draft = create_event(&app, &admin, None, 10).await;
    let live = create_event(&app, &admin, None, 10).await;
    publish(&app, &admin, live).await;

    let (status, _) = app.delete(&format!("/events/{live}"), &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/events/{draft}"), &admin).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/events/{draft}"), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_events_that_awarded_points_cannot_be_deleted() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    app.create_user(&admin, "alice001", "regular").await;

    let draft = create_event(&app, &admin, None, 50).await;
    let (status, _) = app
        .post(
            &format!("/events/{draft}/guests"),
            &admin,
            json!({ "utorid": "alice001" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post(
            &format!("/events/{draft}/transactions"),
            &admin,
            json!({ "type": "event", "utorid": "alice001", "amount": 5 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.delete(&format!("/events/{draft}"), &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get(&format!("/events/{draft}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pointsAwarded"], 5);
}

async fn pool(app: &TestApp, id: i64) -> (i64, i64, i64) {
    let event = events::Entity::find_by_id(i32::try_from(id).unwrap())
        .one(&app.shared.store.conn)
        .await
        .unwrap()
        .unwrap();
    (event.points_total, event.points_remain, event.points_awarded)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_awards_cannot_overdraw_the_pool() {
    let app = Arc::new(spawn_app().await);
    let admin = app.admin_token().await;
    let (_, alice) = app.create_user(&admin, "alice001", "regular").await;

    let id = create_event(&app, &admin, None, 100).await;
    publish(&app, &admin, id).await;
    let (status, _) = app
        .send("POST", &format!("/events/{id}/guests/me"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Only one award of 60 fits in a pool of 100.
    let mut awards = JoinSet::new();
    for _ in 0..6 {
        let app = app.clone();
        let admin = admin.clone();
        awards.spawn(async move {
            app.post(
                &format!("/events/{id}/transactions"),
                &admin,
                json!({ "type": "event", "amount": 60 }),
            )
            .await
            .0
        });
    }

    let mut statuses = Vec::new();
    while let Some(status) = awards.join_next().await {
        statuses.push(status.unwrap());
    }
    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let rejected = statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count();
    assert_eq!((created, rejected), (1, 5), "{statuses:?}");

    assert_eq!(pool(&app, id).await, (100, 40, 60));
    assert_eq!(app.points(&alice).await, 60);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_point_edits_racing_awards_keep_the_pool_consistent() {
    let app = Arc::new(spawn_app().await);
    let admin = app.admin_token().await;
    let (_, alice) = app.create_user(&admin, "alice001", "regular").await;

    let id = create_event(&app, &admin, None, 1000).await;
    publish(&app, &admin, id).await;
    let (status, _) = app
        .send("POST", &format!("/events/{id}/guests/me"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut requests = JoinSet::new();
    for i in 0..10 {
        let award_app = app.clone();
        let award_admin = admin.clone();
        requests.spawn(async move {
            award_app
                .post(
                    &format!("/events/{id}/transactions"),
                    &award_admin,
                    json!({ "type": "event", "amount": 10 }),
                )
                .await
        });

        let edit_app = app.clone();
        let edit_admin = admin.clone();
        requests.spawn(async move {
            edit_app
                .patch(
                    &format!("/events/{id}"),
                    &edit_admin,
                    json!({ "points": 2000 + i }),
                )
                .await
        });
    }

    while let Some(result) = requests.join_next().await {
        let (status, body) = result.unwrap();
        assert!(status.is_success(), "{status}: {body}");
    }

    let (total, remain, awarded) = pool(&app, id).await;
    assert_eq!(awarded, 100);
    assert_eq!(remain + awarded, total);
    assert!((2000..2010).contains(&total));
    assert_eq!(app.points(&alice).await, 100);
}
