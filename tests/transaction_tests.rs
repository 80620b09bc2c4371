mod common;

use axum::http::StatusCode;
use campus_loyalty::db::NewPromotion;
use campus_loyalty::entities::sea_orm_active_enums::PromotionKind;
use chrono::{Duration, Utc};
use common::{TestApp, spawn_app};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinSet;

struct Cast {
    admin: String,
    manager: String,
    cashier: String,
    alice: String,
    alice_id: i64,
    bob: String,
    bob_id: i64,
}

async fn cast(app: &TestApp) -> Cast {
    let admin = app.admin_token().await;
    let (_, manager) = app.create_user(&admin, "manager1", "manager").await;
    let (_, cashier) = app.create_user(&admin, "cashier1", "cashier").await;
    let (alice_id, alice) = app.create_user(&admin, "alice001", "regular").await;
    let (bob_id, bob) = app.create_user(&admin, "bobsmith", "regular").await;

    Cast {
        admin,
        manager,
        cashier,
        alice,
        alice_id,
        bob,
        bob_id,
    }
}

async fn purchase(app: &TestApp, cashier: &str, utorid: &str, spent: f64) -> serde_json::Value {
    let (status, body) = app
        .post(
            "/transactions",
            cashier,
            json!({ "type": "purchase", "utorid": utorid, "spent": spent }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

#[tokio::test]
async fn test_purchase_earns_points_per_quarter() {
    let app = spawn_app().await;
    let c = cast(&app).await;

    let row = purchase(&app, &c.cashier, "alice001", 10.0).await;
    assert_eq!(row["type"], "purchase");
    assert_eq!(row["amount"], 40);
    assert_eq!(row["createdBy"], "cashier1");
    assert_eq!(app.points(&c.alice).await, 40);

    let (status, _) = app
        .post(
            "/transactions",
            &c.alice,
            json!({ "type": "purchase", "utorid": "bobsmith", "spent": 10.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/transactions",
            &c.cashier,
            json!({ "type": "purchase", "utorid": "alice001", "spent": -3.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_promotions_add_bonus_and_one_time_is_consumed() {
    let app = spawn_app().await;
    let c = cast(&app).await;
    let now = Utc::now();
    let promotions = app.shared.store.promotions();

    promotions
        .create(NewPromotion {
            name: "Big Spender".to_string(),
            description: "Extra point per dollar over $20".to_string(),
            kind: PromotionKind::Automatic,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::days(1),
            min_spending: Some(20.0),
            rate: Some(0.01),
            points: None,
        })
        .await
        .unwrap();
    let welcome = promotions
        .create(NewPromotion {
            name: "Welcome".to_string(),
            description: "One-time bonus".to_string(),
            kind: PromotionKind::Onetime,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::days(1),
            min_spending: None,
            rate: None,
            points: Some(100),
        })
        .await
        .unwrap();

    // Below the automatic threshold: base points only.
    let row = purchase(&app, &c.cashier, "alice001", 10.0).await;
    assert_eq!(row["amount"], 40);

    // $20 earns 80 base plus 20 from the automatic rate.
    let row = purchase(&app, &c.cashier, "alice001", 20.0).await;
    assert_eq!(row["amount"], 100);

    let (status, body) = app
        .post(
            "/transactions",
            &c.cashier,
            json!({
                "type": "purchase",
                "utorid": "alice001",
                "spent": 1.0,
                "promotionIds": [welcome.id],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["amount"], 104);
    assert_eq!(body["data"]["promotionIds"], json!([welcome.id]));

    let (status, _) = app
        .post(
            "/transactions",
            &c.cashier,
            json!({
                "type": "purchase",
                "utorid": "alice001",
                "spent": 1.0,
                "promotionIds": [welcome.id],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.points(&c.alice).await, 244);

    // Used one-time promotions disappear from the customer's list.
    let (status, body) = app.get("/promotions", &c.alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
}

#[tokio::test]
async fn test_transfer_moves_points_between_users() {
    let app = spawn_app().await;
    let c = cast(&app).await;
    purchase(&app, &c.cashier, "alice001", 25.0).await;

    let (status, body) = app
        .post(
            &format!("/users/{}/transactions", c.bob_id),
            &c.alice,
            json!({ "type": "transfer", "amount": 30, "remark": "pizza" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["amount"], -30);
    assert_eq!(body["data"]["recipientId"], c.bob_id);

    assert_eq!(app.points(&c.alice).await, 70);
    assert_eq!(app.points(&c.bob).await, 30);

    let (status, _) = app
        .post(
            &format!("/users/{}/transactions", c.bob_id),
            &c.alice,
            json!({ "type": "transfer", "amount": 500 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            &format!("/users/{}/transactions", c.alice_id),
            &c.alice,
            json!({ "type": "transfer", "amount": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/users/me/transactions?type=transfer", &c.bob).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["results"][0]["amount"], 30);
}

#[tokio::test]
async fn test_redemption_debits_when_processed() {
    let app = spawn_app().await;
    let c = cast(&app).await;
    purchase(&app, &c.cashier, "alice001", 25.0).await;

    let (status, body) = app
        .post(
            "/users/me/transactions",
            &c.alice,
            json!({ "type": "redemption", "amount": 60 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["processed"], false);
    let id = body["data"]["id"].as_i64().unwrap();

    // Nothing moves until a cashier processes it.
    assert_eq!(app.points(&c.alice).await, 100);

    let (status, _) = app
        .patch(
            &format!("/transactions/{id}/processed"),
            &c.alice,
            json!({ "processed": true }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(
            &format!("/transactions/{id}/processed"),
            &c.cashier,
            json!({ "processed": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["processed"], true);
    assert_eq!(body["data"]["processedBy"], "cashier1");
    assert_eq!(app.points(&c.alice).await, 40);

    let (status, _) = app
        .patch(
            &format!("/transactions/{id}/processed"),
            &c.cashier,
            json!({ "processed": true }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/users/me/transactions",
            &c.alice,
            json!({ "type": "redemption", "amount": 41 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_processing_debits_each_redemption_once() {
    let app = Arc::new(spawn_app().await);
    let c = cast(&app).await;
    purchase(&app, &c.cashier, "alice001", 25.0).await;

    for _ in 0..5 {
        let (status, body) = app
            .post(
                "/users/me/transactions",
                &c.alice,
                json!({ "type": "redemption", "amount": 10 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id = body["data"]["id"].as_i64().unwrap();

        let mut attempts = JoinSet::new();
        for _ in 0..3 {
            let app = app.clone();
            let cashier = c.cashier.clone();
            attempts.spawn(async move {
                app.patch(
                    &format!("/transactions/{id}/processed"),
                    &cashier,
                    json!({ "processed": true }),
                )
                .await
                .0
            });
        }

        let mut statuses = Vec::new();
        while let Some(status) = attempts.join_next().await {
            statuses.push(status.unwrap());
        }
        let ok = statuses.iter().filter(|s| **s == StatusCode::OK).count();
        let rejected = statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count();
        assert_eq!((ok, rejected), (1, 2), "{statuses:?}");
    }

    assert_eq!(app.points(&c.alice).await, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_suspicious_flags_reverse_once() {
    let app = Arc::new(spawn_app().await);
    let c = cast(&app).await;
    let row = purchase(&app, &c.cashier, "alice001", 10.0).await;
    let id = row["id"].as_i64().unwrap();
    purchase(&app, &c.cashier, "alice001", 5.0).await;
    assert_eq!(app.points(&c.alice).await, 60);

    let mut flags = JoinSet::new();
    for _ in 0..4 {
        let app = app.clone();
        let manager = c.manager.clone();
        flags.spawn(async move {
            app.patch(
                &format!("/transactions/{id}/suspicious"),
                &manager,
                json!({ "suspicious": true }),
            )
            .await
            .0
        });
    }
    while let Some(status) = flags.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    assert_eq!(app.points(&c.alice).await, 20);
}

#[tokio::test]
async fn test_redemption_fails_if_balance_drops_before_processing() {
    let app = spawn_app().await;
    let c = cast(&app).await;
    purchase(&app, &c.cashier, "alice001", 10.0).await;

    let (_, body) = app
        .post(
            "/users/me/transactions",
            &c.alice,
            json!({ "type": "redemption", "amount": 40 }),
        )
        .await;
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .post(
            &format!("/users/{}/transactions", c.bob_id),
            &c.alice,
            json!({ "type": "transfer", "amount": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .patch(
            &format!("/transactions/{id}/processed"),
            &c.cashier,
            json!({ "processed": true }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.points(&c.alice).await, 30);
}

#[tokio::test]
async fn test_suspicious_flag_reverses_and_restores_points() {
    let app = spawn_app().await;
    let c = cast(&app).await;
    let row = purchase(&app, &c.cashier, "alice001", 5.0).await;
    let id = row["id"].as_i64().unwrap();

    let (status, _) = app
        .patch(
            &format!("/transactions/{id}/suspicious"),
            &c.cashier,
            json!({ "suspicious": true }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(
            &format!("/transactions/{id}/suspicious"),
            &c.manager,
            json!({ "suspicious": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["suspicious"], true);
    assert_eq!(app.points(&c.alice).await, 0);

    // Repeating the same flag changes nothing.
    app.patch(
        &format!("/transactions/{id}/suspicious"),
        &c.manager,
        json!({ "suspicious": true }),
    )
    .await;
    assert_eq!(app.points(&c.alice).await, 0);

    app.patch(
        &format!("/transactions/{id}/suspicious"),
        &c.manager,
        json!({ "suspicious": false }),
    )
    .await;
    assert_eq!(app.points(&c.alice).await, 20);
}

#[tokio::test]
async fn test_suspicious_cashier_purchases_are_withheld() {
    let app = spawn_app().await;
    let c = cast(&app).await;

    let (_, me) = app.get("/users/me", &c.cashier).await;
    let cashier_id = me["data"]["id"].as_i64().unwrap();
    let (status, _) = app
        .patch(
            &format!("/users/{cashier_id}"),
            &c.manager,
            json!({ "suspicious": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let row = purchase(&app, &c.cashier, "alice001", 10.0).await;
    assert_eq!(row["suspicious"], true);
    assert_eq!(app.points(&c.alice).await, 0);

    // Clearing the flag releases the points.
    let id = row["id"].as_i64().unwrap();
    app.patch(
        &format!("/transactions/{id}/suspicious"),
        &c.manager,
        json!({ "suspicious": false }),
    )
    .await;
    assert_eq!(app.points(&c.alice).await, 40);
}

#[tokio::test]
async fn test_adjustments_require_manager_and_related_row() {
    let app = spawn_app().await;
    let c = cast(&app).await;
    let row = purchase(&app, &c.cashier, "alice001", 10.0).await;
    let related = row["id"].as_i64().unwrap();

    let body = json!({
        "type": "adjustment",
        "utorid": "alice001",
        "amount": -15,
        "relatedId": related,
        "remark": "refund",
    });

    let (status, _) = app.post("/transactions", &c.cashier, body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.post("/transactions", &c.manager, body).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["data"]["relatedId"], related);
    assert_eq!(app.points(&c.alice).await, 25);

    let (status, _) = app
        .post(
            "/transactions",
            &c.manager,
            json!({ "type": "adjustment", "utorid": "alice001", "amount": 5, "relatedId": 9999 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_listing_filters_and_validation() {
    let app = spawn_app().await;
    let c = cast(&app).await;
    purchase(&app, &c.cashier, "alice001", 10.0).await;
    purchase(&app, &c.cashier, "alice001", 50.0).await;
    purchase(&app, &c.cashier, "bobsmith", 2.0).await;

    let (status, _) = app.get("/transactions", &c.cashier).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/transactions", &c.manager).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 3);

    let (_, body) = app.get("/transactions?name=alice001", &c.manager).await;
    assert_eq!(body["data"]["count"], 2);

    let (_, body) = app
        .get("/transactions?amount=100&operator=gte", &c.manager)
        .await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["results"][0]["amount"], 200);

    let (_, body) = app
        .get("/transactions?createdBy=cashier1&limit=2&page=2", &c.manager)
        .await;
    assert_eq!(body["data"]["count"], 3);
    assert_eq!(body["data"]["results"].as_array().unwrap().len(), 1);

    let (status, _) = app.get("/transactions?amount=100", &c.manager).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/transactions?after=yesterday", &c.manager).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get("/users/me/transactions", &c.bob).await;
    assert_eq!(body["data"]["count"], 1);
}

#[tokio::test]
async fn test_cashier_and_manager_stats() {
    let app = spawn_app().await;
    let c = cast(&app).await;
    purchase(&app, &c.cashier, "alice001", 10.0).await;
    purchase(&app, &c.cashier, "bobsmith", 5.0).await;

    let (status, body) = app.get("/transactions/cashier-stats", &c.cashier).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["purchases"], 2);
    assert_eq!(body["data"]["pointsIssued"], 60);

    let (status, _) = app
        .get("/transactions/cashier-stats?cashierId=1", &c.cashier)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/manager/stats", &c.cashier).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/manager/stats", &c.admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outstandingPoints"], 60);
}
