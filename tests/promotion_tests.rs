mod common;

use axum::http::StatusCode;
use campus_loyalty::db::NewPromotion;
use campus_loyalty::entities::sea_orm_active_enums::PromotionKind;
use chrono::{Duration, Utc};
use common::spawn_app;
use serde_json::json;

#[tokio::test]
async fn test_create_validates_window_and_role() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, regular) = app.create_user(&admin, "regular1", "regular").await;
    let start = Utc::now() + Duration::days(1);

    let valid = json!({
        "name": "Spring Sale",
        "description": "Bonus on every purchase",
        "type": "automatic",
        "startTime": start.to_rfc3339(),
        "endTime": (start + Duration::days(7)).to_rfc3339(),
        "minSpending": 10.0,
        "points": 20,
    });

    let (status, _) = app.post("/promotions", &regular, valid.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post("/promotions", &admin, valid).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["type"], "automatic");

    let (status, _) = app
        .post(
            "/promotions",
            &admin,
            json!({
                "name": "Backwards",
                "description": "x",
                "type": "one-time",
                "startTime": start.to_rfc3339(),
                "endTime": (start - Duration::hours(1)).to_rfc3339(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/promotions",
            &admin,
            json!({
                "name": "Negative",
                "description": "x",
                "type": "onetime",
                "startTime": start.to_rfc3339(),
                "endTime": (start + Duration::days(1)).to_rfc3339(),
                "points": -5,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_started_promotions_are_frozen() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, regular) = app.create_user(&admin, "regular1", "regular").await;
    let now = Utc::now();

    let running = app
        .shared
        .store
        .promotions()
        .create(NewPromotion {
            name: "Running".to_string(),
            description: "Already started".to_string(),
            kind: PromotionKind::Automatic,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::days(1),
            min_spending: None,
            rate: None,
            points: Some(5),
        })
        .await
        .unwrap();
    let future = app
        .shared
        .store
        .promotions()
        .create(NewPromotion {
            name: "Upcoming".to_string(),
            description: "Not started".to_string(),
            kind: PromotionKind::Onetime,
            start_time: now + Duration::days(2),
            end_time: now + Duration::days(3),
            min_spending: None,
            rate: None,
            points: Some(50),
        })
        .await
        .unwrap();

    let (status, _) = app
        .patch(
            &format!("/promotions/{}", running.id),
            &admin,
            json!({ "points": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let new_end = now + Duration::days(5);
    let (status, body) = app
        .patch(
            &format!("/promotions/{}", running.id),
            &admin,
            json!({ "endTime": new_end.to_rfc3339() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app
        .delete(&format!("/promotions/{}", running.id), &admin)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Regular users only see what is active right now.
    let (status, _) = app
        .get(&format!("/promotions/{}", future.id), &regular)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.get("/promotions", &regular).await;
    assert_eq!(body["data"]["count"], 1);

    let (_, body) = app.get("/promotions?type=onetime", &admin).await;
    assert_eq!(body["data"]["count"], 1);

    let (status, _) = app
        .delete(&format!("/promotions/{}", future.id), &admin)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
