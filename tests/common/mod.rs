#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use campus_loyalty::api;
use campus_loyalty::clients::email::{EmailMessage, Mailer};
use campus_loyalty::clients::google::{GoogleAuthError, GoogleIdentity, IdTokenVerifier};
use campus_loyalty::config::Config;
use campus_loyalty::state::SharedState;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const ADMIN_UTORID: &str = "admin001";
pub const ADMIN_PASSWORD: &str = "Integr4tion!Admin";
pub const PASSWORD: &str = "Passw0rd!23";

/// Keeps every message so tests can read tokens out of links.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn last_to(&self, to: &str) -> Option<EmailMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.to == to)
            .cloned()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Accepts credentials of the form `valid:<sub>:<email>`.
pub struct StubGoogle;

#[async_trait]
impl IdTokenVerifier for StubGoogle {
    async fn verify(&self, credential: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        let mut parts = credential.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("valid"), Some(subject), Some(email)) => Ok(GoogleIdentity {
                subject: subject.to_string(),
                email: email.to_string(),
                name: Some("Google User".to_string()),
            }),
            _ => Err(GoogleAuthError::InvalidToken("bad credential".to_string())),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub shared: Arc<SharedState>,
    pub mailer: Arc<RecordingMailer>,
    db_path: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

pub fn test_config(db_path: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.general.database_url = format!("sqlite:{}", db_path.display());
    config.auth.jwt_secret = "integration-test-secret-integration-test".to_string();
    config.auth.google_client_id = "test-client".to_string();
    config.auth.argon2_memory_cost_kib = 1024;
    config.auth.argon2_time_cost = 1;
    config.observability.metrics_enabled = false;
    config.bootstrap.superuser_password = ADMIN_PASSWORD.to_string();
    config
}

pub async fn spawn_app() -> TestApp {
    let db_path =
        std::env::temp_dir().join(format!("campus-loyalty-test-{}.db", uuid::Uuid::new_v4()));
    let config = test_config(&db_path);

    let mailer = Arc::new(RecordingMailer::default());
    let shared = Arc::new(
        SharedState::with_clients(config, mailer.clone(), Arc::new(StubGoogle))
            .await
            .expect("Failed to create shared state"),
    );
    let router = api::router(api::create_app_state(shared.clone(), None));

    TestApp {
        router,
        shared,
        mailer,
        db_path,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send("PATCH", uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send("DELETE", uri, Some(token), None).await
    }

    pub async fn login(&self, utorid: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/auth/tokens",
                None,
                Some(json!({ "utorid": utorid, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed for {utorid}: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_UTORID, ADMIN_PASSWORD).await
    }

    /// Registers, activates and verifies an account with `role`.
    /// Returns `(user_id, token)`.
    pub async fn create_user(&self, admin: &str, utorid: &str, role: &str) -> (i64, String) {
        let (status, body) = self
            .post(
                "/users",
                admin,
                json!({
                    "utorid": utorid,
                    "name": format!("User {utorid}"),
                    "email": format!("{utorid}@mail.utoronto.ca"),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        let id = body["data"]["id"].as_i64().unwrap();
        let reset_token = body["data"]["resetToken"].as_str().unwrap().to_string();

        let (status, body) = self
            .send(
                "POST",
                &format!("/auth/resets/{reset_token}"),
                None,
                Some(json!({ "utorid": utorid, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "activation failed: {body}");

        let (status, body) = self
            .patch(
                &format!("/users/{id}"),
                admin,
                json!({ "verified": true, "role": role }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "promotion failed: {body}");

        (id, self.login(utorid, PASSWORD).await)
    }

    pub async fn points(&self, token: &str) -> i64 {
        let (status, body) = self.get("/users/me", token).await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["points"].as_i64().unwrap()
    }
}
