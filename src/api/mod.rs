use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, patch, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::state::SharedState;

pub mod auth;
mod error;
mod events;
mod manager;
mod observability;
mod promotions;
pub mod rate_limit;
mod system;
mod transactions;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use rate_limit::ResetRateLimiter;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub reset_limiter: ResetRateLimiter,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    let cooldown = Duration::from_secs(shared.config.auth.reset_cooldown_seconds);

    Arc::new(AppState {
        shared,
        reset_limiter: ResetRateLimiter::new(cooldown),
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let protected_routes = create_protected_router(state.clone());

    let reset_routes = Router::new()
        .route("/auth/resets", post(auth::request_reset))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::reset_rate_limit,
        ));

    let api_router = Router::new()
        .merge(protected_routes)
        .merge(reset_routes)
        .route("/auth/signup", post(auth::signup))
        .route("/auth/verify/{token}", post(auth::verify_email))
        .route("/auth/tokens", post(auth::login))
        .route("/auth/google", post(auth::google_login))
        .route("/auth/resets/{token}", post(auth::complete_reset))
        .route("/health", get(system::health))
        .with_state(state);

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    api_router
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(users::register).get(users::list_users))
        .route("/users/me", get(users::get_me).patch(users::update_me))
        .route("/users/me/password", patch(users::change_password))
        .route(
            "/users/me/transactions",
            post(transactions::create_redemption).get(transactions::list_my_transactions),
        )
        .route("/users/{id}", get(users::get_user).patch(users::update_user))
        .route("/users/{id}/transactions", post(transactions::transfer))
        .route(
            "/transactions",
            post(transactions::create_transaction).get(transactions::list_transactions),
        )
        .route(
            "/transactions/cashier-stats",
            get(transactions::cashier_stats),
        )
        .route("/transactions/{id}", get(transactions::get_transaction))
        .route(
            "/transactions/{id}/suspicious",
            patch(transactions::set_suspicious),
        )
        .route(
            "/transactions/{id}/processed",
            patch(transactions::process_redemption),
        )
        .route("/events", post(events::create_event).get(events::list_events))
        .route(
            "/events/{id}",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/{id}/organizers", post(events::add_organizer))
        .route(
            "/events/{id}/organizers/{user_id}",
            delete(events::remove_organizer),
        )
        .route("/events/{id}/guests", post(events::add_guest))
        .route(
            "/events/{id}/guests/me",
            post(events::rsvp).delete(events::cancel_rsvp),
        )
        .route(
            "/events/{id}/guests/{user_id}",
            delete(events::remove_guest),
        )
        .route("/events/{id}/transactions", post(events::award_points))
        .route(
            "/promotions",
            post(promotions::create_promotion).get(promotions::list_promotions),
        )
        .route(
            "/promotions/{id}",
            get(promotions::get_promotion)
                .patch(promotions::update_promotion)
                .delete(promotions::delete_promotion),
        )
        .route("/manager/stats", get(manager::get_stats))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
