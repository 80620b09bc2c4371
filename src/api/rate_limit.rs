//! Per-client cooldown for password reset requests.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{ApiError, AppState};

const SWEEP_THRESHOLD: usize = 1024;

#[derive(Clone)]
pub struct ResetRateLimiter {
    /// client IP -> time of last accepted request
    inner: Arc<Mutex<HashMap<String, Instant>>>,
    cooldown: Duration,
}

impl ResetRateLimiter {
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            cooldown,
        }
    }

    /// Records the attempt if allowed. Otherwise returns the time left
    /// until the client may try again.
    pub async fn check(&self, client: &str) -> Result<(), Duration> {
        let mut map = self.inner.lock().await;
        let now = Instant::now();

        if map.len() > SWEEP_THRESHOLD {
            map.retain(|_, last| now.duration_since(*last) < self.cooldown);
        }

        if let Some(last) = map.get(client) {
            let elapsed = now.duration_since(*last);
            if elapsed < self.cooldown {
                return Err(self.cooldown - elapsed);
            }
        }

        map.insert(client.to_owned(), now);
        Ok(())
    }
}

/// Client address: the first `X-Forwarded-For` entry when proxies are
/// trusted, else the peer address.
pub fn client_ip(request: &Request, trust_forwarded: bool) -> String {
    if trust_forwarded
        && let Some(forwarded) = request.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
    {
        let ip = first.trim();
        if !ip.is_empty() {
            return ip.to_owned();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_owned(), |ci| ci.0.ip().to_string())
}

pub async fn reset_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(&request, state.config().server.trust_forwarded_headers);

    if let Err(remaining) = state.reset_limiter.check(&ip).await {
        tracing::warn!(client = %ip, "Password reset rate limited");
        return Err(ApiError::TooManyRequests(format!(
            "Too many reset requests, try again in {} seconds",
            remaining.as_secs().max(1)
        )));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_request_within_cooldown_is_rejected() {
        let limiter = ResetRateLimiter::new(Duration::from_secs(60));

        assert!(limiter.check("10.0.0.1").await.is_ok());
        let remaining = limiter.check("10.0.0.1").await.unwrap_err();
        assert!(remaining <= Duration::from_secs(60));

        assert!(limiter.check("10.0.0.2").await.is_ok());
    }

    #[tokio::test]
    async fn test_zero_cooldown_never_limits() {
        let limiter = ResetRateLimiter::new(Duration::ZERO);
        assert!(limiter.check("10.0.0.1").await.is_ok());
        assert!(limiter.check("10.0.0.1").await.is_ok());
    }

    #[test]
    fn test_client_ip_ignores_forwarded_header_unless_trusted() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(axum::body::Body::empty())
            .unwrap();

        assert_eq!(client_ip(&request, true), "203.0.113.9");
        assert_eq!(client_ip(&request, false), "unknown");
    }
}
