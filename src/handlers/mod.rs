mod daily;
mod health;
mod history;
mod metrics;
mod verse;

pub use daily::daily_handler;
pub use health::health_handler;
pub use history::{clear_history_handler, history_handler};
pub use metrics::metrics_handler;
pub use verse::verse_handler;

use axum::{
    Router,
    http::{HeaderMap, HeaderName, HeaderValue},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::metrics::{RATE_LIMITED_TOTAL, REQUEST_TOTAL};
use crate::rate_limit::{RateLimitDecision, RateLimitPolicy, client_id};
use crate::state::AppState;

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_USER_ID: &str = "x-user-id";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/verse", post(verse_handler))
        .route("/api/daily", get(daily_handler))
        .route("/api/history", get(history_handler).delete(clear_history_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn rate_headers(decision: &RateLimitDecision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers
}

// Counts the request against "<route>:<client>" and rejects it once over the limit
fn admit(
    state: &AppState,
    route: &'static str,
    policy: RateLimitPolicy,
    headers: &HeaderMap,
) -> Result<RateLimitDecision, AppError> {
    REQUEST_TOTAL.with_label_values(&[route]).inc();

    let identifier = format!("{route}:{}", client_id(headers));
    let decision = state.limiter.check(&identifier, policy);
    if decision.allowed {
        Ok(decision)
    } else {
        RATE_LIMITED_TOTAL.with_label_values(&[route]).inc();
        Err(AppError::RateLimited(decision))
    }
}

// Identity set by the auth layer in front of the gateway
fn user_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(X_USER_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
}
