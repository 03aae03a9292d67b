use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::daily::DailyError;
use crate::handlers::rate_headers;
use crate::rate_limit::RateLimitDecision;
use crate::sources::SourceError;

pub enum AppError {
    /// Rejected by the rate limiter, carries the decision for headers
    RateLimited(RateLimitDecision),
    /// No user identity on a route that needs one
    Unauthorized,
    /// Bad input - message is safe to show
    Validation(String),
    NotFound(&'static str),
    /// Upstream did not answer in time
    Timeout,
    /// Upstream failed - logged, generic 502 to the user
    Upstream(String),
    /// Internal errors - logged, generic 500 to the user
    Internal(String),
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::RateLimited(decision) => {
                let mut response = error_body(StatusCode::TOO_MANY_REQUESTS, "Too many requests");
                let headers = response.headers_mut();
                headers.extend(rate_headers(&decision));
                let reset_in = decision.reset_in;
                let retry_after = (reset_in.as_secs() + u64::from(reset_in.subsec_nanos() > 0)).max(1);
                headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                response
            }
            AppError::Unauthorized => error_body(StatusCode::UNAUTHORIZED, "Unauthorized"),
            AppError::Validation(msg) => error_body(StatusCode::BAD_REQUEST, &msg),
            AppError::NotFound(msg) => error_body(StatusCode::NOT_FOUND, msg),
            AppError::Timeout => error_body(StatusCode::GATEWAY_TIMEOUT, "Request timed out"),
            AppError::Upstream(detail) => {
                tracing::error!(%detail, "upstream error");
                error_body(StatusCode::BAD_GATEWAY, "Upstream service error")
            }
            AppError::Internal(detail) => {
                tracing::error!(%detail, "internal error");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound => AppError::NotFound("Verse not found"),
            SourceError::Timeout(_) => AppError::Timeout,
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<DailyError> for AppError {
    fn from(err: DailyError) -> Self {
        match err {
            DailyError::InvalidTimezone(_) => AppError::Validation(err.to_string()),
            DailyError::ContentUnavailable {
                reason: SourceError::Timeout(_),
                ..
            } => AppError::Timeout,
            DailyError::ContentUnavailable { .. } => AppError::Upstream(err.to_string()),
            DailyError::HistoryUnavailable(_) | DailyError::NoCandidates => {
                AppError::Internal(err.to_string())
            }
        }
    }
}
