use axum::{Json, extract::State, http::HeaderMap};
use std::sync::Arc;
use std::time::Instant;

use super::{admit, rate_headers, user_id};
use crate::error::AppError;
use crate::metrics::REQUEST_LATENCY;
use crate::models::HistoryEntry;
use crate::sources::{SourceError, bounded};
use crate::state::AppState;

fn history_error(action: &'static str, err: SourceError) -> AppError {
    match err {
        SourceError::Timeout(_) => AppError::Timeout,
        other => AppError::Upstream(format!("{action}: {other}")),
    }
}

// GET /api/history - the caller's lookups, newest first
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<Vec<HistoryEntry>>), AppError> {
    let decision = admit(&state, "history", state.policies.history, &headers)?;
    let start_time = Instant::now();

    let user = user_id(&headers).ok_or(AppError::Unauthorized)?;
    let entries = bounded(state.upstream_timeout, state.history.list(user))
        .await
        .map_err(|err| history_error("listing history", err))?;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    Ok((rate_headers(&decision), Json(entries)))
}

// DELETE /api/history - forgets every lookup, daily selection starts over from the full pool
pub async fn clear_history_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<serde_json::Value>), AppError> {
    let decision = admit(&state, "history-delete", state.policies.history_delete, &headers)?;

    let user = user_id(&headers).ok_or(AppError::Unauthorized)?;
    bounded(state.upstream_timeout, state.history.clear(user))
        .await
        .map_err(|err| history_error("clearing history", err))?;

    tracing::info!(user_id = user, "history cleared");
    Ok((rate_headers(&decision), Json(serde_json::json!({ "success": true }))))
}
