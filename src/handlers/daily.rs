use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use super::{admit, rate_headers, user_id};
use crate::error::AppError;
use crate::metrics::REQUEST_LATENCY;
use crate::models::DailyVerse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    #[serde(default, alias = "timezone")]
    tz: Option<String>,
}

// GET /api/daily?tz=<IANA zone> - today's verse for the calling user
pub async fn daily_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DailyQuery>,
) -> Result<(HeaderMap, Json<DailyVerse>), AppError> {
    let decision = admit(&state, "daily", state.policies.daily, &headers)?;
    let start_time = Instant::now();

    let user = user_id(&headers).ok_or(AppError::Unauthorized)?;
    let verse = state.daily.get_or_create(user, query.tz.as_deref()).await?;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    Ok((rate_headers(&decision), Json(verse)))
}
