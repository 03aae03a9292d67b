use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use std::sync::Arc;
use std::time::Instant;

use super::{admit, rate_headers, user_id};
use crate::catalog::VerseRef;
use crate::error::AppError;
use crate::metrics::{REQUEST_LATENCY, UPSTREAM_ERRORS};
use crate::models::{Envelope, VerseContent, VerseRequest};
use crate::sources::{SourceError, bounded};
use crate::state::AppState;

// POST /api/verse - proxies one verse lookup to the content backend
pub async fn verse_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<VerseRequest>, JsonRejection>,
) -> Result<(HeaderMap, Json<Envelope<VerseContent>>), AppError> {
    let decision = admit(&state, "verse", state.policies.verse, &headers)?;
    let start_time = Instant::now();

    let Json(request) = payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    let verse = VerseRef::new(request.chapter, request.verse);
    if !verse.is_valid() {
        return Err(AppError::Validation("Invalid chapter or verse".to_string()));
    }

    let content = bounded(state.upstream_timeout, state.content.fetch(verse))
        .await
        .inspect_err(|err| {
            if *err != SourceError::NotFound {
                UPSTREAM_ERRORS.inc();
                tracing::warn!(%verse, error = %err, "verse lookup failed");
            }
        })?;

    // signed-in lookups count as seen for daily selection
    if let Some(user) = user_id(&headers) {
        if let Err(err) = bounded(state.upstream_timeout, state.history.record(user, verse)).await {
            tracing::warn!(user_id = user, %verse, error = %err, "failed to record verse in history");
        }
    }

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    Ok((rate_headers(&decision), Json(Envelope::success(content))))
}
