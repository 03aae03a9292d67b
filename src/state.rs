use std::sync::Arc;
use std::time::Duration;

use crate::config::Policies;
use crate::daily::DailySelectionCache;
use crate::rate_limit::RateLimiter;
use crate::sources::{ContentSource, HistorySource};

// app's shared state
pub struct AppState {
    pub limiter: RateLimiter,
    pub policies: Policies,
    pub content: Arc<dyn ContentSource>,
    pub history: Arc<dyn HistorySource>,
    pub daily: Arc<DailySelectionCache>,
    pub upstream_timeout: Duration, // bound on every upstream call made by handlers
}
