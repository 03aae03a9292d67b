use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: CounterVec = register_counter_vec!(
        "verse_gateway_requests_total",
        "Total number of requests",
        &["route"]
    )
    .unwrap();
    pub static ref RATE_LIMITED_TOTAL: CounterVec = register_counter_vec!(
        "verse_gateway_rate_limited_total",
        "Requests rejected by the rate limiter",
        &["route"]
    )
    .unwrap();
    pub static ref DAILY_CACHE_HITS: Counter =
        register_counter!("verse_gateway_daily_cache_hits_total", "Daily verse lookups answered from the store").unwrap();
    pub static ref DAILY_CACHE_MISSES: Counter =
        register_counter!("verse_gateway_daily_cache_misses_total", "Daily verse lookups that made a new selection").unwrap();
    pub static ref UPSTREAM_ERRORS: Counter =
        register_counter!("verse_gateway_upstream_errors_total", "Failed calls to the content backend").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "verse_gateway_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref RATE_LIMIT_ENTRIES: Gauge =
        register_gauge!("verse_gateway_rate_limit_entries", "Tracked rate limit windows, expired ones count until the next sweep").unwrap();
    pub static ref DAILY_SELECTIONS: Gauge =
        register_gauge!("verse_gateway_daily_selections", "Daily selections held in process memory").unwrap();
}
