use axum::http::HeaderMap;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use prometheus::Gauge;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

use crate::clock::{Clock, SystemClock};
use crate::metrics::RATE_LIMIT_ENTRIES;

// Rate limit entry - one fixed window per identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

// Max requests admitted per window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub const fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_in: Duration,
}

impl RateLimitDecision {
    fn admitted(policy: RateLimitPolicy, count: u32, reset_in: Duration) -> Self {
        Self {
            allowed: true,
            limit: policy.limit,
            remaining: policy.limit.saturating_sub(count),
            reset_in,
        }
    }

    fn denied(policy: RateLimitPolicy, reset_in: Duration) -> Self {
        Self {
            allowed: false,
            limit: policy.limit,
            remaining: 0,
            reset_in,
        }
    }
}

// Window storage. `update` runs `apply` under the identifier's lock, `None` leaves the entry as is
pub trait RateLimitStore: Send + Sync {
    fn update(
        &self,
        identifier: &str,
        apply: &mut dyn FnMut(Option<&RateLimitEntry>) -> Option<RateLimitEntry>,
    );

    // returns how many were dropped
    fn retain(&self, keep: &mut dyn FnMut(&RateLimitEntry) -> bool) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// In-process store, shard locks of the DashMap guard each identifier
#[derive(Default)]
pub struct MemoryRateLimitStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn get(&self, identifier: &str) -> Option<RateLimitEntry> {
        self.entries.get(identifier).map(|entry| *entry)
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    fn update(
        &self,
        identifier: &str,
        apply: &mut dyn FnMut(Option<&RateLimitEntry>) -> Option<RateLimitEntry>,
    ) {
        match self.entries.entry(identifier.to_owned()) {
            Entry::Occupied(mut slot) => {
                if let Some(next) = apply(Some(slot.get())) {
                    slot.insert(next);
                }
            }
            Entry::Vacant(slot) => {
                if let Some(next) = apply(None) {
                    slot.insert(next);
                }
            }
        }
    }

    fn retain(&self, keep: &mut dyn FnMut(&RateLimitEntry) -> bool) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let live = keep(entry);
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// Fixed-window limiter, identifiers look like "daily:203.0.113.7"
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    tracked_gauge: Gauge,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            tracked_gauge: RATE_LIMIT_ENTRIES.clone(),
        }
    }

    #[cfg(test)]
    pub fn with_gauge(mut self, gauge: Gauge) -> Self {
        self.tracked_gauge = gauge;
        self
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRateLimitStore::new()), Arc::new(SystemClock))
    }

    // The request reaching `policy.limit` is the last one admitted, rejections leave the entry alone
    pub fn check(&self, identifier: &str, policy: RateLimitPolicy) -> RateLimitDecision {
        if policy.limit == 0 {
            return RateLimitDecision::denied(policy, policy.window);
        }

        let now = self.clock.now();
        let window = TimeDelta::from_std(policy.window).unwrap_or(TimeDelta::MAX);
        let mut decision = RateLimitDecision::denied(policy, Duration::ZERO);
        let mut opened = false;

        self.store
            .update(identifier, &mut |current: Option<&RateLimitEntry>| match current {
                Some(entry) if now <= entry.reset_at => {
                    let reset_in = time_until(entry.reset_at, now);
                    if entry.count >= policy.limit {
                        decision = RateLimitDecision::denied(policy, reset_in);
                        None
                    } else {
                        let count = entry.count + 1;
                        decision = RateLimitDecision::admitted(policy, count, reset_in);
                        Some(RateLimitEntry {
                            count,
                            reset_at: entry.reset_at,
                        })
                    }
                }
                // no entry yet, or the old window is over
                _ => {
                    opened = current.is_none();
                    decision = RateLimitDecision::admitted(policy, 1, policy.window);
                    Some(RateLimitEntry {
                        count: 1,
                        reset_at: now
                            .checked_add_signed(window)
                            .unwrap_or(DateTime::<Utc>::MAX_UTC),
                    })
                }
            });

        if opened {
            self.tracked_gauge.set(self.store.len() as f64);
        }
        if !decision.allowed {
            tracing::debug!(identifier, reset_in_ms = decision.reset_in.as_millis() as u64, "rate limited");
        }
        decision
    }

    // Drops windows that have ended
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let removed = self.store.retain(&mut |entry| now <= entry.reset_at);
        self.tracked_gauge.set(self.store.len() as f64);
        removed
    }

    pub fn tracked(&self) -> usize {
        self.store.len()
    }
}

fn time_until(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (reset_at - now).to_std().unwrap_or_default()
}

// Sweeper - runs forever, independent of request traffic
pub async fn sweeper(limiter: RateLimiter, every: Duration) {
    let every = every.max(Duration::from_millis(1));
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval = ?every, "rate limit sweeper started");

    loop {
        ticker.tick().await;
        let removed = limiter.sweep();
        if removed > 0 {
            tracing::debug!(removed, tracked = limiter.tracked(), "swept expired rate limit windows");
        }
    }
}

// Client identifier from proxy headers, first hop of X-Forwarded-For wins
pub fn client_id(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|hop| !hop.is_empty()) {
            return first.to_string();
        }
    }

    header("x-real-ip").unwrap_or("unknown").to_string()
}
