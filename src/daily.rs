// One verse per user per calendar day. The first lookup of a day picks and
// stores it, every later lookup returns the stored row untouched.

use chrono::TimeDelta;
use chrono_tz::Tz;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{MissedTickBehavior, interval};

use crate::calendar;
use crate::catalog::{self, VerseRef};
use crate::clock::{Clock, SystemClock};
use crate::metrics::{DAILY_CACHE_HITS, DAILY_CACHE_MISSES};
use crate::models::{DailySelection, DailyVerse};
use crate::sources::{ContentSource, HistorySource, SelectionStore, SourceError, bounded};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DailyError {
    #[error("invalid timezone {0:?}")]
    InvalidTimezone(String),
    #[error("content for {verse} unavailable: {reason}")]
    ContentUnavailable { verse: VerseRef, reason: SourceError },
    #[error("history unavailable: {0}")]
    HistoryUnavailable(SourceError),
    #[error("no candidates to choose from")]
    NoCandidates,
}

pub struct DailySelectionCache {
    content: Arc<dyn ContentSource>,
    history: Arc<dyn HistorySource>,
    store: Arc<dyn SelectionStore>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    candidates: Vec<VerseRef>,
    fallback_tz: Tz,
    timeout: Duration,
}

impl DailySelectionCache {
    pub fn new(
        content: Arc<dyn ContentSource>,
        history: Arc<dyn HistorySource>,
        store: Arc<dyn SelectionStore>,
    ) -> Self {
        Self {
            content,
            history,
            store,
            clock: Arc::new(SystemClock),
            rng: Mutex::new(StdRng::from_entropy()),
            candidates: catalog::all_verses(),
            fallback_tz: Tz::UTC,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    #[cfg(test)]
    pub fn with_candidates(mut self, candidates: Vec<VerseRef>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_fallback_timezone(mut self, tz: Tz) -> Self {
        self.fallback_tz = tz;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    // Today's verse for the user, `cached` tells whether it was stored before this call
    pub async fn get_or_create(
        &self,
        user_id: &str,
        timezone: Option<&str>,
    ) -> Result<DailyVerse, DailyError> {
        let (today, tz) = calendar::today_in(timezone, self.fallback_tz, self.clock.now())?;

        match bounded(self.timeout, self.store.get(user_id, today)).await {
            Ok(Some(selection)) => {
                DAILY_CACHE_HITS.inc();
                tracing::debug!(user_id, date = %today, verse = %selection.verse_ref(), "daily verse cache hit");
                return Ok(DailyVerse::new(selection, true));
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(user_id, date = %today, error = %err, "daily verse lookup failed, selecting afresh");
            }
        }
        DAILY_CACHE_MISSES.inc();

        let seen = match self.load_seen(user_id).await {
            Ok(seen) => seen,
            Err(err) => {
                tracing::warn!(user_id, error = %err, "selecting without history");
                HashSet::new()
            }
        };

        let verse = self.pick(&seen).ok_or(DailyError::NoCandidates)?;

        let content = bounded(self.timeout, self.content.fetch(verse))
            .await
            .map_err(|reason| DailyError::ContentUnavailable { verse, reason })?;

        let selection = DailySelection::from_content(user_id, today, content);
        let stored = match bounded(self.timeout, self.store.insert(&selection)).await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(user_id, date = %today, error = %err, "failed to persist daily verse");
                return Ok(DailyVerse::new(selection, false));
            }
        };

        // a row written before ours wins, ours is discarded
        if stored != selection {
            tracing::info!(user_id, date = %today, verse = %stored.verse_ref(), "daily verse already stored");
            return Ok(DailyVerse::new(stored, true));
        }

        tracing::info!(
            user_id,
            date = %today,
            timezone = tz.name(),
            verse = %verse,
            seen = seen.len(),
            "selected daily verse"
        );
        Ok(DailyVerse::new(stored, false))
    }

    // Drops stored days older than yesterday in every zone (UTC-12 is the furthest behind)
    pub fn prune(&self) -> usize {
        let cutoff = (self.clock.now() - TimeDelta::hours(36)).date_naive();
        self.store.prune(cutoff)
    }

    async fn load_seen(&self, user_id: &str) -> Result<HashSet<VerseRef>, DailyError> {
        bounded(self.timeout, self.history.seen(user_id))
            .await
            .map_err(DailyError::HistoryUnavailable)
    }

    // Uniform over unseen candidates, or over all of them once none are left
    fn pick(&self, seen: &HashSet<VerseRef>) -> Option<VerseRef> {
        let unseen: Vec<VerseRef> = self
            .candidates
            .iter()
            .filter(|verse| !seen.contains(verse))
            .copied()
            .collect();
        let pool = if unseen.is_empty() {
            &self.candidates
        } else {
            &unseen
        };

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        pool.choose(&mut *rng).copied()
    }
}

// Pruner - keeps the in-memory selection store to the last couple of days
pub async fn pruner(cache: Arc<DailySelectionCache>, every: Duration) {
    let mut ticker = interval(every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let removed = cache.prune();
        if removed > 0 {
            tracing::debug!(removed, "pruned old daily selections");
        }
    }
}
