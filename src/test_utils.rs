// Fakes and builders shared by the unit tests

use async_trait::async_trait;
use axum::Router;
use axum::http::StatusCode;
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::MemorySelectionStore;
use crate::catalog::VerseRef;
use crate::clock::ManualClock;
use crate::config::Policies;
use crate::daily::DailySelectionCache;
use crate::models::{DailySelection, HistoryEntry, VerseContent};
use crate::rate_limit::{MemoryRateLimitStore, RateLimiter};
use crate::sources::{ContentSource, HistorySource, SelectionStore, SourceError};
use crate::state::AppState;

// Serves `app` on an ephemeral local port and returns its base url
pub async fn spawn_upstream(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn verse_content(verse: VerseRef) -> VerseContent {
    VerseContent {
        chapter: verse.chapter,
        verse: verse.verse,
        translation: format!("translation of {verse}"),
        summarized_commentary: format!("commentary on {verse}"),
        full_commentary: None,
    }
}

pub fn selection_for(user_id: &str, date: &str, verse: VerseRef) -> DailySelection {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    DailySelection::from_content(user_id, date, verse_content(verse))
}

#[derive(Clone, Copy)]
enum Behaviour {
    Serve,
    Fail,
    Hang,
}

async fn hang() {
    tokio::time::sleep(Duration::from_secs(3600)).await;
}

// Content source that answers every verse with generated text
pub struct FakeContent {
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl FakeContent {
    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn serving() -> Self {
        Self::new(Behaviour::Serve)
    }

    pub fn missing() -> Self {
        Self::new(Behaviour::Fail)
    }

    pub fn hanging() -> Self {
        Self::new(Behaviour::Hang)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for FakeContent {
    async fn fetch(&self, verse: VerseRef) -> Result<VerseContent, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Serve => Ok(verse_content(verse)),
            Behaviour::Fail => Err(SourceError::NotFound),
            Behaviour::Hang => {
                hang().await;
                Err(SourceError::NotFound)
            }
        }
    }
}

// History source with a fixed seen set that also collects records
pub struct FakeHistory {
    behaviour: Behaviour,
    log: Mutex<Vec<VerseRef>>,
    calls: AtomicUsize,
}

impl FakeHistory {
    fn new(behaviour: Behaviour, log: Vec<VerseRef>) -> Self {
        Self {
            behaviour,
            log: Mutex::new(log),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_seen(seen: impl IntoIterator<Item = VerseRef>) -> Self {
        Self::new(Behaviour::Serve, seen.into_iter().collect())
    }

    pub fn failing() -> Self {
        Self::new(Behaviour::Fail, Vec::new())
    }

    pub fn hanging() -> Self {
        Self::new(Behaviour::Hang, Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> HashSet<VerseRef> {
        self.log.lock().unwrap().iter().copied().collect()
    }

    fn unavailable() -> SourceError {
        SourceError::Transport("connection refused".into())
    }
}

#[async_trait]
impl HistorySource for FakeHistory {
    async fn seen(&self, _user_id: &str) -> Result<HashSet<VerseRef>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Serve => Ok(self.snapshot()),
            Behaviour::Fail => Err(Self::unavailable()),
            Behaviour::Hang => {
                hang().await;
                Ok(HashSet::new())
            }
        }
    }

    async fn record(&self, _user_id: &str, verse: VerseRef) -> Result<(), SourceError> {
        match self.behaviour {
            Behaviour::Serve => {
                self.log.lock().unwrap().push(verse);
                Ok(())
            }
            _ => Err(Self::unavailable()),
        }
    }

    async fn list(&self, _user_id: &str) -> Result<Vec<HistoryEntry>, SourceError> {
        match self.behaviour {
            Behaviour::Serve => Ok(self
                .log
                .lock()
                .unwrap()
                .iter()
                .rev()
                .map(|verse| HistoryEntry::for_verse(*verse, Utc::now()))
                .collect()),
            Behaviour::Fail => Err(Self::unavailable()),
            Behaviour::Hang => {
                hang().await;
                Ok(Vec::new())
            }
        }
    }

    async fn clear(&self, _user_id: &str) -> Result<(), SourceError> {
        match self.behaviour {
            Behaviour::Serve => {
                self.log.lock().unwrap().clear();
                Ok(())
            }
            _ => Err(Self::unavailable()),
        }
    }
}

// In-memory selection store whose lookups or writes can be made to fail
pub struct FakeSelections {
    inner: MemorySelectionStore,
    get: Behaviour,
    failing_gets: AtomicUsize,
    insert: Behaviour,
}

impl FakeSelections {
    fn new(get: Behaviour, failing_gets: usize, insert: Behaviour) -> Self {
        Self {
            inner: MemorySelectionStore::new(),
            get,
            failing_gets: AtomicUsize::new(failing_gets),
            insert,
        }
    }

    // the first `times` lookups fail, later ones are served
    pub fn failing_get(times: usize) -> Self {
        Self::new(Behaviour::Fail, times, Behaviour::Serve)
    }

    pub fn hanging_get() -> Self {
        Self::new(Behaviour::Hang, 0, Behaviour::Serve)
    }

    pub fn failing_insert() -> Self {
        Self::new(Behaviour::Serve, 0, Behaviour::Fail)
    }

    pub async fn seed(&self, selection: &DailySelection) {
        self.inner.insert(selection).await.unwrap();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl SelectionStore for FakeSelections {
    async fn get(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailySelection>, SourceError> {
        match self.get {
            Behaviour::Fail => {
                let failed = self
                    .failing_gets
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                    .is_ok();
                if failed {
                    return Err(SourceError::Transport("connection reset".into()));
                }
            }
            Behaviour::Hang => hang().await,
            Behaviour::Serve => {}
        }
        self.inner.get(user_id, date).await
    }

    async fn insert(&self, selection: &DailySelection) -> Result<DailySelection, SourceError> {
        match self.insert {
            Behaviour::Fail => Err(SourceError::Upstream(StatusCode::SERVICE_UNAVAILABLE)),
            _ => self.inner.insert(selection).await,
        }
    }
}

// Builder for `AppState` wired to fakes and a manual clock
pub struct TestStateBuilder {
    content: Arc<FakeContent>,
    history: Arc<FakeHistory>,
    clock: Arc<ManualClock>,
    policies: Policies,
    timeout: Duration,
}

impl TestStateBuilder {
    pub fn new() -> Self {
        Self {
            content: Arc::new(FakeContent::serving()),
            history: Arc::new(FakeHistory::with_seen([])),
            clock: Arc::new(ManualClock::at("2026-03-01T09:00:00Z")),
            policies: Policies::default(),
            timeout: Duration::from_millis(100),
        }
    }

    pub fn with_content(mut self, content: Arc<FakeContent>) -> Self {
        self.content = content;
        self
    }

    pub fn with_history(mut self, history: Arc<FakeHistory>) -> Self {
        self.history = history;
        self
    }

    pub fn with_policies(mut self, policies: Policies) -> Self {
        self.policies = policies;
        self
    }

    pub fn build(self) -> Arc<AppState> {
        let limiter = RateLimiter::new(Arc::new(MemoryRateLimitStore::new()), self.clock.clone());
        let daily = Arc::new(
            DailySelectionCache::new(
                self.content.clone(),
                self.history.clone(),
                Arc::new(MemorySelectionStore::new()),
            )
            .with_clock(self.clock)
            .with_seed(1)
            .with_timeout(self.timeout),
        );

        Arc::new(AppState {
            limiter,
            policies: self.policies,
            content: self.content,
            history: self.history,
            daily,
            upstream_timeout: self.timeout,
        })
    }
}
