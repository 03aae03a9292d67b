// Upstream data the gateway depends on. Callers wrap every call in `bounded`,
// implementations carry no timeouts of their own.

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::catalog::VerseRef;
use crate::models::{DailySelection, Envelope, HistoryEntry, VerseContent, VerseRequest};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("not found")]
    NotFound,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream responded with {0}")]
    Upstream(StatusCode),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

// Runs `call` with a deadline, nothing is retried
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| SourceError::Timeout(limit))?
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, verse: VerseRef) -> Result<VerseContent, SourceError>;
}

#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn seen(&self, user_id: &str) -> Result<HashSet<VerseRef>, SourceError>;

    async fn record(&self, user_id: &str, verse: VerseRef) -> Result<(), SourceError>;

    // newest first
    async fn list(&self, user_id: &str) -> Result<Vec<HistoryEntry>, SourceError>;

    async fn clear(&self, user_id: &str) -> Result<(), SourceError>;
}

#[async_trait]
pub trait SelectionStore: Send + Sync {
    async fn get(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailySelection>, SourceError>;

    // Insert-if-absent on (user_id, date), returns the row that ends up stored
    async fn insert(&self, selection: &DailySelection) -> Result<DailySelection, SourceError>;

    // Drops rows dated before `cutoff`, returns how many. Durable stores keep everything.
    fn prune(&self, _cutoff: NaiveDate) -> usize {
        0
    }
}

// Content backend reached over HTTP (POST /api/verse)
pub struct BackendContentSource {
    client: reqwest::Client,
    base_url: String,
}

impl BackendContentSource {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ContentSource for BackendContentSource {
    async fn fetch(&self, verse: VerseRef) -> Result<VerseContent, SourceError> {
        let res = self
            .client
            .post(format!("{}/api/verse", self.base_url))
            .json(&VerseRequest::from(verse))
            .send()
            .await?;

        match res.status() {
            StatusCode::NOT_FOUND => return Err(SourceError::NotFound),
            status if !status.is_success() => return Err(SourceError::Upstream(status)),
            _ => {}
        }

        let body = res.json::<Envelope<VerseContent>>().await?;
        if body.data.verse_ref() != verse {
            return Err(SourceError::Decode(format!(
                "asked for {verse}, got {}",
                body.data.verse_ref()
            )));
        }
        Ok(body.data)
    }
}
