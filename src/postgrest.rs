// daily_verse and query_history tables behind a PostgREST endpoint

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;

use crate::catalog::VerseRef;
use crate::models::{DailySelection, HistoryEntry};
use crate::sources::{HistorySource, SelectionStore, SourceError};

pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

// One query_history row, chapter/verse can be null for unmatched queries
#[derive(Deserialize)]
struct HistoryRow {
    chapter: Option<u16>,
    verse: Option<u16>,
}

impl PostgrestStore {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn table(&self, name: &str, params: &[(&str, &str)]) -> Result<Url, SourceError> {
        let mut url = Url::parse(&format!("{}/rest/v1/{name}", self.base_url))
            .map_err(|e| SourceError::Transport(format!("bad PostgREST url: {e}")))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, SourceError> {
        let res = self.authorized(self.client.get(url)).send().await?;
        if !res.status().is_success() {
            return Err(SourceError::Upstream(res.status()));
        }
        Ok(res.json::<Vec<T>>().await?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, SourceError> {
        let res = self.authorized(request).send().await?;
        if !res.status().is_success() {
            return Err(SourceError::Upstream(res.status()));
        }
        Ok(res)
    }
}

#[async_trait]
impl HistorySource for PostgrestStore {
    async fn seen(&self, user_id: &str) -> Result<HashSet<VerseRef>, SourceError> {
        let user = format!("eq.{user_id}");
        let url = self.table(
            "query_history",
            &[("select", "chapter,verse"), ("user_id", user.as_str())],
        )?;

        let rows: Vec<HistoryRow> = self.rows(url).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| Some(VerseRef::new(row.chapter?, row.verse?)))
            .collect())
    }

    async fn record(&self, user_id: &str, verse: VerseRef) -> Result<(), SourceError> {
        let url = self.table("query_history", &[])?;
        let row = serde_json::json!({
            "user_id": user_id,
            "query": format!("verse {verse}"),
            "chapter": verse.chapter,
            "verse": verse.verse,
        });
        self.send(
            self.client
                .post(url)
                .header("Prefer", "return=minimal")
                .json(&row),
        )
        .await?;
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<HistoryEntry>, SourceError> {
        let user = format!("eq.{user_id}");
        let url = self.table(
            "query_history",
            &[
                ("select", "*"),
                ("user_id", user.as_str()),
                ("order", "created_at.desc"),
            ],
        )?;
        self.rows(url).await
    }

    async fn clear(&self, user_id: &str) -> Result<(), SourceError> {
        let user = format!("eq.{user_id}");
        let url = self.table("query_history", &[("user_id", user.as_str())])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}

#[async_trait]
impl SelectionStore for PostgrestStore {
    async fn get(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailySelection>, SourceError> {
        let user = format!("eq.{user_id}");
        let day = format!("eq.{}", date.format("%Y-%m-%d"));
        let url = self.table(
            "daily_verse",
            &[
                ("select", "*"),
                ("user_id", user.as_str()),
                ("date", day.as_str()),
                ("limit", "1"),
            ],
        )?;

        let rows: Vec<DailySelection> = self.rows(url).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, selection: &DailySelection) -> Result<DailySelection, SourceError> {
        let url = self.table("daily_verse", &[("on_conflict", "user_id,date")])?;
        let res = self
            .send(
                self.client
                    .post(url)
                    .header("Prefer", "resolution=ignore-duplicates,return=representation")
                    .json(selection),
            )
            .await?;

        let inserted: Vec<DailySelection> = res.json().await?;
        if let Some(row) = inserted.into_iter().next() {
            return Ok(row);
        }

        // conflict ignored, the row already there is the one that counts
        self.get(&selection.user_id, selection.date)
            .await?
            .ok_or_else(|| SourceError::Decode("daily verse missing after conflicting insert".into()))
    }
}
