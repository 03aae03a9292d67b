use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::VerseRef;

// Content backend verse format
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct VerseContent {
    pub chapter: u16,
    pub verse: u16,
    pub translation: String,
    pub summarized_commentary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_commentary: Option<String>,
}

impl VerseContent {
    pub fn verse_ref(&self) -> VerseRef {
        VerseRef::new(self.chapter, self.verse)
    }
}

// Body of POST /api/verse, both here and upstream
#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct VerseRequest {
    pub chapter: u16,
    pub verse: u16,
}

impl From<VerseRef> for VerseRequest {
    fn from(verse: VerseRef) -> Self {
        Self {
            chapter: verse.chapter,
            verse: verse.verse,
        }
    }
}

// { "status": "success", "data": ... } envelope used by the backend
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Envelope<T> {
    #[serde(default = "success")]
    pub status: String,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: success(),
            data,
        }
    }
}

fn success() -> String {
    "success".to_string()
}

// daily_verse row, frozen once written
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DailySelection {
    pub user_id: String,
    pub date: NaiveDate,
    pub chapter: u16,
    pub verse: u16,
    pub translation: String,
    pub summarized_commentary: String,
    #[serde(default)]
    pub matched_theme: Option<String>,
}

impl DailySelection {
    pub fn from_content(user_id: &str, date: NaiveDate, content: VerseContent) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
            chapter: content.chapter,
            verse: content.verse,
            translation: content.translation,
            summarized_commentary: content.summarized_commentary,
            matched_theme: None,
        }
    }

    pub fn verse_ref(&self) -> VerseRef {
        VerseRef::new(self.chapter, self.verse)
    }
}

// Response of GET /api/daily
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DailyVerse {
    pub chapter: u16,
    pub verse: u16,
    pub translation: String,
    pub summarized_commentary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_theme: Option<String>,
    pub date: NaiveDate,
    pub cached: bool,
}

impl DailyVerse {
    pub fn new(selection: DailySelection, cached: bool) -> Self {
        Self {
            chapter: selection.chapter,
            verse: selection.verse,
            translation: selection.translation,
            summarized_commentary: selection.summarized_commentary,
            matched_theme: selection.matched_theme,
            date: selection.date,
            cached,
        }
    }
}

// One query_history row as returned by GET /api/history
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub query: String,
    pub chapter: Option<u16>,
    pub verse: Option<u16>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn for_verse(verse: VerseRef, created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            query: format!("verse {verse}"),
            chapter: Some(verse.chapter),
            verse: Some(verse.verse),
            created_at,
        }
    }

    pub fn verse_ref(&self) -> Option<VerseRef> {
        Some(VerseRef::new(self.chapter?, self.verse?))
    }
}
