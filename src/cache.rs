use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::VerseRef;
use crate::clock::{Clock, SystemClock};
use crate::metrics::DAILY_SELECTIONS;
use crate::models::{DailySelection, HistoryEntry};
use crate::sources::{HistorySource, SelectionStore, SourceError};

// Daily selections held in process, keyed by (user, date)
#[derive(Default)]
pub struct MemorySelectionStore {
    selections: DashMap<(String, NaiveDate), DailySelection>,
}

impl MemorySelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.selections.len()
    }
}

#[async_trait]
impl SelectionStore for MemorySelectionStore {
    async fn get(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailySelection>, SourceError> {
        Ok(self
            .selections
            .get(&(user_id.to_string(), date))
            .map(|entry| entry.value().clone()))
    }

    async fn insert(&self, selection: &DailySelection) -> Result<DailySelection, SourceError> {
        let stored = self
            .selections
            .entry((selection.user_id.clone(), selection.date))
            .or_insert_with(|| selection.clone())
            .value()
            .clone();
        DAILY_SELECTIONS.set(self.selections.len() as f64);
        Ok(stored)
    }

    fn prune(&self, cutoff: NaiveDate) -> usize {
        let before = self.selections.len();
        self.selections.retain(|(_, date), _| *date >= cutoff);
        let after = self.selections.len();
        DAILY_SELECTIONS.set(after as f64);
        before.saturating_sub(after)
    }
}

// Query history per user, appended in time order
pub struct MemoryHistory {
    entries: DashMap<String, Vec<HistoryEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl HistorySource for MemoryHistory {
    async fn seen(&self, user_id: &str) -> Result<HashSet<VerseRef>, SourceError> {
        Ok(self
            .entries
            .get(user_id)
            .map(|rows| rows.iter().filter_map(HistoryEntry::verse_ref).collect())
            .unwrap_or_default())
    }

    async fn record(&self, user_id: &str, verse: VerseRef) -> Result<(), SourceError> {
        let entry = HistoryEntry::for_verse(verse, self.clock.now());
        self.entries.entry(user_id.to_string()).or_default().push(entry);
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<HistoryEntry>, SourceError> {
        Ok(self
            .entries
            .get(user_id)
            .map(|rows| rows.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn clear(&self, user_id: &str) -> Result<(), SourceError> {
        self.entries.remove(user_id);
        Ok(())
    }
}
