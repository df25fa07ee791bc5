use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::KvError;
use super::kv_store::{KeyValueStore, STREAK_KEY, read_json, write_json};

/// Consecutive days with at least one delivered user message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub current: u32,
    pub longest: u32,
    pub last_active: Option<NaiveDate>,
}

impl StreakRecord {
    /// Folds one day of activity into the record. Returns true if it changed.
    pub fn record(&mut self, day: NaiveDate) -> bool {
        match self.last_active {
            Some(last) if last == day => return false,
            // Clock moved backwards; keep the later day.
            Some(last) if last > day => return false,
            Some(last) if last.succ_opt() == Some(day) => self.current += 1,
            _ => self.current = 1,
        }
        self.last_active = Some(day);
        self.longest = self.longest.max(self.current);
        true
    }

    /// Current streak as of `today`; a missed day resets it to zero.
    pub fn current_as_of(&self, today: NaiveDate) -> u32 {
        match self.last_active {
            Some(last) if last == today || last.succ_opt() == Some(today) => self.current,
            _ => 0,
        }
    }
}

pub struct StreakTracker {
    store: Arc<dyn KeyValueStore>,
    record: StreakRecord,
}

impl StreakTracker {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let record = read_json(store.as_ref(), STREAK_KEY).unwrap_or_default();
        Self { store, record }
    }

    pub fn record(&self) -> StreakRecord {
        self.record
    }

    pub fn current(&self) -> u32 {
        self.record.current_as_of(Utc::now().date_naive())
    }

    pub fn record_activity(&mut self) -> Result<StreakRecord, KvError> {
        self.record_activity_on(Utc::now().date_naive())
    }

    pub fn record_activity_on(&mut self, day: NaiveDate) -> Result<StreakRecord, KvError> {
        if self.record.record(day) {
            write_json(self.store.as_ref(), STREAK_KEY, &self.record)?;
        }
        Ok(self.record)
    }
}
