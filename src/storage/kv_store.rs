use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::database::SharedDatabase;
use super::error::KvError;

pub const RATE_LIMIT_KEY: &str = "lingua.rate_limit_window";
pub const OFFLINE_QUEUE_KEY: &str = "lingua.offline_queue";
pub const STREAK_KEY: &str = "lingua.streak";
pub const FAVORITES_KEY: &str = "lingua.favorites";
pub const VOCABULARY_KEY: &str = "lingua.vocabulary";

/// Small local persistence capability, the desktop stand-in for browser
/// local storage. Values are flat strings under fixed keys.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    fn set(&self, key: &str, value: &str) -> Result<(), KvError>;
    fn remove(&self, key: &str) -> Result<(), KvError>;
}

/// Reads a JSON record. A corrupted record is logged and treated as absent
/// so one bad write never wedges the client.
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            log::warn!("Failed to read local state `{key}`: {err}");
            return None;
        }
    };

    match serde_json::from_str::<T>(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("Discarding corrupted local state `{key}`: {err}");
            None
        }
    }
}

pub fn write_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), KvError> {
    let json = serde_json::to_string(value)?;
    store.set(key, &json)
}

pub struct SqliteKeyValueStore {
    db: SharedDatabase,
}

impl SqliteKeyValueStore {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let db = self.db.lock().map_err(|_| KvError::Poisoned)?;
        let value = db
            .connection()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let db = self.db.lock().map_err(|_| KvError::Poisoned)?;
        db.connection().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), KvError> {
        let db = self.db.lock().map_err(|_| KvError::Poisoned)?;
        db.connection()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let entries = self.entries.lock().map_err(|_| KvError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut entries = self.entries.lock().map_err(|_| KvError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), KvError> {
        let mut entries = self.entries.lock().map_err(|_| KvError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;

    #[test]
    fn sqlite_store_overwrites_and_removes() {
        let store = SqliteKeyValueStore::new(Database::in_memory().unwrap().into_shared());

        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn corrupted_json_reads_as_absent() {
        let store = MemoryKeyValueStore::new();
        store.set(RATE_LIMIT_KEY, "{not json").unwrap();

        let value: Option<Vec<i64>> = read_json(&store, RATE_LIMIT_KEY);
        assert!(value.is_none());
    }

    #[test]
    fn json_helpers_round_trip_through_store() {
        let store = MemoryKeyValueStore::new();
        write_json(&store, STREAK_KEY, &vec![1_i64, 2, 3]).unwrap();

        let value: Option<Vec<i64>> = read_json(&store, STREAK_KEY);
        assert_eq!(value, Some(vec![1, 2, 3]));
    }
}
