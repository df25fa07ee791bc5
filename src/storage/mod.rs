pub mod database;
pub mod document_store;
pub mod error;
pub mod favorites;
pub mod http_store;
pub mod kv_store;
pub mod streak;
pub mod vocabulary;

pub use database::{Database, SharedDatabase};
pub use document_store::{DocumentStore, SqliteDocumentStore};
pub use error::{KvError, StoreError};
pub use favorites::FavoritesStore;
pub use http_store::HttpDocumentStore;
pub use kv_store::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use streak::{StreakRecord, StreakTracker};
pub use vocabulary::{VocabularyError, VocabularyStore};

use std::fs;
use std::path::Path;

/// Ensure data directory exists
pub fn ensure_data_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}
