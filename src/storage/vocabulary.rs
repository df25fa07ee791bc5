//! The learner's word list. Entries are per user and per target language;
//! a word is unique within a language regardless of case.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::common::{UserId, VocabularyEntry};

use super::error::KvError;
use super::kv_store::{KeyValueStore, VOCABULARY_KEY, read_json, write_json};

pub const MAX_WORD_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum VocabularyError {
    #[error("word is empty")]
    EmptyWord,
    #[error("word is {length} characters, limit is {max}")]
    TooLong { length: usize, max: usize },
    #[error("`{0}` is already in your word list")]
    Duplicate(String),
    #[error(transparent)]
    Local(#[from] KvError),
}

pub struct VocabularyStore {
    store: Arc<dyn KeyValueStore>,
    by_owner: HashMap<String, Vec<VocabularyEntry>>,
}

fn same_word(entry: &VocabularyEntry, word: &str, language: &str) -> bool {
    entry.language == language && entry.word.to_lowercase() == word.to_lowercase()
}

impl VocabularyStore {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let by_owner = read_json(store.as_ref(), VOCABULARY_KEY).unwrap_or_default();
        Self { store, by_owner }
    }

    /// Entries in the order they were added, optionally for one language.
    pub fn list(&self, owner: &UserId, language: Option<&str>) -> Vec<VocabularyEntry> {
        self.by_owner
            .get(owner.as_str())
            .into_iter()
            .flatten()
            .filter(|entry| language.is_none_or(|lang| entry.language == lang))
            .cloned()
            .collect()
    }

    pub fn add(
        &mut self,
        owner: &UserId,
        word: &str,
        translation: Option<&str>,
        language: &str,
    ) -> Result<VocabularyEntry, VocabularyError> {
        let word = word.trim();
        if word.is_empty() {
            return Err(VocabularyError::EmptyWord);
        }
        let length = word.chars().count();
        if length > MAX_WORD_CHARS {
            return Err(VocabularyError::TooLong {
                length,
                max: MAX_WORD_CHARS,
            });
        }

        let entries = self.by_owner.entry(owner.as_str().to_string()).or_default();
        if entries.iter().any(|entry| same_word(entry, word, language)) {
            return Err(VocabularyError::Duplicate(word.to_string()));
        }

        let entry = VocabularyEntry {
            word: word.to_string(),
            translation: translation
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            language: language.to_string(),
            added_at: Utc::now(),
        };
        entries.push(entry.clone());
        self.persist()?;
        log::debug!("Added `{}` to the {language} word list", entry.word);
        Ok(entry)
    }

    /// Returns false if the word was not in the list.
    pub fn remove(&mut self, owner: &UserId, word: &str, language: &str) -> Result<bool, KvError> {
        let Some(entries) = self.by_owner.get_mut(owner.as_str()) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|entry| !same_word(entry, word.trim(), language));
        if entries.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> Result<(), KvError> {
        write_json(self.store.as_ref(), VOCABULARY_KEY, &self.by_owner)
    }
}
