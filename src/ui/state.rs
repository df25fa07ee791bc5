use chrono::{DateTime, Utc};

use crate::common::{DeliveryStatus, Favorite, Message, VocabularyEntry};

const MAX_NOTICES: usize = 20;

#[derive(Debug, Clone)]
pub struct DisplayedMessage {
    pub message: Message,
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub at: DateTime<Utc>,
    pub text: String,
}

/// UI-local state, fed only by `ChatEvent`s.
pub struct AppState {
    pub messages: Vec<DisplayedMessage>,
    pub input_text: String,
    pub email_input: String,
    pub password_input: String,
    pub language_input: String,
    pub signed_in_as: Option<String>,
    pub online: bool,
    pub queue_length: usize,
    pub streak_current: u32,
    pub streak_longest: u32,
    pub speaking: bool,
    pub notices: Vec<Notice>,
    pub favorites: Vec<Favorite>,
    pub vocabulary: Vec<VocabularyEntry>,
    pub word_input: String,
    pub translation_input: String,
}

impl AppState {
    pub fn new(target_language: &str) -> Self {
        Self {
            messages: Vec::new(),
            input_text: String::new(),
            email_input: String::new(),
            password_input: String::new(),
            language_input: target_language.to_string(),
            signed_in_as: None,
            online: true,
            queue_length: 0,
            streak_current: 0,
            streak_longest: 0,
            speaking: false,
            notices: Vec::new(),
            favorites: Vec::new(),
            vocabulary: Vec::new(),
            word_input: String::new(),
            translation_input: String::new(),
        }
    }

    pub fn push_message(&mut self, message: Message, status: DeliveryStatus) {
        self.messages.push(DisplayedMessage { message, status });
    }

    pub fn update_status(&mut self, id: &str, status: DeliveryStatus) {
        if let Some(entry) = self.messages.iter_mut().rev().find(|m| m.message.id == id) {
            entry.status = status;
        }
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    pub fn is_favorite(&self, message_id: &str) -> bool {
        self.favorites.iter().any(|f| f.message_id == message_id)
    }

    pub fn push_notice(&mut self, text: String) {
        self.notices.push(Notice { at: Utc::now(), text });
        if self.notices.len() > MAX_NOTICES {
            self.notices.remove(0);
        }
    }
}
