use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Sender::User),
            "ai" => Ok(Sender::Ai),
            _ => Err(format!("unknown sender: {s}")),
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain model for a single chat message. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(text: String, sender: Sender, language: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            sender,
            language: language.into(),
            created_at: Utc::now(),
        }
    }
}

/// Identity-provider user id; scopes the per-user document namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: UserId,
    pub email: String,
}

/// A starred message, copied so it outlives the chat history window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub message_id: String,
    pub text: String,
    pub sender: Sender,
    pub language: String,
    pub saved_at: DateTime<Utc>,
}

/// A word or phrase the learner chose to keep, per target language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyEntry {
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    pub language: String,
    pub added_at: DateTime<Utc>,
}

/// Lifecycle of a displayed message as reported to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sending,
    Delivered,
    Queued,
    Failed,
    /// Shown locally but never sent to the store (signed out or rate limited).
    NotPersisted,
    History,
}

impl DeliveryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryStatus::Sending => "sending",
            DeliveryStatus::Delivered => "saved",
            DeliveryStatus::Queued => "queued",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::NotPersisted => "local only",
            DeliveryStatus::History => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_parses_only_known_roles() {
        assert_eq!("user".parse::<Sender>(), Ok(Sender::User));
        assert_eq!("ai".parse::<Sender>(), Ok(Sender::Ai));
        assert!("AI".parse::<Sender>().is_err());
        assert!("system".parse::<Sender>().is_err());
    }

    #[test]
    fn message_serializes_with_camel_case_fields() {
        let message = Message::new("Hola".to_string(), Sender::User, "es");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["sender"], "user");
        assert!(json.get("createdAt").is_some());
    }
}
