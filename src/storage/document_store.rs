use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Result as SqlResult, params};

use crate::common::{Message, Sender, UserId};

use super::database::SharedDatabase;
use super::error::StoreError;

/// The document-store collaborator. Writes are at-least-once; reads are
/// ordered oldest-first and scoped to one user's namespace.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save(&self, owner: &UserId, message: &Message) -> Result<(), StoreError>;

    /// Returns up to `limit` of the most recent messages created after
    /// `since`, oldest first.
    async fn list(
        &self,
        owner: &UserId,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, StoreError>;
}

/// Document store backed by the local SQLite file.
pub struct SqliteDocumentStore {
    db: SharedDatabase,
}

type MessageRow = (String, String, String, String, i64);

impl SqliteDocumentStore {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    #[cfg(test)]
    pub(crate) fn message_count(&self, owner: &UserId) -> Result<usize, StoreError> {
        let db = self
            .db
            .lock()
            .map_err(|_| StoreError::Backend("database lock poisoned".into()))?;
        let count: i64 = db.connection().query_row(
            "SELECT COUNT(*) FROM messages WHERE owner = ?1",
            params![owner.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn save(&self, owner: &UserId, message: &Message) -> Result<(), StoreError> {
        let db = self
            .db
            .lock()
            .map_err(|_| StoreError::Backend("database lock poisoned".into()))?;
        db.connection().execute(
            "INSERT OR IGNORE INTO messages (id, owner, sender, text, language, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id,
                owner.as_str(),
                message.sender.as_str(),
                message.text,
                message.language,
                message.created_at.timestamp_millis()
            ],
        )?;
        Ok(())
    }

    async fn list(
        &self,
        owner: &UserId,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = {
            let db = self
                .db
                .lock()
                .map_err(|_| StoreError::Backend("database lock poisoned".into()))?;
            let since_ms = since.map(|ts| ts.timestamp_millis()).unwrap_or(i64::MIN);
            let mut stmt = db.connection().prepare(
                "SELECT id, sender, text, language, created_at
                 FROM messages
                 WHERE owner = ?1 AND created_at > ?2
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
            )?;
            stmt.query_map(params![owner.as_str(), since_ms, limit as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<SqlResult<Vec<MessageRow>>>()?
        };

        let mut messages = rows
            .into_iter()
            .map(row_to_message)
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }
}

fn row_to_message((id, sender, text, language, created_ms): MessageRow) -> Result<Message, StoreError> {
    let sender = sender.parse::<Sender>().map_err(StoreError::Decode)?;
    let created_at = Utc
        .timestamp_millis_opt(created_ms)
        .single()
        .ok_or_else(|| StoreError::Decode(format!("invalid timestamp {created_ms} on {id}")))?;
    Ok(Message {
        id,
        text,
        sender,
        language,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;
    use chrono::Duration;

    fn message_at(text: &str, created_at: DateTime<Utc>) -> Message {
        let mut message = Message::new(text.to_string(), Sender::User, "es");
        message.created_at = created_at;
        message
    }

    #[tokio::test]
    async fn list_is_scoped_per_owner_and_oldest_first() {
        let store = SqliteDocumentStore::new(Database::in_memory().unwrap().into_shared());
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let base = Utc::now();

        store.save(&alice, &message_at("dos", base + Duration::seconds(2))).await.unwrap();
        store.save(&alice, &message_at("uno", base + Duration::seconds(1))).await.unwrap();
        store.save(&bob, &message_at("bonjour", base)).await.unwrap();

        let listed = store.list(&alice, 10, None).await.unwrap();
        let texts: Vec<_> = listed.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["uno", "dos"]);
    }

    #[tokio::test]
    async fn list_keeps_most_recent_when_limited() {
        let store = SqliteDocumentStore::new(Database::in_memory().unwrap().into_shared());
        let owner = UserId::new("alice");
        let base = Utc::now();
        for i in 0..5 {
            store
                .save(&owner, &message_at(&format!("m{i}"), base + Duration::seconds(i)))
                .await
                .unwrap();
        }

        let listed = store.list(&owner, 2, None).await.unwrap();
        let texts: Vec<_> = listed.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["m3", "m4"]);

        let since = store.list(&owner, 10, Some(base + Duration::seconds(2))).await.unwrap();
        assert_eq!(since.len(), 2);
    }

    #[tokio::test]
    async fn saving_same_message_twice_stores_one_row() {
        let store = SqliteDocumentStore::new(Database::in_memory().unwrap().into_shared());
        let owner = UserId::new("alice");
        let message = Message::new("Hola".to_string(), Sender::User, "es");

        store.save(&owner, &message).await.unwrap();
        store.save(&owner, &message).await.unwrap();

        assert_eq!(store.message_count(&owner).unwrap(), 1);
    }
}
