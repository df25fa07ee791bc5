//! Durable buffer for messages that could not reach the document store.
//!
//! Item lifecycle: `Pending -> Flushing -> {delivered (removed), Pending,
//! abandoned (removed)}`. Drains are sequential in enqueue order, one
//! attempt per item per pass. The whole queue is rewritten to the
//! key-value store after every mutation.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{Message, UserId};
use crate::storage::KvError;
use crate::storage::kv_store::{KeyValueStore, OFFLINE_QUEUE_KEY, read_json, write_json};

use super::persistence::PersistenceClient;

pub const DEFAULT_MAX_QUEUE_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    #[default]
    Pending,
    Flushing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMessage {
    pub message: Message,
    pub owner: UserId,
    pub retry_count: u32,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub state: QueueState,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub delivered: Vec<Message>,
    pub retained: usize,
    pub abandoned: usize,
}

pub struct OfflineQueue {
    store: Arc<dyn KeyValueStore>,
    items: VecDeque<QueuedMessage>,
    max_retries: u32,
}

impl OfflineQueue {
    pub fn load(store: Arc<dyn KeyValueStore>, max_retries: u32) -> Self {
        let mut items: VecDeque<QueuedMessage> =
            read_json(store.as_ref(), OFFLINE_QUEUE_KEY).unwrap_or_default();

        // A flush interrupted by shutdown never completed.
        for item in items.iter_mut() {
            item.state = QueueState::Pending;
        }
        if !items.is_empty() {
            log::info!("Restored {} queued messages", items.len());
        }

        Self {
            store,
            items,
            max_retries,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.items.iter()
    }

    pub fn enqueue(&mut self, owner: &UserId, message: Message) -> Result<(), KvError> {
        self.items.push_back(QueuedMessage {
            message,
            owner: owner.clone(),
            retry_count: 0,
            enqueued_at: Utc::now(),
            state: QueueState::Pending,
        });
        self.persist()
    }

    /// One pass over every queued item, oldest first. Items already at the
    /// retry ceiling are dropped without another attempt.
    pub async fn drain(&mut self, persistence: &PersistenceClient) -> DrainReport {
        let mut report = DrainReport::default();
        let mut index = 0;

        while index < self.items.len() {
            if self.items[index].retry_count >= self.max_retries {
                if let Some(dropped) = self.items.remove(index) {
                    log::warn!(
                        "Abandoning queued message {} after {} failed flushes",
                        dropped.message.id,
                        dropped.retry_count
                    );
                    report.abandoned += 1;
                }
                self.persist_logged();
                continue;
            }

            self.items[index].state = QueueState::Flushing;
            self.persist_logged();

            let item = self.items[index].clone();
            match persistence.try_save(&item.owner, &item.message).await {
                Ok(()) => {
                    self.items.remove(index);
                    report.delivered.push(item.message);
                }
                Err(err) => {
                    let entry = &mut self.items[index];
                    entry.retry_count += 1;
                    entry.state = QueueState::Pending;
                    log::warn!(
                        "Queued message {} still undeliverable (retry {}): {err}",
                        entry.message.id,
                        entry.retry_count
                    );
                    report.retained += 1;
                    index += 1;
                }
            }
            self.persist_logged();
        }

        log::info!(
            "Offline queue drained: {} delivered, {} retained, {} abandoned",
            report.delivered.len(),
            report.retained,
            report.abandoned
        );
        report
    }

    fn persist(&self) -> Result<(), KvError> {
        write_json(self.store.as_ref(), OFFLINE_QUEUE_KEY, &self.items)
    }

    fn persist_logged(&self) {
        if let Err(err) = self.persist() {
            log::warn!("Failed to persist offline queue: {err}");
        }
    }
}
