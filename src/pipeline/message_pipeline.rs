use std::sync::Arc;

use crate::common::{DeliveryStatus, Message, Sender, UserId};
use crate::storage::{DocumentStore, KeyValueStore, StoreError};

use super::error::{PipelineError, ValidationError};
use super::offline_queue::{DEFAULT_MAX_QUEUE_RETRIES, DrainReport, OfflineQueue};
use super::persistence::{PersistenceClient, RetryPolicy};
use super::rate_limiter::{RateDecision, RateLimiter};
use super::sanitizer::sanitize;
use super::sink::MessageSink;
use super::validator::{validate, validate_sanitized};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub rate_capacity: usize,
    pub rate_window_ms: i64,
    pub retry: RetryPolicy,
    pub queue_max_retries: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            rate_capacity: 20,
            rate_window_ms: 60_000,
            retry: RetryPolicy::default(),
            queue_max_retries: DEFAULT_MAX_QUEUE_RETRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Delivered(Message),
    Queued(Message),
    /// Shown but not persisted: nobody is signed in.
    DisplayedOnly(Message),
}

impl SubmitOutcome {
    pub fn message(&self) -> &Message {
        match self {
            SubmitOutcome::Delivered(message)
            | SubmitOutcome::Queued(message)
            | SubmitOutcome::DisplayedOnly(message) => message,
        }
    }
}

/// Outbound path for chat messages:
/// validate → sanitize → display → auth gate → rate limit → persist,
/// falling back to the offline queue when the store is unreachable.
/// The optimistic display is never rolled back, and a live save never
/// overtakes a queued message.
pub struct MessagePipeline {
    limiter: RateLimiter,
    persistence: PersistenceClient,
    queue: OfflineQueue,
    sink: Arc<dyn MessageSink>,
    online: bool,
    user: Option<UserId>,
}

impl MessagePipeline {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        documents: Arc<dyn DocumentStore>,
        settings: PipelineSettings,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            limiter: RateLimiter::load(kv.clone(), settings.rate_capacity, settings.rate_window_ms),
            persistence: PersistenceClient::new(documents, settings.retry),
            queue: OfflineQueue::load(kv, settings.queue_max_retries),
            sink,
            online: true,
            user: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn set_user(&mut self, user: Option<UserId>) {
        self.user = user;
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// Submits a user message. Consumes rate-limit budget.
    pub async fn submit(&mut self, text: &str, sender: &str, language: &str) -> Result<SubmitOutcome, PipelineError> {
        let message = self.prepare(text, sender, language)?;
        let gate_rate = message.sender == Sender::User;
        self.sink.display(&message, DeliveryStatus::Sending);
        self.persist(message, gate_rate).await
    }

    /// Persists a tutor reply. Replies do not count against the user's
    /// submission budget.
    pub async fn submit_reply(&mut self, text: &str, language: &str) -> Result<SubmitOutcome, PipelineError> {
        let message = self.prepare(text, Sender::Ai.as_str(), language)?;
        self.sink.display(&message, DeliveryStatus::Sending);
        self.persist(message, false).await
    }

    /// Display-only mode: validated and sanitized like a submission, but it
    /// never touches the rate limiter or the store.
    pub fn display_only(&self, text: &str, sender: &str, language: &str) -> Result<Message, PipelineError> {
        let message = self.prepare(text, sender, language)?;
        self.sink.display(&message, DeliveryStatus::NotPersisted);
        Ok(message)
    }

    /// Renders already-stored messages without writing them back.
    pub fn display_history(&self, messages: &[Message]) {
        for stored in messages {
            let mut message = stored.clone();
            message.text = sanitize(&message.text);
            self.sink.display(&message, DeliveryStatus::History);
        }
    }

    /// Fetches the signed-in user's recent messages and displays them.
    pub async fn load_history(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        let Some(user) = self.user.as_ref() else {
            return Ok(Vec::new());
        };
        let messages = self.persistence.store().list(user, limit, None).await?;
        self.display_history(&messages);
        Ok(messages)
    }

    /// Records a connectivity change. Coming back online drains the queue.
    pub async fn set_online(&mut self, online: bool) -> Option<DrainReport> {
        let was_online = self.online;
        self.online = online;
        if online && !was_online {
            log::info!("Connectivity restored");
            if !self.queue.is_empty() {
                return Some(self.drain_offline_queue().await);
            }
        } else if !online && was_online {
            log::info!("Connectivity lost; new messages will be queued");
        }
        None
    }

    pub async fn drain_offline_queue(&mut self) -> DrainReport {
        let report = self.queue.drain(&self.persistence).await;
        for message in &report.delivered {
            self.sink.delivery(&message.id, DeliveryStatus::Delivered);
        }
        report
    }

    /// Validates the raw input, then the sanitized text: stripping can empty
    /// a message and escaping can push it past the length limit.
    fn prepare(&self, text: &str, sender: &str, language: &str) -> Result<Message, ValidationError> {
        let sender = validate(text, sender)?;
        let sanitized = sanitize(text);
        validate_sanitized(&sanitized)?;
        Ok(Message::new(sanitized, sender, language))
    }

    async fn persist(&mut self, message: Message, gate_rate: bool) -> Result<SubmitOutcome, PipelineError> {
        let Some(user) = self.user.clone() else {
            self.sink.delivery(&message.id, DeliveryStatus::NotPersisted);
            return Ok(SubmitOutcome::DisplayedOnly(message));
        };

        if gate_rate {
            if let RateDecision::Denied { retry_after_ms } = self.limiter.try_acquire() {
                log::warn!("Rate limit hit; message {} not persisted", message.id);
                self.sink.delivery(&message.id, DeliveryStatus::NotPersisted);
                return Err(PipelineError::RateLimitExceeded { retry_after_ms });
            }
        }

        if !self.online {
            return self.enqueue(&user, message);
        }

        // Anything still queued was written earlier and must reach the store
        // first. A failed connectivity save leaves `online` set, so this is
        // also how a recovered store gets noticed.
        if !self.queue.is_empty() {
            self.drain_offline_queue().await;
            if !self.queue.is_empty() {
                log::info!(
                    "{} messages still queued; queueing {} behind them",
                    self.queue.len(),
                    message.id
                );
                return self.enqueue(&user, message);
            }
        }

        match self.persistence.save(&user, &message).await {
            Ok(()) => {
                self.sink.delivery(&message.id, DeliveryStatus::Delivered);
                Ok(SubmitOutcome::Delivered(message))
            }
            Err(err) if err.is_connectivity() => {
                log::warn!("Store unreachable; queueing message {}", message.id);
                self.enqueue(&user, message)
            }
            Err(err) => {
                self.sink.delivery(&message.id, DeliveryStatus::Failed);
                Err(PipelineError::PersistenceFailed(err))
            }
        }
    }

    fn enqueue(&mut self, user: &UserId, message: Message) -> Result<SubmitOutcome, PipelineError> {
        if let Err(err) = self.queue.enqueue(user, message.clone()) {
            self.sink.delivery(&message.id, DeliveryStatus::Failed);
            return Err(PipelineError::LocalState(err));
        }
        self.sink.delivery(&message.id, DeliveryStatus::Queued);
        Ok(SubmitOutcome::Queued(message))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::persistence::test_support::ScriptedStore;
    use crate::pipeline::sink::test_support::RecordingSink;
    use crate::storage::kv_store::MemoryKeyValueStore;

    struct Harness {
        pipeline: MessagePipeline,
        store: Arc<ScriptedStore>,
        sink: Arc<RecordingSink>,
    }

    fn harness(store: ScriptedStore) -> Harness {
        let store = Arc::new(store);
        let sink = Arc::new(RecordingSink::default());
        let settings = PipelineSettings {
            retry: RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(10),
                multiplier: 2.0,
            },
            ..PipelineSettings::default()
        };
        let mut pipeline = MessagePipeline::new(
            Arc::new(MemoryKeyValueStore::new()),
            store.clone(),
            settings,
            sink.clone(),
        );
        pipeline.set_user(Some(UserId::new("u1")));
        Harness {
            pipeline,
            store,
            sink,
        }
    }

    #[tokio::test]
    async fn invalid_input_aborts_before_display() {
        let mut h = harness(ScriptedStore::default());

        let err = h.pipeline.submit("   ", "user", "es").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(ValidationError::Empty)));

        let err = h.pipeline.submit("Hola", "robot", "es").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(ValidationError::UnknownSender(_))));

        assert!(h.sink.displayed_texts().is_empty());
        assert_eq!(h.store.calls(), 0);
    }

    #[tokio::test]
    async fn markup_is_sanitized_before_display_and_storage() {
        let mut h = harness(ScriptedStore::default());

        h.pipeline
            .submit("<script>alert(1)</script>", "user", "es")
            .await
            .unwrap();

        let expected = "&lt;script&gt;alert(1)&lt;/script&gt;";
        assert_eq!(h.sink.displayed_texts(), vec![expected]);
        assert_eq!(h.store.saved_texts(), vec![expected]);
    }

    #[tokio::test]
    async fn signed_out_messages_are_displayed_but_not_persisted() {
        let mut h = harness(ScriptedStore::default());
        h.pipeline.set_user(None);

        let outcome = h.pipeline.submit("Hola", "user", "es").await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::DisplayedOnly(_)));
        assert_eq!(h.store.calls(), 0);
        assert_eq!(
            h.sink.last_status(&outcome.message().id),
            Some(DeliveryStatus::NotPersisted)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn non_connectivity_failure_surfaces_and_keeps_display() {
        let mut h = harness(ScriptedStore::failing_forever(StoreError::Rejected(
            "403".into(),
        )));

        let err = h.pipeline.submit("Hola", "user", "es").await.unwrap_err();

        assert!(matches!(err, PipelineError::PersistenceFailed(ref e) if e.attempts == 4));
        assert_eq!(h.sink.displayed_texts(), vec!["Hola"]);
        assert!(h.pipeline.queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn connectivity_failure_after_retries_goes_to_queue() {
        let mut h = harness(ScriptedStore::failing_forever(StoreError::Connectivity(
            "dns".into(),
        )));

        let outcome = h.pipeline.submit("Hola", "user", "es").await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Queued(_)));
        assert_eq!(h.pipeline.queue().len(), 1);
        assert_eq!(
            h.sink.last_status(&outcome.message().id),
            Some(DeliveryStatus::Queued)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn queued_message_reaches_the_store_before_the_next_one() {
        let mut h = harness(ScriptedStore::with_outcomes(vec![
            Err(StoreError::Connectivity("dns".into()));
            4
        ]));

        let first = h.pipeline.submit("A", "user", "es").await.unwrap();
        assert!(matches!(first, SubmitOutcome::Queued(_)));
        assert!(h.pipeline.is_online());

        let second = h.pipeline.submit("B", "user", "es").await.unwrap();

        assert!(matches!(second, SubmitOutcome::Delivered(_)));
        assert_eq!(h.store.saved_texts(), vec!["A", "B"]);
        assert!(h.pipeline.queue().is_empty());
        assert_eq!(
            h.sink.last_status(&first.message().id),
            Some(DeliveryStatus::Delivered)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn new_messages_wait_behind_an_undeliverable_queue() {
        let mut h = harness(ScriptedStore::failing_forever(StoreError::Connectivity(
            "dns".into(),
        )));

        h.pipeline.submit("A", "user", "es").await.unwrap();
        assert_eq!(h.store.calls(), 4);

        let second = h.pipeline.submit("B", "user", "es").await.unwrap();

        assert!(matches!(second, SubmitOutcome::Queued(_)));
        // One drain attempt for A; B is never tried ahead of it.
        assert_eq!(h.store.calls(), 5);
        let queued: Vec<_> = h
            .pipeline
            .queue()
            .items()
            .map(|item| item.message.text.clone())
            .collect();
        assert_eq!(queued, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn text_emptied_by_sanitizing_is_rejected() {
        let mut h = harness(ScriptedStore::default());

        for input in ["javascript:", "  JavaScript : ", "onclick=", "data:vbscript:"] {
            let err = h.pipeline.submit(input, "user", "es").await.unwrap_err();
            assert!(
                matches!(err, PipelineError::InvalidInput(ValidationError::Empty)),
                "{input:?}: {err:?}"
            );
        }
        assert!(h.sink.displayed_texts().is_empty());
        assert_eq!(h.store.calls(), 0);
    }

    #[tokio::test]
    async fn escaped_text_must_fit_the_length_limit() {
        use crate::pipeline::validator::MAX_MESSAGE_CHARS;
        let mut h = harness(ScriptedStore::default());

        // Each `<` becomes the four characters `&lt;`.
        let fits = "<".repeat(MAX_MESSAGE_CHARS / 4);
        let outcome = h.pipeline.submit(&fits, "user", "es").await.unwrap();
        assert_eq!(outcome.message().text.chars().count(), MAX_MESSAGE_CHARS);

        let err = h
            .pipeline
            .submit(&"<".repeat(MAX_MESSAGE_CHARS), "user", "es")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidInput(ValidationError::TooLong { length, .. })
                if length == MAX_MESSAGE_CHARS * 4
        ));
        assert_eq!(h.store.saved_texts().len(), 1);
        assert!(
            h.store
                .saved_texts()
                .iter()
                .all(|text| text.chars().count() <= MAX_MESSAGE_CHARS)
        );
    }

    #[tokio::test]
    async fn tutor_replies_skip_the_rate_limit() {
        let mut h = harness(ScriptedStore::default());
        for i in 0..20 {
            h.pipeline.submit(&format!("m{i}"), "user", "es").await.unwrap();
        }

        let reply = h.pipeline.submit_reply("¡Muy bien!", "es").await.unwrap();
        assert!(matches!(reply, SubmitOutcome::Delivered(ref m) if m.sender == Sender::Ai));

        let err = h.pipeline.submit("m20", "user", "es").await.unwrap_err();
        assert!(matches!(err, PipelineError::RateLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn display_only_never_persists() {
        let mut h = harness(ScriptedStore::default());
        for i in 0..25 {
            h.pipeline.display_only(&format!("m{i}"), "ai", "es").unwrap();
        }

        assert_eq!(h.store.calls(), 0);
        assert_eq!(h.sink.displayed_texts().len(), 25);
        assert!(h.pipeline.submit("still allowed", "user", "es").await.is_ok());
    }

    #[tokio::test]
    async fn going_offline_then_online_drains_once() {
        let mut h = harness(ScriptedStore::default());

        assert!(h.pipeline.set_online(false).await.is_none());
        h.pipeline.submit("uno", "user", "es").await.unwrap();
        assert_eq!(h.store.calls(), 0);

        let report = h.pipeline.set_online(true).await.unwrap();
        assert_eq!(report.delivered.len(), 1);
        assert!(h.pipeline.queue().is_empty());
        assert!(h.pipeline.set_online(true).await.is_none());
    }
}
