use std::error::Error;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::common::{AuthUser, ChatCommand, ChatEvent, Message, Sender};
use crate::context::AppContext;
use crate::pipeline::{ChannelSink, MessagePipeline, PipelineError, SubmitOutcome};
use crate::storage::{FavoritesStore, StreakTracker, VocabularyError, VocabularyStore};

use super::speech::{SpeechEvent, forward_final_transcripts};

/// Owns the message pipeline and serves UI commands one at a time, so the
/// rate-limit window and offline queue are only ever touched from here.
pub struct ChatClient {
    ctx: AppContext,
    event_sender: mpsc::Sender<ChatEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
    // Weak so the loop still ends once the UI drops its sender.
    command_loopback: mpsc::WeakSender<ChatCommand>,
    pipeline: MessagePipeline,
    streak: StreakTracker,
    favorites: FavoritesStore,
    vocabulary: VocabularyStore,
    conversation: Vec<Message>,
    target_language: String,
}

impl ChatClient {
    pub fn new(
        ctx: AppContext,
        event_sender: mpsc::Sender<ChatEvent>,
        command_receiver: mpsc::Receiver<ChatCommand>,
        command_loopback: mpsc::Sender<ChatCommand>,
    ) -> Self {
        let sink = Arc::new(ChannelSink::new(event_sender.clone()));
        let pipeline = MessagePipeline::new(
            ctx.kv.clone(),
            ctx.documents.clone(),
            ctx.config.pipeline_settings(),
            sink,
        );
        let streak = StreakTracker::load(ctx.kv.clone());
        let favorites = FavoritesStore::load(ctx.kv.clone());
        let vocabulary = VocabularyStore::load(ctx.kv.clone());
        let target_language = ctx.config.target_language.clone();
        Self {
            ctx,
            event_sender,
            command_receiver,
            command_loopback: command_loopback.downgrade(),
            pipeline,
            streak,
            favorites,
            vocabulary,
            conversation: Vec::new(),
            target_language,
        }
    }

    pub async fn run(mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut auth_changes: watch::Receiver<Option<AuthUser>> = self.ctx.auth.subscribe();

        self.emit(ChatEvent::ConnectivityChanged(self.pipeline.is_online())).await;
        self.emit(ChatEvent::QueueLength(self.pipeline.queue().len())).await;
        let record = self.streak.record();
        self.emit(ChatEvent::StreakUpdated {
            current: self.streak.current(),
            longest: record.longest,
        })
        .await;

        let initial_user = auth_changes.borrow_and_update().clone();
        if initial_user.is_some() {
            self.handle_auth_change(initial_user).await;
        }

        log::info!("Chat loop started");
        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }
                changed = auth_changes.changed() => {
                    if changed.is_err() {
                        log::warn!("Identity provider dropped; persistence disabled");
                        self.handle_auth_change(None).await;
                        break;
                    }
                    let user = auth_changes.borrow_and_update().clone();
                    self.handle_auth_change(user).await;
                }
            }
        }

        log::info!("Chat loop stopped");
        Ok(())
    }

    async fn handle_command(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::SendMessage(text) => self.handle_send(text).await,
            ChatCommand::SetOnline(online) => {
                if let Some(report) = self.pipeline.set_online(online).await {
                    if report.abandoned > 0 {
                        self.notice(format!(
                            "{} queued messages could not be saved and were dropped",
                            report.abandoned
                        ))
                        .await;
                    }
                }
                self.emit(ChatEvent::ConnectivityChanged(online)).await;
                self.emit_queue_length().await;
            }
            ChatCommand::SignUp { email, password } => {
                if let Err(err) = self.ctx.auth.sign_up(&email, &password).await {
                    self.notice(format!("Sign-up failed: {err}")).await;
                }
            }
            ChatCommand::SignIn { email, password } => {
                if let Err(err) = self.ctx.auth.sign_in(&email, &password).await {
                    self.notice(format!("Sign-in failed: {err}")).await;
                }
            }
            ChatCommand::SignOut => {
                if let Err(err) = self.ctx.auth.sign_out().await {
                    self.notice(format!("Sign-out failed: {err}")).await;
                }
            }
            ChatCommand::ReloadHistory => self.reload_history().await,
            ChatCommand::SetTargetLanguage(language) => {
                log::info!("Target language set to {language}");
                self.target_language = language;
                self.emit_vocabulary().await;
            }
            ChatCommand::StartDictation => self.start_dictation().await,
            ChatCommand::ToggleFavorite(message_id) => self.toggle_favorite(&message_id).await,
            ChatCommand::AddVocabulary { word, translation } => {
                self.add_vocabulary(&word, translation.as_deref()).await
            }
            ChatCommand::RemoveVocabulary(word) => self.remove_vocabulary(&word).await,
        }
    }

    async fn handle_send(&mut self, text: String) {
        let language = self.target_language.clone();
        let outcome = self.pipeline.submit(&text, Sender::User.as_str(), &language).await;

        let message = match outcome {
            Ok(outcome) => {
                if !matches!(outcome, SubmitOutcome::DisplayedOnly(_)) {
                    self.record_activity().await;
                }
                outcome.message().clone()
            }
            Err(PipelineError::InvalidInput(err)) => {
                self.notice(format!("Message not sent: {err}")).await;
                return;
            }
            Err(PipelineError::RateLimitExceeded { retry_after_ms }) => {
                self.notice(format!(
                    "You're sending messages too quickly. Try again in {}s.",
                    (retry_after_ms + 999) / 1000
                ))
                .await;
                return;
            }
            Err(err @ PipelineError::PersistenceFailed(_)) | Err(err @ PipelineError::LocalState(_)) => {
                log::error!("Message shown but not saved: {err}");
                self.notice(format!("Couldn't save your message: {err}")).await;
                return;
            }
        };

        self.emit_queue_length().await;
        self.conversation.push(message);
        self.reply_as_tutor().await;
    }

    async fn reply_as_tutor(&mut self) {
        let window = self.ctx.config.tutor.context_messages.max(1);
        let start = self.conversation.len().saturating_sub(window);
        let reply = self
            .ctx
            .tutor
            .reply(
                &self.conversation[start..],
                &self.target_language,
                &self.ctx.config.native_language,
            )
            .await;

        let language = self.target_language.clone();
        match self.pipeline.submit_reply(&reply, &language).await {
            Ok(outcome) => {
                let message = outcome.message().clone();
                if self.ctx.config.speak_replies {
                    self.speak(&reply, &language);
                }
                self.conversation.push(message);
            }
            Err(err) => {
                log::warn!("Tutor reply not saved: {err}");
            }
        }
        self.emit_queue_length().await;
    }

    fn speak(&self, text: &str, language: &str) {
        let events = self.event_sender.clone();
        self.ctx.synthesizer.speak(
            text,
            language,
            Box::new(move |event| {
                let speaking = match event {
                    SpeechEvent::Started => true,
                    SpeechEvent::Ended => false,
                    SpeechEvent::Error(err) => {
                        log::warn!("Speech synthesis failed: {err}");
                        false
                    }
                };
                let _ = events.try_send(ChatEvent::Speaking(speaking));
            }),
        );
    }

    async fn start_dictation(&mut self) {
        let Some(recognizer) = self.ctx.recognizer.clone() else {
            self.notice("Speech input is not available on this device").await;
            return;
        };
        let Some(commands) = self.command_loopback.upgrade() else {
            log::debug!("UI gone; not starting dictation");
            return;
        };
        let transcripts = recognizer.listen(&self.target_language);
        tokio::spawn(async move {
            let forwarded = forward_final_transcripts(transcripts, commands).await;
            log::debug!("Dictation finished with {forwarded} messages");
        });
    }

    async fn handle_auth_change(&mut self, user: Option<AuthUser>) {
        let changed = self.pipeline.user() != user.as_ref().map(|u| &u.uid);
        if !changed {
            return;
        }

        self.pipeline.set_user(user.as_ref().map(|u| u.uid.clone()));
        self.conversation.clear();
        self.emit(ChatEvent::HistoryCleared).await;

        match user {
            Some(user) => {
                log::info!("Signed in as {}", user.email);
                self.emit(ChatEvent::SignedIn(user.email)).await;
                self.emit_favorites().await;
                self.emit_vocabulary().await;
                self.reload_history().await;
                if self.pipeline.is_online() && !self.pipeline.queue().is_empty() {
                    self.pipeline.drain_offline_queue().await;
                    self.emit_queue_length().await;
                }
            }
            None => {
                log::info!("Signed out; messages will be shown but not saved");
                self.emit(ChatEvent::SignedOut).await;
                self.emit_favorites().await;
                self.emit_vocabulary().await;
            }
        }
    }

    async fn reload_history(&mut self) {
        if self.pipeline.user().is_none() {
            return;
        }
        match self.pipeline.load_history(self.ctx.config.history_limit).await {
            Ok(messages) => {
                log::info!("Loaded {} messages of history", messages.len());
                self.conversation = messages;
            }
            Err(err) => {
                log::warn!("Failed to load history: {err}");
                self.notice(format!("Couldn't load earlier messages: {err}")).await;
            }
        }
    }

    async fn toggle_favorite(&mut self, message_id: &str) {
        let Some(owner) = self.pipeline.user().cloned() else {
            self.notice("Sign in to keep favorites").await;
            return;
        };

        let result = match self.conversation.iter().find(|m| m.id == message_id) {
            Some(message) => self.favorites.toggle(&owner, message).map(|_| ()),
            // Starred messages can still be unstarred once out of the loaded history.
            None => match self.favorites.remove(&owner, message_id) {
                Ok(true) => Ok(()),
                Ok(false) => {
                    self.notice("That message is no longer available").await;
                    return;
                }
                Err(err) => Err(err),
            },
        };

        match result {
            Ok(()) => self.emit_favorites().await,
            Err(err) => {
                log::warn!("Failed to persist favorites: {err}");
                self.notice(format!("Couldn't update favorites: {err}")).await;
            }
        }
    }

    async fn add_vocabulary(&mut self, word: &str, translation: Option<&str>) {
        let Some(owner) = self.pipeline.user().cloned() else {
            self.notice("Sign in to build a word list").await;
            return;
        };

        match self.vocabulary.add(&owner, word, translation, &self.target_language) {
            Ok(entry) => {
                log::info!("Saved `{}` ({})", entry.word, entry.language);
                self.emit_vocabulary().await;
            }
            Err(err @ VocabularyError::Local(_)) => {
                log::warn!("Failed to persist word list: {err}");
                self.notice(format!("Couldn't save the word: {err}")).await;
            }
            Err(err) => self.notice(format!("Word not added: {err}")).await,
        }
    }

    async fn remove_vocabulary(&mut self, word: &str) {
        let Some(owner) = self.pipeline.user().cloned() else {
            return;
        };
        match self.vocabulary.remove(&owner, word, &self.target_language) {
            Ok(_) => self.emit_vocabulary().await,
            Err(err) => {
                log::warn!("Failed to persist word list: {err}");
                self.notice(format!("Couldn't remove the word: {err}")).await;
            }
        }
    }

    async fn emit_favorites(&self) {
        let favorites = self
            .pipeline
            .user()
            .map(|owner| self.favorites.list(owner).to_vec())
            .unwrap_or_default();
        self.emit(ChatEvent::FavoritesChanged(favorites)).await;
    }

    async fn emit_vocabulary(&self) {
        let entries = self
            .pipeline
            .user()
            .map(|owner| self.vocabulary.list(owner, Some(&self.target_language)))
            .unwrap_or_default();
        self.emit(ChatEvent::VocabularyChanged(entries)).await;
    }

    async fn record_activity(&mut self) {
        match self.streak.record_activity() {
            Ok(record) => {
                self.emit(ChatEvent::StreakUpdated {
                    current: record.current,
                    longest: record.longest,
                })
                .await;
            }
            Err(err) => log::warn!("Failed to persist streak: {err}"),
        }
    }

    async fn emit_queue_length(&self) {
        self.emit(ChatEvent::QueueLength(self.pipeline.queue().len())).await;
    }

    async fn notice(&self, text: impl Into<String>) {
        self.emit(ChatEvent::Notice(text.into())).await;
    }

    async fn emit(&self, event: ChatEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::warn!("Failed to notify UI: {err}");
        }
    }
}
