use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, StoreBackend};
use crate::network::auth::{AuthProvider, LocalAuthProvider};
use crate::network::speech::{LoggingSynthesizer, SpeechRecognizer, SpeechSynthesizer};
use crate::network::tutor::TutorService;
use crate::storage::{
    self, Database, DocumentStore, HttpDocumentStore, KeyValueStore, MemoryKeyValueStore,
    SqliteDocumentStore, SqliteKeyValueStore,
};

/// Everything the chat loop needs, built once at startup and passed down
/// explicitly.
#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub kv: Arc<dyn KeyValueStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub tutor: TutorService,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// No desktop binding exists; `None` makes dictation report itself
    /// unavailable.
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
}

impl AppContext {
    /// Opens local state under `config.data_dir` and selects the document
    /// store backend.
    pub fn initialize(config: AppConfig) -> Result<Self, Box<dyn Error>> {
        storage::ensure_data_dir(&config.data_dir)?;
        let db = Database::new(config.database_path())?.into_shared();
        let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(db.clone()));

        let documents: Arc<dyn DocumentStore> = match (config.store.backend, config.store.endpoint.as_deref()) {
            (StoreBackend::Http, Some(endpoint)) => {
                log::info!("Using remote document store at {endpoint}");
                Arc::new(HttpDocumentStore::new(
                    endpoint,
                    Duration::from_secs(config.store.timeout_secs),
                )?)
            }
            (StoreBackend::Http, None) => {
                log::warn!("HTTP store selected without an endpoint; falling back to SQLite");
                Arc::new(SqliteDocumentStore::new(db))
            }
            (StoreBackend::Sqlite, _) => Arc::new(SqliteDocumentStore::new(db)),
        };

        let tutor = TutorService::from_config(&config.tutor);
        log::info!(
            "Context ready (data dir {}, {} -> {})",
            config.data_dir.display(),
            config.native_language,
            config.target_language
        );

        Ok(Self {
            config,
            kv,
            documents,
            auth: Arc::new(LocalAuthProvider::new()),
            tutor,
            synthesizer: Arc::new(LoggingSynthesizer),
            recognizer: None,
        })
    }

    /// All-memory context: SQLite in memory, canned tutor replies.
    pub fn in_memory(config: AppConfig) -> Result<Self, Box<dyn Error>> {
        let db = Database::in_memory()?.into_shared();
        Ok(Self {
            config,
            kv: Arc::new(MemoryKeyValueStore::new()),
            documents: Arc::new(SqliteDocumentStore::new(db)),
            auth: Arc::new(LocalAuthProvider::new()),
            tutor: TutorService::new(None),
            synthesizer: Arc::new(LoggingSynthesizer),
            recognizer: None,
        })
    }

    pub async fn shutdown(self) {
        if let Some(user) = self.auth.current_user() {
            log::info!("Signing out {} on shutdown", user.email);
            if let Err(err) = self.auth.sign_out().await {
                log::warn!("Sign-out during shutdown failed: {err}");
            }
        }
        log::info!("Context shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_context_round_trips_documents() {
        let ctx = AppContext::in_memory(AppConfig::default()).unwrap();
        let owner = crate::common::UserId::new("u1");
        let message = crate::common::Message::new(
            "Hola".to_string(),
            crate::common::Sender::User,
            "es",
        );

        ctx.documents.save(&owner, &message).await.unwrap();
        let listed = ctx.documents.list(&owner, 10, None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, message.id);
        assert_eq!(listed[0].text, "Hola");
    }

    #[tokio::test]
    async fn shutdown_signs_out_current_user() {
        let ctx = AppContext::in_memory(AppConfig::default()).unwrap();
        let auth = ctx.auth.clone();
        auth.sign_up("ana@example.com", "secreto").await.unwrap();

        ctx.shutdown().await;
        assert!(auth.current_user().is_none());
    }
}
