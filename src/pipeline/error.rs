use crate::storage::{KvError, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("message is empty")]
    Empty,
    #[error("message is {length} characters, limit is {max}")]
    TooLong { length: usize, max: usize },
    #[error("unknown sender `{0}`")]
    UnknownSender(String),
}

/// Remote write failed after every retry.
#[derive(Debug, Clone, thiserror::Error)]
#[error("persistence failed after {attempts} attempts: {last}")]
pub struct PersistenceError {
    pub attempts: u32,
    #[source]
    pub last: StoreError,
}

impl PersistenceError {
    pub fn is_connectivity(&self) -> bool {
        self.last.is_connectivity()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
    #[error("rate limit exceeded, retry in {retry_after_ms} ms")]
    RateLimitExceeded { retry_after_ms: i64 },
    #[error(transparent)]
    PersistenceFailed(#[from] PersistenceError),
    #[error("local state error: {0}")]
    LocalState(#[from] KvError),
}
