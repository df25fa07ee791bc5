/// Failures of the local key-value state.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("local store lock poisoned")]
    Poisoned,
}

/// Failures of the remote document store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("connectivity lost: {0}")]
    Connectivity(String),
    #[error("write rejected: {0}")]
    Rejected(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("malformed document: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StoreError::Connectivity(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
