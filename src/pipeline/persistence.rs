use std::sync::Arc;
use std::time::Duration;

use crate::common::{Message, UserId};
use crate::storage::{DocumentStore, StoreError};

use super::error::PersistenceError;

/// Exponential backoff: the delay before retry `n` (0-based) is
/// `base_delay * multiplier^n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

/// Upper bound for a single backoff sleep, whatever the configured policy.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

impl RetryPolicy {
    /// Never panics: overflow and NaN clamp to `MAX_RETRY_DELAY`, a negative
    /// product to zero.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if secs.is_nan() {
            return MAX_RETRY_DELAY;
        }
        Duration::try_from_secs_f64(secs.max(0.0))
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

/// Wraps the document store's write with bounded retries.
#[derive(Clone)]
pub struct PersistenceClient {
    store: Arc<dyn DocumentStore>,
    policy: RetryPolicy,
}

impl PersistenceClient {
    pub fn new(store: Arc<dyn DocumentStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// One initial attempt plus up to `max_retries` retries. Returns on the
    /// first success, so a call never writes twice on its own.
    pub async fn save(&self, owner: &UserId, message: &Message) -> Result<(), PersistenceError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match self.store.save(owner, message).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            let retry = attempts - 1;
            if retry >= self.policy.max_retries {
                log::error!(
                    "Giving up on message {} after {attempts} attempts: {err}",
                    message.id
                );
                return Err(PersistenceError { attempts, last: err });
            }

            let delay = self.policy.delay_for(retry);
            log::warn!(
                "Saving message {} failed (attempt {attempts}): {err}; retrying in {delay:?}",
                message.id
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Single attempt, no backoff. Used by the offline queue drain.
    pub async fn try_save(&self, owner: &UserId, message: &Message) -> Result<(), StoreError> {
        self.store.save(owner, message).await
    }
}
