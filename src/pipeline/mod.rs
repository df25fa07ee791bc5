pub mod error;
pub mod message_pipeline;
pub mod offline_queue;
pub mod persistence;
pub mod rate_limiter;
pub mod sanitizer;
pub mod sink;
pub mod validator;

pub use error::{PersistenceError, PipelineError, ValidationError};
pub use message_pipeline::{MessagePipeline, PipelineSettings, SubmitOutcome};
pub use offline_queue::{DrainReport, OfflineQueue, QueuedMessage};
pub use persistence::{PersistenceClient, RetryPolicy};
pub use rate_limiter::{RateDecision, RateLimiter};
pub use sanitizer::sanitize;
pub use sink::{ChannelSink, MessageSink};
pub use validator::{MAX_MESSAGE_CHARS, validate, validate_sanitized};
