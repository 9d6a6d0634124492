//! State store error types.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("atomic update on {key} did not converge after {attempts} attempts")]
    OptimisticLockExhausted { key: String, attempts: u32 },

    #[error("webhook signature mismatch")]
    InvalidWebhookSignature,

    #[error("webhook token not found or expired")]
    WebhookTokenExpired,

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StateError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Redis(_))
    }
}
