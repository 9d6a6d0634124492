//! Worker error types and the top-level failure classification.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("job failed: {0}")]
    JobFailed(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("input invalid: {0}")]
    InputInvalid(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("configuration build error: {0}")]
    ConfigBuild(#[from] config::ConfigError),

    #[error("state store error: {0}")]
    State(#[from] recap_state::StateError),

    #[error("storage error: {0}")]
    Storage(#[from] recap_storage::StorageError),

    #[error("media error: {0}")]
    Media(#[from] recap_media::MediaError),

    #[error("external client error: {0}")]
    Client(#[from] recap_clients::ClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn input_invalid(msg: impl Into<String>) -> Self {
        Self::InputInvalid(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Sanitize an error message for storage on the job record: collapse to
    /// a single line and cap length so a runaway stderr tail never blows up
    /// the job payload.
    pub fn sanitized_message(&self) -> String {
        let raw = self.to_string().replace('\n', " ");
        if raw.len() > 500 {
            format!("{}...", &raw[..500])
        } else {
            raw
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_message_caps_length() {
        let err = WorkerError::job_failed("x".repeat(1000));
        assert!(err.sanitized_message().len() <= 503);
    }

    #[test]
    fn sanitized_message_collapses_newlines() {
        let err = WorkerError::job_failed("line one\nline two");
        assert!(!err.sanitized_message().contains('\n'));
    }
}
