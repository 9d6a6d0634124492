//! Client error taxonomy shared by the understanding, LLM, and TTS clients.
//!
//! Mirrors the error kinds of spec §7: transient errors carry enough
//! information for the worker's retry loop to apply linear backoff,
//! fatal errors propagate directly to the top-level handler.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transient error calling {service}: {message}")]
    Transient { service: &'static str, message: String },

    #[error("fatal error from {service}: {message}")]
    Fatal { service: &'static str, message: String },

    #[error("request to {service} timed out after {timeout_secs}s")]
    Timeout { service: &'static str, timeout_secs: u64 },

    #[error("failed to parse {service} response: {message}")]
    ParseFailure { service: &'static str, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transient { .. } | ClientError::Timeout { .. })
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Classify a non-2xx HTTP status / transport error message per spec §7's
/// TransientExternal rule: network errors, 5xx/429, or a body containing
/// "busy"/"network"/"try again" are transient; everything else is fatal.
pub fn classify_http_error(service: &'static str, status: Option<u16>, body: &str) -> ClientError {
    let body_lower = body.to_lowercase();
    let transient_phrase = ["busy", "network", "try again"]
        .iter()
        .any(|p| body_lower.contains(p));

    let is_transient = match status {
        None => true,
        Some(code) => code == 429 || (500..600).contains(&code) || transient_phrase,
    };

    if is_transient {
        ClientError::Transient {
            service,
            message: body.to_string(),
        }
    } else {
        ClientError::Fatal {
            service,
            message: body.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_5xx_as_transient() {
        let e = classify_http_error("understanding", Some(503), "server error");
        assert!(e.is_retryable());
    }

    #[test]
    fn classifies_4xx_as_fatal() {
        let e = classify_http_error("understanding", Some(404), "not found");
        assert!(!e.is_retryable());
    }

    #[test]
    fn classifies_busy_phrase_as_transient_regardless_of_status() {
        let e = classify_http_error("tts", Some(200), "service is busy, try again later");
        assert!(e.is_retryable());
    }
}
