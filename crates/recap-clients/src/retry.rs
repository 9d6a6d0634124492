//! Linear-backoff retry for transient external-service failures (spec §7
//! TransientExternal: "retried with linear backoff (5s × attempt), bounded
//! by the per-call retry count").

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub operation_name: &'static str,
}

impl RetryConfig {
    pub fn new(operation_name: &'static str) -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
            operation_name,
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Run `operation` until it succeeds, the error is non-retryable, or
/// `config.max_retries` attempts have been made.
pub async fn retry_transient<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, ClientError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let delay = config.delay_for_attempt(attempt);
                debug!(
                    operation = config.operation_name,
                    attempt, ?delay, error = %e, "transient error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_scales_linearly() {
        let config = RetryConfig::new("test");
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            ..RetryConfig::new("test")
        };
        let calls = AtomicU32::new(0);

        let result = retry_transient(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ClientError::Transient {
                        service: "test",
                        message: "boom".into(),
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_retrying_on_fatal_error() {
        let config = RetryConfig::new("test");
        let calls = AtomicU32::new(0);

        let result: Result<(), ClientError> = retry_transient(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ClientError::Fatal {
                    service: "test",
                    message: "nope".into(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
