//! Webhook token minting/validation and HMAC signature verification for the
//! inbound `memories` callback, plus the wait-protocol status classifier.
//!
//! The HTTP route itself is out of scope; this module is the logic a route
//! handler (or a direct caller in tests) would invoke.

use std::time::Duration;

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::{StateError, StateResult};
use crate::store::StateStore;

type HmacSha256 = Hmac<Sha256>;

const WEBHOOK_TOKEN_TTL: Duration = Duration::from_secs(6 * 60 * 60);

fn webhook_token_key(job_id: &str) -> String {
    format!("memories:webhook_token:{job_id}")
}

fn webhook_status_key(job_id: &str) -> String {
    format!("memories:status:{job_id}")
}

fn webhook_channel(job_id: &str) -> String {
    format!("memories:webhook:{job_id}")
}

/// Outcome of the video-understanding service's processing, as reported by
/// either the webhook callback or the status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// Parsing finished successfully.
    Complete,
    /// Parsing failed; fatal for the job.
    Error,
    /// Still in progress.
    Pending,
}

impl ParseStatus {
    pub fn classify(raw_status: &str) -> Self {
        match raw_status.to_uppercase().as_str() {
            "PARSE" => ParseStatus::Complete,
            "PARSE_ERROR" => ParseStatus::Error,
            _ => ParseStatus::Pending,
        }
    }
}

/// Mint a random 32-byte webhook token for `job_id`, store it with a 6-hour
/// TTL, and return the hex-encoded token to embed in the callback URL.
pub async fn mint_webhook_token(store: &StateStore, job_id: &str) -> StateResult<String> {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    store
        .set_ex(&webhook_token_key(job_id), &token, WEBHOOK_TOKEN_TTL)
        .await?;
    Ok(token)
}

/// Validate a token presented on an inbound webhook request against the
/// minted value for `job_id`.
pub async fn validate_webhook_token(
    store: &StateStore,
    job_id: &str,
    presented_token: &str,
) -> StateResult<bool> {
    match store.get(&webhook_token_key(job_id)).await? {
        Some(expected) => Ok(constant_time_eq(expected.as_bytes(), presented_token.as_bytes())),
        None => Err(StateError::WebhookTokenExpired),
    }
}

/// Verify an HMAC-SHA256 signature over the raw request body. `header_value`
/// may carry an optional `sha256=` prefix before the hex digest.
pub fn verify_signature(secret: &[u8], raw_body: &[u8], header_value: &str) -> bool {
    let digest_hex = header_value.strip_prefix("sha256=").unwrap_or(header_value);
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&expected).is_ok()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Record the webhook handler writes: the status key (with TTL) and the
/// pub/sub notification, in that order, matching the original poll/notify
/// race so a late subscriber still observes the status key.
pub async fn record_webhook_status(
    store: &StateStore,
    job_id: &str,
    status_payload: &str,
    ttl: Duration,
) -> StateResult<()> {
    store
        .set_ex(&webhook_status_key(job_id), status_payload, ttl)
        .await?;
    store.publish(&webhook_channel(job_id), status_payload).await?;
    Ok(())
}

/// Read the catch-up status key directly, used by the wait loop alongside
/// the pub/sub subscription so a message delivered before the subscriber
/// connected is not lost.
pub async fn read_webhook_status(store: &StateStore, job_id: &str) -> StateResult<Option<String>> {
    store.get(&webhook_status_key(job_id)).await
}

pub fn webhook_channel_name(job_id: &str) -> String {
    webhook_channel(job_id)
}

/// Wait up to `tick` for the webhook callback's notification on `job_id`'s
/// channel, checking the catch-up status key first: `record_webhook_status`
/// writes the key before it publishes, so a callback that landed between
/// this call's invocations is already visible there even if the publish
/// itself raced ahead of the subscription.
pub async fn wait_for_status_change(
    store: &StateStore,
    job_id: &str,
    tick: Duration,
) -> StateResult<Option<String>> {
    if let Some(payload) = read_webhook_status(store, job_id).await? {
        return Ok(Some(payload));
    }
    store.wait_for_publish(&webhook_channel_name(job_id), tick).await
}

/// Extract the `status` field out of a webhook/status JSON payload.
pub fn extract_status(payload: &str) -> Option<ParseStatus> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    let status = value.get("status")?.as_str()?;
    Some(ParseStatus::classify(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_parse_statuses() {
        assert_eq!(ParseStatus::classify("PARSE"), ParseStatus::Complete);
        assert_eq!(ParseStatus::classify("parse_error"), ParseStatus::Error);
        assert_eq!(ParseStatus::classify("PROCESSING"), ParseStatus::Pending);
    }

    #[test]
    fn verifies_hmac_signature_with_and_without_prefix() {
        let secret = b"topsecret";
        let body = b"{\"status\":\"PARSE\"}";
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(body);
        let digest = hex::encode(mac.finalize().into_bytes());

        assert!(verify_signature(secret, body, &digest));
        assert!(verify_signature(secret, body, &format!("sha256={digest}")));
        assert!(!verify_signature(secret, body, "deadbeef"));
    }

    #[test]
    fn extracts_status_from_payload() {
        assert_eq!(
            extract_status(r#"{"status":"PARSE"}"#),
            Some(ParseStatus::Complete)
        );
        assert_eq!(extract_status("not json"), None);
    }
}
