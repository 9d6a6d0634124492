//! Integration tests against a live Redis instance. Ignored by default; run
//! with `cargo test -- --ignored` against a real `REDIS_URL`.

use std::time::Duration;

use recap_state::{webhook, StateStore};
use uuid::Uuid;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

fn job_id() -> String {
    Uuid::new_v4().to_string()
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn bad_token_is_rejected_without_mutating_status() {
    let store = StateStore::new(&redis_url()).expect("failed to build redis client");
    let job_id = job_id();

    webhook::mint_webhook_token(&store, &job_id).await.expect("failed to mint token");

    let rejected = webhook::validate_webhook_token(&store, &job_id, "wrong-token").await;
    assert!(matches!(rejected, Ok(false)));

    let status = webhook::read_webhook_status(&store, &job_id).await.expect("read failed");
    assert!(status.is_none(), "a rejected token must never write the status key");
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn correct_token_validates() {
    let store = StateStore::new(&redis_url()).expect("failed to build redis client");
    let job_id = job_id();

    let token = webhook::mint_webhook_token(&store, &job_id).await.expect("failed to mint token");
    let accepted = webhook::validate_webhook_token(&store, &job_id, &token).await;
    assert!(matches!(accepted, Ok(true)));
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn record_webhook_status_publishes_exactly_once() {
    let store = StateStore::new(&redis_url()).expect("failed to build redis client");
    let job_id = job_id();

    let waiter = {
        let store = store.clone();
        let job_id = job_id.clone();
        tokio::spawn(async move {
            webhook::wait_for_status_change(&store, &job_id, Duration::from_secs(5)).await
        })
    };

    // Give the subscriber a moment to attach before the write races ahead of it.
    tokio::time::sleep(Duration::from_millis(200)).await;
    webhook::record_webhook_status(&store, &job_id, r#"{"status":"PARSE"}"#, Duration::from_secs(60))
        .await
        .expect("failed to record webhook status");

    let first = waiter.await.expect("waiter task panicked").expect("wait failed");
    assert_eq!(first.as_deref(), Some(r#"{"status":"PARSE"}"#));

    // No second publish happened: a fresh wait only sees the status key
    // already written, confirming record_webhook_status published once.
    let second = webhook::wait_for_status_change(&store, &job_id, Duration::from_millis(200))
        .await
        .expect("wait failed");
    assert_eq!(second.as_deref(), Some(r#"{"status":"PARSE"}"#));
}
