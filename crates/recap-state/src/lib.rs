//! Redis-backed state store adapter and job manager for the recap pipeline.
//!
//! This crate provides:
//! - A generic key/TTL, list-queue, and pub/sub adapter over Redis
//! - The WATCH/MULTI/EXEC atomic update protocol jobs are mutated through
//! - The Job Manager built on top of that protocol
//! - Webhook token minting/validation and HMAC signature verification for
//!   the video-understanding service's callback

pub mod error;
pub mod jobs;
pub mod store;
pub mod webhook;

pub use error::{StateError, StateResult};
pub use jobs::JobManager;
pub use store::{StateStore, DEFAULT_MAX_RETRIES};
pub use webhook::{
    extract_status, mint_webhook_token, read_webhook_status, record_webhook_status, validate_webhook_token,
    verify_signature, wait_for_status_change, webhook_channel_name, ParseStatus,
};
