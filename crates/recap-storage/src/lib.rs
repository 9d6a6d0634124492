//! S3-compatible blob store adapter for the recap pipeline.
//!
//! This crate provides:
//! - The recap object-store key layout (source/user-script/output) encoded
//!   directly in `R2Client`'s methods
//! - Presigned output URLs, rewritten to a public CDN endpoint

pub mod client;
pub mod error;
pub mod public_url;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use public_url::rewrite_to_public_endpoint;
