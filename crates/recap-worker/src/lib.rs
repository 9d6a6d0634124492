#![deny(unreachable_patterns)]
//! The recap pipeline worker.
//!
//! This crate provides:
//! - Layered configuration
//! - The S1-S16 pipeline stages
//! - Structured job logging
//! - The worker binary's job loop

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use config::RecapConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use pipeline::context::PipelineContext;
