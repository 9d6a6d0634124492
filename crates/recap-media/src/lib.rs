#![deny(unreachable_patterns)]
//! FFmpeg/FFprobe CLI wrapper for the recap pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a timeout-enforcing runner
//! - Duration/codec probing via ffprobe
//! - The pre-upload optimization policy (remux vs transcode)
//! - The elastic stitcher that drives the final recap mux

pub mod command;
pub mod error;
pub mod optimize;
pub mod probe;
pub mod stitch;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use optimize::{
    decide_pre_upload_strategy, remux_command, transcode_command, transcode_timeout, PreUploadStrategy,
};
pub use probe::{probe_video, VideoInfo};
pub use stitch::{ElasticStitcher, StitchScene};
