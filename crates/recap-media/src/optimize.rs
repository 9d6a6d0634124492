//! Pre-upload optimization policy (pipeline stage S4).
//!
//! Decides whether a downloaded source video can be re-muxed with a
//! fast-start flag only, or needs a full transcode before it is handed to
//! the video-understanding service.

use std::time::Duration;

use crate::command::FfmpegCommand;
use crate::probe::VideoInfo;

/// Baseline codec accepted without transcoding.
const SUPPORTED_BASELINE_CODEC: &str = "h264";

const REMUX_MAX_HEIGHT: u32 = 720;
const REMUX_MAX_SIZE_BYTES: u64 = 400 * 1024 * 1024;
const REMUX_MAX_BITRATE_BPS: u64 = 2_500_000;

const MIN_BITRATE_720P_BPS: u64 = 1_200_000;
const MIN_BITRATE_1080P_BPS: u64 = 2_000_000;
const TARGET_MAX_SIZE_BYTES: u64 = 400 * 1024 * 1024;

/// Chosen strategy for preparing a source video before upload.
#[derive(Debug, Clone, PartialEq)]
pub enum PreUploadStrategy {
    /// Stream-copy with a fast-start flag only.
    Remux,
    /// Full re-encode with the given target video bitrate (bits/sec).
    Transcode { target_bitrate_bps: u64 },
    /// File already meets the target profile, nothing to do.
    PassThrough,
}

/// Decide the pre-upload strategy for a probed source video.
///
/// Policy (spec S4):
/// - height <= 720, size <= 400MB, bitrate <= 2500kbps, baseline codec ->
///   remux (fast-start only).
/// - otherwise -> transcode: never downscale below 720p, only downscale if
///   source height > 720, target bitrate aims for <= 400MB output with
///   per-resolution minimums.
pub fn decide_pre_upload_strategy(info: &VideoInfo) -> PreUploadStrategy {
    let is_baseline_codec = info.codec.eq_ignore_ascii_case(SUPPORTED_BASELINE_CODEC);

    if info.height <= REMUX_MAX_HEIGHT
        && info.size <= REMUX_MAX_SIZE_BYTES
        && info.bitrate <= REMUX_MAX_BITRATE_BPS
        && is_baseline_codec
    {
        return PreUploadStrategy::Remux;
    }

    let min_bitrate = if info.height > REMUX_MAX_HEIGHT {
        MIN_BITRATE_1080P_BPS
    } else {
        MIN_BITRATE_720P_BPS
    };

    let target_bitrate_bps = if info.duration > 0.0 {
        let size_driven = (TARGET_MAX_SIZE_BYTES as f64 * 8.0 / info.duration) as u64;
        size_driven.max(min_bitrate)
    } else {
        min_bitrate
    };

    PreUploadStrategy::Transcode { target_bitrate_bps }
}

/// Transcode timeout: clamp(duration * 2 + 600, 900, 7200) seconds.
pub fn transcode_timeout(duration_secs: f64) -> Duration {
    let raw = duration_secs * 2.0 + 600.0;
    Duration::from_secs(raw.clamp(900.0, 7200.0) as u64)
}

/// Build the ffmpeg command for the fast-start-only remux path.
pub fn remux_command(input: &std::path::Path, output: &std::path::Path) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .video_codec("copy")
        .audio_codec("copy")
        .output_arg("-movflags")
        .output_arg("+faststart")
}

/// Build the ffmpeg command for the full transcode path.
///
/// Never downscales below 720p; only downscales when the source height
/// exceeds 720. Forces yuv420p pixel format and a baseline audio codec.
pub fn transcode_command(
    input: &std::path::Path,
    output: &std::path::Path,
    source_height: u32,
    target_bitrate_bps: u64,
) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new(input, output)
        .video_codec("libx264")
        .output_arg("-pix_fmt")
        .output_arg("yuv420p")
        .output_arg("-b:v")
        .output_arg(format!("{}", target_bitrate_bps))
        .audio_codec("aac")
        .output_arg("-movflags")
        .output_arg("+faststart");

    if source_height > REMUX_MAX_HEIGHT {
        cmd = cmd.video_filter(format!("scale=-2:{}", REMUX_MAX_HEIGHT));
    }

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(height: u32, size: u64, bitrate: u64, codec: &str, duration: f64) -> VideoInfo {
        VideoInfo {
            duration,
            height,
            codec: codec.to_string(),
            size,
            bitrate,
        }
    }

    #[test]
    fn remuxes_small_baseline_video() {
        let v = info(720, 300 * 1024 * 1024, 2_000_000, "h264", 600.0);
        assert_eq!(decide_pre_upload_strategy(&v), PreUploadStrategy::Remux);
    }

    #[test]
    fn transcodes_oversized_video() {
        let v = info(1080, 900 * 1024 * 1024, 5_000_000, "hevc", 600.0);
        match decide_pre_upload_strategy(&v) {
            PreUploadStrategy::Transcode { target_bitrate_bps } => {
                assert!(target_bitrate_bps >= MIN_BITRATE_1080P_BPS);
            }
            other => panic!("expected transcode, got {:?}", other),
        }
    }

    #[test]
    fn transcode_respects_720p_floor() {
        let v = info(480, 100 * 1024 * 1024, 5_000_000, "hevc", 6000.0);
        match decide_pre_upload_strategy(&v) {
            PreUploadStrategy::Transcode { target_bitrate_bps } => {
                assert!(target_bitrate_bps >= MIN_BITRATE_720P_BPS);
            }
            other => panic!("expected transcode, got {:?}", other),
        }
    }

    #[test]
    fn timeout_is_clamped() {
        assert_eq!(transcode_timeout(10.0), Duration::from_secs(900));
        assert_eq!(transcode_timeout(10_000.0), Duration::from_secs(7200));
        assert_eq!(transcode_timeout(300.0), Duration::from_secs(1200));
    }
}
