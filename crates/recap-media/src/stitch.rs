//! Elastic stitcher: time-stretches source video ranges to match narration
//! audio durations and muxes the final recap output.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

const MIN_STRETCH_FACTOR: f64 = 0.1;
const MAX_STRETCH_FACTOR: f64 = 10.0;

/// One scene to be stitched: a source video range, its narration audio file,
/// and the duration the video range must be stretched to match.
#[derive(Debug, Clone)]
pub struct StitchScene {
    pub source_video: PathBuf,
    pub video_start: f64,
    pub video_end: f64,
    pub audio_file: PathBuf,
    pub target_duration: f64,
}

impl StitchScene {
    fn source_duration(&self) -> f64 {
        (self.video_end - self.video_start).max(0.001)
    }

    /// Stretch factor = target_duration / source_duration, clamped.
    pub fn stretch_factor(&self) -> f64 {
        (self.target_duration / self.source_duration()).clamp(MIN_STRETCH_FACTOR, MAX_STRETCH_FACTOR)
    }
}

/// Stitches an ordered list of scenes into a single mp4.
pub struct ElasticStitcher {
    work_dir: PathBuf,
    timeout_secs: u64,
}

impl ElasticStitcher {
    pub fn new(work_dir: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            work_dir: work_dir.into(),
            timeout_secs,
        }
    }

    /// Produce the final stitched mp4 at `output_path`.
    pub async fn stitch(&self, scenes: &[StitchScene], output_path: &Path) -> MediaResult<()> {
        if scenes.is_empty() {
            return Err(MediaError::Internal("no scenes to stitch".into()));
        }

        fs::create_dir_all(&self.work_dir).await?;

        let mut video_segments = Vec::with_capacity(scenes.len());
        for (idx, scene) in scenes.iter().enumerate() {
            self.assert_exists_nonempty(&scene.source_video).await?;
            self.assert_exists_nonempty(&scene.audio_file).await?;

            let segment_path = self.work_dir.join(format!("video_{idx:03}.mp4"));
            self.stretch_segment(scene, &segment_path).await?;
            self.assert_exists_nonempty(&segment_path).await?;
            video_segments.push(segment_path);
        }

        let concat_video = self.work_dir.join("concat_video.mp4");
        self.concat_videos(&video_segments, &concat_video).await?;

        let concat_audio = self.work_dir.join("concat_audio.m4a");
        let audio_files: Vec<PathBuf> = scenes.iter().map(|s| s.audio_file.clone()).collect();
        self.concat_audio(&audio_files, &concat_audio).await?;

        self.mux_final(&concat_video, &concat_audio, output_path).await?;
        self.assert_exists_nonempty(output_path).await?;

        info!(scenes = scenes.len(), "elastic stitch complete");
        Ok(())
    }

    async fn assert_exists_nonempty(&self, path: &Path) -> MediaResult<()> {
        let meta = fs::metadata(path)
            .await
            .map_err(|_| MediaError::MissingOutput(path.to_path_buf()))?;
        if meta.len() == 0 {
            return Err(MediaError::MissingOutput(path.to_path_buf()));
        }
        Ok(())
    }

    /// Re-encode a single source range, time-stretched to its target duration.
    async fn stretch_segment(&self, scene: &StitchScene, output: &Path) -> MediaResult<()> {
        let factor = scene.stretch_factor();
        debug!(factor, "stretching scene segment");

        // setpts stretches presentation timestamps: factor > 1 slows down,
        // factor < 1 speeds up.
        let pts_filter = format!("setpts={:.6}*PTS", factor);

        let cmd = FfmpegCommand::new(&scene.source_video, output)
            .seek(scene.video_start)
            .duration(scene.source_duration())
            .video_filter(pts_filter)
            .video_codec("libx264")
            .crf(20)
            .preset("fast")
            .output_arg("-an");

        let runner = FfmpegRunner::new().with_timeout(self.timeout_secs);
        runner.run(&cmd).await
    }

    async fn concat_videos(&self, segments: &[PathBuf], output: &Path) -> MediaResult<()> {
        let list_path = self.work_dir.join("video_concat_list.txt");
        self.write_concat_list(segments, &list_path).await?;

        let cmd = FfmpegCommand::new(&list_path, output)
            .input_arg("-f")
            .input_arg("concat")
            .input_arg("-safe")
            .input_arg("0")
            .video_codec("libx264")
            .crf(20)
            .preset("fast")
            .output_arg("-an");

        let runner = FfmpegRunner::new().with_timeout(self.timeout_secs);
        runner.run(&cmd).await
    }

    async fn concat_audio(&self, audio_files: &[PathBuf], output: &Path) -> MediaResult<()> {
        let list_path = self.work_dir.join("audio_concat_list.txt");
        self.write_concat_list(audio_files, &list_path).await?;

        let cmd = FfmpegCommand::new(&list_path, output)
            .input_arg("-f")
            .input_arg("concat")
            .input_arg("-safe")
            .input_arg("0")
            .audio_codec("aac")
            .output_arg("-vn");

        let runner = FfmpegRunner::new().with_timeout(self.timeout_secs);
        runner.run(&cmd).await
    }

    async fn mux_final(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(video, output)
            .input_arg("-i")
            .input_arg(audio.to_string_lossy().to_string())
            .video_codec("copy")
            .audio_codec("copy")
            .output_arg("-shortest")
            .output_arg("-movflags")
            .output_arg("+faststart");

        let runner = FfmpegRunner::new().with_timeout(self.timeout_secs);
        runner.run(&cmd).await
    }

    async fn write_concat_list(&self, files: &[PathBuf], list_path: &Path) -> MediaResult<()> {
        let mut body = String::new();
        for f in files {
            body.push_str(&format!("file '{}'\n", f.display()));
        }
        fs::write(list_path, body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretch_factor_clamped() {
        let scene = StitchScene {
            source_video: PathBuf::from("x.mp4"),
            video_start: 0.0,
            video_end: 1.0,
            audio_file: PathBuf::from("a.mp3"),
            target_duration: 100.0,
        };
        assert_eq!(scene.stretch_factor(), MAX_STRETCH_FACTOR);

        let scene = StitchScene {
            target_duration: 0.01,
            ..scene
        };
        assert_eq!(scene.stretch_factor(), MIN_STRETCH_FACTOR);
    }

    #[test]
    fn stretch_factor_ordinary_case() {
        let scene = StitchScene {
            source_video: PathBuf::from("x.mp4"),
            video_start: 10.0,
            video_end: 20.0,
            audio_file: PathBuf::from("a.mp3"),
            target_duration: 15.0,
        };
        assert!((scene.stretch_factor() - 1.5).abs() < 1e-9);
    }
}
