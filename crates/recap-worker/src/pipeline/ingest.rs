//! S1-S4: set up the job's working directory, download the source video,
//! and prepare it for the understanding service (remux or transcode).

use std::path::{Path, PathBuf};

use recap_media::{decide_pre_upload_strategy, probe_video, transcode_timeout, FfmpegRunner, PreUploadStrategy, VideoInfo};
use recap_models::{Job, JobPatch};
use tracing::info;

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::context::PipelineContext;

/// The source video as prepared for upload: a local path, ready to hand to
/// the understanding client, plus the probed info used throughout the rest
/// of the pipeline (source duration in particular).
pub struct PreparedSource {
    pub upload_path: PathBuf,
    pub info: VideoInfo,
}

/// S1: create the job's scratch directory under the worker's configured
/// work_dir.
pub async fn init_work_dir(ctx: &PipelineContext, job_id: &str) -> WorkerResult<PathBuf> {
    let dir = Path::new(&ctx.config.work_dir).join(job_id);
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}

/// S2-S4: download the source video, probe it, and apply the pre-upload
/// optimization policy.
pub async fn prepare_source(ctx: &PipelineContext, job: &Job, work_dir: &Path) -> WorkerResult<PreparedSource> {
    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(1),
                current_step: Some("Downloading source video".to_string()),
                ..Default::default()
            },
        )
        .await?;

    let downloaded = work_dir.join("source");
    ctx.storage.download_source_video(&job.source_video_key, &downloaded).await?;

    let info = probe_video(&downloaded)
        .await
        .map_err(|e| WorkerError::input_invalid(format!("could not probe source video: {e}")))?;
    if info.duration <= 0.0 {
        return Err(WorkerError::input_invalid("source video has zero or unknown duration"));
    }

    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(5),
                current_step: Some("Preparing video for analysis".to_string()),
                ..Default::default()
            },
        )
        .await?;

    let strategy = decide_pre_upload_strategy(&info);
    let upload_path = match strategy {
        PreUploadStrategy::PassThrough => downloaded,
        PreUploadStrategy::Remux => {
            let output = work_dir.join("remuxed.mp4");
            let cmd = recap_media::remux_command(&downloaded, &output);
            let runner = FfmpegRunner::new().with_timeout(transcode_timeout(info.duration).as_secs());
            runner.run(&cmd).await?;
            output
        }
        PreUploadStrategy::Transcode { target_bitrate_bps } => {
            info!(target_bitrate_bps, "transcoding source video before upload");
            let output = work_dir.join("transcoded.mp4");
            let cmd = recap_media::transcode_command(&downloaded, &output, info.height, target_bitrate_bps);
            let runner = FfmpegRunner::new().with_timeout(transcode_timeout(info.duration).as_secs());
            runner.run(&cmd).await?;
            output
        }
    };

    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(7),
                current_step: Some("Source video ready".to_string()),
                ..Default::default()
            },
        )
        .await?;

    Ok(PreparedSource { upload_path, info })
}
