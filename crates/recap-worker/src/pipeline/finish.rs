//! S14-S16: stitch the final scenes, upload the output and script, and mark
//! the job complete.

use std::path::Path;

use recap_media::{ElasticStitcher, StitchScene};
use recap_models::{ChapterScene, Job, JobPatch};
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::context::PipelineContext;

/// S14: invoke the elastic stitcher over the final scene list. The
/// copyright-protection variant is out of scope here; the core just logs
/// that it was requested and delegates to the same stitcher.
pub async fn stitch(
    ctx: &PipelineContext,
    job: &Job,
    work_dir: &Path,
    source_video: &Path,
    scenes: &[ChapterScene],
) -> WorkerResult<std::path::PathBuf> {
    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(70),
                current_step: Some("Stitching final video".to_string()),
                total_scenes: Some(scenes.len() as u32),
                ..Default::default()
            },
        )
        .await?;

    if job.enable_copyright_protection {
        info!(job_id = %job.id, "copyright-protection stitch requested, delegating to standard stitcher");
    }

    let stitch_scenes: Vec<StitchScene> = scenes
        .iter()
        .map(|scene| StitchScene {
            source_video: source_video.to_path_buf(),
            video_start: scene.video_start,
            video_end: scene.video_end,
            audio_file: std::path::PathBuf::from(&scene.audio_path),
            target_duration: scene.audio_duration,
        })
        .collect();

    let output_path = work_dir.join("output.mp4");
    let stitcher = ElasticStitcher::new(work_dir.join("stitch"), ctx.config.stitch_timeout.as_secs());
    stitcher.stitch(&stitch_scenes, &output_path).await?;

    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(90),
                current_step: Some("Stitch complete".to_string()),
                ..Default::default()
            },
        )
        .await?;

    Ok(output_path)
}

/// S15-S16: upload the rendered video and the narration script, presign a
/// download URL, mark the job complete, and best-effort delete the uploaded
/// source from the understanding service.
pub async fn finish(
    ctx: &PipelineContext,
    job: &Job,
    video_id: &str,
    output_path: &Path,
    scenes: Vec<ChapterScene>,
) -> WorkerResult<()> {
    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(90),
                current_step: Some("Uploading output".to_string()),
                ..Default::default()
            },
        )
        .await?;

    let job_id = job.id.to_string();
    let script = scenes
        .iter()
        .map(|s| s.narration.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    ctx.storage.upload_recap_output(&job_id, output_path, &script).await?;
    let output_url = ctx.storage.presign_recap_output(&job_id).await?;

    let total_scenes = scenes.len() as u32;
    ctx.jobs
        .complete_job_if_not_failed(
            &job.id,
            Some(output_url),
            Some(scenes),
            100,
            "Recap complete",
            Some(total_scenes),
        )
        .await?;

    ctx.understanding.delete_video(video_id, &job_id).await;

    Ok(())
}

/// Wraps any pipeline error into a job failure, per the spec's single
/// top-level error handler. Always returns `Ok` since the job record itself
/// is now the authoritative failure signal.
pub async fn mark_failed(ctx: &PipelineContext, job: &Job, error: &WorkerError) {
    let message = error.sanitized_message();
    if let Err(e) = ctx.jobs.fail_job_if_not_completed(&job.id, message.clone(), "Failed").await {
        warn!(job_id = %job.id, error = %e, original_error = %message, "failed to record job failure");
    }
}

