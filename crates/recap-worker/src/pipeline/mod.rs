//! The recap pipeline: S1 through S16, one job at a time.

pub mod chapters;
pub mod characters;
pub mod context;
pub mod finish;
pub mod ingest;
pub mod narration_stage;
pub mod scenes;
pub mod tts_stage;
pub mod understanding;

use recap_models::{Job, JobPatch, JobStatus};
use tracing::error;

use crate::error::WorkerResult;
use crate::logging::JobLogger;
use context::PipelineContext;

/// Drive one job from S1 to S16. Any stage error is caught here, recorded on
/// the job, and swallowed: the caller's job loop moves on to the next job
/// regardless of outcome. The job's working directory is always removed,
/// success or failure.
pub async fn run_job(ctx: &PipelineContext, job: Job) {
    let logger = JobLogger::new(&job.id, "recap_pipeline");
    let job_id = job.id.to_string();
    logger.log_start("pipeline run");

    if let Err(e) = ctx
        .jobs
        .update_job(
            &job.id,
            &JobPatch {
                status: Some(JobStatus::Processing),
                current_step: Some("Starting".to_string()),
                progress: Some(0),
                ..Default::default()
            },
        )
        .await
    {
        logger.log_error(&format!("failed to mark job processing, aborting run: {e}"));
        return;
    }

    let result = run_stages(ctx, &job).await;

    let work_dir = std::path::Path::new(&ctx.config.work_dir).join(&job_id);
    if let Err(e) = result {
        logger.log_error(&format!("pipeline run failed: {e}"));
        finish::mark_failed(ctx, &job, &e).await;
    } else {
        logger.log_completion("pipeline run complete");
    }

    if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            error!(job_id, error = %e, "failed to clean up job working directory");
        }
    }
}

async fn run_stages(ctx: &PipelineContext, job: &Job) -> WorkerResult<()> {
    let work_dir = ingest::init_work_dir(ctx, &job.id.to_string()).await?;
    let source = ingest::prepare_source(ctx, job, &work_dir).await?;

    let parsed = understanding::upload(ctx, job, &source.upload_path).await?;
    let extraction = understanding::extract(ctx, job, &parsed.video_id).await?;
    let mut structured = extraction.structured;

    let normalized_chapters = chapters::normalize_chapters(extraction.chapters, source.info.duration)?;
    let (target_duration, cap_note) = chapters::cap_target_duration(job.target_duration_minutes, source.info.duration);
    if let Some(note) = cap_note {
        tracing::warn!(job_id = %job.id, note, "target duration capped");
    }

    narration_stage::extract_characters(ctx, job, &parsed.video_id, &extraction.transcript, &mut structured).await?;

    let user_script = fetch_user_script(ctx, job).await?;

    let narrations = narration_stage::generate_narration(
        ctx,
        job,
        &normalized_chapters,
        &structured,
        &extraction.transcript,
        user_script.as_deref(),
    )
    .await?;

    let character_guide = job.character_guide.clone().unwrap_or_default();
    let (intro, outro) = narration_stage::generate_intro_outro(ctx, &structured, &character_guide, true).await;

    let synthesized = tts_stage::synthesize_narration(
        ctx,
        job,
        &work_dir,
        &source.upload_path,
        &intro,
        &narrations,
        &outro,
    )
    .await?;

    let built_scenes = scenes::build_scenes(
        ctx,
        &parsed.video_id,
        job.has_script,
        job.enable_clip_matching,
        &normalized_chapters,
        source.info.duration,
        &synthesized,
    )
    .await?;
    let final_scenes = scenes::fit_to_target_duration(built_scenes, target_duration);

    let output_path = finish::stitch(ctx, job, &work_dir, &source.upload_path, &final_scenes).await?;
    finish::finish(ctx, job, &parsed.video_id, &output_path, final_scenes).await?;

    Ok(())
}

/// Fetch the optional user-supplied script from `videos/{job_id}/script.txt`
/// when the job carries the `has_script` flag. An empty or unreadable
/// script is invalid input, not a silent fallback.
async fn fetch_user_script(ctx: &PipelineContext, job: &Job) -> WorkerResult<Option<String>> {
    if !job.has_script {
        return Ok(None);
    }

    let job_id = job.id.to_string();
    let script = ctx.storage.fetch_user_script(&job_id).await?;

    match script {
        Some(text) if !text.trim().is_empty() => Ok(Some(text)),
        _ => Err(crate::error::WorkerError::input_invalid("user script is empty")),
    }
}
