//! S5-S7: upload to the video-understanding service, wait for parsing, and
//! run the unified extraction plus the chapters/transcript fetch.

use std::path::Path;
use std::time::Duration;

use recap_clients::retry::{retry_transient, RetryConfig};
use recap_models::{Chapter, Job, JobPatch, StructuredMovieData, TranscriptSegment};
use recap_state::webhook::{self, ParseStatus};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::context::PipelineContext;

const POLL_INTERVAL: Duration = Duration::from_secs(10);
const WEBHOOK_TICK: Duration = Duration::from_secs(2);

pub struct ParsedVideo {
    pub video_id: String,
}

/// S5: upload the prepared file, registering a webhook callback when one is
/// configured, otherwise falling back to polling mode.
pub async fn upload(ctx: &PipelineContext, job: &Job, upload_path: &Path) -> WorkerResult<ParsedVideo> {
    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(10),
                current_step: Some("Uploading to understanding service".to_string()),
                ..Default::default()
            },
        )
        .await?;

    let unique_id = job.id.to_string();
    let callback_url = if ctx.config.webhook_enabled() {
        let token = webhook::mint_webhook_token(&ctx.store, &unique_id).await?;
        let base = ctx.config.webhook_base_url.as_deref().unwrap_or_default();
        Some(format!("{base}?job_id={unique_id}&token={token}"))
    } else {
        None
    };

    let result = ctx
        .understanding
        .upload_video(upload_path, &unique_id, callback_url.as_deref())
        .await?;

    wait_for_parsing(ctx, job, &result.video_id, &unique_id).await?;

    Ok(ParsedVideo { video_id: result.video_id })
}

/// S6: wait for the understanding service to finish parsing, either via the
/// webhook pub/sub + status-key race or by polling.
async fn wait_for_parsing(ctx: &PipelineContext, job: &Job, video_id: &str, unique_id: &str) -> WorkerResult<()> {
    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(15),
                current_step: Some("Waiting for video analysis".to_string()),
                ..Default::default()
            },
        )
        .await?;

    let deadline = tokio::time::Instant::now() + ctx.config.wait_for_parsing_timeout;

    if ctx.config.webhook_enabled() {
        wait_via_webhook(ctx, unique_id, deadline).await?;
    } else {
        wait_via_polling(ctx, video_id, unique_id, deadline).await?;
    }

    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(20),
                current_step: Some("Video analysis complete".to_string()),
                ..Default::default()
            },
        )
        .await?;

    Ok(())
}

/// Wait on the webhook pub/sub channel, re-checking the catch-up status key
/// on every tick so a callback delivered before this call subscribed is
/// never lost. Each tick blocks for up to `WEBHOOK_TICK`, so the deadline
/// check below still runs roughly that often even under a live callback.
async fn wait_via_webhook(ctx: &PipelineContext, job_id: &str, deadline: tokio::time::Instant) -> WorkerResult<()> {
    loop {
        if let Some(payload) = webhook::wait_for_status_change(&ctx.store, job_id, WEBHOOK_TICK).await? {
            if let Some(status) = webhook::extract_status(&payload) {
                match status {
                    ParseStatus::Complete => return Ok(()),
                    ParseStatus::Error => {
                        return Err(WorkerError::job_failed("video-understanding service reported a parse error"))
                    }
                    ParseStatus::Pending => {}
                }
            }
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(WorkerError::job_failed("timed out waiting for video parsing (webhook mode)"));
        }
    }
}

async fn wait_via_polling(
    ctx: &PipelineContext,
    video_id: &str,
    unique_id: &str,
    deadline: tokio::time::Instant,
) -> WorkerResult<()> {
    let mut last_status = None;
    loop {
        let poll_result = retry_transient(&RetryConfig::new("understanding_status_poll"), || {
            ctx.understanding.get_video_status(video_id, unique_id)
        })
        .await;

        match poll_result {
            Ok((status, cause)) => {
                let status = webhook_status_from_client(status);
                if Some(status) != last_status {
                    info!(video_id, ?status, "video parsing status changed");
                    last_status = Some(status);
                }
                match status {
                    ParseStatus::Complete => return Ok(()),
                    ParseStatus::Error => {
                        return Err(WorkerError::job_failed(
                            cause.unwrap_or_else(|| "video-understanding service reported a parse error".to_string()),
                        ))
                    }
                    ParseStatus::Pending => {}
                }
            }
            Err(e) => warn!(error = %e, "status poll failed, will retry"),
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(WorkerError::job_failed("timed out waiting for video parsing (polling mode)"));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn webhook_status_from_client(status: recap_clients::VideoStatus) -> ParseStatus {
    match status {
        recap_clients::VideoStatus::Parsed => ParseStatus::Complete,
        recap_clients::VideoStatus::ParseError => ParseStatus::Error,
        recap_clients::VideoStatus::Unparsed => ParseStatus::Pending,
    }
}

#[derive(Debug, Deserialize)]
struct ChaptersResponse {
    #[serde(default)]
    chapters: Vec<Chapter>,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

/// Everything S7 gathers: the unified structured extraction plus the raw
/// chapter boundaries and the speaker-mapped transcript.
pub struct ExtractionResult {
    pub structured: StructuredMovieData,
    pub chapters: Vec<Chapter>,
    pub transcript: Vec<TranscriptSegment>,
}

/// S7: single unified extraction call, plus the chapters and transcript
/// fetch launched concurrently. A failed transcript fetch yields an empty
/// fallback (narration still works from plot context); a failed chapters
/// fetch is fatal since there is nothing to normalize in S8.
pub async fn extract(ctx: &PipelineContext, job: &Job, video_id: &str) -> WorkerResult<ExtractionResult> {
    let unique_id = job.id.to_string();

    let video_id_hint = format!("video_id={video_id}");
    let structured_future = ctx
        .understanding
        .extract_structured_movie_data::<StructuredMovieData>(&ctx.llm, &video_id_hint);
    let chapters_future = fetch_chapters(ctx, video_id, &unique_id);
    let transcript_future = fetch_transcript(ctx, video_id, &unique_id);

    let (structured, chapters, transcript) = tokio::join!(structured_future, chapters_future, transcript_future);

    let structured = structured.map_err(|e| WorkerError::job_failed(format!("unified extraction failed: {e}")))?;
    let chapters = chapters.map_err(|e| WorkerError::job_failed(format!("chapters fetch failed: {e}")))?;
    let transcript = transcript.unwrap_or_else(|e| {
        warn!(error = %e, "transcript fetch failed, continuing with an empty transcript");
        Vec::new()
    });

    let transcript = apply_speaker_mapping(transcript, &structured.speaker_mapping);

    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(25),
                current_step: Some("Extracted story structure".to_string()),
                ..Default::default()
            },
        )
        .await?;

    Ok(ExtractionResult {
        structured,
        chapters,
        transcript,
    })
}

async fn fetch_chapters(ctx: &PipelineContext, video_id: &str, unique_id: &str) -> WorkerResult<Vec<Chapter>> {
    let hits = ctx
        .understanding
        .search_video(video_id, "chapter boundaries and scene breaks", unique_id, None, None, 50)
        .await?;

    if !hits.is_empty() {
        return Ok(hits
            .into_iter()
            .filter_map(|hit| {
                hit.text.map(|title| Chapter {
                    start: hit.start_seconds,
                    end: hit.end_seconds,
                    title,
                    description: String::new(),
                })
            })
            .collect());
    }

    let prompt = format!("Identify chapter boundaries for video {video_id}. Return JSON: {{\"chapters\": [...]}}");
    let response: ChaptersResponse = ctx.llm.generate_json(&prompt).await?;
    Ok(response.chapters)
}

async fn fetch_transcript(ctx: &PipelineContext, video_id: &str, unique_id: &str) -> WorkerResult<Vec<TranscriptSegment>> {
    let prompt = format!(
        "Return the full dialogue transcript for video {video_id} as JSON: {{\"segments\": [...]}}. unique_id={unique_id}"
    );
    let response: TranscriptResponse = ctx.llm.generate_json(&prompt).await?;
    Ok(response.segments)
}

fn apply_speaker_mapping(
    mut segments: Vec<TranscriptSegment>,
    mapping: &std::collections::HashMap<String, String>,
) -> Vec<TranscriptSegment> {
    for segment in &mut segments {
        if let Some(generic) = &segment.speaker {
            if let Some(canonical) = mapping.get(generic) {
                segment.speaker = Some(canonical.clone());
            }
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_mapping_rewrites_known_labels() {
        let mut mapping = std::collections::HashMap::new();
        mapping.insert("Speaker 1".to_string(), "Jon Snow".to_string());

        let segments = vec![TranscriptSegment {
            start: 0.0,
            end: 1.0,
            speaker: Some("Speaker 1".to_string()),
            text: "Winter is coming.".to_string(),
        }];

        let mapped = apply_speaker_mapping(segments, &mapping);
        assert_eq!(mapped[0].speaker.as_deref(), Some("Jon Snow"));
    }

    #[test]
    fn speaker_mapping_leaves_unknown_labels_untouched() {
        let mapping = std::collections::HashMap::new();
        let segments = vec![TranscriptSegment {
            start: 0.0,
            end: 1.0,
            speaker: Some("Speaker 9".to_string()),
            text: "Hi.".to_string(),
        }];
        let mapped = apply_speaker_mapping(segments, &mapping);
        assert_eq!(mapped[0].speaker.as_deref(), Some("Speaker 9"));
    }
}
