//! S9 character extraction dispatch and S10 narration generation.

use recap_models::{Chapter, Job, JobPatch, StructuredMovieData, TranscriptSegment};
use serde::Deserialize;
use tracing::warn;

use crate::error::WorkerResult;
use crate::pipeline::characters::merge_characters;
use crate::pipeline::context::PipelineContext;

const SERIES_CHARACTERS_TTL_SECS: u64 = 30 * 24 * 60 * 60;

fn series_characters_key(series_id: &str) -> String {
    format!("series_characters:{series_id}")
}

/// S9: when clip-matching/character tracking is enabled and the job carries
/// a series id, run AI extraction (over the transcript) and visual
/// extraction (understanding-service search) concurrently, merge with the
/// existing series roster, and persist it with a refreshed TTL.
pub async fn extract_characters(
    ctx: &PipelineContext,
    job: &Job,
    video_id: &str,
    transcript: &[TranscriptSegment],
    structured: &mut StructuredMovieData,
) -> WorkerResult<()> {
    let Some(series_id) = job.series_id.as_deref() else {
        return Ok(());
    };

    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(32),
                current_step: Some("Identifying characters".to_string()),
                ..Default::default()
            },
        )
        .await?;

    let existing = load_series_characters(ctx, series_id).await?;

    let job_id_str = job.id.to_string();
    let ai_future = extract_characters_ai(ctx, transcript, &structured.plot_summary);
    let visual_future = extract_characters_visual(ctx, video_id, &job_id_str);
    let (ai_result, visual_result) = tokio::join!(ai_future, visual_future);

    let mut incoming = Vec::new();
    match ai_result {
        Ok(chars) => incoming.extend(chars),
        Err(e) => warn!(error = %e, "AI character extraction failed, continuing without it"),
    }
    match visual_result {
        Ok(chars) => incoming.extend(chars),
        Err(e) => warn!(error = %e, "visual character extraction failed, continuing without it"),
    }

    let merged = merge_characters(existing, incoming);
    save_series_characters(ctx, series_id, &merged).await?;
    structured.characters = merged;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct CharactersResponse {
    #[serde(default)]
    characters: Vec<recap_models::Character>,
}

async fn extract_characters_ai(
    ctx: &PipelineContext,
    transcript: &[TranscriptSegment],
    plot_summary: &str,
) -> WorkerResult<Vec<recap_models::Character>> {
    let lines: Vec<String> = transcript
        .iter()
        .take(200)
        .map(|seg| format!("{}: {}", seg.speaker.as_deref().unwrap_or("Unknown"), seg.text))
        .collect();

    let prompt = format!(
        "Extract named characters from this transcript and plot summary. Return JSON: \
         {{\"characters\": [...]}}.\n\nPLOT:\n{plot_summary}\n\nTRANSCRIPT:\n{}",
        lines.join("\n")
    );

    let response: CharactersResponse = ctx.llm.generate_json(&prompt).await?;
    Ok(response.characters)
}

async fn extract_characters_visual(
    ctx: &PipelineContext,
    video_id: &str,
    unique_id: &str,
) -> WorkerResult<Vec<recap_models::Character>> {
    let hits = ctx
        .understanding
        .search_video(video_id, "recurring named characters", unique_id, None, None, 20)
        .await?;

    Ok(hits
        .into_iter()
        .filter_map(|hit| {
            let name = hit.text?;
            Some(recap_models::Character {
                id: uuid::Uuid::new_v4().to_string(),
                canonical_name: name,
                aliases: Vec::new(),
                description: String::new(),
                role: recap_models::CharacterRole::Supporting,
                visual_traits: Vec::new(),
                confidence: hit.confidence,
                first_appearance: hit.start_seconds,
                appearances: vec![recap_models::CharacterAppearance {
                    start: hit.start_seconds,
                    end: hit.end_seconds,
                    confidence: hit.confidence,
                    source: recap_models::AppearanceSource::Visual,
                }],
                source_video_no: 0,
            })
        })
        .collect())
}

async fn load_series_characters(ctx: &PipelineContext, series_id: &str) -> WorkerResult<Vec<recap_models::Character>> {
    match ctx.store.get(&series_characters_key(series_id)).await? {
        Some(raw) => Ok(serde_json::from_str(&raw).unwrap_or_default()),
        None => Ok(Vec::new()),
    }
}

async fn save_series_characters(
    ctx: &PipelineContext,
    series_id: &str,
    characters: &[recap_models::Character],
) -> WorkerResult<()> {
    let raw = serde_json::to_string(characters).unwrap_or_default();
    ctx.store
        .set_ex(
            &series_characters_key(series_id),
            &raw,
            std::time::Duration::from_secs(SERIES_CHARACTERS_TTL_SECS),
        )
        .await?;
    Ok(())
}

/// S10: generate narration for every chapter via the user script, the
/// structured-data LLM batch, or the plain fallback batch, then synthesize
/// intro/outro copy.
pub async fn generate_narration(
    ctx: &PipelineContext,
    job: &Job,
    chapters: &[Chapter],
    structured: &StructuredMovieData,
    transcript: &[TranscriptSegment],
    user_script: Option<&str>,
) -> WorkerResult<Vec<String>> {
    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(35),
                current_step: Some("Writing narration".to_string()),
                ..Default::default()
            },
        )
        .await?;

    let durations: Vec<f64> = chapters.iter().map(Chapter::duration).collect();

    let narrations = if let Some(script) = user_script.filter(|s| !s.trim().is_empty()) {
        recap_narration::split_user_script_into_chapters(script, &durations)
    } else if !structured.characters.is_empty() || !structured.scene_bindings.is_empty() {
        let narrations = recap_narration::rewrite_chapters_batch(
            &ctx.llm,
            chapters,
            structured,
            transcript,
            ctx.config.narration_batch_size_structured,
        )
        .await;

        if quality_gate_pass_ratio(&narrations) < 0.30 {
            recap_narration::rewrite_chapters_batch(
                &ctx.llm,
                chapters,
                &StructuredMovieData::default(),
                transcript,
                ctx.config.narration_batch_size_fallback,
            )
            .await
        } else {
            narrations
        }
    } else {
        recap_narration::rewrite_chapters_batch(
            &ctx.llm,
            chapters,
            &StructuredMovieData::default(),
            transcript,
            ctx.config.narration_batch_size_fallback,
        )
        .await
    };

    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(48),
                current_step: Some("Narration complete".to_string()),
                ..Default::default()
            },
        )
        .await?;

    Ok(narrations)
}

/// Fraction of narrations that are both >10 words and free of common
/// meta-language artifacts, used to decide whether to fall through from the
/// structured-data batch to the plain fallback batch.
fn quality_gate_pass_ratio(narrations: &[String]) -> f64 {
    if narrations.is_empty() {
        return 0.0;
    }
    let passing = narrations
        .iter()
        .filter(|n| n.split_whitespace().count() > 10 && !contains_meta_language(n))
        .count();
    passing as f64 / narrations.len() as f64
}

fn contains_meta_language(text: &str) -> bool {
    const BLACKLIST: &[&str] = &["the scene shows", "we see", "the camera", "the video shows"];
    let lower = text.to_lowercase();
    BLACKLIST.iter().any(|p| lower.contains(p))
}

/// Build the intro and outro lines for the final narration track.
pub async fn generate_intro_outro(
    ctx: &PipelineContext,
    structured: &StructuredMovieData,
    character_guide: &str,
    include_cta: bool,
) -> (String, String) {
    let intro = recap_narration::generate_intro(&ctx.llm, &structured.plot_summary, character_guide, &structured.title).await;
    let outro = recap_narration::generate_outro(include_cta);
    (intro, outro)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_gate_flags_meta_language() {
        assert!(contains_meta_language("The scene shows a battle unfolding."));
        assert!(!contains_meta_language("Jon Snow leads the charge north."));
    }

    #[test]
    fn quality_gate_ratio_counts_passing_narrations() {
        let narrations = vec![
            "Jon Snow leads the charge north with his sworn brothers at his side.".to_string(),
            "We see a short clip.".to_string(),
        ];
        let ratio = quality_gate_pass_ratio(&narrations);
        assert!((ratio - 0.5).abs() < 1e-9);
    }
}
