//! S12-S13: build the final scene list (intro + chapter ranges, with the
//! optional clip-matching refinement) and fit it to the target duration.

use recap_models::{Chapter, ChapterScene, INTRO_SCENE_ID, OUTRO_SCENE_ID};
use tracing::{info, warn};

use crate::error::WorkerResult;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::tts_stage::SynthesizedAudio;

const MATCH_CONFIDENCE_THRESHOLD: f64 = 0.40;
const FULL_VIDEO_CONFIDENCE_BONUS: f64 = 0.10;
const MATCH_TOP_K: u32 = 5;
const DURATION_FIT_SLACK: f64 = 1.1;
const SHORTFALL_RATIO: f64 = 0.8;

/// S12: choose each chapter's video range, defaulting to the chapter's own
/// bounds, optionally refined by the clip matcher, then prepend/append the
/// synthetic intro and outro scenes.
pub async fn build_scenes(
    ctx: &PipelineContext,
    video_id: &str,
    job_has_script: bool,
    enable_clip_matching: bool,
    chapters: &[Chapter],
    source_duration: f64,
    audio: &[SynthesizedAudio],
) -> WorkerResult<Vec<ChapterScene>> {
    debug_assert_eq!(audio.len(), chapters.len() + 2, "audio must be [intro, chapters.., outro]");

    let intro_audio = &audio[0];
    let outro_audio = &audio[audio.len() - 1];
    let chapter_audio = &audio[1..audio.len() - 1];

    let mut scenes = Vec::with_capacity(chapters.len() + 2);

    let intro_end = (intro_audio.duration * 1.5).min(15.0);
    scenes.push(ChapterScene {
        id: INTRO_SCENE_ID,
        title: "Intro".to_string(),
        narration: intro_audio.text.clone(),
        audio_path: intro_audio.audio_path.to_string_lossy().to_string(),
        audio_duration: intro_audio.duration,
        video_start: 0.0,
        video_end: intro_end,
    });

    for (idx, (chapter, narrated)) in chapters.iter().zip(chapter_audio.iter()).enumerate() {
        let (video_start, video_end) = if enable_clip_matching && job_has_script {
            match_chapter_range(ctx, video_id, chapter).await
        } else {
            (chapter.start, chapter.end)
        };

        scenes.push(ChapterScene {
            id: (idx + 1) as u32,
            title: chapter.title.clone(),
            narration: narrated.text.clone(),
            audio_path: narrated.audio_path.to_string_lossy().to_string(),
            audio_duration: narrated.duration,
            video_start,
            video_end,
        });
    }

    let outro_start = (source_duration - outro_audio.duration * 1.5).max(0.0);
    scenes.push(ChapterScene {
        id: OUTRO_SCENE_ID,
        title: "Outro".to_string(),
        narration: outro_audio.text.clone(),
        audio_path: outro_audio.audio_path.to_string_lossy().to_string(),
        audio_duration: outro_audio.duration,
        video_start: outro_start,
        video_end: source_duration,
    });

    Ok(scenes)
}

/// Try the clip matcher for one chapter; fall back to the chapter's own
/// range when no match clears the confidence/proximity gate.
async fn match_chapter_range(ctx: &PipelineContext, video_id: &str, chapter: &Chapter) -> (f64, f64) {
    let query = format!("{}: {}", chapter.title, chapter.description);
    let matches = match ctx.vector_store.match_text(video_id, &query, MATCH_TOP_K).await {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "clip matcher call failed, using chapter's own range");
            return (chapter.start, chapter.end);
        }
    };

    let duration = chapter.duration();
    let max_drift = (duration * 2.0).max(120.0);

    for candidate in matches {
        // `scene_id` carrying "full_video" marks a whole-source match, which
        // gets a confidence bonus since it is inherently less precise.
        let threshold = if candidate.scene_id == "full_video" {
            MATCH_CONFIDENCE_THRESHOLD + FULL_VIDEO_CONFIDENCE_BONUS
        } else {
            MATCH_CONFIDENCE_THRESHOLD
        };

        if candidate.score >= threshold && (candidate.start_seconds - chapter.start).abs() <= max_drift {
            return (candidate.start_seconds, candidate.end_seconds);
        }
    }

    (chapter.start, chapter.end)
}

/// S13: if a target duration was requested and the stitched audio would run
/// long, greedily keep chapters (in order) while the running total stays
/// within `target * 1.1`, always keeping at least one. Log (never fail) when
/// the result looks like it will run short.
pub fn fit_to_target_duration(scenes: Vec<ChapterScene>, target_duration_minutes: Option<f64>) -> Vec<ChapterScene> {
    let Some(target_minutes) = target_duration_minutes else {
        return scenes;
    };
    let target_seconds = target_minutes * 60.0;

    let total: f64 = scenes.iter().map(|s| s.audio_duration).sum();
    if total <= target_seconds * DURATION_FIT_SLACK {
        if total < target_seconds * SHORTFALL_RATIO {
            warn!(total, target_seconds, "stitched audio duration is short of the target");
        }
        return scenes;
    }

    let intro = scenes.iter().find(|s| s.is_intro()).cloned();
    let outro = scenes.iter().find(|s| s.is_outro()).cloned();
    let mut chapters: Vec<ChapterScene> = scenes.into_iter().filter(|s| !s.is_intro() && !s.is_outro()).collect();

    let mut kept = Vec::new();
    let mut running = intro.as_ref().map(|s| s.audio_duration).unwrap_or(0.0)
        + outro.as_ref().map(|s| s.audio_duration).unwrap_or(0.0);

    for chapter in chapters.drain(..) {
        if kept.is_empty() || running + chapter.audio_duration <= target_seconds * DURATION_FIT_SLACK {
            running += chapter.audio_duration;
            kept.push(chapter);
        } else {
            break;
        }
    }

    info!(kept = kept.len(), total_seconds = running, "fit scenes to target duration");

    let mut result = Vec::with_capacity(kept.len() + 2);
    if let Some(intro) = intro {
        result.push(intro);
    }
    result.extend(kept);
    if let Some(outro) = outro {
        result.push(outro);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: u32, audio_duration: f64) -> ChapterScene {
        ChapterScene {
            id,
            title: format!("chapter {id}"),
            narration: String::new(),
            audio_path: String::new(),
            audio_duration,
            video_start: 0.0,
            video_end: 1.0,
        }
    }

    #[test]
    fn no_target_duration_leaves_scenes_untouched() {
        let scenes = vec![scene(INTRO_SCENE_ID, 5.0), scene(1, 60.0), scene(OUTRO_SCENE_ID, 5.0)];
        let fitted = fit_to_target_duration(scenes.clone(), None);
        assert_eq!(fitted.len(), scenes.len());
    }

    #[test]
    fn keeps_at_least_one_chapter_when_over_budget() {
        let scenes = vec![scene(INTRO_SCENE_ID, 5.0), scene(1, 600.0), scene(2, 600.0), scene(OUTRO_SCENE_ID, 5.0)];
        let fitted = fit_to_target_duration(scenes, Some(1.0));
        let chapter_count = fitted.iter().filter(|s| !s.is_intro() && !s.is_outro()).count();
        assert_eq!(chapter_count, 1);
    }

    #[test]
    fn keeps_all_chapters_within_slack() {
        let scenes = vec![scene(INTRO_SCENE_ID, 5.0), scene(1, 30.0), scene(2, 30.0), scene(OUTRO_SCENE_ID, 5.0)];
        let fitted = fit_to_target_duration(scenes, Some(2.0));
        assert_eq!(fitted.len(), 4);
    }
}
