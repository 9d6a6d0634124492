//! S11: synthesize narration audio in parallel batches, splicing in
//! original-audio clips where a chapter's narration carried a marker.

use std::path::{Path, PathBuf};
use std::time::Duration;

use recap_media::{FfmpegCommand, FfmpegRunner};
use recap_models::{parse_original_audio_marker, Job, JobPatch, OriginalAudioMarker};
use tokio::fs;
use tracing::warn;

use crate::error::WorkerResult;
use crate::pipeline::context::PipelineContext;

const BATCH_GAP: Duration = Duration::from_secs(1);
const PLACEHOLDER_SECONDS: f64 = 0.5;

/// One synthesized item: the narration text with its marker stripped, the
/// audio file on disk, and that file's final duration (post marker-concat).
pub struct SynthesizedAudio {
    pub text: String,
    pub audio_path: PathBuf,
    pub duration: f64,
}

/// S11: build the ordered intro/chapters/outro list, run TTS in batches of
/// `ctx.config.tts_batch_size` with a gap between batches, and concatenate
/// original-audio clips for any chapter that carried a marker.
pub async fn synthesize_narration(
    ctx: &PipelineContext,
    job: &Job,
    work_dir: &Path,
    source_video: &Path,
    intro: &str,
    chapter_narrations: &[String],
    outro: &str,
) -> WorkerResult<Vec<SynthesizedAudio>> {
    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(50),
                current_step: Some("Synthesizing narration audio".to_string()),
                ..Default::default()
            },
        )
        .await?;

    let mut items: Vec<String> = Vec::with_capacity(chapter_narrations.len() + 2);
    items.push(intro.to_string());
    items.extend(chapter_narrations.iter().cloned());
    items.push(outro.to_string());

    let audio_dir = work_dir.join("narration_audio");
    fs::create_dir_all(&audio_dir).await?;

    let batch_size = ctx.config.tts_batch_size.max(1);
    let mut results: Vec<SynthesizedAudio> = Vec::with_capacity(items.len());

    for (batch_idx, batch) in items.chunks(batch_size).enumerate() {
        if batch_idx > 0 {
            tokio::time::sleep(BATCH_GAP).await;
        }

        let offset = batch_idx * batch_size;
        let futures = batch
            .iter()
            .enumerate()
            .map(|(i, text)| synthesize_item(ctx, &audio_dir, source_video, offset + i, text));
        let batch_results = futures::future::join_all(futures).await;
        results.extend(batch_results);
    }

    ctx.jobs
        .update_job(
            &job.id,
            &JobPatch {
                progress: Some(65),
                current_step: Some("Narration audio ready".to_string()),
                ..Default::default()
            },
        )
        .await?;

    Ok(results)
}

async fn synthesize_item(
    ctx: &PipelineContext,
    audio_dir: &Path,
    source_video: &Path,
    index: usize,
    narration: &str,
) -> SynthesizedAudio {
    let (clean_text, marker) = parse_original_audio_marker(narration);
    let tts_path = audio_dir.join(format!("tts_{index:03}.mp3"));

    let tts_result = ctx.tts.generate_speech_with_timestamps(&clean_text, &tts_path, None).await;

    let (audio_path, duration) = match tts_result {
        Ok(result) => {
            let duration = match result.alignment_duration_seconds {
                Some(d) => d,
                None => recap_media::probe_video(&result.audio_path)
                    .await
                    .map(|info| info.duration)
                    .unwrap_or(PLACEHOLDER_SECONDS),
            };
            (result.audio_path, duration)
        }
        Err(e) => {
            warn!(error = %e, index, "TTS synthesis failed, using silent placeholder");
            let placeholder = audio_dir.join(format!("placeholder_{index:03}.mp3"));
            match make_silent_placeholder(&placeholder).await {
                Ok(()) => (placeholder, PLACEHOLDER_SECONDS),
                Err(e) => {
                    warn!(error = %e, index, "failed to render silent placeholder");
                    (placeholder, PLACEHOLDER_SECONDS)
                }
            }
        }
    };

    match marker {
        Some(marker) => match splice_original_audio(audio_dir, index, &audio_path, source_video, &marker).await {
            Ok((combined_path, combined_duration)) => SynthesizedAudio {
                text: clean_text,
                audio_path: combined_path,
                duration: combined_duration,
            },
            Err(e) => {
                warn!(error = %e, index, "original-audio splice failed, using narration audio alone");
                SynthesizedAudio {
                    text: clean_text,
                    audio_path,
                    duration,
                }
            }
        },
        None => SynthesizedAudio {
            text: clean_text,
            audio_path,
            duration,
        },
    }
}

/// Extract `[marker.start, marker.end]` from the source video's audio and
/// concatenate it after the narration track, per SC6.
async fn splice_original_audio(
    audio_dir: &Path,
    index: usize,
    narration_audio: &Path,
    source_video: &Path,
    marker: &OriginalAudioMarker,
) -> WorkerResult<(PathBuf, f64)> {
    let clip_path = audio_dir.join(format!("original_{index:03}.m4a"));
    let clip_cmd = FfmpegCommand::new(source_video, &clip_path)
        .seek(marker.start)
        .duration((marker.end - marker.start).max(0.0))
        .audio_codec("aac")
        .output_arg("-vn");
    FfmpegRunner::new().run(&clip_cmd).await?;

    let list_path = audio_dir.join(format!("concat_{index:03}.txt"));
    let list_body = format!("file '{}'\nfile '{}'\n", narration_audio.display(), clip_path.display());
    fs::write(&list_path, list_body).await?;

    let combined_path = audio_dir.join(format!("combined_{index:03}.m4a"));
    let concat_cmd = FfmpegCommand::new(&list_path, &combined_path)
        .input_arg("-f")
        .input_arg("concat")
        .input_arg("-safe")
        .input_arg("0")
        .audio_codec("aac")
        .output_arg("-vn");
    FfmpegRunner::new().run(&concat_cmd).await?;

    let info = recap_media::probe_video(&combined_path).await?;
    Ok((combined_path, info.duration))
}

async fn make_silent_placeholder(output: &Path) -> WorkerResult<()> {
    let cmd = FfmpegCommand::new(
        format!("anullsrc=r=44100:cl=mono:d={PLACEHOLDER_SECONDS}"),
        output,
    )
    .input_arg("-f")
    .input_arg("lavfi")
    .audio_codec("libmp3lame")
    .output_arg("-q:a")
    .output_arg("9");
    FfmpegRunner::new().run(&cmd).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_stripped_text_has_no_bracket_tag() {
        let (text, marker) = parse_original_audio_marker("Hello there. [ORIGINAL_AUDIO:10.0:12.0:Ada]");
        assert_eq!(text, "Hello there.");
        assert!(marker.is_some());
    }

    #[test]
    fn plain_narration_has_no_marker() {
        let (text, marker) = parse_original_audio_marker("Just narration, no tags here.");
        assert_eq!(text, "Just narration, no tags here.");
        assert!(marker.is_none());
    }
}
