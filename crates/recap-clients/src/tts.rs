//! Text-to-speech client: synthesizes narration audio with word-level
//! timing, writing the result to a file on disk so the pipeline worker can
//! hand it straight to the stitcher.

use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{classify_http_error, ClientError, ClientResult};

const TURBO_MODEL: &str = "eleven_turbo_v2_5";

/// Word-level timing from the TTS alignment data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordAlignment {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
}

/// Result of a speech synthesis call.
#[derive(Debug, Clone)]
pub struct TtsResult {
    pub audio_path: PathBuf,
    /// Alignment-derived duration when available, else the caller should
    /// probe the written file (probing is `recap_media`'s concern).
    pub alignment_duration_seconds: Option<f64>,
    pub alignments: Vec<WordAlignment>,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f64,
    similarity_boost: f64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Deserialize)]
struct TimestampsResponse {
    audio_base64: String,
    alignment: Option<Alignment>,
}

#[derive(Debug, Deserialize)]
struct Alignment {
    #[serde(default)]
    characters: Vec<String>,
    #[serde(default)]
    character_start_times_seconds: Vec<f64>,
    #[serde(default)]
    character_end_times_seconds: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    voices: Vec<VoiceEntry>,
}

#[derive(Debug, Deserialize)]
struct VoiceEntry {
    voice_id: String,
    name: String,
}

pub struct TtsClient {
    api_key: String,
    base_url: String,
    default_voice_id: String,
    client: reqwest::Client,
}

impl TtsClient {
    pub fn new(api_key: impl Into<String>, default_voice_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.elevenlabs.io/v1".to_string(),
            default_voice_id: default_voice_id.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Synthesize `text` with word-level timestamps, writing the mp3 to
    /// `output_path`. Times out per spec §5 (60 s).
    pub async fn generate_speech_with_timestamps(
        &self,
        text: &str,
        output_path: &Path,
        voice_id: Option<&str>,
    ) -> ClientResult<TtsResult> {
        let voice = voice_id.unwrap_or(&self.default_voice_id);
        let url = format!("{}/text-to-speech/{voice}/with-timestamps", self.base_url);

        let request = SpeechRequest {
            text,
            model_id: TURBO_MODEL,
            voice_settings: VoiceSettings::default(),
        };

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(60),
            self.client
                .post(&url)
                .header("xi-api-key", &self.api_key)
                .header("Accept", "application/json")
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| ClientError::Timeout {
            service: "tts",
            timeout_secs: 60,
        })??;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error("tts", Some(status), &body));
        }

        let parsed: TimestampsResponse = response.json().await.map_err(|e| ClientError::ParseFailure {
            service: "tts",
            message: e.to_string(),
        })?;

        let audio = base64::engine::general_purpose::STANDARD
            .decode(&parsed.audio_base64)
            .map_err(|e| ClientError::ParseFailure {
                service: "tts",
                message: format!("invalid audio_base64: {e}"),
            })?;

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
        tokio::fs::write(output_path, &audio)
            .await
            .map_err(|e| ClientError::ParseFailure {
                service: "tts",
                message: format!("failed to write audio: {e}"),
            })?;

        let (alignments, duration) = match parsed.alignment {
            Some(a) => reconstruct_word_alignments(&a),
            None => (Vec::new(), None),
        };

        Ok(TtsResult {
            audio_path: output_path.to_path_buf(),
            alignment_duration_seconds: duration,
            alignments,
        })
    }

    pub async fn list_voices(&self) -> ClientResult<Vec<VoiceInfo>> {
        let url = format!("{}/voices", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("xi-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error("tts", Some(status), &body));
        }

        let parsed: VoicesResponse = response.json().await.map_err(|e| ClientError::ParseFailure {
            service: "tts",
            message: e.to_string(),
        })?;

        Ok(parsed
            .voices
            .into_iter()
            .map(|v| VoiceInfo {
                id: v.voice_id,
                name: v.name,
            })
            .collect())
    }
}

/// Reconstruct word-level timing from ElevenLabs' character-level alignment.
fn reconstruct_word_alignments(alignment: &Alignment) -> (Vec<WordAlignment>, Option<f64>) {
    let chars = &alignment.characters;
    let starts = &alignment.character_start_times_seconds;
    let ends = &alignment.character_end_times_seconds;

    if chars.is_empty() || starts.is_empty() || ends.is_empty() {
        return (Vec::new(), None);
    }

    let duration = ends.last().zip(starts.first()).and_then(|(end, start)| {
        let d = end - start;
        (d >= 0.0).then_some(d)
    });

    let mut words = Vec::new();
    let mut current = String::new();
    let mut word_start: Option<f64> = None;

    for (i, ch) in chars.iter().enumerate() {
        let is_last = i == chars.len() - 1;
        let is_space = ch == " ";

        if is_space || is_last {
            if is_last && !is_space {
                current.push_str(ch);
            }
            if !current.is_empty() {
                if let Some(start) = word_start {
                    let end = if is_space { ends[i.saturating_sub(1)] } else { ends[i] };
                    words.push(WordAlignment {
                        word: std::mem::take(&mut current),
                        start_time: start,
                        end_time: end,
                    });
                }
            }
            current.clear();
            word_start = None;
        } else {
            if word_start.is_none() {
                word_start = starts.get(i).copied();
            }
            current.push_str(ch);
        }
    }

    if words.is_empty() {
        warn!("TTS alignment produced no word boundaries");
    }

    (words, duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstructs_simple_two_word_alignment() {
        let alignment = Alignment {
            characters: vec!["h", "i", " ", "y", "o", "u"]
                .into_iter()
                .map(String::from)
                .collect(),
            character_start_times_seconds: vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5],
            character_end_times_seconds: vec![0.1, 0.2, 0.2, 0.4, 0.5, 0.6],
        };
        let (words, duration) = reconstruct_word_alignments(&alignment);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].word, "hi");
        assert_eq!(words[1].word, "you");
        assert_eq!(duration, Some(0.6));
    }

    #[test]
    fn empty_alignment_yields_no_words() {
        let alignment = Alignment {
            characters: Vec::new(),
            character_start_times_seconds: Vec::new(),
            character_end_times_seconds: Vec::new(),
        };
        let (words, duration) = reconstruct_word_alignments(&alignment);
        assert!(words.is_empty());
        assert_eq!(duration, None);
    }
}
