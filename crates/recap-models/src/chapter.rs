//! Chapter, Chapter Scene, and the Original Audio Marker.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A half-open time interval `[start, end)` produced by the
/// video-understanding service, before or after normalization (spec §4.3-S8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Chapter {
    pub start: f64,
    pub end: f64,
    pub title: String,
    pub description: String,
}

impl Chapter {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Reserved chapter scene ids for the synthetic intro/outro scenes.
pub const INTRO_SCENE_ID: u32 = 0;
pub const OUTRO_SCENE_ID: u32 = 999;

/// A processed chapter ready for stitching: narration, its synthesized
/// audio, and the chosen video range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChapterScene {
    pub id: u32,
    pub title: String,
    /// Narration text with any `[ORIGINAL_AUDIO:...]` marker already stripped.
    pub narration: String,
    pub audio_path: String,
    pub audio_duration: f64,
    pub video_start: f64,
    pub video_end: f64,
}

impl ChapterScene {
    pub fn is_intro(&self) -> bool {
        self.id == INTRO_SCENE_ID
    }

    pub fn is_outro(&self) -> bool {
        self.id == OUTRO_SCENE_ID
    }
}

/// An inline `[ORIGINAL_AUDIO:start:end:speaker]` annotation attached to a
/// chapter's narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OriginalAudioMarker {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[ORIGINAL_AUDIO:([\d.]+):([\d.]+):([^\]]+)\]").expect("valid marker regex")
    })
}

/// Parse and strip an Original Audio Marker from narration text.
///
/// Returns the text with the marker (and any trailing whitespace before it)
/// removed, plus the parsed marker if one was present. Property P7.
pub fn parse_original_audio_marker(narration: &str) -> (String, Option<OriginalAudioMarker>) {
    let re = marker_regex();
    match re.captures(narration) {
        Some(caps) => {
            let start: f64 = caps[1].parse().unwrap_or(0.0);
            let end: f64 = caps[2].parse().unwrap_or(0.0);
            let speaker = caps[3].trim().to_string();
            let stripped = re.replace(narration, "").trim_end().to_string();
            (
                stripped,
                Some(OriginalAudioMarker {
                    start,
                    end,
                    speaker,
                }),
            )
        }
        None => (narration.to_string(), None),
    }
}

/// Parse a timestamp given either as a bare float-string, `HH:MM:SS`, or
/// `MM:SS`.
pub fn parse_time(value: &str) -> Option<f64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<f64>() {
        return Some(seconds);
    }

    let parts: Vec<&str> = value.split(':').collect();
    match parts.len() {
        2 => {
            let minutes: f64 = parts[0].parse().ok()?;
            let seconds: f64 = parts[1].parse().ok()?;
            Some(minutes * 60.0 + seconds)
        }
        3 => {
            let hours: f64 = parts[0].parse().ok()?;
            let minutes: f64 = parts[1].parse().ok()?;
            let seconds: f64 = parts[2].parse().ok()?;
            Some(hours * 3600.0 + minutes * 60.0 + seconds)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_round_trip() {
        let (text, marker) =
            parse_original_audio_marker("X. Y... [ORIGINAL_AUDIO:10.5:13.2:Ada]");
        assert_eq!(text, "X. Y...");
        let marker = marker.unwrap();
        assert_eq!(marker.start, 10.5);
        assert_eq!(marker.end, 13.2);
        assert_eq!(marker.speaker, "Ada");
    }

    #[test]
    fn no_marker_present() {
        let (text, marker) = parse_original_audio_marker("Just plain narration.");
        assert_eq!(text, "Just plain narration.");
        assert!(marker.is_none());
    }

    #[test]
    fn parse_time_formats() {
        assert_eq!(parse_time("90"), Some(90.0));
        assert_eq!(parse_time("1:30"), Some(90.0));
        assert_eq!(parse_time("01:01:30"), Some(3690.0));
        assert_eq!(parse_time("not a time"), None);
    }

    #[test]
    fn chapter_duration() {
        let c = Chapter {
            start: 10.0,
            end: 70.0,
            title: "t".into(),
            description: "d".into(),
        };
        assert_eq!(c.duration(), 60.0);
    }
}
