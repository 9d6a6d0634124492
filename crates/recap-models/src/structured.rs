//! Structured Movie Data: the bundle returned by a single unified-extraction
//! call to the video-understanding service (spec §3, §4.3-S7).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::character::Character;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SceneBinding {
    pub chapter: u32,
    pub location: String,
    pub characters_present: Vec<String>,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct KeyMoment {
    pub chapter_index: u32,
    pub start: f64,
    pub end: f64,
    pub speaker: String,
    pub dialogue: String,
    pub lead_in: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Relationship {
    pub a: String,
    pub b: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StructuredMovieData {
    pub title: String,
    pub characters: Vec<Character>,
    pub locations: Vec<String>,
    pub factions: Vec<String>,
    pub relationships: Vec<Relationship>,
    pub scene_bindings: Vec<SceneBinding>,
    pub plot_summary: String,
    pub key_moments: Vec<KeyMoment>,
    /// Generic speaker label (e.g. "Speaker 1") -> canonical character name.
    pub speaker_mapping: HashMap<String, String>,
}

impl StructuredMovieData {
    pub fn key_moments_for_chapter(&self, chapter_index: u32) -> Vec<&KeyMoment> {
        self.key_moments
            .iter()
            .filter(|m| m.chapter_index == chapter_index)
            .collect()
    }
}

/// A single segment of the audio transcript, optionally with a speaker
/// mapped from a generic label to a canonical character name.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub speaker: Option<String>,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_moments_filtered_by_chapter() {
        let mut data = StructuredMovieData::default();
        data.key_moments.push(KeyMoment {
            chapter_index: 0,
            start: 0.0,
            end: 1.0,
            speaker: "A".into(),
            dialogue: "hi".into(),
            lead_in: String::new(),
        });
        data.key_moments.push(KeyMoment {
            chapter_index: 1,
            start: 2.0,
            end: 3.0,
            speaker: "B".into(),
            dialogue: "hey".into(),
            lead_in: String::new(),
        });
        assert_eq!(data.key_moments_for_chapter(0).len(), 1);
        assert_eq!(data.key_moments_for_chapter(2).len(), 0);
    }
}
