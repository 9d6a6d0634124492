//! Character data model, persisted per series across re-extractions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CharacterRole {
    Protagonist,
    Antagonist,
    Supporting,
    Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AppearanceSource {
    Ai,
    Visual,
    Database,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CharacterAppearance {
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
    pub source: AppearanceSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Character {
    pub id: String,
    pub canonical_name: String,
    pub aliases: Vec<String>,
    pub description: String,
    pub role: CharacterRole,
    pub visual_traits: Vec<String>,
    pub confidence: f64,
    pub first_appearance: f64,
    pub appearances: Vec<CharacterAppearance>,
    pub source_video_no: u32,
}

impl Character {
    /// Jaccard similarity between this character's visual traits and
    /// another's, used by the S9 merge rule (0.20 weight).
    pub fn visual_trait_jaccard(&self, other: &Character) -> f64 {
        let a: std::collections::HashSet<&str> =
            self.visual_traits.iter().map(String::as_str).collect();
        let b: std::collections::HashSet<&str> =
            other.visual_traits.iter().map(String::as_str).collect();
        if a.is_empty() && b.is_empty() {
            return 0.0;
        }
        let intersection = a.intersection(&b).count() as f64;
        let union = a.union(&b).count() as f64;
        if union == 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Alias overlap ratio: fraction of the smaller alias set contained in
    /// the union with the other's (S9 merge rule, 0.20 weight).
    pub fn alias_overlap(&self, other: &Character) -> f64 {
        let a: std::collections::HashSet<&str> = self.aliases.iter().map(String::as_str).collect();
        let b: std::collections::HashSet<&str> =
            other.aliases.iter().map(String::as_str).collect();
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let intersection = a.intersection(&b).count() as f64;
        let smaller = a.len().min(b.len()) as f64;
        intersection / smaller
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character(name: &str, traits: &[&str], aliases: &[&str]) -> Character {
        Character {
            id: name.to_string(),
            canonical_name: name.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            description: String::new(),
            role: CharacterRole::Supporting,
            visual_traits: traits.iter().map(|s| s.to_string()).collect(),
            confidence: 0.8,
            first_appearance: 0.0,
            appearances: Vec::new(),
            source_video_no: 0,
        }
    }

    #[test]
    fn jaccard_identical_sets() {
        let a = character("A", &["red_hair", "scar"], &[]);
        let b = character("B", &["red_hair", "scar"], &[]);
        assert_eq!(a.visual_trait_jaccard(&b), 1.0);
    }

    #[test]
    fn jaccard_disjoint_sets() {
        let a = character("A", &["red_hair"], &[]);
        let b = character("B", &["blue_cloak"], &[]);
        assert_eq!(a.visual_trait_jaccard(&b), 0.0);
    }

    #[test]
    fn alias_overlap_partial() {
        let a = character("A", &[], &["Ace", "Captain"]);
        let b = character("B", &[], &["Ace"]);
        assert_eq!(a.alias_overlap(&b), 1.0);
    }
}
