//! S9 character extraction merge: combine AI-derived, visual-signal, and
//! existing-database character sets into one canonical roster per series.

use recap_models::{AppearanceSource, Character};

const NAME_WEIGHT: f64 = 0.60;
const ALIAS_WEIGHT: f64 = 0.20;
const VISUAL_WEIGHT: f64 = 0.20;
const MERGE_THRESHOLD: f64 = 0.50;
const VISUAL_SOURCE_BOOST: f64 = 1.1;

/// Merge a newly extracted character list into an existing roster (from a
/// prior episode of the same series, possibly empty). Characters that match
/// an existing entry above [`MERGE_THRESHOLD`] are folded into it; the rest
/// are appended as new entries.
pub fn merge_characters(existing: Vec<Character>, incoming: Vec<Character>) -> Vec<Character> {
    let mut roster = existing;

    for candidate in incoming {
        let best = roster
            .iter()
            .enumerate()
            .map(|(idx, known)| (idx, match_score(known, &candidate)))
            .filter(|(_, score)| *score >= MERGE_THRESHOLD)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some((idx, _)) => {
                let merged = merge_pair(roster[idx].clone(), candidate);
                roster[idx] = merged;
            }
            None => roster.push(candidate),
        }
    }

    roster
}

/// Weighted similarity score between two characters per the S9 merge rule:
/// name similarity 0.60, alias overlap 0.20, visual-trait Jaccard 0.20.
fn match_score(a: &Character, b: &Character) -> f64 {
    NAME_WEIGHT * name_similarity(&a.canonical_name, &b.canonical_name)
        + ALIAS_WEIGHT * a.alias_overlap(b)
        + VISUAL_WEIGHT * a.visual_trait_jaccard(b)
}

/// Case-insensitive token-overlap ratio. Exact match (after lowercasing and
/// trimming) scores 1.0; otherwise the fraction of shared whitespace-split
/// tokens relative to the longer name.
fn name_similarity(a: &str, b: &str) -> f64 {
    let a_norm = a.trim().to_lowercase();
    let b_norm = b.trim().to_lowercase();

    if a_norm == b_norm {
        return 1.0;
    }
    if a_norm.is_empty() || b_norm.is_empty() {
        return 0.0;
    }

    let a_tokens: std::collections::HashSet<&str> = a_norm.split_whitespace().collect();
    let b_tokens: std::collections::HashSet<&str> = b_norm.split_whitespace().collect();
    let shared = a_tokens.intersection(&b_tokens).count() as f64;
    let longer = a_tokens.len().max(b_tokens.len()) as f64;

    if longer == 0.0 {
        0.0
    } else {
        shared / longer
    }
}

/// Combine two matched character records into one: prefer the longer,
/// more specific canonical name, union aliases and visual traits, take the
/// max confidence (boosted 1.1x when either source is a visual detection,
/// capped at 1.0), concatenate appearances, and keep the earliest nonzero
/// first appearance.
fn merge_pair(existing: Character, incoming: Character) -> Character {
    let canonical_name = pick_longer_name(&existing.canonical_name, &incoming.canonical_name);

    let mut aliases = existing.aliases;
    for alias in incoming.aliases {
        if !aliases.contains(&alias) {
            aliases.push(alias);
        }
    }

    let mut visual_traits = existing.visual_traits;
    for trait_name in incoming.visual_traits {
        if !visual_traits.contains(&trait_name) {
            visual_traits.push(trait_name);
        }
    }

    let has_visual_source = existing
        .appearances
        .iter()
        .chain(incoming.appearances.iter())
        .any(|a| a.source == AppearanceSource::Visual);

    let mut confidence = existing.confidence.max(incoming.confidence);
    if has_visual_source {
        confidence = (confidence * VISUAL_SOURCE_BOOST).min(1.0);
    }

    let mut appearances = existing.appearances;
    appearances.extend(incoming.appearances);

    let first_appearance = match (existing.first_appearance, incoming.first_appearance) {
        (0.0, b) => b,
        (a, 0.0) => a,
        (a, b) => a.min(b),
    };

    Character {
        id: existing.id,
        canonical_name,
        aliases,
        description: pick_longer_description(existing.description, incoming.description),
        role: existing.role,
        visual_traits,
        confidence,
        first_appearance,
        appearances,
        source_video_no: existing.source_video_no,
    }
}

fn pick_longer_name(a: &str, b: &str) -> String {
    if b.len() > a.len() { b.to_string() } else { a.to_string() }
}

fn pick_longer_description(a: String, b: String) -> String {
    if b.len() > a.len() { b } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recap_models::{CharacterAppearance, CharacterRole};

    fn character(name: &str, aliases: &[&str], traits: &[&str]) -> Character {
        Character {
            id: uuid::Uuid::new_v4().to_string(),
            canonical_name: name.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            description: String::new(),
            role: CharacterRole::Supporting,
            visual_traits: traits.iter().map(|s| s.to_string()).collect(),
            confidence: 0.7,
            first_appearance: 0.0,
            appearances: Vec::new(),
            source_video_no: 0,
        }
    }

    #[test]
    fn exact_name_match_merges() {
        let existing = vec![character("Jon Snow", &["Lord Snow"], &["dark_hair"])];
        let incoming = vec![character("Jon Snow", &["The Bastard"], &["dark_hair", "fur_cloak"])];
        let merged = merge_characters(existing, incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].aliases.len(), 2);
        assert_eq!(merged[0].visual_traits.len(), 2);
    }

    #[test]
    fn unrelated_names_stay_separate() {
        let existing = vec![character("Jon Snow", &[], &[])];
        let incoming = vec![character("Daenerys Targaryen", &[], &[])];
        let merged = merge_characters(existing, incoming);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn visual_source_boosts_confidence_capped_at_one() {
        let mut existing = character("Arya Stark", &[], &[]);
        existing.confidence = 0.95;
        let mut incoming = character("Arya Stark", &[], &[]);
        incoming.confidence = 0.9;
        incoming.appearances.push(CharacterAppearance {
            start: 0.0,
            end: 10.0,
            confidence: 0.9,
            source: AppearanceSource::Visual,
        });
        let merged = merge_characters(vec![existing], vec![incoming]);
        assert_eq!(merged[0].confidence, 1.0);
    }

    #[test]
    fn earliest_first_appearance_kept() {
        let mut existing = character("Tyrion Lannister", &[], &[]);
        existing.first_appearance = 120.0;
        let mut incoming = character("Tyrion Lannister", &[], &[]);
        incoming.first_appearance = 30.0;
        let merged = merge_characters(vec![existing], vec![incoming]);
        assert_eq!(merged[0].first_appearance, 30.0);
    }
}
