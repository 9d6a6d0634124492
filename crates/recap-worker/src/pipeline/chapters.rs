//! S8 chapter normalization: sort, de-duplicate, fill end times, filter
//! credits/degenerate chapters, and merge small chapters into scene-level
//! units of at least 60 seconds.

use recap_models::Chapter;

use crate::error::{WorkerError, WorkerResult};

const MIN_CHAPTER_SECONDS: f64 = 60.0;
const MAX_CHAPTER_SECONDS: f64 = 180.0;
const MIN_VALID_SECONDS: f64 = 3.0;
const OVERLAP_TOLERANCE: f64 = 1.0;

const CREDITS_TITLE_WORDS: &[&str] = &["credit", "credits", "end credits", "closing"];
const CREDITS_SUMMARY_PHRASES: &[&str] = &["credits roll", "end credits", "closing credits"];

/// Normalize raw chapters from the understanding service into
/// non-overlapping, ≥60s chapters ready for narration. Fails with
/// `InputInvalid` if nothing survives filtering.
pub fn normalize_chapters(mut chapters: Vec<Chapter>, source_duration: f64) -> WorkerResult<Vec<Chapter>> {
    if chapters.is_empty() {
        return Err(WorkerError::input_invalid("no chapters returned by understanding service"));
    }

    chapters.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));

    let deduplicated = deduplicate(chapters);
    let filled = fill_end_times(deduplicated, source_duration);
    let filtered = filter_credits_and_degenerate(filled);

    if filtered.is_empty() {
        return Err(WorkerError::input_invalid("all chapters were filtered out as credits or invalid"));
    }

    let merged = merge_small_chapters(filtered);

    if let Some(last) = merged.last() {
        if last.end > source_duration && source_duration > 0.0 {
            let mut merged = merged;
            let last_idx = merged.len() - 1;
            merged[last_idx].end = source_duration;
            return Ok(merged);
        }
    }

    Ok(merged)
}

fn deduplicate(chapters: Vec<Chapter>) -> Vec<Chapter> {
    let mut out: Vec<Chapter> = Vec::with_capacity(chapters.len());
    let mut last_end = f64::NEG_INFINITY;

    for ch in chapters {
        if ch.start >= last_end - OVERLAP_TOLERANCE {
            last_end = ch.end;
            out.push(ch);
        }
    }
    out
}

fn fill_end_times(mut chapters: Vec<Chapter>, source_duration: f64) -> Vec<Chapter> {
    let n = chapters.len();
    for i in 0..n {
        if chapters[i].end <= chapters[i].start {
            chapters[i].end = if i + 1 < n { chapters[i + 1].start } else { source_duration.max(chapters[i].start) };
        }
    }
    chapters
}

fn filter_credits_and_degenerate(chapters: Vec<Chapter>) -> Vec<Chapter> {
    chapters
        .into_iter()
        .filter_map(|mut ch| {
            let title = ch.title.to_lowercase();
            let summary = ch.description.to_lowercase();

            if CREDITS_TITLE_WORDS.iter().any(|w| title.contains(w)) {
                return None;
            }
            if CREDITS_SUMMARY_PHRASES.iter().any(|p| summary.contains(p)) {
                return None;
            }

            if ch.duration() > MAX_CHAPTER_SECONDS {
                ch.end = ch.start + MAX_CHAPTER_SECONDS;
            }

            if ch.duration() < MIN_VALID_SECONDS {
                return None;
            }

            Some(ch)
        })
        .collect()
}

fn merge_small_chapters(chapters: Vec<Chapter>) -> Vec<Chapter> {
    let mut merged: Vec<Chapter> = Vec::new();

    for ch in chapters {
        match merged.last_mut() {
            Some(group) if group.duration() < MIN_CHAPTER_SECONDS => {
                group.end = ch.end;
                if !ch.description.is_empty() {
                    group.description.push(' ');
                    group.description.push_str(&ch.description);
                }
            }
            _ => merged.push(ch),
        }
    }

    merged
}

/// Cap `target_duration_minutes` to twice the source duration: stretching a
/// source further than 2x produces unwatchable slow-motion (spec SC4/P4).
/// Returns the (possibly capped) target in minutes and a warning note when
/// capping occurred.
pub fn cap_target_duration(target_minutes: Option<f64>, source_duration: f64) -> (Option<f64>, Option<String>) {
    let Some(target_minutes) = target_minutes else {
        return (None, None);
    };

    let target_seconds = target_minutes * 60.0;
    let max_feasible = source_duration * 2.0;

    if target_seconds > max_feasible {
        let capped_minutes = max_feasible / 60.0;
        let note = format!(
            "Note: Target capped to {:.0}min (source is only {:.0}min)",
            capped_minutes,
            source_duration / 60.0
        );
        (Some(capped_minutes), Some(note))
    } else {
        (Some(target_minutes), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(start: f64, end: f64, title: &str, description: &str) -> Chapter {
        Chapter {
            start,
            end,
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn drops_credits_chapters() {
        let chapters = vec![
            chapter(0.0, 100.0, "Opening", "A man walks into town."),
            chapter(100.0, 130.0, "End Credits", "Credits roll with cast names."),
        ];
        let normalized = normalize_chapters(chapters, 130.0).unwrap();
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].title, "Opening");
    }

    #[test]
    fn drops_overlapping_chapters_keeping_first() {
        let chapters = vec![
            chapter(0.0, 90.0, "A", "a"),
            chapter(10.0, 95.0, "B overlaps A", "b"),
            chapter(90.0, 180.0, "C", "c"),
        ];
        let normalized = normalize_chapters(chapters, 180.0).unwrap();
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].title, "A");
    }

    #[test]
    fn merges_small_chapters_to_minimum_duration() {
        let chapters: Vec<Chapter> = (0..6).map(|i| chapter(i as f64 * 20.0, (i + 1) as f64 * 20.0, "t", "d")).collect();
        let normalized = normalize_chapters(chapters, 120.0).unwrap();
        assert!(normalized.iter().all(|c| c.duration() >= MIN_CHAPTER_SECONDS - 1e-9 || normalized.len() == 1));
    }

    #[test]
    fn caps_duration_above_180_seconds() {
        let chapters = vec![chapter(0.0, 400.0, "Long one", "d")];
        let normalized = normalize_chapters(chapters, 400.0).unwrap();
        assert_eq!(normalized[0].duration(), MAX_CHAPTER_SECONDS);
    }

    #[test]
    fn empty_chapters_is_input_invalid() {
        assert!(normalize_chapters(Vec::new(), 100.0).is_err());
    }

    #[test]
    fn target_duration_capped_at_twice_source() {
        let (capped, note) = cap_target_duration(Some(20.0), 300.0);
        assert_eq!(capped, Some(10.0));
        assert!(note.unwrap().contains("capped"));
    }

    #[test]
    fn target_duration_unchanged_when_feasible() {
        let (capped, note) = cap_target_duration(Some(4.0), 300.0);
        assert_eq!(capped, Some(4.0));
        assert!(note.is_none());
    }
}
