//! Splits a user-supplied script into per-chapter narration chunks (S10's
//! "user script split" strategy), used instead of LLM rewriting whenever a
//! job was submitted with a script.

/// Split `script` into `chapter_durations.len()` chunks.
///
/// If the script contains explicit `=== Chapter` delimiters, those win and
/// are matched 1:1 against chapters in order (padding/truncating to fit).
/// Otherwise the script is split sentence-by-sentence, allocating sentences
/// to chapters proportionally to their duration weight, with a minimum of
/// one sentence per chapter.
pub fn split_user_script_into_chapters(script: &str, chapter_durations: &[f64]) -> Vec<String> {
    if chapter_durations.is_empty() {
        return Vec::new();
    }

    if let Some(explicit) = split_by_explicit_delimiters(script, chapter_durations.len()) {
        return explicit;
    }

    split_by_sentence_weight(script, chapter_durations)
}

fn split_by_explicit_delimiters(script: &str, chapter_count: usize) -> Option<Vec<String>> {
    if !script.contains("=== Chapter") {
        return None;
    }

    let mut chunks: Vec<String> = script
        .split("=== Chapter")
        .skip(1)
        .map(|chunk| {
            chunk
                .split_once("===")
                .map(|(_, rest)| rest)
                .unwrap_or(chunk)
                .trim()
                .to_string()
        })
        .collect();

    if chunks.is_empty() {
        return None;
    }

    chunks.resize(chapter_count, String::new());
    Some(chunks)
}

fn split_sentences(script: &str) -> Vec<String> {
    script
        .split_inclusive(|c| c == '.' || c == '!' || c == '?')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_by_sentence_weight(script: &str, chapter_durations: &[f64]) -> Vec<String> {
    let sentences = split_sentences(script);
    let n = chapter_durations.len();

    if sentences.is_empty() {
        return vec![String::new(); n];
    }

    let total_duration: f64 = chapter_durations.iter().sum();
    let total_sentences = sentences.len();

    // Proportional allocation with a floor of one sentence per chapter,
    // the remainder handed to chapters in duration order.
    let mut counts = vec![1usize; n];
    if total_sentences > n {
        let remaining = total_sentences - n;
        let weights: Vec<f64> = chapter_durations
            .iter()
            .map(|d| if total_duration > 0.0 { d / total_duration } else { 1.0 / n as f64 })
            .collect();

        let mut extra: Vec<usize> = weights.iter().map(|w| (w * remaining as f64).floor() as usize).collect();
        let mut used: usize = extra.iter().sum();

        // distribute leftover sentences (rounding remainder) to the largest chapters first
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| chapter_durations[b].partial_cmp(&chapter_durations[a]).unwrap());
        let mut idx = 0;
        while used < remaining {
            extra[order[idx % n]] += 1;
            used += 1;
            idx += 1;
        }

        for (count, e) in counts.iter_mut().zip(extra.iter()) {
            *count += e;
        }
    }

    let mut chapters = Vec::with_capacity(n);
    let mut cursor = 0;
    for count in counts {
        let end = (cursor + count).min(sentences.len());
        let chunk = sentences[cursor..end].join(" ");
        chapters.push(chunk);
        cursor = end;
    }

    chapters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_by_explicit_chapter_delimiters() {
        let script = "=== Chapter 1 ===\nFirst chunk.\n=== Chapter 2 ===\nSecond chunk.";
        let result = split_by_explicit_delimiters(script, 2).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result[0].contains("First chunk."));
        assert!(result[1].contains("Second chunk."));
    }

    #[test]
    fn allocates_sentences_proportionally_to_duration() {
        let sentences: Vec<String> = (1..=10).map(|i| format!("Sentence {i}.")).collect();
        let script = sentences.join(" ");
        let durations = [30.0, 70.0];
        let chapters = split_by_sentence_weight(&script, &durations);
        assert_eq!(chapters.len(), 2);
        let first_count = chapters[0].matches('.').count();
        let second_count = chapters[1].matches('.').count();
        assert_eq!(first_count + second_count, 10);
        assert!(second_count > first_count);
    }

    #[test]
    fn every_sentence_is_used_exactly_once() {
        let sentences: Vec<String> = (1..=60).map(|i| format!("Sentence {i}.")).collect();
        let script = sentences.join(" ");
        let durations = [80.0, 120.0, 100.0, 90.0, 110.0, 100.0];
        let chapters = split_by_sentence_weight(&script, &durations);
        let joined = chapters.join(" ");
        for i in 1..=60 {
            assert!(joined.contains(&format!("Sentence {i}.")), "missing sentence {i}");
        }
    }

    #[test]
    fn minimum_one_sentence_per_chapter_when_possible() {
        let script = "One. Two. Three.";
        let durations = [10.0, 10.0, 10.0];
        let chapters = split_by_sentence_weight(script, &durations);
        assert!(chapters.iter().all(|c| !c.is_empty()));
    }
}
