//! Drives S10's narration generation: batches chapters into LLM calls with
//! story-structure phase labels and character/location context, enforces a
//! per-chapter word-count quality gate, and falls back to the chapter's own
//! description when generation fails outright.

use recap_clients::LlmClient;
use recap_models::{Chapter, StructuredMovieData, TranscriptSegment};

use crate::cleaner::clean_narration;

/// Words per second at normal TTS speaking rate; used to size each
/// chapter's target word count from its clip duration so narration length
/// matches the video without needing to speed up playback.
const WORDS_PER_SECOND: f64 = 2.5;
const MIN_CHAPTER_SECONDS: f64 = 30.0;
const QUALITY_GATE_RATIO: f64 = 0.8;

/// Target word count for a chapter, derived from its clip duration.
pub fn target_word_count(chapter: &Chapter) -> usize {
    let duration = chapter.duration().max(MIN_CHAPTER_SECONDS);
    (duration * WORDS_PER_SECOND).round() as usize
}

fn phase_label(chapter_number: usize, total: usize) -> &'static str {
    let fraction = chapter_number as f64 / total.max(1) as f64;
    if fraction <= 0.15 {
        "intro"
    } else if fraction <= 0.40 {
        "conflict"
    } else if fraction <= 0.80 {
        "rising action"
    } else if fraction <= 0.95 {
        "climax"
    } else {
        "resolution"
    }
}

fn build_context_section(structured: &StructuredMovieData) -> String {
    let mut sections = Vec::new();

    if !structured.characters.is_empty() {
        let lines: Vec<String> = structured
            .characters
            .iter()
            .map(|c| format!("- {} ({:?}) - {}", c.canonical_name, c.role, c.description))
            .collect();
        sections.push(format!("CHARACTERS (use these names, never \"the youth\" or \"a man\"):\n{}", lines.join("\n")));
    }

    if !structured.locations.is_empty() {
        sections.push(format!("LOCATIONS:\n{}", bullet_list(&structured.locations, 10)));
    }

    if !structured.relationships.is_empty() {
        let lines: Vec<String> = structured
            .relationships
            .iter()
            .take(10)
            .map(|r| format!("- {} <-> {}: {}", r.a, r.b, r.description))
            .collect();
        sections.push(format!("RELATIONSHIPS:\n{}", lines.join("\n")));
    }

    if !structured.factions.is_empty() {
        sections.push(format!("FACTIONS:\n{}", bullet_list(&structured.factions, 5)));
    }

    if sections.is_empty() {
        "Use names from the plot summary.".to_string()
    } else {
        sections.join("\n\n")
    }
}

fn bullet_list(items: &[String], limit: usize) -> String {
    items.iter().take(limit).map(|s| format!("- {s}")).collect::<Vec<_>>().join("\n")
}

fn dialogue_for_chapter<'a>(chapter: &Chapter, transcript: &'a [TranscriptSegment]) -> Vec<&'a TranscriptSegment> {
    transcript
        .iter()
        .filter(|seg| seg.start < chapter.end && seg.end > chapter.start)
        .take(5)
        .collect()
}

struct BatchEntry {
    chapter_index: usize,
    target_words: usize,
    prompt_block: String,
}

fn build_batch_prompt(
    entries: &[BatchEntry],
    total_chapters: usize,
    batch_start: usize,
    batch_end: usize,
    context_section: &str,
) -> String {
    let phases: Vec<&str> = (batch_start..batch_end).map(|i| phase_label(i + 1, total_chapters)).collect();
    let mut unique_phases: Vec<&str> = Vec::new();
    for p in &phases {
        if !unique_phases.contains(p) {
            unique_phases.push(p);
        }
    }
    let story_position = unique_phases.join(" / ").to_uppercase();

    let chapters_text: String = entries.iter().map(|e| e.prompt_block.clone()).collect::<Vec<_>>().join("\n\n");

    format!(
        "REWRITE these plot summaries as STORYTELLING NARRATION for a recap video.\n\n\
         Never copy visual descriptions from the input; write what characters do and feel, using \
         their names instead of \"a man\"/\"a figure\"/\"someone\".\n\n\
         {context_section}\n\n\
         STORY POSITION: {story_position}\n\
         SECTIONS {start} - {end} of {total}:\n\n\
         {chapters_text}\n\n\
         Each section lists a [TARGET: N words] budget; hit that count by expanding the story, \
         never by adding visual description.\n\n\
         Return ONLY a JSON array of strings, one narration per section, no markdown fences.",
        start = batch_start + 1,
        end = batch_end,
        total = total_chapters,
    )
}

/// Parse a batch response as a JSON string array, falling back to
/// double-newline-separated line extraction if JSON parsing fails.
fn parse_batch_response(content: &str, expected_count: usize) -> Vec<String> {
    let trimmed = content.trim();
    let fenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed)
        .trim_end_matches("```")
        .trim();

    if let (Some(start), Some(end)) = (fenced.find('['), fenced.rfind(']')) {
        if end >= start {
            if let Ok(parsed) = serde_json::from_str::<Vec<String>>(&fenced[start..=end]) {
                return parsed;
            }
        }
    }

    fenced
        .split("\n\n")
        .map(|line| line.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|line| line.len() > 20)
        .take(expected_count)
        .collect()
}

/// Rewrite `chapters` into narration strings using the LLM, with a
/// structured-data-aware batch prompt (B chapters per call), a quality gate
/// requiring 80% of the target word count, and a single boosted retry per
/// chapter that falls short.
pub async fn rewrite_chapters_batch(
    llm: &LlmClient,
    chapters: &[Chapter],
    structured: &StructuredMovieData,
    transcript: &[TranscriptSegment],
    batch_size: usize,
) -> Vec<String> {
    let total = chapters.len();
    let mut narrations = vec![String::new(); total];
    let context_section = build_context_section(structured);
    let targets: Vec<usize> = chapters.iter().map(target_word_count).collect();

    let mut batch_start = 0;
    while batch_start < total {
        let batch_end = (batch_start + batch_size).min(total);
        let entries: Vec<BatchEntry> = (batch_start..batch_end)
            .map(|i| {
                let chapter = &chapters[i];
                let dialogue = dialogue_for_chapter(chapter, transcript);
                let dialogue_block = if dialogue.is_empty() {
                    String::new()
                } else {
                    let lines: Vec<String> = dialogue
                        .iter()
                        .map(|seg| format!("  {}: \"{}\"", seg.speaker.as_deref().unwrap_or("Unknown"), seg.text))
                        .collect();
                    format!("\nDialogue:\n{}", lines.join("\n"))
                };
                BatchEntry {
                    chapter_index: i,
                    target_words: targets[i],
                    prompt_block: format!(
                        "SECTION {} [TARGET: {} words]: {}{}",
                        i + 1,
                        targets[i],
                        chapter.description,
                        dialogue_block
                    ),
                }
            })
            .collect();

        let prompt = build_batch_prompt(&entries, total, batch_start, batch_end, &context_section);

        match llm.generate_text_with_fallback(&prompt).await {
            Ok(response) => {
                let parsed = parse_batch_response(&response, entries.len());
                for (offset, entry) in entries.iter().enumerate() {
                    if let Some(raw) = parsed.get(offset) {
                        narrations[entry.chapter_index] = clean_narration(raw);
                    }
                }
            }
            Err(_) => {
                for entry in &entries {
                    narrations[entry.chapter_index] = chapters[entry.chapter_index].description.clone();
                }
            }
        }

        batch_start = batch_end;
    }

    for i in 0..total {
        if narrations[i].split_whitespace().count() < 5 {
            narrations[i] = chapters[i].description.clone();
        }
    }

    apply_quality_gate(llm, chapters, &targets, narrations).await
}

/// Retry any chapter whose narration fell short of 80% of its target word
/// count, once, with an explicit "write N more words" instruction.
async fn apply_quality_gate(
    llm: &LlmClient,
    chapters: &[Chapter],
    targets: &[usize],
    mut narrations: Vec<String>,
) -> Vec<String> {
    for i in 0..narrations.len() {
        let word_count = narrations[i].split_whitespace().count();
        let min_acceptable = (targets[i] as f64 * QUALITY_GATE_RATIO) as usize;
        if word_count >= min_acceptable {
            continue;
        }

        let shortfall = targets[i].saturating_sub(word_count);
        let prompt = format!(
            "TOO SHORT. You wrote {word_count} words, need {target} words. Add {shortfall} more words by \
             expanding the story (motivations, stakes, consequences), never by adding visual description.\n\n\
             ORIGINAL SUMMARY:\n{summary}\n\n\
             PREVIOUS ATTEMPT:\n{previous}\n\n\
             Return ONLY the expanded narration text.",
            target = targets[i],
            summary = chapters[i].description,
            previous = narrations[i],
        );

        if let Ok(retry_text) = llm.generate_text_with_fallback(&prompt).await {
            let cleaned = clean_narration(&retry_text);
            if cleaned.split_whitespace().count() > word_count {
                narrations[i] = cleaned;
            }
        }
    }

    narrations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chapter(start: f64, end: f64, description: &str) -> Chapter {
        Chapter {
            start,
            end,
            title: "Chapter".to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn target_word_count_scales_with_duration() {
        let short = sample_chapter(0.0, 20.0, "x");
        let long = sample_chapter(0.0, 100.0, "x");
        assert!(target_word_count(&long) > target_word_count(&short));
    }

    #[test]
    fn target_word_count_has_a_duration_floor() {
        let tiny = sample_chapter(0.0, 1.0, "x");
        assert_eq!(target_word_count(&tiny), (MIN_CHAPTER_SECONDS * WORDS_PER_SECOND).round() as usize);
    }

    #[test]
    fn phase_label_covers_whole_range() {
        assert_eq!(phase_label(1, 20), "intro");
        assert_eq!(phase_label(7, 20), "conflict");
        assert_eq!(phase_label(12, 20), "rising action");
        assert_eq!(phase_label(17, 20), "climax");
        assert_eq!(phase_label(20, 20), "resolution");
    }

    #[test]
    fn parses_clean_json_array() {
        let content = r#"["First.", "Second."]"#;
        let parsed = parse_batch_response(content, 2);
        assert_eq!(parsed, vec!["First.".to_string(), "Second.".to_string()]);
    }

    #[test]
    fn parses_markdown_fenced_json_array() {
        let content = "```json\n[\"First.\", \"Second.\"]\n```";
        let parsed = parse_batch_response(content, 2);
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn falls_back_to_line_extraction_when_json_invalid() {
        let content = "This is a reasonably long first narration line that should pass.\n\nThis is a reasonably long second narration line that should pass.";
        let parsed = parse_batch_response(content, 2);
        assert_eq!(parsed.len(), 2);
    }
}
