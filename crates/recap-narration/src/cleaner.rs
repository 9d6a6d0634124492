//! Blacklist post-processor for raw LLM narration output.
//!
//! Strips JSON/markdown artifacts, chapter labels, documentary/screenplay
//! phrasing ("the scene shows...", "we see..."), and known transcription
//! garbage, leaving plain storytelling prose.

use regex::Regex;

/// Patterns anchored at the start of the narration; removed once each, in
/// order.
const BANNED_STARTS: &[&str] = &[
    r"(?i)^Elsewhere,?\s*",
    r"(?i)^Somewhere,?\s*",
    r"(?i)^Meanwhile,?\s*",
    r"(?i)^Back at[^,]*,?\s*",
    r"(?i)^In another part of[^,]*,?\s*",
    r"(?i)^The scene shows\s*",
    r"(?i)^The scene shifts to\s*",
    r"(?i)^The scene transitions to\s*",
    r"(?i)^The scene returns to\s*",
    r"(?i)^Things cut to\s*",
    r"(?i)^Now we're at\s*",
    r"(?i)^Speaking of\s*",
    r"(?i)^On that note,?\s*",
    r"(?i)^We see\s*",
    r"(?i)^We get\s*",
    r"(?i)^We're\s+",
    r"(?i)^The camera shows\s*",
    r"(?i)^The camera then\s*",
    r"(?i)^The camera zeroes\s*",
    r"(?i)^The video shows\s*",
    r"(?i)^The film shows\s*",
    r"(?i)^This story kicks off\s*",
    r"(?i)^Alright,?\s*",
    r"(?i)^So,?\s+basically\s*",
];

/// YouTuber-speak patterns replaced with a single space, anywhere in the text.
const YOUTUBER_PATTERNS: &[&str] = &[
    r"(?i),?\s*let me tell you[,.]?\s*",
    r"(?i),?\s*trust me[,.]?\s*",
    r"(?i),?\s*right\?\s*",
    r"(?i),?\s*if you know what I mean[,.]?\s*",
    r"(?i)\s*–\s*always a good sign!?\s*",
    r"(?i),?\s*always a good sign!?\s*",
    r"(?i),?\s*unsettling,? right\?\s*",
    r"(?i),?\s*creepy,? right\?\s*",
];

/// Whole meta-commentary sentences, removed entirely.
const META_PATTERNS: &[&str] = &[
    r"(?i)The text says[^.]*\.\s*",
    r"(?i)The screen shows[^.]*\.\s*",
    r"(?i)The screen flashes[^.]*\.\s*",
    r"(?i)A title card[^.]*\.\s*",
    r"(?i)A caption flashes[^.]*\.\s*",
    r"(?i)A subtitle flashes[^.]*\.\s*",
    r"(?i)The next line says[^.]*\.\s*",
    r"(?i)It then switches to[^.]*\.\s*",
    r"(?i)The scene depicts[^.]*\.\s*",
    r"(?i)The scene returns[^.]*\.\s*",
    r"(?i)We're shown[^.]*\.\s*",
    r"(?i)We get this[^.]*\.\s*",
    r"(?i)We get glimpses[^.]*\.\s*",
    r"(?i)The movie shows[^.]*\.\s*",
    r"(?i)The film depicts[^.]*\.\s*",
    r"(?i)Credits and art flash[^.]*\.\s*",
    r"(?i)Credits roll[^.]*\.\s*",
];

/// "Scene description" phrasing, the main source of documentary-feel text.
/// Removed anywhere, not just at the start.
const SCENE_LANGUAGE_PATTERNS: &[&str] = &[
    r"(?i)\bthe scene\b[^.!?]{0,200}[.!?]\s*",
    r"(?i)\bthe screen\b[^.!?]{0,200}[.!?]\s*",
    r"(?i)\bthe show\b[^.!?]{0,200}[.!?]\s*",
    r"(?i)\bthe video (shows|opens|begins|cuts|shifts|transitions)[^.!?]*[.!?]\s*",
    r"(?i)\bthe camera\b[^.!?]{0,200}[.!?]\s*",
    r"(?i)\bin (this|the) scene\b[^.!?]{0,200}[.!?]\s*",
    r"(?i)\bthe setting\b[^.!?]{0,200}[.!?]\s*",
    r"(?i)\bthe narrative\b[^.!?]{0,200}[.!?]\s*",
    r"(?i)\bthe focus\b[^.!?]{0,200}[.!?]\s*",
    r"(?i)\bthe title card\b[^.!?]{0,200}[.!?]\s*",
    r"(?i)\b(a )?title card\b[^.!?]{0,200}[.!?]\s*",
    r"(?i)\bwe see\b\s*",
    r"(?i)\bwe watch\b\s*",
    r"(?i)\bwe observe\b\s*",
    r"(?i)\bwe're shown\b\s*",
    r"(?i)\bwe're immediately\b[^.!?]{0,200}[.!?]\s*",
    r"(?i)\bon screen\b[^.!?]*[.!?]\s*",
    r"(?i)\bit('s| is) revealed (that )?\b",
    r"(?i)\babruptly,\s*",
    r"(?i)\bsuddenly,\s+the (image|scene|screen)\b[^.!?]*[.!?]\s*",
    r"(?i)\bin another shift,?\s*",
    r"(?i)\bfollowing the[^,]{0,50},\s*",
    r"(?i)\bis prominently displayed\b",
    r"(?i)\bare prominently displayed\b",
    r"(?i), (his|her|their) expressions? (suggesting|betraying|showing)[^,.]*[,.]",
    r"(?i), leaving (him|her|them) visibly [^,.]*[,.]",
    r"(?i)^the bustling streets\b[^.!?]{0,200}[.!?]\s*",
    r"(?i)^amidst the\b[^.!?]{0,200}[.!?]\s*",
];

/// Visual-description phrasing that slips past the patterns above.
const VISUAL_PATTERNS: &[&str] = &[
    r"(?i),?\s*(his|her|their) faces? etched with[^,.]*[,.]?",
    r"(?i),?\s*(his|her|their) expressions? (suggesting|betraying|showing|a mixture of)[^,.]*[,.]?",
    r"(?i),?\s*(his|her|their) eyes (reflecting|gleaming|burning|fixed)[^,.]*[,.]?",
    r"(?i),?\s*(his|her|their) (knuckles|hands|fingers) (white|gripping|pressing)[^,.]*[,.]?",
    r"(?i),?\s*a (cold |chilling |)glint in (his|her|their) eyes?[^,.]*[,.]?",
    r"(?i),?\s*(his|her|their) gaze (unwavering|fixed|intense)[^,.]*[,.]?",
    r"(?i),?\s*determination (blazing|burning|shining) in (his|her|their) eyes[^,.]*[,.]?",
    r"(?i)\ba sprawling metropolis\b",
    r"(?i)\ba harbor where dreams dock\b",
    r"(?i)\bshadows lurk\b",
    r"(?i)\bsickly green light\b",
    r"(?i)\bdimly lit\b",
    r"(?i)\bbustling\b",
    r"(?i),?\s*a (stark |)contrast to[^,.]*[,.]?",
    r"(?i),?\s*a (silent |)observer[^,.]*[,.]?",
    r"(?i),?\s*its presence dominating[^,.]*[,.]?",
    r"(?i)^A (crimson|green|blue|red|dark|bright) hue[^.]*\.\s*",
    r"(?i)^The (room|scene|frame|shot) is (washed|bathed|filled)[^.]*\.\s*",
    r"(?i)\bwe're plunged into\b",
    r"(?i)\bwe see it\b",
    r"(?i)\bwe see\b",
    r"(?i)\bthe image zooms\b",
    r"(?i)\bthe camera zooms\b",
    r"(?i)\band then we see\b",
    r"(?i)\bthen we see\b",
    r"(?i)^SECTION \d+:\s*",
];

/// Transcription garbage left over from automated captioning.
const GARBAGE_PATTERNS: &[&str] = &[
    r"(?i)\bThe End\b\.?\s*",
    r"(?i)\broz\b\.?\s*",
    r"(?i)\bShish\b\.?\s*",
    r"(?i)\bOi\b\s*!?\s*",
    r"\b[А-Яа-яЁё]+\b",
    r"\[Music\]",
    r"\[Applause\]",
    r"\[Laughter\]",
    r"♪[^♪]*♪",
    r"🎵[^🎵]*🎵",
];

/// Collapse a word or short phrase (up to 3 words) repeated 3+ times in a
/// row, e.g. "The End, The End, The End" -> "The End". The `regex` crate has
/// no backreference support, so this is done with a manual token scan.
fn collapse_immediate_repeats(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let normalize = |w: &str| w.trim_matches(|c: char| c == ',' || c == '.').to_lowercase();

    let mut out: Vec<&str> = Vec::with_capacity(words.len());
    let mut i = 0;
    'outer: while i < words.len() {
        for phrase_len in (1..=3).rev() {
            if i + phrase_len > words.len() {
                continue;
            }
            let phrase: Vec<String> = words[i..i + phrase_len].iter().map(|w| normalize(w)).collect();
            let mut repeats = 1;
            let mut j = i + phrase_len;
            while j + phrase_len <= words.len() {
                let next: Vec<String> = words[j..j + phrase_len].iter().map(|w| normalize(w)).collect();
                if next == phrase {
                    repeats += 1;
                    j += phrase_len;
                } else {
                    break;
                }
            }
            if repeats >= 3 {
                out.extend_from_slice(&words[i..i + phrase_len]);
                i = j;
                continue 'outer;
            }
        }
        out.push(words[i]);
        i += 1;
    }
    out.join(" ")
}

fn apply_all(text: &str, patterns: &[&str], replacement: &str) -> String {
    let mut result = text.to_string();
    for pattern in patterns {
        let re = Regex::new(pattern).expect("narration cleanup pattern is valid");
        result = re.replace_all(&result, replacement).to_string();
    }
    result
}

/// Run the full cleanup pipeline over raw LLM narration output.
pub fn clean_narration(narration: &str) -> String {
    if narration.is_empty() {
        return String::new();
    }

    let mut text = narration.trim().trim_matches(|c| c == '"' || c == '\'').to_string();

    text = Regex::new(r"^```json\s*").unwrap().replace(&text, "").to_string();
    text = Regex::new(r"^```\s*").unwrap().replace(&text, "").to_string();
    text = Regex::new(r"\s*```$").unwrap().replace(&text, "").to_string();
    text = Regex::new(r#"^\[\s*""#).unwrap().replace(&text, "").to_string();
    text = Regex::new(r#""\s*\]$"#).unwrap().replace(&text, "").to_string();

    text = Regex::new(r"(?i)^CHAPTER\s*\d+\s*(\[[^\]]*\])?\s*:?\s*")
        .unwrap()
        .replace(&text, "")
        .to_string();
    text = Regex::new(r"(?i)^SECTION\s*\d+\s*:?\s*").unwrap().replace(&text, "").to_string();
    text = Regex::new(r"(?i)^Ch\.\s*\d+\s*:?\s*").unwrap().replace(&text, "").to_string();
    text = Regex::new(r"^#\d+\s*").unwrap().replace(&text, "").to_string();

    text = Regex::new(r"^\d+:\d+\s*-\s*\d+:\d+\s*").unwrap().replace(&text, "").to_string();
    text = Regex::new(r"^\[\d+:\d+\s*-\s*\d+:\d+\]\s*").unwrap().replace(&text, "").to_string();

    text = apply_all(&text, BANNED_STARTS, "");
    text = apply_all(&text, YOUTUBER_PATTERNS, " ");
    text = apply_all(&text, META_PATTERNS, "");
    text = apply_all(&text, SCENE_LANGUAGE_PATTERNS, " ");
    text = apply_all(&text, VISUAL_PATTERNS, "");
    text = apply_all(&text, GARBAGE_PATTERNS, "");

    text = collapse_immediate_repeats(&text);

    text = Regex::new(r"'[^']*Studios'[^.]*\.").unwrap().replace_all(&text, "").to_string();
    text = Regex::new(r#""[^"]*Studios"[^.]*\."#).unwrap().replace_all(&text, "").to_string();

    text = Regex::new(r"\s+").unwrap().replace_all(&text, " ").trim().to_string();

    if let Some(first) = text.chars().next() {
        if first.is_lowercase() {
            let rest: String = text.chars().skip(1).collect();
            text = format!("{}{}", first.to_uppercase(), rest);
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(clean_narration(""), "");
    }

    #[test]
    fn strips_json_fence_and_quotes() {
        let raw = "```json\n\"Dek fights the beast.\"\n```";
        assert_eq!(clean_narration(raw), "Dek fights the beast.");
    }

    #[test]
    fn strips_chapter_label_prefix() {
        let raw = "CHAPTER 3: Dek returns home.";
        assert_eq!(clean_narration(raw), "Dek returns home.");
    }

    #[test]
    fn removes_scene_description_language() {
        let raw = "We see Dek walking through the forest. The scene shows him stopping suddenly. He spots Thea.";
        let cleaned = clean_narration(raw);
        assert!(!cleaned.to_lowercase().contains("the scene shows"));
        assert!(cleaned.contains("He spots Thea."));
    }

    #[test]
    fn capitalizes_leading_lowercase_letter_after_cleanup() {
        let cleaned = clean_narration("dek walks home alone.");
        assert!(cleaned.starts_with('D'));
    }

    #[test]
    fn collapses_repeated_words() {
        let raw = "The End, The End, The End. It is finished.";
        let cleaned = clean_narration(raw);
        assert!(!cleaned.to_lowercase().contains("the end, the end"));
    }
}
