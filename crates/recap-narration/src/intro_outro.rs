//! Intro and outro copywriting. The intro is generated by the LLM from the
//! plot summary; the outro is assembled from fixed templates so it reads
//! dramatically without a round-trip to the LLM.

use rand::seq::SliceRandom;
use rand::Rng;
use recap_clients::LlmClient;

use crate::cleaner::clean_narration;

const FALLBACK_INTRO: &str = "This is a story you need to hear. Here is what happens.";

/// Generate a 20-30 word intro stating the premise, falling back to a fixed
/// line if the LLM call fails.
pub async fn generate_intro(llm: &LlmClient, plot_summary: &str, character_guide: &str, video_title: &str) -> String {
    let title_info = if video_title.is_empty() {
        String::new()
    } else {
        format!("TITLE: {video_title}\n")
    };
    let char_info = if character_guide.is_empty() {
        String::new()
    } else {
        format!("MAIN CHARACTERS: {}\n", truncate(character_guide, 500))
    };
    let premise = truncate(plot_summary, 1500);

    let prompt = format!(
        "You are a straightforward narrator. Write a brief intro (20-30 words) that states the premise.\n\n\
         {title_info}{char_info}\n\
         STORY PREMISE:\n{premise}\n\n\
         REQUIREMENTS:\n\
         - EXACTLY 20-30 words (about 8-12 seconds when spoken)\n\
         - STATE THE PREMISE in 1-2 sentences\n\
         - NO questions, NO \"hooks\", NO drama\n\
         - Present tense\n\
         - Direct language only\n\n\
         Write the intro now. Output ONLY the narration, nothing else."
    );

    match llm.generate_text_with_fallback(&prompt).await {
        Ok(text) => clean_narration(&text),
        Err(_) => FALLBACK_INTRO.to_string(),
    }
}

const ENDINGS: &[&str] = &[
    "And so it ends. But the echoes of this story will linger long after the credits roll.",
    "The road ends here. But the journey... the journey stays with us forever.",
    "And when the dust settles, only one question remains: was it worth it?",
    "The final step. The last breath. And a legacy that will never be forgotten.",
    "This is how it ends. Not with answers, but with silence.",
    "The curtain falls. But the story... the story never truly ends.",
    "And just like that, it's over. But nothing will ever be the same.",
    "The final chapter closes. What remains is memory.",
];

const REFLECTIONS: &[&str] = &[
    "A story of survival, sacrifice, and the darkness that lives in all of us.",
    "Not everyone makes it to the end. But those who do are never the same.",
    "In the end, it was never about winning. It was about what we're willing to lose.",
    "Some journeys change you. This one... this one breaks you.",
    "Heroes fall. Villains rise. And the line between them blurs.",
    "The price of victory is always higher than we expect.",
];

const CTAS: &[&str] = &[
    "If this story moved you, leave a like. If you want more, subscribe.",
    "Hit subscribe for more stories that stay with you.",
    "Like and subscribe if you felt something. That's all I ask.",
    "Subscribe for more tales of triumph and tragedy.",
];

const THANKS: &[&str] = &[
    "Until next time.",
    "See you in the next one.",
    "Thanks for being here.",
    "Until we meet again.",
    "Stay legendary.",
];

/// Assemble a dramatic outro from randomized fixed templates.
pub fn generate_outro(include_cta: bool) -> String {
    let mut rng = rand::thread_rng();

    let mut parts = vec![pick(&mut rng, ENDINGS)];
    if rng.gen_bool(0.5) {
        parts.push(pick(&mut rng, REFLECTIONS));
    }
    if include_cta {
        parts.push(pick(&mut rng, CTAS));
    }
    parts.push(pick(&mut rng, THANKS));

    parts.join(" ")
}

fn pick<'a, R: Rng>(rng: &mut R, options: &'a [&'a str]) -> &'a str {
    options.choose(rng).copied().expect("option list is non-empty")
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outro_always_ends_with_a_thanks_line() {
        for _ in 0..20 {
            let outro = generate_outro(true);
            assert!(THANKS.iter().any(|t| outro.ends_with(*t)));
        }
    }

    #[test]
    fn outro_without_cta_excludes_cta_lines() {
        for _ in 0..20 {
            let outro = generate_outro(false);
            assert!(CTAS.iter().all(|cta| !outro.contains(cta)));
        }
    }

    #[test]
    fn truncate_short_string_is_unchanged() {
        assert_eq!(truncate("short", 100), "short");
    }

    #[test]
    fn truncate_long_string_is_capped() {
        let long = "a".repeat(200);
        let truncated = truncate(&long, 50);
        assert_eq!(truncated.chars().count(), 53);
    }
}
