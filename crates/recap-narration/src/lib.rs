//! Narration generation for the recap pipeline: splitting a user-supplied
//! script across chapters, LLM-driven rewriting with a word-count quality
//! gate, intro/outro copy, and the shared blacklist cleanup pass.

pub mod cleaner;
pub mod generator;
pub mod intro_outro;
pub mod split;

pub use cleaner::clean_narration;
pub use generator::{rewrite_chapters_batch, target_word_count};
pub use intro_outro::{generate_intro, generate_outro};
pub use split::split_user_script_into_chapters;
