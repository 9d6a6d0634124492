//! HTTP clients for the external services the recap pipeline depends on:
//! the video-understanding service, the LLM used for narration and
//! character extraction, and the text-to-speech service.

pub mod error;
pub mod llm;
pub mod retry;
pub mod tts;
pub mod understanding;
pub mod vector_store;

pub use error::{classify_http_error, ClientError, ClientResult};
pub use llm::LlmClient;
pub use retry::{retry_transient, RetryConfig};
pub use tts::{TtsClient, TtsResult, VoiceInfo, WordAlignment};
pub use understanding::{SearchHit, UnderstandingClient, UploadResult, VideoStatus};
pub use vector_store::{NullVectorStore, VectorMatch, VectorStoreClient};
