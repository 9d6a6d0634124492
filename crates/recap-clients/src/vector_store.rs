//! Interface to the visual-entailment/grounding/vector-match subsystem.
//!
//! This subsystem's internals are out of scope: its inputs and outputs are
//! specified, but nothing here implements embedding, indexing, or ranking.
//! `recap-worker`'s optional clip matcher (S12) depends on this trait so a
//! concrete implementation can be swapped in without touching pipeline code.

use std::future::Future;
use std::pin::Pin;

use crate::error::ClientResult;

#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub scene_id: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub score: f64,
}

pub trait VectorStoreClient: Send + Sync {
    /// Find the scenes whose visual/semantic embedding best matches `text`,
    /// restricted to `video_id`.
    fn match_text<'a>(
        &'a self,
        video_id: &'a str,
        text: &'a str,
        top_k: u32,
    ) -> Pin<Box<dyn Future<Output = ClientResult<Vec<VectorMatch>>> + Send + 'a>>;
}

/// No-op implementation used when the enrichment subsystem is not
/// configured; S12 treats an empty result as "no match found" rather than
/// an error.
pub struct NullVectorStore;

impl VectorStoreClient for NullVectorStore {
    fn match_text<'a>(
        &'a self,
        _video_id: &'a str,
        _text: &'a str,
        _top_k: u32,
    ) -> Pin<Box<dyn Future<Output = ClientResult<Vec<VectorMatch>>> + Send + 'a>> {
        Box::pin(async move { Ok(Vec::new()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_vector_store_returns_empty() {
        let store = NullVectorStore;
        let result = store.match_text("video-1", "a car chase", 5).await.unwrap();
        assert!(result.is_empty());
    }
}
