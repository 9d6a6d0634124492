//! Shared handles threaded through every pipeline stage.

use std::sync::Arc;

use recap_clients::{LlmClient, NullVectorStore, TtsClient, UnderstandingClient, VectorStoreClient};
use recap_state::{JobManager, StateStore};
use recap_storage::{R2Client, R2Config};

use crate::config::RecapConfig;
use crate::error::WorkerResult;

/// Bundles the state store, object storage, and external API clients a
/// pipeline run needs. Constructed once at worker startup and shared
/// (behind `Arc`) across concurrently executing jobs.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<RecapConfig>,
    pub jobs: Arc<JobManager>,
    pub store: Arc<StateStore>,
    pub storage: Arc<R2Client>,
    pub understanding: Arc<UnderstandingClient>,
    pub llm: Arc<LlmClient>,
    pub tts: Arc<TtsClient>,
    /// The visual-entailment/grounding/vector-match subsystem used by the
    /// optional S12 clip matcher. Defaults to a no-op implementation since
    /// that subsystem's internals are out of scope here.
    pub vector_store: Arc<dyn VectorStoreClient>,
}

impl PipelineContext {
    pub async fn new(config: RecapConfig) -> WorkerResult<Self> {
        let store = StateStore::new(&config.redis_url)?;
        let jobs = JobManager::new(store.clone());

        let r2_config = R2Config::from_env()?;
        let storage = R2Client::new(r2_config).await?;

        let understanding = UnderstandingClient::new(
            config.understanding_base_url.clone(),
            config.understanding_api_key.clone(),
        );
        let llm = LlmClient::new(config.llm_api_key.clone());
        let tts = TtsClient::new(config.tts_api_key.clone(), config.tts_default_voice_id.clone());

        Ok(Self {
            config: Arc::new(config),
            jobs: Arc::new(jobs),
            store: Arc::new(store),
            storage: Arc::new(storage),
            understanding: Arc::new(understanding),
            llm: Arc::new(llm),
            tts: Arc::new(tts),
            vector_store: Arc::new(NullVectorStore),
        })
    }
}
