//! Worker configuration: a layered, immutable config value built once at
//! startup from (in ascending priority) built-in defaults, a `.env` file,
//! and process environment variables.

use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// Resolved worker configuration. Constructed once via [`RecapConfig::load`]
/// and handed to the pipeline by reference; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RecapConfig {
    pub redis_url: String,
    pub work_dir: String,
    pub max_concurrent_jobs: usize,

    pub understanding_base_url: String,
    pub understanding_api_key: String,
    pub llm_api_key: String,
    pub tts_api_key: String,
    pub tts_default_voice_id: String,

    /// Base URL the webhook callback is reachable at. When unset, S5/S6 use
    /// polling mode instead of webhook mode.
    pub webhook_base_url: Option<String>,

    pub narration_batch_size_structured: usize,
    pub narration_batch_size_fallback: usize,
    pub tts_batch_size: usize,

    pub job_timeout: Duration,
    pub wait_for_parsing_timeout: Duration,
    pub stitch_timeout: Duration,
}

impl RecapConfig {
    /// Build the layered config: defaults < `.env` < process environment.
    /// `dotenvy::dotenv()` is expected to have already been called by the
    /// binary entrypoint so its values land in the process environment
    /// before this runs.
    pub fn load() -> WorkerResult<Self> {
        let builder = config::Config::builder()
            .set_default("redis_url", "redis://localhost:6379")?
            .set_default("work_dir", "/tmp/recap")?
            .set_default("max_concurrent_jobs", 2i64)?
            .set_default("understanding_base_url", "")?
            .set_default("understanding_api_key", "")?
            .set_default("llm_api_key", "")?
            .set_default("tts_api_key", "")?
            .set_default("tts_default_voice_id", "")?
            .set_default("narration_batch_size_structured", 3i64)?
            .set_default("narration_batch_size_fallback", 5i64)?
            .set_default("tts_batch_size", 5i64)?
            .set_default("job_timeout_secs", 3600i64)?
            .set_default("wait_for_parsing_timeout_secs", 1800i64)?
            .set_default("stitch_timeout_secs", 1800i64)?
            .add_source(config::Environment::with_prefix("RECAP").try_parsing(true));

        let raw = builder
            .build()
            .map_err(|e| WorkerError::config_error(e.to_string()))?;

        Ok(Self {
            redis_url: raw.get_string("redis_url").map_err(cfg_err)?,
            work_dir: raw.get_string("work_dir").map_err(cfg_err)?,
            max_concurrent_jobs: raw.get_int("max_concurrent_jobs").map_err(cfg_err)? as usize,
            understanding_base_url: raw.get_string("understanding_base_url").map_err(cfg_err)?,
            understanding_api_key: raw.get_string("understanding_api_key").map_err(cfg_err)?,
            llm_api_key: raw.get_string("llm_api_key").map_err(cfg_err)?,
            tts_api_key: raw.get_string("tts_api_key").map_err(cfg_err)?,
            tts_default_voice_id: raw.get_string("tts_default_voice_id").map_err(cfg_err)?,
            webhook_base_url: raw.get_string("webhook_base_url").ok().filter(|s| !s.is_empty()),
            narration_batch_size_structured: raw
                .get_int("narration_batch_size_structured")
                .map_err(cfg_err)? as usize,
            narration_batch_size_fallback: raw
                .get_int("narration_batch_size_fallback")
                .map_err(cfg_err)? as usize,
            tts_batch_size: raw.get_int("tts_batch_size").map_err(cfg_err)? as usize,
            job_timeout: Duration::from_secs(raw.get_int("job_timeout_secs").map_err(cfg_err)? as u64),
            wait_for_parsing_timeout: Duration::from_secs(
                raw.get_int("wait_for_parsing_timeout_secs").map_err(cfg_err)? as u64,
            ),
            stitch_timeout: Duration::from_secs(raw.get_int("stitch_timeout_secs").map_err(cfg_err)? as u64),
        })
    }

    /// Whether the webhook wait protocol (S6) should be used over polling.
    pub fn webhook_enabled(&self) -> bool {
        self.webhook_base_url
            .as_deref()
            .is_some_and(|url| url.starts_with("http://") || url.starts_with("https://"))
    }
}

fn cfg_err(e: config::ConfigError) -> WorkerError {
    WorkerError::config_error(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_disabled_when_unset() {
        let cfg = RecapConfig {
            webhook_base_url: None,
            ..test_config()
        };
        assert!(!cfg.webhook_enabled());
    }

    #[test]
    fn webhook_disabled_for_malformed_url() {
        let cfg = RecapConfig {
            webhook_base_url: Some("not-a-url".to_string()),
            ..test_config()
        };
        assert!(!cfg.webhook_enabled());
    }

    #[test]
    fn webhook_enabled_for_https_url() {
        let cfg = RecapConfig {
            webhook_base_url: Some("https://example.com".to_string()),
            ..test_config()
        };
        assert!(cfg.webhook_enabled());
    }

    fn test_config() -> RecapConfig {
        RecapConfig {
            redis_url: "redis://localhost:6379".into(),
            work_dir: "/tmp/recap".into(),
            max_concurrent_jobs: 2,
            understanding_base_url: String::new(),
            understanding_api_key: String::new(),
            llm_api_key: String::new(),
            tts_api_key: String::new(),
            tts_default_voice_id: String::new(),
            webhook_base_url: None,
            narration_batch_size_structured: 3,
            narration_batch_size_fallback: 5,
            tts_batch_size: 5,
            job_timeout: Duration::from_secs(3600),
            wait_for_parsing_timeout: Duration::from_secs(1800),
            stitch_timeout: Duration::from_secs(1800),
        }
    }
}
