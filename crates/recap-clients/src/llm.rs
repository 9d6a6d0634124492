//! Generic LLM client used for narration generation, character extraction,
//! and intro/outro copywriting. Prompt construction and response parsing
//! for those specific tasks live in `recap-narration`; this module owns
//! only the HTTP call and model-fallback mechanics.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{classify_http_error, ClientError, ClientResult};

/// Models tried in order until one succeeds. Mirrors the worker's
/// highlight-extraction fallback chain, generalized to any JSON-producing
/// prompt.
const MODEL_FALLBACK_CHAIN: &[&str] = &[
    "gemini-3-flash-preview",
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.5-pro",
];

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

pub struct LlmClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Send `prompt` to the first model in the fallback chain that returns a
    /// successful response, parsing the result as JSON of type `T`.
    pub async fn generate_json<T: DeserializeOwned>(&self, prompt: &str) -> ClientResult<T> {
        let text = self.generate_text_with_fallback(prompt).await?;
        parse_json_lenient(&text)
    }

    /// Same as `generate_json` but pinned to a single model, used when the
    /// caller has already chosen a model (e.g. to keep a batch consistent).
    pub async fn generate_json_with_model<T: DeserializeOwned>(
        &self,
        model: &str,
        prompt: &str,
    ) -> ClientResult<T> {
        let text = self.call_model(model, prompt).await?;
        parse_json_lenient(&text)
    }

    /// Send `prompt` and return raw text, trying each model in
    /// `MODEL_FALLBACK_CHAIN` until one succeeds.
    pub async fn generate_text_with_fallback(&self, prompt: &str) -> ClientResult<String> {
        let mut last_error = None;

        for model in MODEL_FALLBACK_CHAIN {
            info!(model, "attempting LLM call");
            match self.call_model(model, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() => {
                    warn!(model, error = %e, "model call failed, trying next");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ClientError::Fatal {
            service: "llm",
            message: "all models in fallback chain failed".to_string(),
        }))
    }

    async fn call_model(&self, model: &str, prompt: &str) -> ClientResult<String> {
        let url = format!("{}/{model}:generateContent?key={}", self.base_url, self.api_key);

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error("llm", Some(status), &body));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| ClientError::ParseFailure {
            service: "llm",
            message: e.to_string(),
        })?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ClientError::ParseFailure {
                service: "llm",
                message: "no content in response".to_string(),
            })
    }
}

/// Strip a surrounding markdown code fence, if present, then parse JSON.
fn parse_json_lenient<T: DeserializeOwned>(text: &str) -> ClientResult<T> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix("```json").unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix("```").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);

    serde_json::from_str(trimmed.trim()).map_err(|e| ClientError::ParseFailure {
        service: "llm",
        message: format!("failed to parse JSON response: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        value: u32,
    }

    #[test]
    fn parses_plain_json() {
        let parsed: Payload = parse_json_lenient(r#"{"value": 7}"#).unwrap();
        assert_eq!(parsed, Payload { value: 7 });
    }

    #[test]
    fn strips_markdown_fence_before_parsing() {
        let text = "```json\n{\"value\": 9}\n```";
        let parsed: Payload = parse_json_lenient(text).unwrap();
        assert_eq!(parsed, Payload { value: 9 });
    }

    #[test]
    fn invalid_json_is_parse_failure() {
        let result: ClientResult<Payload> = parse_json_lenient("not json");
        assert!(matches!(result, Err(ClientError::ParseFailure { .. })));
    }
}
