//! Video-understanding service client: upload, status polling, structured
//! extraction, scene search and video-chat based narration rewrite.
//!
//! The remote API wraps every response in an envelope with a `code` field
//! ("0000" on success); `call_json` centralizes that unwrapping so callers
//! only see typed success values or a classified `ClientError`.

use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{classify_http_error, ClientError, ClientResult};

/// Video processing status as reported by the understanding service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStatus {
    Unparsed,
    Parsed,
    ParseError,
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub video_id: String,
    pub video_name: String,
    pub status: VideoStatus,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub confidence: f64,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: String,
    msg: Option<String>,
    data: Option<Value>,
}

impl Envelope {
    fn into_data(self) -> ClientResult<Value> {
        if self.code != "0000" {
            let msg = self.msg.unwrap_or_default();
            let transient = ["network", "abnormal", "try again", "busy"]
                .iter()
                .any(|p| msg.to_lowercase().contains(p));
            return Err(if transient {
                ClientError::Transient {
                    service: "understanding",
                    message: msg,
                }
            } else {
                ClientError::Fatal {
                    service: "understanding",
                    message: msg,
                }
            });
        }
        Ok(self.data.unwrap_or(Value::Null))
    }
}

pub struct UnderstandingClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl UnderstandingClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: format!("{}/serve/api/v1", base_url.into()),
            api_key: api_key.into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(600))
                .build()
                .expect("reqwest client builds with static config"),
        }
    }

    fn auth_headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            self.api_key.parse().expect("api key is valid header value"),
        );
        headers
    }

    /// Upload a video file, optionally registering a webhook callback that
    /// the service will POST to once processing completes.
    pub async fn upload_video(
        &self,
        file_path: &Path,
        unique_id: &str,
        callback_url: Option<&str>,
    ) -> ClientResult<UploadResult> {
        let bytes = tokio::fs::read(file_path)
            .await
            .map_err(|e| ClientError::config(format!("failed to read video file: {e}")))?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "video.mp4".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("video/mp4")
            .map_err(|e| ClientError::config(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("unique_id", unique_id.to_string());
        if let Some(callback) = callback_url {
            form = form.text("callback", callback.to_string());
        }

        info!(file = %file_name, "uploading video to understanding service");

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .headers(self.auth_headers())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error("understanding", Some(status), &body));
        }

        let envelope: Envelope = response.json().await.map_err(|e| ClientError::ParseFailure {
            service: "understanding",
            message: e.to_string(),
        })?;
        let data = envelope.into_data()?;

        let video_id = data
            .get("videoNo")
            .or_else(|| data.get("video_no"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let video_name = data
            .get("videoName")
            .or_else(|| data.get("video_name"))
            .and_then(Value::as_str)
            .unwrap_or(&file_name)
            .to_string();
        let status_str = data
            .get("videoStatus")
            .or_else(|| data.get("video_status"))
            .or_else(|| data.get("status"))
            .and_then(Value::as_str)
            .unwrap_or("UNPARSE");

        Ok(UploadResult {
            video_id,
            video_name,
            status: parse_video_status(status_str),
        })
    }

    /// Poll the understanding service for a video's current processing
    /// status. This is the fallback path when webhook delivery is
    /// unavailable or has not yet arrived.
    pub async fn get_video_status(
        &self,
        video_id: &str,
        unique_id: &str,
    ) -> ClientResult<(VideoStatus, Option<String>)> {
        let response = self
            .client
            .post(format!("{}/list_videos", self.base_url))
            .headers(self.auth_headers())
            .json(&serde_json::json!({
                "video_no": video_id,
                "unique_id": unique_id,
                "page": 1,
                "size": 1,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error("understanding", Some(status), &body));
        }

        let envelope: Envelope = response.json().await.map_err(|e| ClientError::ParseFailure {
            service: "understanding",
            message: e.to_string(),
        })?;
        let data = envelope.into_data()?;

        let videos = data.get("videos").and_then(Value::as_array).cloned().unwrap_or_default();
        let Some(video) = videos.into_iter().next() else {
            return Ok((VideoStatus::Unparsed, None));
        };

        let status_str = video.get("status").and_then(Value::as_str).unwrap_or("UNPARSE");
        let cause = video
            .get("cause")
            .and_then(Value::as_str)
            .filter(|c| *c != "null")
            .map(str::to_string);

        Ok((parse_video_status(status_str), cause))
    }

    /// Extract characters, locations, relationships and factions in a
    /// single call, used to seed narration with consistent entity names.
    pub async fn extract_structured_movie_data<T: DeserializeOwned>(
        &self,
        llm: &crate::llm::LlmClient,
        chapters_context: &str,
    ) -> ClientResult<T> {
        let prompt = format!(
            "Analyze this video and extract structured data. Focus on ACTUAL NAMES, not descriptions.\n\n\
             CHAPTERS:\n{chapters_context}\n\n\
             Return ONLY valid JSON with keys: title, characters, locations, relationships, factions."
        );
        llm.generate_json(&prompt).await
    }

    /// Search for a visual/textual match within an optional time window.
    pub async fn search_video(
        &self,
        video_id: &str,
        query: &str,
        unique_id: &str,
        time_start: Option<f64>,
        time_end: Option<f64>,
        top_k: u32,
    ) -> ClientResult<Vec<SearchHit>> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .headers(self.auth_headers())
            .json(&serde_json::json!({
                "search_param": query,
                "search_type": "BY_VIDEO",
                "unique_id": unique_id,
                "video_nos": [video_id],
                "top_k": top_k * 3,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error("understanding", Some(status), &body));
        }

        let envelope: Envelope = response.json().await.map_err(|e| ClientError::ParseFailure {
            service: "understanding",
            message: e.to_string(),
        })?;
        let data = envelope.into_data()?;

        let mut hits: Vec<SearchHit> = data
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let start = item
                    .get("start")
                    .or_else(|| item.get("start_time"))
                    .and_then(Value::as_f64)?;
                let end = item
                    .get("end")
                    .or_else(|| item.get("end_time"))
                    .and_then(Value::as_f64)
                    .unwrap_or(start + 5.0);
                let confidence = item
                    .get("score")
                    .or_else(|| item.get("confidence"))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.5);

                if let Some(window_start) = time_start {
                    if end < window_start {
                        return None;
                    }
                }
                if let Some(window_end) = time_end {
                    if start > window_end {
                        return None;
                    }
                }

                Some(SearchHit {
                    start_seconds: start,
                    end_seconds: end,
                    confidence,
                    text: item.get("text").and_then(Value::as_str).map(str::to_string),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k as usize);
        Ok(hits)
    }

    /// Best-effort deletion, used during S16 cleanup. Failures are logged,
    /// never propagated, since a leaked remote video is not fatal to a job.
    pub async fn delete_video(&self, video_id: &str, unique_id: &str) {
        let result = self
            .client
            .request(reqwest::Method::DELETE, format!("{}/delete_videos", self.base_url))
            .headers(self.auth_headers())
            .json(&serde_json::json!({
                "video_nos": [video_id],
                "unique_id": unique_id,
            }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(video_id, "deleted remote video");
            }
            Ok(response) => {
                warn!(video_id, status = %response.status(), "remote video delete returned non-success");
            }
            Err(e) => {
                warn!(video_id, error = %e, "remote video delete request failed");
            }
        }
    }
}

fn parse_video_status(raw: &str) -> VideoStatus {
    match raw.to_uppercase().as_str() {
        "PARSE" => VideoStatus::Parsed,
        "PARSE_ERROR" | "FAIL" | "FAILED" | "ERROR" => VideoStatus::ParseError,
        _ => VideoStatus::Unparsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_status_strings() {
        assert_eq!(parse_video_status("PARSE"), VideoStatus::Parsed);
        assert_eq!(parse_video_status("parse_error"), VideoStatus::ParseError);
        assert_eq!(parse_video_status("FAILED"), VideoStatus::ParseError);
        assert_eq!(parse_video_status("UNPARSE"), VideoStatus::Unparsed);
        assert_eq!(parse_video_status("something_else"), VideoStatus::Unparsed);
    }

    #[test]
    fn envelope_success_unwraps_data() {
        let envelope = Envelope {
            code: "0000".to_string(),
            msg: None,
            data: Some(serde_json::json!({"videoNo": "abc"})),
        };
        let data = envelope.into_data().unwrap();
        assert_eq!(data["videoNo"], "abc");
    }

    #[test]
    fn envelope_transient_error_is_retryable() {
        let envelope = Envelope {
            code: "5000".to_string(),
            msg: Some("network hiccup, try again later".to_string()),
            data: None,
        };
        let err = envelope.into_data().unwrap_err();
        assert!(err.is_retryable());
    }
}
