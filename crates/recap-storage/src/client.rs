//! R2 client for the recap object store.
//!
//! Key layout is fixed by the pipeline, not the caller: source uploads live
//! at an arbitrary key handed in by the submission, user scripts and
//! rendered output live under `videos/{job_id}/script.txt` and
//! `output/{job_id}/...`. The client encodes that layout directly so the
//! pipeline stages never assemble a key themselves.

use std::path::Path;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::public_url::rewrite_to_public_endpoint;

const OUTPUT_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for the R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public CDN base URL that presigned output links get rewritten to, so
    /// the account-scoped R2 API host never reaches a client. Unset means
    /// skip rewriting and hand back the raw presigned URL.
    pub public_base_url: Option<String>,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("R2_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("R2_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("R2_BUCKET_NAME not set"))?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: std::env::var("R2_PUBLIC_BASE_URL").ok(),
        })
    }
}

/// Cloudflare R2 client, scoped to the recap pipeline's object-store layout.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
    public_base_url: Option<String>,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub async fn new(config: R2Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(sdk_config);

        Ok(Self {
            client,
            bucket: config.bucket_name,
            public_base_url: config.public_base_url,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = R2Config::from_env()?;
        Self::new(config).await
    }

    /// Download the job's source video (S2) to `dest`. The key comes from
    /// the submission, not from any layout convention this client owns.
    pub async fn download_source_video(&self, source_key: &str, dest: impl AsRef<Path>) -> StorageResult<()> {
        self.download_file(source_key, dest).await
    }

    /// Fetch the job's optional user-supplied script from
    /// `videos/{job_id}/script.txt`. Returns `None` if the key doesn't exist.
    pub async fn fetch_user_script(&self, job_id: &str) -> StorageResult<Option<String>> {
        let key = format!("videos/{job_id}/script.txt");
        match self.download_bytes(&key).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// S15: upload the rendered recap and its narration script to
    /// `output/{job_id}/final_recap.mp4` and `output/{job_id}/script.txt`.
    pub async fn upload_recap_output(
        &self,
        job_id: &str,
        video_path: impl AsRef<Path>,
        script: &str,
    ) -> StorageResult<()> {
        let video_key = format!("output/{job_id}/final_recap.mp4");
        let script_key = format!("output/{job_id}/script.txt");

        self.upload_file(video_path, &video_key, "video/mp4").await?;
        self.upload_bytes(script.as_bytes().to_vec(), &script_key, "text/plain")
            .await?;
        Ok(())
    }

    /// S16: presign a week-long download URL for the job's rendered output,
    /// rewritten to the public CDN endpoint when one is configured.
    pub async fn presign_recap_output(&self, job_id: &str) -> StorageResult<String> {
        let video_key = format!("output/{job_id}/final_recap.mp4");
        let presigned = self.presign_get(&video_key, OUTPUT_PRESIGN_EXPIRY).await?;

        match &self.public_base_url {
            Some(base) => Ok(rewrite_to_public_endpoint(&presigned, base).unwrap_or(presigned)),
            None => Ok(presigned),
        }
    }

    async fn upload_file(&self, path: impl AsRef<Path>, key: &str, content_type: &str) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}", data.len(), key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        debug!("Downloading {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    async fn download_file(&self, key: &str, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Downloading {} to {}", key, path.display());

        let bytes = self.download_bytes(key).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::DownloadFailed(format!("Failed to create directory: {}", e)))?;
        }

        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| StorageError::DownloadFailed(format!("Failed to write file: {}", e)))?;

        info!("Downloaded {} to {}", key, path.display());
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_presign_expiry_is_one_week() {
        assert_eq!(OUTPUT_PRESIGN_EXPIRY.as_secs(), 7 * 24 * 60 * 60);
    }
}
