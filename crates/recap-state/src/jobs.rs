//! Job Manager: create, fetch, and atomically update jobs in the state
//! store, and pop the next job id off the priority or default queue.

use recap_models::{Job, JobId, JobPatch, JobProgressEvent, JobStatus, JobSubmission, QueueName};
use tracing::{info, warn};

use crate::error::{StateError, StateResult};
use crate::store::{StateStore, DEFAULT_MAX_RETRIES};

const JOB_KEY_PREFIX: &str = "job:";

fn job_key(id: &JobId) -> String {
    format!("{JOB_KEY_PREFIX}{id}")
}

fn update_channel(id: &JobId) -> String {
    format!("job_updates:{id}")
}

pub struct JobManager {
    store: StateStore,
}

impl JobManager {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Create a job, persist it, and push its id onto the priority or
    /// default queue depending on `submission.priority`.
    pub async fn create_job(&self, submission: JobSubmission, now: chrono::DateTime<chrono::Utc>) -> StateResult<Job> {
        let id = JobId::new();
        let job = Job::new(id, submission, now);
        let raw = serde_json::to_string(&job).map_err(|e| StateError::Serialization(e.to_string()))?;
        self.store.set(&job_key(&id), &raw).await?;

        let queue = if job.priority {
            QueueName::Priority
        } else {
            QueueName::Default
        };
        self.store.lpush(queue.key(), &id.to_string()).await?;

        if job.priority {
            info!(job_id = %id, "job added to priority queue");
        }
        Ok(job)
    }

    pub async fn get_job(&self, id: &JobId) -> StateResult<Option<Job>> {
        match self.store.get(&job_key(id)).await? {
            Some(raw) => {
                let job = serde_json::from_str(&raw).map_err(|e| StateError::Serialization(e.to_string()))?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Pop the next job id: priority queue first, then default.
    pub async fn get_next_job(&self) -> StateResult<Option<JobId>> {
        for queue in [QueueName::Priority, QueueName::Default] {
            if let Some(raw) = self.store.rpop(queue.key()).await? {
                match raw.parse::<JobId>() {
                    Ok(id) => return Ok(Some(id)),
                    Err(_) => warn!(raw, "dropped malformed job id from queue"),
                }
            }
        }
        Ok(None)
    }

    /// Apply a patch to a job. Ignored if the job is missing, terminal, or
    /// the patch changes nothing. Publishes a progress event on success.
    pub async fn update_job(&self, id: &JobId, patch: &JobPatch) -> StateResult<bool> {
        self.update_job_with_retries(id, patch, DEFAULT_MAX_RETRIES).await
    }

    pub async fn update_job_with_retries(
        &self,
        id: &JobId,
        patch: &JobPatch,
        max_retries: u32,
    ) -> StateResult<bool> {
        self.transform_job(id, max_retries, |job| {
            if job.status.is_terminal() {
                return false;
            }
            patch.apply(job)
        })
        .await
    }

    /// Only set Failed if the job is not already Completed.
    pub async fn fail_job_if_not_completed(
        &self,
        id: &JobId,
        error_message: impl Into<String>,
        current_step: impl Into<String>,
    ) -> StateResult<bool> {
        let error_message = error_message.into();
        let current_step = current_step.into();
        self.transform_job(id, DEFAULT_MAX_RETRIES, |job| {
            if job.status == JobStatus::Completed {
                return false;
            }
            job.status = JobStatus::Failed;
            job.current_step = current_step.clone();
            job.error_message = Some(error_message.clone());
            true
        })
        .await
    }

    /// Only set Completed if the job is not already Failed.
    #[allow(clippy::too_many_arguments)]
    pub async fn complete_job_if_not_failed(
        &self,
        id: &JobId,
        output_url: Option<String>,
        scenes: Option<Vec<recap_models::ChapterScene>>,
        progress: u8,
        current_step: impl Into<String>,
        processed_scenes: Option<u32>,
    ) -> StateResult<bool> {
        let current_step = current_step.into();
        self.transform_job(id, DEFAULT_MAX_RETRIES, |job| {
            if job.status == JobStatus::Failed {
                return false;
            }
            job.status = JobStatus::Completed;
            job.progress = progress;
            job.current_step = current_step.clone();
            if let Some(n) = processed_scenes {
                job.processed_scenes = n;
            }
            if let Some(url) = &output_url {
                job.output_url = Some(url.clone());
            }
            if let Some(scenes) = &scenes {
                job.scenes = scenes.clone();
            }
            true
        })
        .await
    }

    async fn transform_job(
        &self,
        id: &JobId,
        max_retries: u32,
        mut apply: impl FnMut(&mut Job) -> bool,
    ) -> StateResult<bool> {
        let key = job_key(id);
        let channel = update_channel(id);
        let now = chrono::Utc::now();

        self.store
            .atomic_update(&key, Some(&channel), max_retries, |raw| {
                let raw = raw?;
                let mut job: Job = serde_json::from_str(raw).ok()?;
                if !apply(&mut job) {
                    return None;
                }
                job.updated_at = now;
                let event = JobProgressEvent::from(&job);
                let payload = serde_json::to_string(&job).ok()?;
                let publish = serde_json::to_string(&event).ok();
                Some((payload, publish))
            })
            .await
    }

    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        user_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> StateResult<Vec<Job>> {
        let keys = self.store.scan_keys(&format!("{JOB_KEY_PREFIX}*")).await?;
        let mut jobs = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(raw) = self.store.get(&key).await? {
                if let Ok(job) = serde_json::from_str::<Job>(&raw) {
                    if status.is_some_and(|s| s != job.status) {
                        continue;
                    }
                    if let Some(uid) = user_id {
                        if job.user_id.as_deref() != Some(uid) {
                            continue;
                        }
                    }
                    jobs.push(job);
                }
            }
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }

    pub async fn cleanup_old_jobs(&self, max_age_hours: i64) -> StateResult<u32> {
        let cutoff = chrono::Utc::now() - chrono::Duration::hours(max_age_hours);
        let jobs = self.list_jobs(None, None, 10_000, 0).await?;
        let mut deleted = 0u32;
        for job in jobs {
            if job.status.is_terminal() && job.created_at < cutoff {
                self.store.delete(&job_key(&job.id)).await?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_key_has_prefix() {
        let id = JobId::new();
        assert!(job_key(&id).starts_with("job:"));
    }

    #[test]
    fn update_channel_matches_spec_naming() {
        let id = JobId::new();
        assert_eq!(update_channel(&id), format!("job_updates:{id}"));
    }
}
