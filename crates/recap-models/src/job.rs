//! Job data model: the durable record a recap job is tracked by.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chapter::ChapterScene;

/// Opaque job identifier, a UUID v4 under the hood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Job lifecycle state. `Completed` and `Failed` are terminal and absorbing:
/// once entered, no further mutation is permitted (enforced by the atomic
/// update protocol in `recap-state`, not by this type alone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    GeneratingAudio,
    Stitching,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Subscription tier the submitting user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    None,
    Creator,
    Studio,
}

/// The durable job record. See spec §3 "Job".
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,
    pub source_video_key: String,
    pub original_filename: String,
    pub target_duration_minutes: Option<f64>,
    pub character_guide: Option<String>,
    pub series_id: Option<String>,
    pub user_id: Option<String>,
    pub plan_tier: PlanTier,
    pub priority: bool,
    pub enable_clip_matching: bool,
    pub enable_copyright_protection: bool,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: String,
    pub total_scenes: u32,
    pub processed_scenes: u32,
    pub error_message: Option<String>,
    pub output_url: Option<String>,
    pub scenes: Vec<ChapterScene>,
    pub has_script: bool,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a job is first submitted.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct JobSubmission {
    pub source_video_key: String,
    pub original_filename: String,
    pub target_duration_minutes: Option<f64>,
    pub character_guide: Option<String>,
    pub series_id: Option<String>,
    pub user_id: Option<String>,
    pub plan_tier: PlanTier,
    pub priority: bool,
    pub enable_clip_matching: bool,
    pub enable_copyright_protection: bool,
    pub has_script: bool,
}

impl Job {
    /// Construct the initial record for a freshly submitted job.
    pub fn new(id: JobId, submission: JobSubmission, now: DateTime<Utc>) -> Self {
        Self {
            id,
            source_video_key: submission.source_video_key,
            original_filename: submission.original_filename,
            target_duration_minutes: submission.target_duration_minutes,
            character_guide: submission.character_guide,
            series_id: submission.series_id,
            user_id: submission.user_id,
            plan_tier: submission.plan_tier,
            priority: submission.priority,
            enable_clip_matching: submission.enable_clip_matching,
            enable_copyright_protection: submission.enable_copyright_protection,
            status: JobStatus::Pending,
            progress: 0,
            current_step: "Queued".to_string(),
            total_scenes: 0,
            processed_scenes: 0,
            error_message: None,
            output_url: None,
            scenes: Vec::new(),
            has_script: submission.has_script,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A typed, all-optional patch applied via the atomic-key-update primitive.
///
/// Only fields that are `Some` and whose value differs from the current
/// record are applied; the transform function in `recap-state` is
/// responsible for the field-by-field diff and for reporting whether
/// anything changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub current_step: Option<String>,
    pub total_scenes: Option<u32>,
    pub processed_scenes: Option<u32>,
    pub error_message: Option<String>,
    pub output_url: Option<String>,
    pub scenes: Option<Vec<ChapterScene>>,
    pub cancel_requested: Option<bool>,
}

impl JobPatch {
    /// Apply this patch onto `job`, returning whether any field changed.
    pub fn apply(&self, job: &mut Job) -> bool {
        let mut changed = false;

        macro_rules! apply_field {
            ($field:ident) => {
                if let Some(v) = self.$field.clone() {
                    if job.$field != v {
                        job.$field = v;
                        changed = true;
                    }
                }
            };
        }

        macro_rules! apply_optional_field {
            ($field:ident) => {
                if let Some(v) = self.$field.clone() {
                    if job.$field != Some(v.clone()) {
                        job.$field = Some(v);
                        changed = true;
                    }
                }
            };
        }

        apply_field!(status);
        apply_field!(progress);
        apply_field!(current_step);
        apply_field!(total_scenes);
        apply_field!(processed_scenes);
        apply_optional_field!(error_message);
        apply_optional_field!(output_url);
        apply_field!(scenes);
        apply_field!(cancel_requested);

        changed
    }
}

/// The minimal payload published on `job_updates:{job_id}` for every state
/// change (spec §4.2, §6).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobProgressEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: String,
}

impl From<&Job> for JobProgressEvent {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            current_step: job.current_step.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn patch_reports_no_change_for_identical_values() {
        let now = Utc::now();
        let submission = JobSubmission {
            source_video_key: "videos/v1".into(),
            original_filename: "movie.mp4".into(),
            target_duration_minutes: None,
            character_guide: None,
            series_id: None,
            user_id: None,
            plan_tier: PlanTier::None,
            priority: false,
            enable_clip_matching: false,
            enable_copyright_protection: false,
            has_script: false,
        };
        let mut job = Job::new(JobId::new(), submission, now);

        let patch = JobPatch {
            progress: Some(0),
            ..Default::default()
        };
        assert!(!patch.apply(&mut job));

        let patch = JobPatch {
            progress: Some(5),
            ..Default::default()
        };
        assert!(patch.apply(&mut job));
        assert_eq!(job.progress, 5);
    }
}
