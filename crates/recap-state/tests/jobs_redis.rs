//! Integration tests against a live Redis instance. Ignored by default; run
//! with `cargo test -- --ignored` against a real `REDIS_URL`.

use chrono::Utc;
use recap_models::{JobSubmission, JobStatus, PlanTier};
use recap_state::{JobManager, StateStore};

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

fn test_submission() -> JobSubmission {
    JobSubmission {
        source_video_key: "videos/test-source.mp4".to_string(),
        original_filename: "test-source.mp4".to_string(),
        target_duration_minutes: None,
        character_guide: None,
        series_id: None,
        user_id: None,
        plan_tier: PlanTier::None,
        priority: false,
        enable_clip_matching: false,
        enable_copyright_protection: false,
        has_script: false,
    }
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn connects_and_round_trips_a_job() {
    let store = StateStore::new(&redis_url()).expect("failed to build redis client");
    let jobs = JobManager::new(store);

    let job = jobs
        .create_job(test_submission(), Utc::now())
        .await
        .expect("failed to create job");
    assert_eq!(job.status, JobStatus::Pending);

    let fetched = jobs.get_job(&job.id).await.expect("failed to fetch job");
    assert_eq!(fetched.map(|j| j.id), Some(job.id));
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn default_queue_pop_returns_created_job() {
    let store = StateStore::new(&redis_url()).expect("failed to build redis client");
    let jobs = JobManager::new(store);

    let job = jobs
        .create_job(test_submission(), Utc::now())
        .await
        .expect("failed to create job");

    let popped = jobs.get_next_job().await.expect("failed to pop next job");
    assert_eq!(popped, Some(job.id));
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn priority_queue_drains_before_default_queue() {
    let store = StateStore::new(&redis_url()).expect("failed to build redis client");
    let jobs = JobManager::new(store);

    let default_job = jobs
        .create_job(test_submission(), Utc::now())
        .await
        .expect("failed to create default job");
    let priority_submission = JobSubmission {
        priority: true,
        ..test_submission()
    };
    let priority_job = jobs
        .create_job(priority_submission, Utc::now())
        .await
        .expect("failed to create priority job");

    let first = jobs.get_next_job().await.expect("failed to pop next job");
    assert_eq!(first, Some(priority_job.id));

    let second = jobs.get_next_job().await.expect("failed to pop next job");
    assert_eq!(second, Some(default_job.id));
}
