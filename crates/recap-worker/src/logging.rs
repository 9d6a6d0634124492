//! Structured job logging.
//!
//! Every pipeline run logs through one `JobLogger` so job ID and run phase
//! always show up as structured fields rather than buried in a message
//! string.

use recap_models::JobId;
use tracing::{error, info};

/// Attaches a job's ID and the name of the run it's part of to every log
/// line emitted through it.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    run: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, run: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            run: run.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, run = %self.run, "{}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, run = %self.run, "{}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, run = %self.run, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_job_id_through_construction() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "recap_pipeline");
        assert_eq!(logger.job_id, job_id.to_string());
        assert_eq!(logger.run, "recap_pipeline");
    }
}
