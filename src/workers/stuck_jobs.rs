use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};

use crate::config::Config;
use crate::jobs::types::{JobItemUpdates, JobStatus};
use crate::workers::{Worker, PROCESSING_GRACE_PERIOD, PROCESSING_TIME_LIMIT};

pub struct StuckJobWorker;

#[async_trait]
impl Worker for StuckJobWorker {
    /// A task that was forcibly terminated by the queue infrastructure
    /// leaves its job in Processing forever. Any job processing past the
    /// hard execution budget plus grace is implicitly failed here.
    async fn run_worker(&self, config: Arc<Config>) -> color_eyre::Result<()> {
        tracing::trace!(log_type = "starting", category = "StuckJobWorker", "StuckJobWorker started.");

        let cutoff = Utc::now().round_subsecs(0) - *PROCESSING_TIME_LIMIT - *PROCESSING_GRACE_PERIOD;
        let stuck_jobs = config.database().get_jobs_stuck_in_processing(cutoff).await?;

        let mut failed = 0usize;
        for job in stuck_jobs {
            let updates = JobItemUpdates::new()
                .update_status(JobStatus::Failed)
                .update_error_detail("execution time limit exceeded".to_string())
                .update_completed_at(Utc::now().round_subsecs(0))
                .build();
            match config.database().update_job(&job, updates).await {
                Ok(_) => {
                    tracing::warn!(job_id = %job.id, "Marked stuck job as failed");
                    failed += 1;
                }
                // a conditional-update miss means the job moved on by itself
                Err(e) => tracing::debug!(job_id = %job.id, error = %e, "Skipped stuck candidate"),
            }
        }

        tracing::info!(
            log_type = "completed",
            category = "StuckJobWorker",
            failed_jobs = failed,
            "StuckJobWorker completed."
        );
        Ok(())
    }
}
