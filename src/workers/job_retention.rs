use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};

use crate::config::Config;
use crate::workers::{Worker, JOB_RETENTION_PERIOD};

/// Upper bound on records handled per sweep; the next tick picks up the rest.
const SWEEP_BATCH_SIZE: i64 = 500;

pub struct JobRetentionWorker;

#[async_trait]
impl Worker for JobRetentionWorker {
    /// 1. Fetch terminal jobs whose completed_at is past the retention period.
    /// 2. Best-effort delete their result blobs.
    /// 3. Delete the job records.
    async fn run_worker(&self, config: Arc<Config>) -> color_eyre::Result<()> {
        tracing::trace!(log_type = "starting", category = "JobRetentionWorker", "JobRetentionWorker started.");

        let cutoff = Utc::now().round_subsecs(0) - *JOB_RETENTION_PERIOD;
        let expired_jobs = config.database().get_jobs_completed_before(cutoff, SWEEP_BATCH_SIZE).await?;

        let mut deleted = 0usize;
        for job in expired_jobs {
            if let Some(result_ref) = &job.result_ref {
                if let Err(e) = config.storage().delete_data(result_ref).await {
                    tracing::warn!(
                        job_id = %job.id,
                        key = %result_ref,
                        error = %e,
                        "Failed to delete expired result blob"
                    );
                }
            }

            match config.database().delete_job(job.id).await {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!(job_id = %job.id, error = %e, "Failed to delete expired job record"),
            }
        }

        tracing::info!(
            log_type = "completed",
            category = "JobRetentionWorker",
            deleted_jobs = deleted,
            "JobRetentionWorker completed."
        );
        Ok(())
    }
}
