use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};

use crate::config::Config;
use crate::helpers::delete_blobs_best_effort;
use crate::jobs::constants::TEMP_UPLOAD_PREFIX;
use crate::workers::{Worker, TEMP_RETENTION_PERIOD};

pub struct TempCleanupWorker;

#[async_trait]
impl Worker for TempCleanupWorker {
    /// Purges stale objects under the temp upload prefix, independent of
    /// job records. Covers uploads that never became a job and inputs left
    /// behind when a post-completion cleanup failed.
    async fn run_worker(&self, config: Arc<Config>) -> color_eyre::Result<()> {
        tracing::trace!(log_type = "starting", category = "TempCleanupWorker", "TempCleanupWorker started.");

        let cutoff = Utc::now().round_subsecs(0) - *TEMP_RETENTION_PERIOD;
        let stale_keys = config.storage().list_keys_older_than(TEMP_UPLOAD_PREFIX, cutoff).await?;

        if !stale_keys.is_empty() {
            delete_blobs_best_effort(config.storage(), &stale_keys).await;
        }

        tracing::info!(
            log_type = "completed",
            category = "TempCleanupWorker",
            stale_objects = stale_keys.len(),
            "TempCleanupWorker completed."
        );
        Ok(())
    }
}
