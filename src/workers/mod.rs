use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;

use crate::config::Config;

pub mod job_retention;
pub mod stuck_jobs;
pub mod temp_cleanup;

lazy_static! {
    /// How long a terminal job and its result are kept around.
    pub static ref JOB_RETENTION_PERIOD: chrono::Duration = chrono::Duration::hours(24);
    /// How long stray uploads under the temp prefix may live.
    pub static ref TEMP_RETENTION_PERIOD: chrono::Duration = chrono::Duration::hours(1);
    /// Hard wall-clock execution budget of one task.
    pub static ref PROCESSING_TIME_LIMIT: chrono::Duration = chrono::Duration::minutes(30);
    /// Grace on top of the budget before a job is declared stuck.
    pub static ref PROCESSING_GRACE_PERIOD: chrono::Duration = chrono::Duration::minutes(5);
}

/// Interval at which each worker re-runs.
pub const JOB_RETENTION_INTERVAL: Duration = Duration::from_secs(3600);
pub const TEMP_CLEANUP_INTERVAL: Duration = Duration::from_secs(86400);
pub const STUCK_JOB_INTERVAL: Duration = Duration::from_secs(300);

/// Workers act like cron jobs: the entry point spawns one loop per worker
/// which runs it on a fixed interval.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn run_worker(&self, config: Arc<Config>) -> color_eyre::Result<()>;
}

pub async fn start_cron(worker: Box<dyn Worker>, interval: Duration, config: Arc<Config>) {
    loop {
        if let Err(e) = worker.run_worker(config.clone()).await {
            tracing::error!(error = ?e, "Worker run failed, will retry on next tick");
        }
        tokio::time::sleep(interval).await;
    }
}
