use dotenvy::dotenv;
use paperpress::config::init_config;
use paperpress::queue::init_consumers;
use paperpress::workers::job_retention::JobRetentionWorker;
use paperpress::workers::stuck_jobs::StuckJobWorker;
use paperpress::workers::temp_cleanup::TempCleanupWorker;
use paperpress::workers::{
    start_cron, JOB_RETENTION_INTERVAL, STUCK_JOB_INTERVAL, TEMP_CLEANUP_INTERVAL,
};

/// Start the orchestrator: queue consumers plus the periodic sweepers.
/// `paperpress setup` provisions the queues and the bucket instead of running.
#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = init_config().await;

    if std::env::args().nth(1).as_deref() == Some("setup") {
        config.queue().setup().await.expect("Failed to setup queues");
        tracing::info!("Queue setup completed");
        return;
    }

    // init consumers, one lane per tool plus the failure lane
    init_consumers(config.clone()).await.expect("Failed to init consumers");

    // spawn a thread for each sweeper
    tokio::spawn(start_cron(Box::new(JobRetentionWorker), JOB_RETENTION_INTERVAL, config.clone()));
    tokio::spawn(start_cron(Box::new(TempCleanupWorker), TEMP_CLEANUP_INTERVAL, config.clone()));
    tokio::spawn(start_cron(Box::new(StuckJobWorker), STUCK_JOB_INTERVAL, config.clone()));

    tracing::info!("Orchestrator running, waiting for shutdown signal");
    tokio::signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
    tracing::info!("Orchestrator shutting down");
}
