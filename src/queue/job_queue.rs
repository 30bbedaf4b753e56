use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::Context;
use color_eyre::Result as EyreResult;
use omniqueue::{Delivery, QueueError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use uuid::Uuid;

use super::QueueType;
use crate::config::Config;
use crate::jobs::types::{JobItem, JobParameters, ToolType};
use crate::jobs::{handle_job_failure, process_job, JobError, OtherError};

#[derive(Error, Debug, PartialEq)]
pub enum ConsumptionError {
    #[error("Failed to consume message from queue, error {error_msg:?}")]
    FailedToConsumeFromQueue { error_msg: String },

    #[error("Failed to handle job with id {job_id:?}. Error: {error_msg:?}")]
    FailedToHandleJob { job_id: Uuid, error_msg: String },

    #[error("Other error: {0}")]
    Other(#[from] OtherError),
}

/// Payload of a task addressed to a tool entry point. Carries the job id
/// plus the arguments the entry point needs (input keys and parameters,
/// never file contents); the job record stays authoritative for state.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobQueueMessage {
    pub id: Uuid,
    pub input_refs: Vec<String>,
    pub parameters: JobParameters,
}

impl From<&JobItem> for JobQueueMessage {
    fn from(job: &JobItem) -> Self {
        Self { id: job.id, input_refs: job.input_refs.clone(), parameters: job.parameters.clone() }
    }
}

#[derive(Debug)]
enum DeliveryReturnType {
    Message(Delivery),
    NoMessage,
}

pub trait QueueNameForToolType {
    fn process_queue_name(&self) -> QueueType;
}

impl QueueNameForToolType for ToolType {
    fn process_queue_name(&self) -> QueueType {
        match self {
            ToolType::Merge => QueueType::MergeJobProcessing,
            ToolType::Compress => QueueType::CompressJobProcessing,
            ToolType::Reduce => QueueType::ReduceJobProcessing,
            ToolType::Convert => QueueType::ConvertJobProcessing,
        }
    }
}

/// Enqueues exactly one task for the job onto its tool's processing lane.
pub async fn add_job_to_process_queue(job: &JobItem, config: Arc<Config>) -> EyreResult<()> {
    tracing::info!("Adding job with id {:?} to processing queue", job.id);
    add_job_to_queue(JobQueueMessage::from(job), job.tool_type.process_queue_name(), None, config).await
}

pub async fn consume_job_from_queue<F, Fut>(
    queue: QueueType,
    handler: F,
    config: Arc<Config>,
) -> Result<(), ConsumptionError>
where
    F: FnOnce(JobQueueMessage, Arc<Config>) -> Fut,
    F: Send + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send,
{
    tracing::trace!(queue = %queue, "Attempting to consume job from queue");

    let delivery = get_delivery_from_queue(queue.clone(), config.clone()).await?;

    let message = match delivery {
        DeliveryReturnType::Message(message) => {
            tracing::debug!(queue = %queue, "Message received from queue");
            message
        }
        DeliveryReturnType::NoMessage => {
            tracing::debug!(queue = %queue, "No message in queue");
            return Ok(());
        }
    };

    let job_message = parse_job_message(&message)?;

    if let Some(job_message) = job_message {
        tracing::info!(queue = %queue, job_id = %job_message.id, "Processing job message");
        tokio::spawn(async move {
            if let Err(e) = handle_job_message(job_message, message, handler, config).await {
                tracing::error!("Failed to handle job message. Error: {:?}", e);
            }
        });
    } else {
        tracing::warn!(queue = %queue, "Received empty job message");
    }

    Ok(())
}

fn parse_job_message(message: &Delivery) -> Result<Option<JobQueueMessage>, ConsumptionError> {
    message
        .payload_serde_json()
        .wrap_err("Payload Serde Error")
        .map_err(|e| ConsumptionError::Other(OtherError::from(e)))
}

async fn handle_job_message<F, Fut>(
    job_message: JobQueueMessage,
    message: Delivery,
    handler: F,
    config: Arc<Config>,
) -> Result<(), ConsumptionError>
where
    F: FnOnce(JobQueueMessage, Arc<Config>) -> Fut,
    Fut: Future<Output = Result<(), JobError>>,
{
    let job_id = job_message.id;
    tracing::info!("Handling job with id {:?}", job_id);

    match handler(job_message, config.clone()).await {
        Ok(_) => {
            message
                .ack()
                .await
                .map_err(|(e, _)| e)
                .wrap_err("Queue Error")
                .map_err(|e| ConsumptionError::Other(OtherError::from(e)))?;
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to handle job with id {:?}. Error: {:?}", job_id, e);

            // Failures are recorded on the job record by the handler itself;
            // ack instead of nack so the broker does not re-drive a job that
            // has already been marked failed.
            match message.ack().await {
                Ok(_) => Err(ConsumptionError::FailedToHandleJob {
                    job_id,
                    error_msg: e.to_string(),
                }),
                Err(delivery_ack_error) => Err(ConsumptionError::FailedToHandleJob {
                    job_id,
                    error_msg: delivery_ack_error.0.to_string(),
                }),
            }
        }
    }
}

/// To get the delivery from the message queue using the queue name
async fn get_delivery_from_queue(
    queue: QueueType,
    config: Arc<Config>,
) -> Result<DeliveryReturnType, ConsumptionError> {
    match config.queue().consume_message_from_queue(queue).await {
        Ok(d) => Ok(DeliveryReturnType::Message(d)),
        Err(QueueError::NoData) => Ok(DeliveryReturnType::NoMessage),
        Err(e) => Err(ConsumptionError::FailedToConsumeFromQueue { error_msg: e.to_string() }),
    }
}

macro_rules! spawn_consumer {
    ($queue_type:expr, $handler:expr, $config:expr) => {
        let config_clone = $config.clone();
        tokio::spawn(async move {
            loop {
                match consume_job_from_queue($queue_type, $handler, config_clone.clone()).await {
                    Ok(_) => {}
                    Err(e) => tracing::error!("Failed to consume from queue {:?}. Error: {:?}", $queue_type, e),
                }
                sleep(Duration::from_millis(500)).await;
            }
        });
    };
}

/// Spawns one consumer loop per queue lane. Each tool gets its own lane so
/// a backlog on one tool cannot starve the others.
pub async fn init_consumers(config: Arc<Config>) -> Result<(), JobError> {
    spawn_consumer!(QueueType::MergeJobProcessing, process_job, config.clone());
    spawn_consumer!(QueueType::CompressJobProcessing, process_job, config.clone());
    spawn_consumer!(QueueType::ReduceJobProcessing, process_job, config.clone());
    spawn_consumer!(QueueType::ConvertJobProcessing, process_job, config.clone());

    spawn_consumer!(QueueType::JobHandleFailure, handle_dead_letter, config);
    Ok(())
}

/// Dead letter lane handler: the broker has given up redelivering this
/// message, mark the job as failed.
async fn handle_dead_letter(message: JobQueueMessage, config: Arc<Config>) -> Result<(), JobError> {
    handle_job_failure(message.id, config).await
}

async fn add_job_to_queue(
    message: JobQueueMessage,
    queue: QueueType,
    delay: Option<Duration>,
    config: Arc<Config>,
) -> EyreResult<()> {
    let id = message.id;
    config.queue().send_message_to_queue(queue.clone(), serde_json::to_string(&message)?, delay).await?;
    tracing::info!(
        log_type = "JobQueue",
        category = "add_job_to_queue",
        function_type = "add_job_to_queue",
        "Added job with id {:?} to {:?} queue",
        id,
        queue
    );
    Ok(())
}
