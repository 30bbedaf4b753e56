pub mod job_queue;
pub mod sqs;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use color_eyre::Result as EyreResult;
use lazy_static::lazy_static;
use mockall::automock;
use omniqueue::{Delivery, QueueError};
use strum_macros::{Display, EnumIter};

use crate::config::Config;
use crate::jobs::JobError;

#[derive(Display, Debug, Clone, PartialEq, Eq, EnumIter)]
pub enum QueueType {
    #[strum(serialize = "merge_job_processing")]
    MergeJobProcessing,
    #[strum(serialize = "compress_job_processing")]
    CompressJobProcessing,
    #[strum(serialize = "reduce_job_processing")]
    ReduceJobProcessing,
    #[strum(serialize = "convert_job_processing")]
    ConvertJobProcessing,
    #[strum(serialize = "job_handle_failure")]
    JobHandleFailure,
}

#[derive(Clone)]
pub struct DlqConfig {
    pub max_receive_count: i32,
    pub dlq_name: QueueType,
}

#[derive(Clone)]
pub struct QueueConfig {
    pub name: QueueType,
    pub visibility_timeout: i32,
    pub dlq_config: Option<DlqConfig>,
}

// The visibility timeout on the processing lanes doubles as the hard
// per-task execution budget: a worker that exceeds it loses the message.
lazy_static! {
    pub static ref QUEUES: Vec<QueueConfig> = vec![
        QueueConfig { name: QueueType::JobHandleFailure, visibility_timeout: 300, dlq_config: None },
        QueueConfig {
            name: QueueType::MergeJobProcessing,
            visibility_timeout: 1800,
            dlq_config: Some(DlqConfig { max_receive_count: 5, dlq_name: QueueType::JobHandleFailure })
        },
        QueueConfig {
            name: QueueType::CompressJobProcessing,
            visibility_timeout: 1800,
            dlq_config: Some(DlqConfig { max_receive_count: 5, dlq_name: QueueType::JobHandleFailure })
        },
        QueueConfig {
            name: QueueType::ReduceJobProcessing,
            visibility_timeout: 1800,
            dlq_config: Some(DlqConfig { max_receive_count: 5, dlq_name: QueueType::JobHandleFailure })
        },
        QueueConfig {
            name: QueueType::ConvertJobProcessing,
            visibility_timeout: 1800,
            dlq_config: Some(DlqConfig { max_receive_count: 5, dlq_name: QueueType::JobHandleFailure })
        },
    ];
}

/// Queue Provider Trait
///
/// The QueueProvider trait is used to define the methods that a queue
/// should implement to be used as a queue for the orchestrator. The
/// purpose of this trait is to allow developers to use any queue of their choice.
#[automock]
#[async_trait]
pub trait QueueProvider: Send + Sync {
    async fn send_message_to_queue(&self, queue: QueueType, payload: String, delay: Option<Duration>)
        -> EyreResult<()>;
    async fn consume_message_from_queue(&self, queue: QueueType) -> std::result::Result<Delivery, QueueError>;
    async fn create_queue(&self, queue_config: &QueueConfig) -> EyreResult<()>;
    async fn setup(&self) -> EyreResult<()> {
        // Creating the queues :
        for queue in QUEUES.iter() {
            self.create_queue(queue).await?;
        }
        Ok(())
    }
}

pub async fn init_consumers(config: Arc<Config>) -> Result<(), JobError> {
    job_queue::init_consumers(config).await
}
