/// MongoDB implementation of the database client
pub mod mongodb;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use thiserror::Error;
use uuid::Uuid;

use crate::jobs::types::{JobItem, JobItemUpdates};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error(transparent)]
    MongoError(#[from] ::mongodb::error::Error),

    #[error(transparent)]
    BsonSerError(#[from] ::mongodb::bson::ser::Error),

    #[error("Failed to serialize document: {0}")]
    FailedToSerializeDocument(String),

    /// The conditional update matched no record, usually because the
    /// version filter is outdated (another writer got there first).
    #[error("Failed to update job: {0}")]
    UpdateFailed(String),

    #[error("No field to be updated: {0}")]
    NoUpdateFound(String),
}

/// The Database trait contains every operation the orchestrator performs
/// against the job record store. Single-record operations are atomic;
/// `update_job` is a conditional write gated on the record version.
#[automock]
#[async_trait]
pub trait Database: Send + Sync {
    async fn create_job(&self, job: JobItem) -> Result<JobItem, DatabaseError>;
    async fn get_job_by_id(&self, id: Uuid) -> Result<Option<JobItem>, DatabaseError>;
    /// Jobs of one owner, newest first, at most `limit`.
    async fn get_jobs_by_owner(&self, owner_token: &str, limit: i64) -> Result<Vec<JobItem>, DatabaseError>;
    /// Conditional update: only applies if the stored version still matches
    /// `current_job.version`. Bumps version and updated_at.
    async fn update_job(&self, current_job: &JobItem, updates: JobItemUpdates) -> Result<JobItem, DatabaseError>;
    async fn delete_job(&self, id: Uuid) -> Result<(), DatabaseError>;
    /// Terminal jobs whose completed_at is older than the cutoff, for the
    /// retention sweeper.
    async fn get_jobs_completed_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<JobItem>, DatabaseError>;
    /// Jobs sitting in Processing whose last update is older than the
    /// cutoff, for the stuck job sweeper.
    async fn get_jobs_stuck_in_processing(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobItem>, DatabaseError>;
}
