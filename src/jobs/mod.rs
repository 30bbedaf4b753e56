pub mod constants;
pub mod error;
pub mod types;

use std::sync::Arc;

use bytes::Bytes;
use chrono::{SubsecRound, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::database::DatabaseError;
use crate::helpers::{content_type_for_key, delete_blobs_best_effort, download_inputs_to_scratch, ScratchSpace};
use crate::jobs::constants::{job_result_key, MAX_INPUT_FILES, PRESIGNED_URL_EXPIRY, TEMP_UPLOAD_PREFIX};
use crate::jobs::types::{JobItem, JobItemUpdates, JobParameters, JobStatus, ToolType};
use crate::queue::job_queue::{add_job_to_process_queue, JobQueueMessage};
use crate::tools::tool_handler;

pub use error::{JobError, OtherError, ValidationError};

/// Listing jobs for an owner is capped at this many records.
pub const MAX_JOBS_PER_LISTING: i64 = 50;

/// A presigned upload slot: the key the file will live under and the URL
/// the client PUTs the bytes to.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub key: String,
    pub url: String,
}

/// Validates a submission, persists the job in Pending state and enqueues
/// exactly one task on the tool's processing lane. Fast path only: one
/// record write plus one enqueue, never blocks on processing.
///
/// # Returns
/// * `Result<Uuid, JobError>` - The id of the created job
#[tracing::instrument(skip(owner_token, config), fields(category = "general"), ret, err)]
pub async fn create_job(
    tool_type: ToolType,
    input_refs: Vec<String>,
    parameters: JobParameters,
    owner_token: String,
    config: Arc<Config>,
) -> Result<Uuid, JobError> {
    tracing::info!(
        log_type = "starting",
        category = "general",
        function_type = "create_job",
        tool_type = %tool_type,
        file_count = input_refs.len(),
        "Job submission received"
    );

    if input_refs.is_empty() {
        return Err(ValidationError::EmptyInputs.into());
    }
    if input_refs.len() > MAX_INPUT_FILES {
        return Err(ValidationError::TooManyInputs { got: input_refs.len(), max: MAX_INPUT_FILES }.into());
    }

    let handler = tool_handler(&tool_type);
    handler.validate_submission(&input_refs, &parameters)?;

    for key in &input_refs {
        if !config.storage().exists(key).await? {
            return Err(ValidationError::InputNotFound { key: key.clone() }.into());
        }
    }

    let now = Utc::now().round_subsecs(0);
    let job = JobItem {
        id: Uuid::new_v4(),
        owner_token,
        tool_type,
        status: JobStatus::Pending,
        file_count: input_refs.len() as u64,
        input_refs,
        parameters,
        result_ref: None,
        error_detail: None,
        original_size: None,
        result_size: None,
        version: 0,
        created_at: now,
        updated_at: now,
        completed_at: None,
    };

    let job = config.database().create_job(job).await?;
    add_job_to_process_queue(&job, config.clone()).await.map_err(|e| JobError::Other(OtherError::from(e)))?;

    tracing::info!(
        log_type = "completed",
        category = "general",
        function_type = "create_job",
        job_id = %job.id,
        "Job created and queued"
    );
    Ok(job.id)
}

/// Snapshot of a job. Read-only.
pub async fn get_job_status(id: Uuid, config: Arc<Config>) -> Result<JobItem, JobError> {
    get_job(id, config).await
}

/// Issues a presigned upload URL for a new input file. The key is placed
/// under the temp prefix, so an upload that never becomes a job input is
/// reaped by the temp cleanup worker.
pub async fn create_upload_url(file_name: &str, config: Arc<Config>) -> Result<UploadTarget, JobError> {
    let key = format!("{}{}/{}", TEMP_UPLOAD_PREFIX, Uuid::new_v4(), file_name);
    let url = config
        .storage()
        .create_upload_url(&key, content_type_for_key(file_name), PRESIGNED_URL_EXPIRY)
        .await?;
    Ok(UploadTarget { key, url })
}

/// Issues a presigned download URL for the result of a completed job.
pub async fn create_download_url(id: Uuid, config: Arc<Config>) -> Result<String, JobError> {
    let job = get_job(id, config.clone()).await?;
    let result_ref = job.result_ref.as_ref().ok_or(JobError::ResultNotReady { id })?;
    Ok(config.storage().create_download_url(result_ref, PRESIGNED_URL_EXPIRY).await?)
}

/// Jobs belonging to the given owner token, newest first, capped at
/// [`MAX_JOBS_PER_LISTING`].
pub async fn list_jobs_for_owner(
    owner_token: &str,
    limit: i64,
    config: Arc<Config>,
) -> Result<Vec<JobItem>, JobError> {
    let limit = limit.clamp(1, MAX_JOBS_PER_LISTING);
    Ok(config.database().get_jobs_by_owner(owner_token, limit).await?)
}

/// Deletes a job owned by the caller. The result blob is removed on a
/// best-effort basis; the record deletion proceeds regardless.
#[tracing::instrument(skip(config), fields(category = "general"), ret, err)]
pub async fn delete_job(id: Uuid, owner_token: &str, config: Arc<Config>) -> Result<(), JobError> {
    let job = get_job(id, config.clone()).await?;

    if job.owner_token != owner_token {
        tracing::warn!(job_id = %id, "Rejected delete with mismatching owner token");
        return Err(JobError::NotJobOwner { id });
    }

    if let Some(result_ref) = &job.result_ref {
        match config.storage().delete_data(result_ref).await {
            Ok(()) => tracing::info!(job_id = %id, key = %result_ref, "Deleted result blob"),
            Err(e) => {
                tracing::warn!(job_id = %id, key = %result_ref, error = %e, "Failed to delete result blob")
            }
        }
    }

    config.database().delete_job(id).await?;
    tracing::info!(job_id = %id, category = "general", "Job deleted");
    Ok(())
}

/// Tool execution entry point, invoked by the queue consumers with the
/// message the submission enqueued. The shape is identical for all four
/// tools:
///
/// 1. load the job; a missing record is fatal for this invocation only
/// 2. conditionally transition Pending -> Processing (tolerates redelivery;
///    a job already terminal is left untouched)
/// 3. fetch the inputs into disk-backed scratch space
/// 4. run the tool executor on a blocking thread, catching errors and panics
/// 5. store the results under the job's result prefix
/// 6. transition Processing -> Completed
/// 7. best-effort delete of the input blobs
/// 8. scratch space is released by its drop guard on every path out
#[tracing::instrument(skip(message, config), fields(category = "general", job_id = %message.id), ret, err)]
pub async fn process_job(message: JobQueueMessage, config: Arc<Config>) -> Result<(), JobError> {
    let id = message.id;
    let job = match config.database().get_job_by_id(id).await? {
        Some(job) => job,
        None => {
            tracing::error!(
                job_id = %id,
                category = "general",
                "Received task for a job that does not exist, dropping it"
            );
            return Err(JobError::JobNotFound { id });
        }
    };

    tracing::info!(
        log_type = "starting",
        category = "general",
        function_type = "process_job",
        job_id = %id,
        tool_type = %job.tool_type,
        status = %job.status,
        "Processing job"
    );

    if job.status.is_terminal() {
        tracing::warn!(job_id = %id, status = %job.status, "Job already terminal, skipping duplicate delivery");
        return Ok(());
    }

    // The version filter makes this a conditional write: of two workers
    // racing on the same delivery, one loses and backs off here.
    let job = match config
        .database()
        .update_job(&job, JobItemUpdates::new().update_status(JobStatus::Processing).build())
        .await
    {
        Ok(job) => job,
        Err(DatabaseError::UpdateFailed(_)) => {
            tracing::info!(job_id = %id, "Another worker holds this job, backing off");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let scratch = ScratchSpace::new().map_err(|e| {
        JobError::Other(OtherError::from(format!("failed to allocate scratch space: {}", e)))
    })?;

    let (inputs, original_size) =
        match download_inputs_to_scratch(config.storage(), &message.input_refs, &scratch).await {
            Ok(fetched) => fetched,
            Err(e) => {
                return move_job_to_failed(&job, config.clone(), format!("failed to fetch input: {}", e)).await
            }
        };

    let handler = tool_handler(&job.tool_type);
    let parameters = message.parameters.clone();
    let execution = tokio::task::spawn_blocking(move || handler.execute(&inputs, &parameters)).await;

    let files = match execution {
        Ok(Ok(files)) if !files.is_empty() => files,
        Ok(Ok(_)) => {
            return move_job_to_failed(&job, config.clone(), "tool produced no output".to_string()).await;
        }
        Ok(Err(e)) => {
            tracing::error!(job_id = %id, error = %e, "Tool executor failed");
            return move_job_to_failed(&job, config.clone(), format!("{}", JobError::ProcessingError(e))).await;
        }
        Err(join_error) => {
            let reason = if join_error.is_panic() {
                match join_error.try_into_panic() {
                    Ok(panic) => {
                        let msg = panic
                            .downcast_ref::<String>()
                            .map(|s| s.as_str())
                            .or_else(|| panic.downcast_ref::<&str>().copied())
                            .unwrap_or("Unknown panic message");
                        msg.to_string()
                    }
                    Err(e) => e.to_string(),
                }
            } else {
                join_error.to_string()
            };
            tracing::error!(job_id = %id, panic_msg = %reason, "Tool executor panicked during processing");
            return move_job_to_failed(&job, config.clone(), format!("tool execution panicked: {}", reason))
                .await;
        }
    };

    let result_ref = job_result_key(&job.id, &files[0].name);
    let result_size = files[0].data.len() as u64;
    for file in files {
        let key = job_result_key(&job.id, &file.name);
        if let Err(e) = config.storage().put_data(Bytes::from(file.data), &key, file.content_type).await {
            tracing::error!(job_id = %id, key = %key, error = %e, "Failed to store result");
            return move_job_to_failed(&job, config.clone(), format!("failed to persist result: {}", e)).await;
        }
    }

    let updates = JobItemUpdates::new()
        .update_status(JobStatus::Completed)
        .update_result_ref(result_ref)
        .update_original_size(original_size)
        .update_result_size(result_size)
        .update_completed_at(Utc::now().round_subsecs(0))
        .build();
    match config.database().update_job(&job, updates).await {
        Ok(_) => {}
        Err(DatabaseError::UpdateFailed(_)) => {
            tracing::warn!(job_id = %id, "Terminal write lost the race, record was already finalized");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    delete_blobs_best_effort(config.storage(), &message.input_refs).await;

    tracing::info!(
        log_type = "completed",
        category = "general",
        function_type = "process_job",
        job_id = %id,
        "Job completed"
    );
    Ok(())
}

/// Dead-letter handler: the queue gave up on the job's task, record the
/// failure on the job unless it already reached a terminal state.
#[tracing::instrument(skip(config), fields(category = "general"), ret, err)]
pub async fn handle_job_failure(id: Uuid, config: Arc<Config>) -> Result<(), JobError> {
    let job = get_job(id, config.clone()).await?;
    let status = job.status.to_string();
    move_job_to_failed(
        &job,
        config,
        format!("Received failure queue message for job with status: {}", status),
    )
    .await
}

/// Moves a job to Failed with the provided reason. Terminal states are
/// left untouched: a completed job is never flipped back and an already
/// failed one is not rewritten.
async fn move_job_to_failed(job: &JobItem, config: Arc<Config>, reason: String) -> Result<(), JobError> {
    if job.status == JobStatus::Completed {
        tracing::error!(job_id = %job.id, job_status = %job.status, "Refusing to fail an already completed job");
        return Ok(());
    }
    if job.status == JobStatus::Failed {
        tracing::warn!(job_id = %job.id, "Job already marked as failed, skipping");
        return Ok(());
    }

    let updates = JobItemUpdates::new()
        .update_status(JobStatus::Failed)
        .update_error_detail(reason)
        .update_completed_at(Utc::now().round_subsecs(0))
        .build();
    match config.database().update_job(job, updates).await {
        Ok(_) => {
            tracing::info!(
                log_type = "completed",
                category = "general",
                function_type = "handle_job_failure",
                job_id = %job.id,
                "Job moved to failed"
            );
            Ok(())
        }
        Err(DatabaseError::UpdateFailed(_)) => {
            tracing::warn!(job_id = %job.id, "Failure write lost the race, record was already finalized");
            Ok(())
        }
        Err(e) => {
            tracing::error!(job_id = %job.id, error = %e, "Failed to move job to failed");
            Err(e.into())
        }
    }
}

async fn get_job(id: Uuid, config: Arc<Config>) -> Result<JobItem, JobError> {
    let job = config.database().get_job_by_id(id).await?;
    match job {
        Some(job) => Ok(job),
        None => Err(JobError::JobNotFound { id }),
    }
}
