use assert_matches::assert_matches;
use bytes::Bytes;
use mockall::predicate::eq;
use rstest::rstest;
use uuid::Uuid;

use crate::data_storage::{MockDataStorage, StorageError};
use crate::database::MockDatabase;
use crate::jobs::types::{CompressionLevel, JobParameters, JobStatus, ToolType};
use crate::jobs::{
    create_download_url, create_job, create_upload_url, delete_job, get_job_status, handle_job_failure,
    list_jobs_for_owner, process_job, JobError, ValidationError, MAX_JOBS_PER_LISTING,
};
use crate::queue::job_queue::JobQueueMessage;
use crate::queue::{MockQueueProvider, QueueType};
use crate::tests::common::{build_job_item, single_page_pdf};
use crate::tests::config::TestConfigBuilder;

const OWNER: &str = "session-fixture";

#[rstest]
#[tokio::test]
async fn create_job_persists_pending_job_and_enqueues_once() {
    let mut storage = MockDataStorage::new();
    storage.expect_exists().times(2).returning(|_| Ok(true));

    let mut database = MockDatabase::new();
    database
        .expect_create_job()
        .withf(|job| job.status == JobStatus::Pending && job.file_count == 2)
        .times(1)
        .returning(|job| Ok(job));

    let mut queue = MockQueueProvider::new();
    queue
        .expect_send_message_to_queue()
        .withf(|queue, payload, delay| {
            *queue == QueueType::MergeJobProcessing
                && delay.is_none()
                && serde_json::from_str::<JobQueueMessage>(payload).is_ok()
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let config = TestConfigBuilder::new()
        .mock_db_client(Box::new(database))
        .mock_storage_client(Box::new(storage))
        .mock_queue(Box::new(queue))
        .build();

    let result = create_job(
        ToolType::Merge,
        vec!["tmp/a/one.pdf".to_string(), "tmp/b/two.pdf".to_string()],
        JobParameters::Merge,
        OWNER.to_string(),
        config,
    )
    .await;

    assert!(result.is_ok());
}

#[rstest]
#[tokio::test]
async fn create_job_with_missing_blob_fails_validation() {
    let mut storage = MockDataStorage::new();
    storage.expect_exists().withf(|key| key == "tmp/a/one.pdf").times(1).returning(|_| Ok(false));

    let config = TestConfigBuilder::new().mock_storage_client(Box::new(storage)).build();

    let result = create_job(
        ToolType::Merge,
        vec!["tmp/a/one.pdf".to_string()],
        JobParameters::Merge,
        OWNER.to_string(),
        config,
    )
    .await;

    assert_matches!(
        result,
        Err(JobError::ValidationError(ValidationError::InputNotFound { key })) if key == "tmp/a/one.pdf"
    );
}

#[rstest]
#[tokio::test]
async fn create_job_with_empty_inputs_fails_validation() {
    let config = TestConfigBuilder::new().build();

    let result =
        create_job(ToolType::Merge, vec![], JobParameters::Merge, OWNER.to_string(), config).await;

    assert_matches!(result, Err(JobError::ValidationError(ValidationError::EmptyInputs)));
}

#[rstest]
#[case(0)]
#[case(2)]
#[tokio::test]
async fn create_reduce_job_with_wrong_cardinality_fails(#[case] input_count: usize) {
    let config = TestConfigBuilder::new().build();
    let input_refs: Vec<String> = (0..input_count).map(|i| format!("tmp/a/{}.pdf", i)).collect();

    let result = create_job(
        ToolType::Reduce,
        input_refs,
        JobParameters::Reduce { level: CompressionLevel::Medium },
        OWNER.to_string(),
        config,
    )
    .await;

    match input_count {
        0 => assert_matches!(result, Err(JobError::ValidationError(ValidationError::EmptyInputs))),
        _ => assert_matches!(
            result,
            Err(JobError::ValidationError(ValidationError::InvalidCardinality { expected: 1, got: 2, .. }))
        ),
    }
}

#[rstest]
#[tokio::test]
async fn create_reduce_job_with_single_input_succeeds() {
    let mut storage = MockDataStorage::new();
    storage.expect_exists().times(1).returning(|_| Ok(true));

    let mut database = MockDatabase::new();
    database.expect_create_job().times(1).returning(|job| Ok(job));

    let mut queue = MockQueueProvider::new();
    queue
        .expect_send_message_to_queue()
        .withf(|queue, _, _| *queue == QueueType::ReduceJobProcessing)
        .times(1)
        .returning(|_, _, _| Ok(()));

    let config = TestConfigBuilder::new()
        .mock_db_client(Box::new(database))
        .mock_storage_client(Box::new(storage))
        .mock_queue(Box::new(queue))
        .build();

    let result = create_job(
        ToolType::Reduce,
        vec!["tmp/a/one.pdf".to_string()],
        JobParameters::Reduce { level: CompressionLevel::High },
        OWNER.to_string(),
        config,
    )
    .await;

    assert!(result.is_ok());
}

#[rstest]
#[tokio::test]
async fn create_job_with_mismatched_parameters_fails() {
    let config = TestConfigBuilder::new().build();

    let result = create_job(
        ToolType::Merge,
        vec!["tmp/a/one.pdf".to_string()],
        JobParameters::Compress { level: CompressionLevel::Low },
        OWNER.to_string(),
        config,
    )
    .await;

    assert_matches!(
        result,
        Err(JobError::ValidationError(ValidationError::ParameterMismatch { tool_type: ToolType::Merge }))
    );
}

#[rstest]
#[tokio::test]
async fn process_job_merge_happy_path_completes_job() {
    let job = build_job_item(
        ToolType::Merge,
        JobStatus::Pending,
        vec!["tmp/a/one.pdf".to_string(), "tmp/b/two.pdf".to_string()],
    );
    let job_id = job.id;
    let message = JobQueueMessage::from(&job);

    let mut database = MockDatabase::new();
    let lookup_job = job.clone();
    database.expect_get_job_by_id().with(eq(job_id)).times(1).returning(move |_| Ok(Some(lookup_job.clone())));
    database
        .expect_update_job()
        .withf(|_, updates| updates.status == Some(JobStatus::Processing))
        .times(1)
        .returning(|current, _| {
            let mut updated = current.clone();
            updated.status = JobStatus::Processing;
            updated.version += 1;
            Ok(updated)
        });
    let expected_result_ref = format!("results/{}/merged.pdf", job_id);
    database
        .expect_update_job()
        .withf(move |_, updates| {
            updates.status == Some(JobStatus::Completed)
                && updates.result_ref.as_deref() == Some(expected_result_ref.as_str())
                && updates.error_detail.is_none()
                && updates.completed_at.is_some()
                && updates.original_size.is_some()
                && updates.result_size.is_some()
        })
        .times(1)
        .returning(|current, _| Ok(current.clone()));

    let mut storage = MockDataStorage::new();
    storage.expect_get_data().times(2).returning(|_| Ok(Bytes::from(single_page_pdf(200))));
    storage
        .expect_put_data()
        .withf(move |_, key, content_type| {
            key == format!("results/{}/merged.pdf", job_id) && content_type == "application/pdf"
        })
        .times(1)
        .returning(|_, _, _| Ok(()));
    storage.expect_delete_many().times(1).returning(|keys| {
        Ok(keys.iter().map(|k| (k.clone(), true)).collect())
    });

    let config = TestConfigBuilder::new()
        .mock_db_client(Box::new(database))
        .mock_storage_client(Box::new(storage))
        .build();

    assert!(process_job(message, config).await.is_ok());
}

/// Re-delivery after the terminal write must not touch the record again.
#[rstest]
#[case(JobStatus::Completed)]
#[case(JobStatus::Failed)]
#[tokio::test]
async fn process_job_after_terminal_state_is_idempotent(#[case] status: JobStatus) {
    let mut job = build_job_item(ToolType::Merge, status.clone(), vec!["tmp/a/one.pdf".to_string()]);
    match status {
        JobStatus::Completed => job.result_ref = Some(format!("results/{}/merged.pdf", job.id)),
        _ => job.error_detail = Some("tool execution failed".to_string()),
    }
    let message = JobQueueMessage::from(&job);

    let mut database = MockDatabase::new();
    let lookup_job = job.clone();
    database.expect_get_job_by_id().times(1).returning(move |_| Ok(Some(lookup_job.clone())));
    // no update_job expectation: any write would fail the test

    let config = TestConfigBuilder::new().mock_db_client(Box::new(database)).build();

    assert!(process_job(message, config).await.is_ok());
}

#[rstest]
#[tokio::test]
async fn process_job_for_unknown_job_aborts() {
    let job = build_job_item(ToolType::Merge, JobStatus::Pending, vec!["tmp/a/one.pdf".to_string()]);
    let message = JobQueueMessage::from(&job);

    let mut database = MockDatabase::new();
    database.expect_get_job_by_id().times(1).returning(|_| Ok(None));

    let config = TestConfigBuilder::new().mock_db_client(Box::new(database)).build();

    assert_matches!(process_job(message, config).await, Err(JobError::JobNotFound { .. }));
}

#[rstest]
#[tokio::test]
async fn process_job_fetch_failure_marks_job_failed() {
    let job = build_job_item(ToolType::Merge, JobStatus::Pending, vec!["tmp/a/one.pdf".to_string()]);
    let message = JobQueueMessage::from(&job);

    let mut database = MockDatabase::new();
    let lookup_job = job.clone();
    database.expect_get_job_by_id().times(1).returning(move |_| Ok(Some(lookup_job.clone())));
    database
        .expect_update_job()
        .withf(|_, updates| updates.status == Some(JobStatus::Processing))
        .times(1)
        .returning(|current, _| {
            let mut updated = current.clone();
            updated.status = JobStatus::Processing;
            updated.version += 1;
            Ok(updated)
        });
    database
        .expect_update_job()
        .withf(|_, updates| {
            updates.status == Some(JobStatus::Failed)
                && updates.error_detail.as_ref().is_some_and(|detail| detail.contains("failed to fetch input"))
                && updates.completed_at.is_some()
        })
        .times(1)
        .returning(|current, _| Ok(current.clone()));

    let mut storage = MockDataStorage::new();
    storage
        .expect_get_data()
        .times(1)
        .returning(|_| Err(StorageError::ObjectStreamError("connection reset".to_string())));

    let config = TestConfigBuilder::new()
        .mock_db_client(Box::new(database))
        .mock_storage_client(Box::new(storage))
        .build();

    assert!(process_job(message, config).await.is_ok());
}

/// A malformed input must surface as a failed job, not as a crash of the
/// worker.
#[rstest]
#[tokio::test]
async fn process_job_executor_failure_marks_job_failed() {
    let job = build_job_item(ToolType::Merge, JobStatus::Pending, vec!["tmp/a/one.pdf".to_string()]);
    let message = JobQueueMessage::from(&job);

    let mut database = MockDatabase::new();
    let lookup_job = job.clone();
    database.expect_get_job_by_id().times(1).returning(move |_| Ok(Some(lookup_job.clone())));
    database
        .expect_update_job()
        .withf(|_, updates| updates.status == Some(JobStatus::Processing))
        .times(1)
        .returning(|current, _| {
            let mut updated = current.clone();
            updated.status = JobStatus::Processing;
            updated.version += 1;
            Ok(updated)
        });
    database
        .expect_update_job()
        .withf(|_, updates| {
            updates.status == Some(JobStatus::Failed)
                && updates.error_detail.as_ref().is_some_and(|detail| detail.contains("Malformed input"))
        })
        .times(1)
        .returning(|current, _| Ok(current.clone()));

    let mut storage = MockDataStorage::new();
    storage.expect_get_data().times(1).returning(|_| Ok(Bytes::from_static(b"this is not a pdf")));

    let config = TestConfigBuilder::new()
        .mock_db_client(Box::new(database))
        .mock_storage_client(Box::new(storage))
        .build();

    assert!(process_job(message, config).await.is_ok());
}

#[rstest]
#[tokio::test]
async fn get_job_status_returns_not_found_for_unknown_id() {
    let mut database = MockDatabase::new();
    database.expect_get_job_by_id().times(1).returning(|_| Ok(None));

    let config = TestConfigBuilder::new().mock_db_client(Box::new(database)).build();

    assert_matches!(get_job_status(Uuid::new_v4(), config).await, Err(JobError::JobNotFound { .. }));
}

#[rstest]
#[tokio::test]
async fn delete_job_by_non_owner_is_forbidden() {
    let job = build_job_item(ToolType::Merge, JobStatus::Completed, vec!["tmp/a/one.pdf".to_string()]);
    let job_id = job.id;

    let mut database = MockDatabase::new();
    database.expect_get_job_by_id().times(1).returning(move |_| Ok(Some(job.clone())));
    // no delete_job expectation: the record must survive

    let config = TestConfigBuilder::new().mock_db_client(Box::new(database)).build();

    assert_matches!(
        delete_job(job_id, "someone-else", config).await,
        Err(JobError::NotJobOwner { id }) if id == job_id
    );
}

#[rstest]
#[tokio::test]
async fn delete_job_by_owner_removes_record_and_result_blob() {
    let mut job = build_job_item(ToolType::Merge, JobStatus::Completed, vec!["tmp/a/one.pdf".to_string()]);
    let result_ref = format!("results/{}/merged.pdf", job.id);
    job.result_ref = Some(result_ref.clone());
    let job_id = job.id;

    let mut database = MockDatabase::new();
    database.expect_get_job_by_id().times(1).returning(move |_| Ok(Some(job.clone())));
    database.expect_delete_job().with(eq(job_id)).times(1).returning(|_| Ok(()));

    let mut storage = MockDataStorage::new();
    storage
        .expect_delete_data()
        .withf(move |key| key == result_ref)
        .times(1)
        .returning(|_| Ok(()));

    let config = TestConfigBuilder::new()
        .mock_db_client(Box::new(database))
        .mock_storage_client(Box::new(storage))
        .build();

    assert!(delete_job(job_id, OWNER, config).await.is_ok());
}

/// Blob deletion is best-effort: a storage failure must not block the
/// record deletion.
#[rstest]
#[tokio::test]
async fn delete_job_proceeds_when_result_blob_deletion_fails() {
    let mut job = build_job_item(ToolType::Merge, JobStatus::Completed, vec!["tmp/a/one.pdf".to_string()]);
    job.result_ref = Some(format!("results/{}/merged.pdf", job.id));
    let job_id = job.id;

    let mut database = MockDatabase::new();
    database.expect_get_job_by_id().times(1).returning(move |_| Ok(Some(job.clone())));
    database.expect_delete_job().times(1).returning(|_| Ok(()));

    let mut storage = MockDataStorage::new();
    storage
        .expect_delete_data()
        .times(1)
        .returning(|_| Err(StorageError::ObjectStreamError("unavailable".to_string())));

    let config = TestConfigBuilder::new()
        .mock_db_client(Box::new(database))
        .mock_storage_client(Box::new(storage))
        .build();

    assert!(delete_job(job_id, OWNER, config).await.is_ok());
}

#[rstest]
#[tokio::test]
async fn list_jobs_for_owner_caps_the_limit() {
    let mut database = MockDatabase::new();
    database
        .expect_get_jobs_by_owner()
        .withf(|owner, limit| owner == OWNER && *limit == MAX_JOBS_PER_LISTING)
        .times(1)
        .returning(|_, _| Ok(vec![]));

    let config = TestConfigBuilder::new().mock_db_client(Box::new(database)).build();

    assert!(list_jobs_for_owner(OWNER, 500, config).await.is_ok());
}

#[rstest]
#[tokio::test]
async fn handle_job_failure_marks_non_terminal_job_failed() {
    let job = build_job_item(ToolType::Compress, JobStatus::Processing, vec!["tmp/a/pic.jpg".to_string()]);
    let job_id = job.id;

    let mut database = MockDatabase::new();
    database.expect_get_job_by_id().times(1).returning(move |_| Ok(Some(job.clone())));
    database
        .expect_update_job()
        .withf(|_, updates| {
            updates.status == Some(JobStatus::Failed) && updates.error_detail.is_some()
        })
        .times(1)
        .returning(|current, _| Ok(current.clone()));

    let config = TestConfigBuilder::new().mock_db_client(Box::new(database)).build();

    assert!(handle_job_failure(job_id, config).await.is_ok());
}

#[rstest]
#[tokio::test]
async fn handle_job_failure_leaves_completed_job_untouched() {
    let job = build_job_item(ToolType::Compress, JobStatus::Completed, vec!["tmp/a/pic.jpg".to_string()]);
    let job_id = job.id;

    let mut database = MockDatabase::new();
    database.expect_get_job_by_id().times(1).returning(move |_| Ok(Some(job.clone())));

    let config = TestConfigBuilder::new().mock_db_client(Box::new(database)).build();

    assert!(handle_job_failure(job_id, config).await.is_ok());
}

#[rstest]
#[tokio::test]
async fn create_upload_url_places_key_under_temp_prefix() {
    let mut storage = MockDataStorage::new();
    storage
        .expect_create_upload_url()
        .withf(|key, content_type, _| {
            key.starts_with("tmp/") && key.ends_with("/report.pdf") && content_type == "application/pdf"
        })
        .times(1)
        .returning(|_, _, _| Ok("https://storage.example/upload".to_string()));

    let config = TestConfigBuilder::new().mock_storage_client(Box::new(storage)).build();

    let target = create_upload_url("report.pdf", config).await.unwrap();
    assert!(target.key.starts_with("tmp/"));
    assert_eq!(target.url, "https://storage.example/upload");
}

#[rstest]
#[tokio::test]
async fn create_download_url_requires_a_result() {
    let job = build_job_item(ToolType::Merge, JobStatus::Pending, vec!["tmp/a/one.pdf".to_string()]);
    let job_id = job.id;

    let mut database = MockDatabase::new();
    database.expect_get_job_by_id().times(1).returning(move |_| Ok(Some(job.clone())));

    let config = TestConfigBuilder::new().mock_db_client(Box::new(database)).build();

    assert_matches!(create_download_url(job_id, config).await, Err(JobError::ResultNotReady { .. }));
}
