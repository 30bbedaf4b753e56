use chrono::{Duration, SubsecRound, Utc};
use rstest::rstest;

use crate::data_storage::{MockDataStorage, StorageError};
use crate::database::MockDatabase;
use crate::jobs::types::{JobStatus, ToolType};
use crate::tests::common::build_job_item;
use crate::tests::config::TestConfigBuilder;
use crate::workers::job_retention::JobRetentionWorker;
use crate::workers::stuck_jobs::StuckJobWorker;
use crate::workers::temp_cleanup::TempCleanupWorker;
use crate::workers::Worker;

#[rstest]
#[tokio::test]
async fn retention_sweep_deletes_expired_job_and_result_blob() {
    let mut job =
        build_job_item(ToolType::Merge, JobStatus::Completed, vec!["tmp/a/one.pdf".to_string()]);
    let result_ref = format!("results/{}/merged.pdf", job.id);
    job.result_ref = Some(result_ref.clone());
    job.completed_at = Some(Utc::now().round_subsecs(0) - Duration::hours(25));
    let job_id = job.id;

    let mut database = MockDatabase::new();
    database
        .expect_get_jobs_completed_before()
        .withf(|cutoff, _| {
            let age = Utc::now() - *cutoff;
            age >= Duration::hours(24) && age < Duration::hours(25)
        })
        .times(1)
        .returning(move |_, _| Ok(vec![job.clone()]));
    database.expect_delete_job().withf(move |id| *id == job_id).times(1).returning(|_| Ok(()));

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

    assert!(JobRetentionWorker.run_worker(config).await.is_ok());
}

/// A failing blob delete must not keep the record around.
#[rstest]
#[tokio::test]
async fn retention_sweep_deletes_record_even_if_blob_delete_fails() {
    let mut job =
        build_job_item(ToolType::Merge, JobStatus::Completed, vec!["tmp/a/one.pdf".to_string()]);
    job.result_ref = Some(format!("results/{}/merged.pdf", job.id));
    job.completed_at = Some(Utc::now().round_subsecs(0) - Duration::hours(30));

    let mut database = MockDatabase::new();
    database
        .expect_get_jobs_completed_before()
        .times(1)
        .returning(move |_, _| Ok(vec![job.clone()]));
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

    assert!(JobRetentionWorker.run_worker(config).await.is_ok());
}

#[rstest]
#[tokio::test]
async fn retention_sweep_with_no_expired_jobs_touches_nothing() {
    let mut database = MockDatabase::new();
    database.expect_get_jobs_completed_before().times(1).returning(|_, _| Ok(vec![]));

    let config = TestConfigBuilder::new().mock_db_client(Box::new(database)).build();

    assert!(JobRetentionWorker.run_worker(config).await.is_ok());
}

#[rstest]
#[tokio::test]
async fn stuck_job_sweep_fails_jobs_past_the_execution_budget() {
    let job = build_job_item(ToolType::Reduce, JobStatus::Processing, vec!["tmp/a/doc.pdf".to_string()]);

    let mut database = MockDatabase::new();
    database
        .expect_get_jobs_stuck_in_processing()
        .withf(|cutoff| {
            let age = Utc::now() - *cutoff;
            // hard limit plus grace
            age >= Duration::minutes(35) && age < Duration::minutes(36)
        })
        .times(1)
        .returning(move |_| Ok(vec![job.clone()]));
    database
        .expect_update_job()
        .withf(|_, updates| {
            updates.status == Some(JobStatus::Failed)
                && updates.error_detail.as_deref() == Some("execution time limit exceeded")
                && updates.completed_at.is_some()
        })
        .times(1)
        .returning(|current, _| Ok(current.clone()));

    let config = TestConfigBuilder::new().mock_db_client(Box::new(database)).build();

    assert!(StuckJobWorker.run_worker(config).await.is_ok());
}

#[rstest]
#[tokio::test]
async fn temp_cleanup_purges_stale_objects_under_temp_prefix() {
    let stale_keys = vec!["tmp/abc/one.pdf".to_string(), "tmp/def/two.jpg".to_string()];
    let expected = stale_keys.clone();

    let mut storage = MockDataStorage::new();
    storage
        .expect_list_keys_older_than()
        .withf(|prefix, cutoff| {
            let age = Utc::now() - *cutoff;
            prefix == "tmp/" && age >= Duration::hours(1) && age < Duration::hours(2)
        })
        .times(1)
        .returning(move |_, _| Ok(stale_keys.clone()));
    storage
        .expect_delete_many()
        .withf(move |keys| keys == expected.as_slice())
        .times(1)
        .returning(|keys| Ok(keys.iter().map(|k| (k.clone(), true)).collect()));

    let config = TestConfigBuilder::new().mock_storage_client(Box::new(storage)).build();

    assert!(TempCleanupWorker.run_worker(config).await.is_ok());
}

#[rstest]
#[tokio::test]
async fn temp_cleanup_with_nothing_stale_skips_deletion() {
    let mut storage = MockDataStorage::new();
    storage.expect_list_keys_older_than().times(1).returning(|_, _| Ok(vec![]));
    // no delete_many expectation: nothing stale, nothing deleted

    let config = TestConfigBuilder::new().mock_storage_client(Box::new(storage)).build();

    assert!(TempCleanupWorker.run_worker(config).await.is_ok());
}
