/// Module for AWS S3 client implementation
pub mod aws_s3;
pub mod error;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
pub use error::StorageError;
use mockall::automock;

/// DataStorage trait contains the functions used to store and get the data from
/// the cloud provider storage.
/// The storage layout is:
/// ----s3
///     ----tmp/<upload_id>/<file_name>      (presigned uploads, reaped when stale)
///     ----results/<job_id>/<file_name>     (job results)
#[automock]
#[async_trait]
pub trait DataStorage: Send + Sync {
    async fn get_data(&self, key: &str) -> Result<Bytes, StorageError>;
    async fn put_data(&self, data: Bytes, key: &str, content_type: &str) -> Result<(), StorageError>;
    async fn delete_data(&self, key: &str) -> Result<(), StorageError>;
    /// Batch delete. Returns the per-key outcome; a failed key never fails
    /// the whole call.
    async fn delete_many(&self, keys: &[String]) -> Result<HashMap<String, bool>, StorageError>;
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
    /// Keys under `prefix` whose last modification is older than `cutoff`.
    async fn list_keys_older_than(&self, prefix: &str, cutoff: DateTime<Utc>) -> Result<Vec<String>, StorageError>;
    /// Presigned PUT url a client can upload a file to directly.
    async fn create_upload_url(
        &self,
        key: &str,
        content_type: &str,
        expiry: Duration,
    ) -> Result<String, StorageError>;
    /// Presigned GET url for downloading a stored object directly.
    async fn create_download_url(&self, key: &str, expiry: Duration) -> Result<String, StorageError>;
}
