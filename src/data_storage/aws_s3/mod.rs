use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::config::ProviderConfig;
use crate::data_storage::aws_s3::config::AWSS3Config;
use crate::data_storage::{DataStorage, StorageError};
use crate::utils::settings::Settings;

/// Module for AWS S3 config structs and implementations
pub mod config;

/// S3 caps a single DeleteObjects request at this many keys.
const DELETE_BATCH_SIZE: usize = 1000;

/// AWSS3 represents AWS S3 client object containing the client and the config itself.
pub struct AWSS3 {
    client: Client,
    bucket: String,
}

/// Implementation for AWS S3 client. Contains the function for :
///
/// - initializing a new AWS S3 client
impl AWSS3 {
    /// To init the struct with main settings
    pub async fn new_with_settings(settings: &impl Settings, provider_config: &ProviderConfig) -> Self {
        let s3_config = AWSS3Config::new_with_settings(settings);
        let aws_config = provider_config.get_aws_client_or_panic();
        // Building AWS S3 config
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(aws_config);
        // this is necessary for it to work with localstack in test cases
        s3_config_builder.set_force_path_style(Some(true));
        let client = Client::from_conf(s3_config_builder.build());
        Self { client, bucket: s3_config.bucket_name }
    }
}

/// Implementation of `DataStorage` for `AWSS3`
/// contains the functions for reading, writing and deleting objects
/// by taking the key as an argument.
#[async_trait]
impl DataStorage for AWSS3 {
    /// Function to get the data from S3 bucket by Key.
    async fn get_data(&self, key: &str) -> Result<Bytes, StorageError> {
        let response = self.client.get_object().bucket(&self.bucket).key(key).send().await?;
        let data_stream =
            response.body.collect().await.map_err(|e| StorageError::ObjectStreamError(e.to_string()))?;
        let data_bytes = data_stream.into_bytes();
        tracing::debug!(
            log_type = "DataStorage",
            category = "data_storage_call",
            data_bytes = data_bytes.len(),
            "Successfully retrieved and converted data from {}, key={}",
            self.bucket,
            key
        );
        Ok(data_bytes)
    }

    /// Function to put the data to S3 bucket by Key.
    async fn put_data(&self, data: Bytes, key: &str, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await?;

        tracing::debug!(
            log_type = "DataStorage",
            category = "data_storage_call",
            "Successfully put data into {}. key={}",
            self.bucket,
            key
        );
        Ok(())
    }

    async fn delete_data(&self, key: &str) -> Result<(), StorageError> {
        self.client.delete_object().bucket(&self.bucket).key(key).send().await?;
        tracing::debug!(
            log_type = "DataStorage",
            category = "data_storage_call",
            "Deleted object from {}. key={}",
            self.bucket,
            key
        );
        Ok(())
    }

    /// Deletes in chunks of the S3 batch limit. Keys reported back by S3 as
    /// failed are marked false in the result map instead of failing the call.
    async fn delete_many(&self, keys: &[String]) -> Result<HashMap<String, bool>, StorageError> {
        let mut results: HashMap<String, bool> = HashMap::with_capacity(keys.len());

        for chunk in keys.chunks(DELETE_BATCH_SIZE) {
            let identifiers = chunk
                .iter()
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|e| StorageError::RequestBuildError(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .build()
                .map_err(|e| StorageError::RequestBuildError(e.to_string()))?;

            let response = self.client.delete_objects().bucket(&self.bucket).delete(delete).send().await?;

            for deleted in response.deleted() {
                if let Some(key) = deleted.key() {
                    results.insert(key.to_string(), true);
                }
            }
            for error in response.errors() {
                if let Some(key) = error.key() {
                    tracing::warn!(
                        key = %key,
                        message = error.message().unwrap_or("unknown"),
                        "Failed to delete object in batch"
                    );
                    results.insert(key.to_string(), false);
                }
            }
        }

        Ok(results)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(err)) if err.err().is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys_older_than(
        &self,
        prefix: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await?;

            for object in response.contents() {
                let Some(key) = object.key() else { continue };
                let Some(last_modified) = object.last_modified() else { continue };
                if last_modified.secs() < cutoff.timestamp() {
                    keys.push(key.to_string());
                }
            }

            match response.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }

    async fn create_upload_url(
        &self,
        key: &str,
        content_type: &str,
        expiry: Duration,
    ) -> Result<String, StorageError> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(PresigningConfig::expires_in(expiry)?)
            .await?;
        Ok(presigned.uri().to_string())
    }

    async fn create_download_url(&self, key: &str, expiry: Duration) -> Result<String, StorageError> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(PresigningConfig::expires_in(expiry)?)
            .await?;
        Ok(presigned.uri().to_string())
    }
}
