use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::delete_object::DeleteObjectError;
use aws_sdk_s3::operation::delete_objects::DeleteObjectsError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::presigning::PresigningConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to get data from S3: {0}")]
    GetObjectError(#[from] SdkError<GetObjectError>),

    #[error("Failed to put object: {0}")]
    UnableToPutObject(#[from] SdkError<PutObjectError>),

    #[error("Unable to delete object: {0}")]
    DeleteObjectError(#[from] SdkError<DeleteObjectError>),

    #[error("Unable to batch delete objects: {0}")]
    DeleteObjectsError(#[from] SdkError<DeleteObjectsError>),

    #[error("Failed to check object existence: {0}")]
    HeadObjectError(#[from] SdkError<HeadObjectError>),

    #[error("Failed to list objects: {0}")]
    ListObjectsError(#[from] SdkError<ListObjectsV2Error>),

    #[error("Invalid presigning configuration: {0}")]
    PresigningConfigError(#[from] PresigningConfigError),

    #[error("Failed to stream object: {0}")]
    ObjectStreamError(String),

    #[error("Malformed storage request: {0}")]
    RequestBuildError(String),
}
