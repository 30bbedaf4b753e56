use std::fmt;

use color_eyre::eyre::eyre;
use thiserror::Error;
use uuid::Uuid;

use crate::database::DatabaseError;
use crate::data_storage::StorageError;
use crate::jobs::types::ToolType;
use crate::tools::ToolError;

/// Rejections raised while a submission is being checked, before a job
/// record is ever created. Always surfaced synchronously to the caller.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No input files were provided")]
    EmptyInputs,

    #[error("Too many input files: got {got}, maximum is {max}")]
    TooManyInputs { got: usize, max: usize },

    #[error("Tool {tool_type} expects exactly {expected} input file(s), got {got}")]
    InvalidCardinality { tool_type: ToolType, expected: usize, got: usize },

    #[error("Input file not found in storage: {key}")]
    InputNotFound { key: String },

    #[error("Parameters do not match tool {tool_type}")]
    ParameterMismatch { tool_type: ToolType },
}

/// Error types for job-related operations in the orchestrator
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    ValidationError(#[from] ValidationError),

    /// Indicates the requested job could not be found
    #[error("Failed to find job with id {id:?}")]
    JobNotFound { id: Uuid },

    /// Owner token mismatch on an owner-scoped operation
    #[error("Job with id {id:?} does not belong to the presented owner token")]
    NotJobOwner { id: Uuid },

    /// A download was requested for a job that has no result yet
    #[error("Job with id {id:?} has no result available")]
    ResultNotReady { id: Uuid },

    #[error("Database Error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Storage Error: {0}")]
    StorageError(#[from] StorageError),

    /// Wraps tool executor failures (malformed input, unsupported format,
    /// internal library error)
    #[error("Processing Error: {0}")]
    ProcessingError(#[from] ToolError),

    /// Wraps general errors that don't fit other categories
    #[error("Other error: {0}")]
    Other(#[from] OtherError),
}

/// Wrapper Type for Other(<>) job type
///
/// Provides a generic error type for cases that don't fit into specific
/// error categories while maintaining error chain context.
#[derive(Debug)]
pub struct OtherError(color_eyre::eyre::Error);

impl fmt::Display for OtherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for OtherError {}

impl PartialEq for OtherError {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

impl From<color_eyre::eyre::Error> for OtherError {
    fn from(err: color_eyre::eyre::Error) -> Self {
        OtherError(err)
    }
}

impl From<String> for OtherError {
    fn from(error_string: String) -> Self {
        OtherError(eyre!(error_string))
    }
}

impl From<color_eyre::Report> for JobError {
    fn from(err: color_eyre::Report) -> Self {
        JobError::Other(OtherError(err))
    }
}
