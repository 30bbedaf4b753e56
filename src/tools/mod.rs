pub mod compress;
pub mod convert;
pub mod merge;
pub mod reduce;

use std::path::PathBuf;

use thiserror::Error;

use crate::jobs::error::ValidationError;
use crate::jobs::types::{JobParameters, ToolType};

/// Failures raised by a tool executor. These never cross the task
/// boundary; the entry point records them on the job as a failed status.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ToolError {
    #[error("Malformed input {name}: {reason}")]
    MalformedInput { name: String, reason: String },

    #[error("Unsupported input format for {name}")]
    UnsupportedFormat { name: String },

    #[error("Failed to encode result: {0}")]
    EncodeFailure(String),

    #[error("Failed to read input from scratch space: {0}")]
    Io(String),

    #[error("Tool execution failed: {0}")]
    Internal(String),
}

/// One fetched input, spooled to scratch storage.
#[derive(Debug, Clone)]
pub struct ToolInput {
    /// where the blob was spooled on local disk
    pub path: PathBuf,
    /// the storage key the blob came from
    pub source_key: String,
}

impl ToolInput {
    /// Short label for error messages: the file name part of the key.
    pub fn label(&self) -> &str {
        self.source_key.rsplit('/').next().unwrap_or(&self.source_key)
    }
}

/// One produced result file, to be stored under the job's result prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFile {
    pub name: String,
    pub data: Vec<u8>,
    pub content_type: &'static str,
}

/// The contract every tool implements. Executors transform a list of
/// fetched inputs into one or more result buffers; the first result is
/// the canonical one recorded on the job.
///
/// `execute` is synchronous CPU work and is run on a blocking thread by
/// the entry point.
pub trait ToolHandler: Send + Sync {
    fn tool_type(&self) -> ToolType;

    /// Tool specific submission checks: input cardinality and parameter
    /// shape. Common checks (non-empty, global maximum) happen before.
    fn validate_submission(&self, input_refs: &[String], parameters: &JobParameters) -> Result<(), ValidationError>;

    fn execute(&self, inputs: &[ToolInput], parameters: &JobParameters) -> Result<Vec<ResultFile>, ToolError>;
}

/// Resolves the handler for a tool. Exhaustive over the closed tool set;
/// adding a tool without a handler is a compile error.
pub fn tool_handler(tool_type: &ToolType) -> Box<dyn ToolHandler> {
    match tool_type {
        ToolType::Merge => Box::new(merge::MergeHandler),
        ToolType::Compress => Box::new(compress::CompressHandler),
        ToolType::Reduce => Box::new(reduce::ReduceHandler),
        ToolType::Convert => Box::new(convert::ConvertHandler),
    }
}
