use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::{chrono_datetime_as_bson_datetime, uuid_1_as_binary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs::error::ValidationError;

/// bson serde helper for `Option<DateTime<Utc>>`. The helpers shipped with
/// bson only cover the non-optional case.
pub mod optional_chrono_datetime_as_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
        value.map(bson::DateTime::from_chrono).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<bson::DateTime>::deserialize(deserializer)?.map(|dt| dt.to_chrono()))
    }
}

/// The tools a job can run. Closed set; dispatch happens through an
/// exhaustive match, never through tool names as strings.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolType {
    /// Combine multiple PDF documents into one
    Merge,
    /// Re-encode images at a lower quality, one result per input
    Compress,
    /// Shrink a single PDF document
    Reduce,
    /// Build a PDF out of images, one page per image
    Convert,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "PascalCase")]
pub enum JobStatus {
    /// An acknowledgement that the job has been received by the
    /// orchestrator and is waiting to be picked up by a worker
    Pending,
    /// A worker has taken the job and is executing the tool
    Processing,
    /// The job finished and the result is available under `result_ref`
    Completed,
    /// The job failed; `error_detail` carries the reason
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Requested quality level for the lossy tools.
///
/// The numeric mapping is the single canonical table used everywhere a
/// quality knob exists (standalone images and images embedded in PDFs
/// alike): low keeps ~95% fidelity, medium ~85%, high ~70%. Optimization
/// passes are always enabled.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CompressionLevel {
    Low,
    Medium,
    High,
}

impl CompressionLevel {
    /// Encoder quality (JPEG-style 1..=100 scale).
    pub fn quality(&self) -> u8 {
        match self {
            CompressionLevel::Low => 95,
            CompressionLevel::Medium => 85,
            CompressionLevel::High => 70,
        }
    }

    pub fn optimize(&self) -> bool {
        true
    }
}

/// Per-tool parameters. Each variant carries exactly the shape its tool
/// accepts, so a submission cannot smuggle a quality level into `merge`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum JobParameters {
    Merge,
    Compress { level: CompressionLevel },
    Reduce { level: CompressionLevel },
    Convert,
}

impl JobParameters {
    /// Whether this parameter set belongs to the given tool.
    pub fn matches_tool(&self, tool_type: &ToolType) -> bool {
        matches!(
            (self, tool_type),
            (JobParameters::Merge, ToolType::Merge)
                | (JobParameters::Compress { .. }, ToolType::Compress)
                | (JobParameters::Reduce { .. }, ToolType::Reduce)
                | (JobParameters::Convert, ToolType::Convert)
        )
    }

    pub fn ensure_matches_tool(&self, tool_type: &ToolType) -> Result<(), ValidationError> {
        if self.matches_tool(tool_type) {
            Ok(())
        } else {
            Err(ValidationError::ParameterMismatch { tool_type: *tool_type })
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JobItem {
    /// an uuid to identify a job
    #[serde(with = "uuid_1_as_binary")]
    pub id: Uuid,
    /// opaque session token of the submitter, used to scope job listing
    /// and deletion. Not an authentication credential.
    pub owner_token: String,
    /// the tool this job runs
    pub tool_type: ToolType,
    /// the status of the job
    pub status: JobStatus,
    /// storage keys of the uploaded inputs, in submission order
    pub input_refs: Vec<String>,
    /// tool specific parameters, fixed at submission
    pub parameters: JobParameters,
    /// storage key of the canonical result, set on completion
    pub result_ref: Option<String>,
    /// failure reason, set when the job fails
    pub error_detail: Option<String>,
    /// number of input files, informational
    pub file_count: u64,
    /// combined size of the fetched inputs in bytes, informational
    pub original_size: Option<u64>,
    /// size of the canonical result in bytes, informational
    pub result_size: Option<u64>,
    /// helps to keep track of the version of the item for optimistic locking
    pub version: i32,
    /// timestamp when the job was created
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// timestamp when the job was last updated
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
    /// timestamp of the terminal transition, set exactly once
    #[serde(with = "optional_chrono_datetime_as_bson_datetime")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// The changes an update is allowed to make to a job. Identity fields
/// (id, owner, tool, inputs, parameters) are not updatable; version and
/// updated_at are bumped by the database client on every update.
#[derive(Serialize, Debug, Default)]
pub struct JobItemUpdates {
    pub status: Option<JobStatus>,
    pub result_ref: Option<String>,
    pub error_detail: Option<String>,
    pub original_size: Option<u64>,
    pub result_size: Option<u64>,
    #[serde(with = "optional_chrono_datetime_as_bson_datetime")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobItemUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn update_result_ref(mut self, result_ref: String) -> Self {
        self.result_ref = Some(result_ref);
        self
    }

    pub fn update_error_detail(mut self, error_detail: String) -> Self {
        self.error_detail = Some(error_detail);
        self
    }

    pub fn update_original_size(mut self, original_size: u64) -> Self {
        self.original_size = Some(original_size);
        self
    }

    pub fn update_result_size(mut self, result_size: u64) -> Self {
        self.result_size = Some(result_size);
        self
    }

    pub fn update_completed_at(mut self, completed_at: DateTime<Utc>) -> Self {
        self.completed_at = Some(completed_at);
        self
    }

    pub fn build(self) -> Self {
        self
    }
}
