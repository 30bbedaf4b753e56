use std::time::Duration;

use uuid::Uuid;

/// Hard cap on the number of input files a single submission may carry.
pub const MAX_INPUT_FILES: usize = 20;

/// Lifetime of presigned upload and download URLs.
pub const PRESIGNED_URL_EXPIRY: Duration = Duration::from_secs(3600);

/// Prefix under which presigned uploads land. Objects below it that never
/// became a job are reaped by the temp cleanup worker.
pub const TEMP_UPLOAD_PREFIX: &str = "tmp/";

/// Prefix under which job results are stored.
pub const RESULTS_PREFIX: &str = "results";

pub const MERGE_RESULT_FILE_NAME: &str = "merged.pdf";
pub const REDUCE_RESULT_FILE_NAME: &str = "reduced.pdf";
pub const CONVERT_RESULT_FILE_NAME: &str = "converted.pdf";

/// Key of a result file, scoped by job id so results of different jobs can
/// never collide: `results/{job_id}/{file_name}`.
pub fn job_result_key(job_id: &Uuid, file_name: &str) -> String {
    format!("{}/{}/{}", RESULTS_PREFIX, job_id, file_name)
}
