use std::path::Path;

use tempfile::TempDir;

use crate::data_storage::{DataStorage, StorageError};
use crate::tools::ToolInput;

/// Disk-backed scratch space for one task invocation. Inputs are spooled
/// here instead of being held in memory so that peak memory stays bounded
/// for large files. Dropping the guard removes the directory, which is
/// what guarantees release on every exit path of the entry point.
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self { dir: tempfile::tempdir()? })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Downloads every input blob into the scratch space, in order. Returns
/// the spooled inputs together with the combined byte size.
pub async fn download_inputs_to_scratch(
    storage: &dyn DataStorage,
    input_refs: &[String],
    scratch: &ScratchSpace,
) -> Result<(Vec<ToolInput>, u64), StorageError> {
    let mut inputs = Vec::with_capacity(input_refs.len());
    let mut total_bytes: u64 = 0;

    for (index, key) in input_refs.iter().enumerate() {
        let data = storage.get_data(key).await?;
        total_bytes += data.len() as u64;

        let file_name = key.rsplit('/').next().unwrap_or(key);
        let path = scratch.path().join(format!("input_{}_{}", index, file_name));
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StorageError::ObjectStreamError(format!("failed to spool {} to scratch: {}", key, e)))?;

        inputs.push(ToolInput { path, source_key: key.clone() });
    }

    Ok((inputs, total_bytes))
}

/// Cleanup step: attempt, log outcome, never fail the parent operation.
pub async fn delete_blobs_best_effort(storage: &dyn DataStorage, keys: &[String]) {
    if keys.is_empty() {
        return;
    }
    match storage.delete_many(keys).await {
        Ok(results) => {
            for (key, deleted) in results {
                if !deleted {
                    tracing::warn!(key = %key, "Failed to delete blob during cleanup");
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Blob cleanup failed, leaving objects for the retention sweeper");
        }
    }
}

/// Content type by file extension; storage keys keep their upload names.
pub fn content_type_for_key(key: &str) -> &'static str {
    let extension = key.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
