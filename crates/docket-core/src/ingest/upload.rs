//! Single-file upload path.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error};

use super::pool::WorkerPool;
use super::store::ResultStore;
use crate::archive::{archive_name, move_to_archive};
use crate::engine::ExtractionEngine;
use crate::error::IngestError;
use crate::models::config::IngestConfig;
use crate::models::ExtractionResult;

/// Validates uploaded bytes, parses them on the pool and archives the file.
pub struct UploadIngest {
    engine: Arc<ExtractionEngine>,
    store: Arc<ResultStore>,
    pool: Arc<WorkerPool>,
    input_dir: PathBuf,
    archive_dir: PathBuf,
    ingest: IngestConfig,
}

impl UploadIngest {
    pub fn new(
        engine: Arc<ExtractionEngine>,
        store: Arc<ResultStore>,
        pool: Arc<WorkerPool>,
        input_dir: impl Into<PathBuf>,
        archive_dir: impl Into<PathBuf>,
        ingest: IngestConfig,
    ) -> Self {
        Self {
            engine,
            store,
            pool,
            input_dir: input_dir.into(),
            archive_dir: archive_dir.into(),
            ingest,
        }
    }

    /// Reject unsupported types and oversized content before any work is done.
    pub fn validate(&self, filename: &str, size: usize) -> Result<String, IngestError> {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| IngestError::UnsupportedType(filename.to_string()))?;

        if !self.ingest.is_supported(Path::new(&name)) {
            return Err(IngestError::UnsupportedType(name));
        }
        if size > self.ingest.max_upload_bytes {
            return Err(IngestError::TooLarge {
                size,
                max: self.ingest.max_upload_bytes,
            });
        }
        Ok(name)
    }

    /// Store, parse and archive one uploaded file.
    ///
    /// Only the base name of `filename` is used, for the result and the
    /// archive name. The bytes go to a fresh temporary file in the input
    /// directory, so uploads sharing a name never touch each other's file.
    /// Extraction failures come back as a result with status `error`; only
    /// validation, I/O and pool failures are errors here.
    pub async fn submit(&self, filename: &str, bytes: Vec<u8>) -> Result<ExtractionResult, IngestError> {
        let name = self.validate(filename, bytes.len())?;

        let engine = self.engine.clone();
        let input_dir = self.input_dir.clone();
        let archive_dir = self.archive_dir.clone();
        let result = self
            .pool
            .run(move || -> Result<ExtractionResult, IngestError> {
                let path = store_upload(&input_dir, &name, &bytes)?;

                let mut result = engine.parse(&path, true);
                result.filename = name.clone();

                let target = archive_name(&result, Path::new(&name));
                if let Err(e) = move_to_archive(&path, &archive_dir, &target) {
                    error!("Failed to archive {}: {}", path.display(), e);
                }
                Ok(result)
            })
            .await??;

        self.store.append(result.clone());
        Ok(result)
    }
}

/// Write `bytes` to a new uniquely named file in `dir`, keeping the extension.
fn store_upload(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, IngestError> {
    std::fs::create_dir_all(dir)?;
    let suffix = Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile_in(dir)?;
    file.write_all(bytes)?;
    let (_, path) = file.keep().map_err(|e| e.error)?;

    debug!("Stored upload {} as {} ({} bytes)", name, path.display(), bytes.len());
    Ok(path)
}
