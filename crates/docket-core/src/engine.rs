//! The extraction engine: reader, field extraction, scoring and cache for one document.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::cache::{ContentHash, ResultCache};
use crate::error::{ExtractionError, ReaderError};
use crate::extract::{extract_internal_from_corner, ConfidenceScorer, FieldExtractor};
use crate::lock;
use crate::models::config::ExtractionConfig;
use crate::models::{DocumentFields, ExtractionResult, Status};
use crate::reader::DocumentReader;

/// Parses documents into [`ExtractionResult`]s.
///
/// The reader sits behind the parser lock, so at most one document is
/// recognized at a time no matter how many ingestion paths share the engine.
/// The cache is consulted before and filled after that lock, never under it.
pub struct ExtractionEngine {
    reader: Mutex<Box<dyn DocumentReader>>,
    extractor: FieldExtractor,
    scorer: ConfidenceScorer,
    cache: Option<Arc<ResultCache>>,
}

impl ExtractionEngine {
    pub fn new(reader: Box<dyn DocumentReader>, config: &ExtractionConfig) -> Self {
        Self {
            reader: Mutex::new(reader),
            extractor: FieldExtractor::new(config),
            scorer: ConfidenceScorer::new(config.success_threshold),
            cache: None,
        }
    }

    /// Use `cache` for lookups and writes.
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// Parse the document at `path`.
    ///
    /// Never fails: reader errors and panics become a result with status
    /// `error` that keeps the fields resolved before the failure.
    pub fn parse(&self, path: &Path, use_cache: bool) -> ExtractionResult {
        let start = Instant::now();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let cache = self.cache.as_ref().filter(|_| use_cache);
        let key = match cache {
            Some(cache) => match ContentHash::from_file(path) {
                Ok(key) => {
                    if let Some(mut hit) = cache.get(&key) {
                        info!("{}: cache hit ({})", filename, hit.status);
                        hit.filename = filename;
                        return hit;
                    }
                    Some(key)
                }
                Err(source) => {
                    let err = ExtractionError::Open {
                        path: path.to_path_buf(),
                        source,
                    };
                    warn!("{}: {}", filename, err);
                    return ExtractionResult::failed(filename, DocumentFields::default(), err);
                }
            },
            None => None,
        };

        let (fields, failure) = self.extract(path);

        let result = match failure {
            Some(err) => {
                warn!("{}: extraction failed: {}", filename, err);
                ExtractionResult::failed(filename, fields, err)
            }
            None => {
                let (confidence, status) = self.scorer.score(&fields);
                ExtractionResult {
                    fields,
                    confidence,
                    status,
                    ..ExtractionResult::pending(filename)
                }
            }
        };

        if let (Some(cache), Some(key)) = (cache, key) {
            if result.status != Status::Error {
                if let Err(e) = cache.set(key, &result) {
                    warn!("Failed to write cache: {}", e);
                }
            }
        }

        info!(
            "{}: {} (confidence {}) in {}ms",
            result.filename,
            result.status,
            result.confidence,
            start.elapsed().as_millis()
        );
        result
    }

    /// Recognize and extract under the parser lock.
    fn extract(&self, path: &Path) -> (DocumentFields, Option<ExtractionError>) {
        let mut reader = lock(&self.reader);
        debug!("Reading {} with {}", path.display(), reader.name());

        let recognition = match guarded(|| reader.recognize(path)) {
            Ok(recognition) => recognition,
            Err(e) => return (DocumentFields::default(), Some(e)),
        };

        let mut fields = self.extractor.extract(&recognition);

        if fields.internal_number.is_none() {
            match guarded(|| reader.corner_digits(path)) {
                Ok(Some(digits)) => fields.internal_number = extract_internal_from_corner(&digits),
                Ok(None) => {}
                Err(e) => return (fields, Some(e)),
            }
        }

        (fields, None)
    }
}

/// Run a reader call, turning a panic into an error.
fn guarded<T>(f: impl FnOnce() -> Result<T, ReaderError>) -> Result<T, ExtractionError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result.map_err(ExtractionError::from),
        Err(payload) => Err(ExtractionError::ReaderPanicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
