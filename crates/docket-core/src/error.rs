//! Error types for the docket-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the docket library.
#[derive(Error, Debug)]
pub enum DocketError {
    /// Document reading (PDF/OCR) error.
    #[error("reader error: {0}")]
    Reader(#[from] ReaderError),

    /// Field extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Result cache error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Ingestion (upload, watcher, batch) error.
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by the document reader layer.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Pdf(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Text recognition failed.
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// No recognizer is able to handle this input.
    #[error("unsupported input: {0}")]
    Unsupported(String),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while extracting fields from one document.
///
/// These never leave the engine: they are folded into an
/// [`ExtractionResult`](crate::models::ExtractionResult) with status `error`.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The document could not be hashed or opened.
    #[error("cannot read {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The reader layer failed.
    #[error("{0}")]
    Reader(#[from] ReaderError),

    /// The reader layer panicked.
    #[error("reader panicked: {0}")]
    ReaderPanicked(String),
}

/// Errors related to the persisted result cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading or writing the cache file failed.
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache could not be serialized.
    #[error("cache serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors related to the ingestion paths.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The file type is not accepted.
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    /// The upload exceeds the configured size limit.
    #[error("file too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    /// The folder to watch or scan does not exist.
    #[error("invalid folder: {0}")]
    InvalidPath(PathBuf),

    /// A batch run is already in progress.
    #[error("a batch run is already in progress")]
    BatchInProgress,

    /// A pool task failed to complete.
    #[error("worker task failed: {0}")]
    Worker(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Whether this error was raised by boundary validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::UnsupportedType(_) | Self::TooLarge { .. })
    }
}

/// Result type for the docket library.
pub type Result<T> = std::result::Result<T, DocketError>;
