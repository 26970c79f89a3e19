//! Core library for scanned invoice and delivery-note ingestion.
//!
//! This crate provides:
//! - Document readers (PDF text layer, OCR of scans and images)
//! - Field extraction (vendor, invoice number, internal number, VAT id)
//! - Confidence scoring and archive naming
//! - A content-addressed result cache
//! - Upload, folder-watch and batch ingestion sharing one engine

pub mod archive;
pub mod cache;
pub mod engine;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod models;
pub mod reader;

pub use archive::{archive_name, move_to_archive};
pub use cache::{CacheStats, ContentHash, ResultCache};
pub use engine::ExtractionEngine;
pub use error::{CacheError, DocketError, ExtractionError, IngestError, ReaderError, Result};
pub use extract::FieldExtractor;
pub use ingest::{
    BatchOptions, BatchRunner, BatchStatus, FolderWatcher, Pipeline, ResultStore, StatusCounts,
    UploadIngest, WatcherStatus, WorkerPool,
};
pub use models::{DocketConfig, DocumentFields, ExtractionResult, Status};
#[cfg(feature = "native")]
pub use reader::OcrReader;
pub use reader::{DocumentReader, FileReader, PdfTextReader, Recognition};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
