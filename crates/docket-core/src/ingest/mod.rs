//! Ingestion paths: upload, folder watch and batch, sharing one engine.
//!
//! Locks in this layer: the parser lock inside the engine, the result-store
//! lock and the batch-status lock, plus the cache's own lock. Each guards
//! its own state and none is taken while another is held.

pub mod batch;
pub mod pool;
pub mod store;
pub mod upload;
pub mod watcher;

pub use batch::{BatchOptions, BatchRunner, BatchStatus};
pub use pool::WorkerPool;
pub use store::{ResultStore, StatusCounts};
pub use upload::UploadIngest;
pub use watcher::{wait_for_ready, FolderWatcher, WatcherStatus};

use std::sync::Arc;

use tracing::info;

use crate::cache::ResultCache;
use crate::engine::ExtractionEngine;
use crate::error::IngestError;
use crate::models::DocketConfig;
use crate::reader::DocumentReader;

/// All ingestion services built from one configuration.
///
/// Owned by the entry point; nothing here is global.
pub struct Pipeline {
    pub engine: Arc<ExtractionEngine>,
    pub store: Arc<ResultStore>,
    pub pool: Arc<WorkerPool>,
    pub watcher: FolderWatcher,
    pub batch: BatchRunner,
    pub upload: UploadIngest,
    config: DocketConfig,
}

impl Pipeline {
    pub fn new(config: DocketConfig, reader: Box<dyn DocumentReader>) -> Result<Self, IngestError> {
        let mut engine = ExtractionEngine::new(reader, &config.extraction);
        if config.cache.enabled {
            engine = engine.with_cache(Arc::new(ResultCache::new(&config.cache)));
        }
        let engine = Arc::new(engine);

        let store = Arc::new(ResultStore::new(config.store.max_results));
        let pool = Arc::new(WorkerPool::new(config.ingest.workers)?);
        let paths = &config.paths;

        let watcher = FolderWatcher::new(
            engine.clone(),
            store.clone(),
            &paths.archive_dir,
            config.ingest.clone(),
            config.watcher.clone(),
        );
        let batch = BatchRunner::new(
            engine.clone(),
            store.clone(),
            pool.clone(),
            &paths.archive_dir,
            config.ingest.clone(),
        );
        let upload = UploadIngest::new(
            engine.clone(),
            store.clone(),
            pool.clone(),
            &paths.input_dir,
            &paths.archive_dir,
            config.ingest.clone(),
        );

        info!(
            "Pipeline ready ({} workers, cache {})",
            pool.workers(),
            if engine.cache().is_some() { "on" } else { "off" }
        );

        Ok(Self {
            engine,
            store,
            pool,
            watcher,
            batch,
            upload,
            config,
        })
    }

    pub fn config(&self) -> &DocketConfig {
        &self.config
    }

    /// Batch options from the configuration defaults.
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            archive: self.config.batch.archive,
            recursive: self.config.batch.recursive,
            use_cache: self.config.cache.enabled,
        }
    }

    /// Stop the watcher and any batch run.
    pub fn shutdown(&mut self) {
        self.batch.stop();
        self.watcher.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;
    use crate::reader::testing::ScriptedReader;
    use std::time::{Duration, Instant};

    fn config(root: &std::path::Path) -> DocketConfig {
        let mut config = DocketConfig::default();
        config.cache.file = Some(root.join("cache.json"));
        config.paths.input_dir = root.join("input");
        config.paths.output_dir = root.join("output");
        config.paths.archive_dir = root.join("archive");
        config.watcher.poll_interval_ms = 10;
        config.watcher.ready_interval_ms = 5;
        config
    }

    #[test]
    fn test_three_paths_share_engine_and_store() {
        let dir = tempfile::tempdir().unwrap();
        let reader = ScriptedReader::new()
            .otherwise("Amazon\nRechnungsnummer: INV-2024-001234")
            .delay(Duration::from_millis(5));
        let calls = reader.calls.clone();
        let mut pipeline = Pipeline::new(config(dir.path()), Box::new(reader)).unwrap();

        let watched = dir.path().join("watched");
        let batched = dir.path().join("batched");
        std::fs::create_dir_all(&watched).unwrap();
        std::fs::create_dir_all(&batched).unwrap();
        for i in 0..3 {
            std::fs::write(watched.join(format!("w{i}.pdf")), format!("watch {i}")).unwrap();
            std::fs::write(batched.join(format!("b{i}.pdf")), format!("batch {i}")).unwrap();
        }

        pipeline.watcher.start(&watched).unwrap();
        let handle = pipeline.batch.start(&batched, pipeline.batch_options()).unwrap();
        let upload = pipeline
            .pool
            .block_on(pipeline.upload.submit("u.pdf", b"upload".to_vec()))
            .unwrap()
            .unwrap();
        pipeline.pool.block_on(handle).unwrap().unwrap();

        let start = Instant::now();
        while pipeline.store.len() < 7 && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(10));
        }
        pipeline.shutdown();

        assert_eq!(upload.status, Status::Success);
        assert_eq!(pipeline.store.len(), 7);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 7);
        assert_eq!(pipeline.engine.cache().unwrap().len(), 7);
        assert!(dir.path().join("cache.json").exists());
    }

    #[test]
    fn test_cache_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.cache.enabled = false;

        let pipeline = Pipeline::new(config, Box::new(ScriptedReader::new())).unwrap();
        assert!(pipeline.engine.cache().is_none());
        assert!(!pipeline.batch_options().use_cache);
    }
}
