//! On-demand batch processing of a folder snapshot.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use super::pool::WorkerPool;
use super::store::{ResultStore, StatusCounts};
use crate::archive::{archive_name, move_to_archive};
use crate::engine::ExtractionEngine;
use crate::error::IngestError;
use crate::lock;
use crate::models::config::IngestConfig;
use crate::models::ExtractionResult;

/// Progress of the current or last batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStatus {
    pub running: bool,
    pub current_file: Option<String>,
    pub processed: usize,
    pub total: usize,
    pub counts: StatusCounts,
}

#[derive(Debug, Default)]
struct BatchSession {
    /// Generation of the run that owns this session.
    run_id: u64,
    running: bool,
    total: usize,
    processed: usize,
    current_file: Option<String>,
    results: Vec<ExtractionResult>,
}

/// Options for one batch run.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub archive: bool,
    pub recursive: bool,
    pub use_cache: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            archive: true,
            recursive: false,
            use_cache: true,
        }
    }
}

/// Runs the engine over a folder snapshot, one file at a time, on the pool.
///
/// Only one run owns the session at a time. A stopped run may still finish
/// its in-flight file after a new run starts, but it no longer touches the
/// session. The batch-status lock guards the session counters and is never
/// held while parsing.
pub struct BatchRunner {
    engine: Arc<ExtractionEngine>,
    store: Arc<ResultStore>,
    pool: Arc<WorkerPool>,
    archive_dir: PathBuf,
    ingest: IngestConfig,
    session: Arc<Mutex<BatchSession>>,
}

impl BatchRunner {
    pub fn new(
        engine: Arc<ExtractionEngine>,
        store: Arc<ResultStore>,
        pool: Arc<WorkerPool>,
        archive_dir: impl Into<PathBuf>,
        ingest: IngestConfig,
    ) -> Self {
        Self {
            engine,
            store,
            pool,
            archive_dir: archive_dir.into(),
            ingest,
            session: Arc::new(Mutex::new(BatchSession::default())),
        }
    }

    /// Start processing the files currently in `folder`.
    ///
    /// Fails with [`IngestError::BatchInProgress`] while a run is active,
    /// leaving that run untouched. Files added after the snapshot are not
    /// part of this run.
    pub fn start(&self, folder: &Path, options: BatchOptions) -> Result<JoinHandle<()>, IngestError> {
        if lock(&self.session).running {
            return Err(IngestError::BatchInProgress);
        }
        if !folder.is_dir() {
            return Err(IngestError::InvalidPath(folder.to_path_buf()));
        }

        let files = snapshot(folder, &self.archive_dir, &self.ingest, options.recursive)?;

        let id = {
            let mut session = lock(&self.session);
            if session.running {
                return Err(IngestError::BatchInProgress);
            }
            let id = session.run_id + 1;
            *session = BatchSession {
                run_id: id,
                running: true,
                total: files.len(),
                ..BatchSession::default()
            };
            id
        };
        info!("Batch started: {} files in {}", files.len(), folder.display());

        let run = BatchRun {
            engine: self.engine.clone(),
            store: self.store.clone(),
            archive_dir: self.archive_dir.clone(),
            session: self.session.clone(),
            options,
            id,
        };

        self.pool.spawn(move || run.process(files)).inspect_err(|_| {
            let mut session = lock(&self.session);
            if session.run_id == id {
                session.running = false;
            }
        })
    }

    /// Ask the current run to stop before its next file.
    pub fn stop(&self) {
        let mut session = lock(&self.session);
        if session.running {
            info!("Batch stop requested after {} of {} files", session.processed, session.total);
            session.running = false;
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.session).running
    }

    pub fn status(&self) -> BatchStatus {
        let session = lock(&self.session);
        BatchStatus {
            running: session.running,
            current_file: session.current_file.clone(),
            processed: session.processed,
            total: session.total,
            counts: StatusCounts::from_results(&session.results),
        }
    }

    /// Results of the current or last run, in processing order.
    pub fn results(&self) -> Vec<ExtractionResult> {
        lock(&self.session).results.clone()
    }
}

/// One run, moved onto a pool thread.
struct BatchRun {
    engine: Arc<ExtractionEngine>,
    store: Arc<ResultStore>,
    archive_dir: PathBuf,
    session: Arc<Mutex<BatchSession>>,
    options: BatchOptions,
    id: u64,
}

impl BatchRun {
    fn process(self, files: Vec<PathBuf>) {
        let _finish = FinishGuard {
            session: &self.session,
            id: self.id,
        };

        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            {
                let mut session = lock(&self.session);
                if !session.running || session.run_id != self.id {
                    info!("Batch cancelled before {}", name);
                    return;
                }
                session.current_file = Some(name);
            }

            let result = self.engine.parse(&file, self.options.use_cache);
            self.store.append(result.clone());

            if self.options.archive {
                let target = archive_name(&result, &file);
                if let Err(e) = move_to_archive(&file, &self.archive_dir, &target) {
                    error!("Failed to archive {}: {}", file.display(), e);
                }
            }

            let mut session = lock(&self.session);
            if session.run_id != self.id {
                info!("Batch superseded after {}", result.filename);
                return;
            }
            session.results.push(result);
            session.processed += 1;
        }

        let session = lock(&self.session);
        let counts = StatusCounts::from_results(&session.results);
        info!(
            "Batch finished: {} files, {} success, {} review, {} error",
            session.processed, counts.success, counts.review, counts.error
        );
    }
}

/// Marks the session idle when its run ends, however it ends.
struct FinishGuard<'a> {
    session: &'a Mutex<BatchSession>,
    id: u64,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        let mut session = lock(self.session);
        if session.run_id == self.id {
            session.running = false;
            session.current_file = None;
        }
    }
}

/// Supported files under `folder` in path order, skipping the archive.
///
/// Symlinked directories are not descended into.
fn snapshot(
    folder: &Path,
    archive_dir: &Path,
    ingest: &IngestConfig,
    recursive: bool,
) -> Result<Vec<PathBuf>, IngestError> {
    let archive = archive_dir.canonicalize().ok();
    let is_archive = |path: &Path| {
        archive
            .as_deref()
            .is_some_and(|a| path.canonicalize().is_ok_and(|p| p == a))
    };

    let walker = WalkDir::new(folder)
        .follow_links(false)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 });

    let mut files = Vec::new();
    for entry in walker
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && is_archive(e.path())))
    {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if entry.file_type().is_dir() || !path.is_file() {
            continue;
        }
        if ingest.is_supported(path) {
            files.push(entry.into_path());
        } else {
            warn!("Skipping unsupported file {}", path.display());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::ExtractionConfig;
    use crate::models::Status;
    use crate::reader::testing::{Script, ScriptedReader};
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};

    const GOOD: &str = "Amazon\nRechnungsnummer: INV-2024-001234";

    struct Fixture {
        dir: tempfile::TempDir,
        inbox: PathBuf,
        store: Arc<ResultStore>,
        pool: Arc<WorkerPool>,
        runner: BatchRunner,
    }

    fn fixture(reader: ScriptedReader, files: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("inbox");
        std::fs::create_dir_all(&inbox).unwrap();
        for (i, name) in files.iter().enumerate() {
            let path = inbox.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, format!("file {i}")).unwrap();
        }

        let engine = Arc::new(ExtractionEngine::new(Box::new(reader), &ExtractionConfig::default()));
        let store = Arc::new(ResultStore::new(100));
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let runner = BatchRunner::new(
            engine,
            store.clone(),
            pool.clone(),
            dir.path().join("archive"),
            IngestConfig::default(),
        );

        Fixture {
            dir,
            inbox,
            store,
            pool,
            runner,
        }
    }

    fn no_archive() -> BatchOptions {
        BatchOptions {
            archive: false,
            ..BatchOptions::default()
        }
    }

    #[test]
    fn test_processes_snapshot_in_order() {
        let reader = ScriptedReader::new().otherwise(GOOD);
        let order = reader.order.clone();
        let f = fixture(reader, &["b.pdf", "a.pdf", "c.jpg", "readme.txt"]);

        let handle = f.runner.start(&f.inbox, BatchOptions::default()).unwrap();
        f.pool.block_on(handle).unwrap().unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["a.pdf", "b.pdf", "c.jpg"]);
        let status = f.runner.status();
        assert!(!status.running);
        assert_eq!(status.current_file, None);
        assert_eq!((status.processed, status.total), (3, 3));
        assert_eq!(status.counts.success, 3);
        assert_eq!(f.store.len(), 3);

        // archived, only the unsupported file is left
        assert!(!f.inbox.join("a.pdf").exists());
        assert!(f.inbox.join("readme.txt").exists());
        assert_eq!(std::fs::read_dir(f.dir.path().join("archive")).unwrap().count(), 3);
    }

    #[test]
    fn test_without_archive_files_stay() {
        let f = fixture(ScriptedReader::new().otherwise(GOOD), &["a.pdf"]);
        let handle = f.runner.start(&f.inbox, no_archive()).unwrap();
        f.pool.block_on(handle).unwrap().unwrap();

        assert!(f.inbox.join("a.pdf").exists());
        assert_eq!(f.runner.results().len(), 1);
    }

    #[test]
    fn test_bad_file_does_not_abort_run() {
        let reader = ScriptedReader::new()
            .otherwise(GOOD)
            .on("b.pdf", Script::Fail("unreadable".into()))
            .on("c.pdf", Script::Panic);
        let f = fixture(reader, &["a.pdf", "b.pdf", "c.pdf", "d.pdf"]);

        let handle = f.runner.start(&f.inbox, no_archive()).unwrap();
        f.pool.block_on(handle).unwrap().unwrap();

        let status = f.runner.status();
        assert_eq!(status.processed, 4);
        assert_eq!(status.counts.error, 2);
        let statuses: Vec<Status> = f.runner.results().iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![Status::Success, Status::Error, Status::Error, Status::Success]
        );
    }

    #[test]
    fn test_second_start_is_rejected_without_side_effects() {
        let reader = ScriptedReader::new()
            .otherwise(GOOD)
            .delay(Duration::from_millis(40));
        let f = fixture(reader, &["1.pdf", "2.pdf", "3.pdf", "4.pdf", "5.pdf"]);
        let other = f.dir.path().join("other");
        std::fs::create_dir_all(&other).unwrap();
        std::fs::write(other.join("x.pdf"), b"x").unwrap();

        let handle = f.runner.start(&f.inbox, no_archive()).unwrap();
        let before = f.runner.status();

        let err = f.runner.start(&other, no_archive()).unwrap_err();
        assert!(matches!(err, IngestError::BatchInProgress));

        let after = f.runner.status();
        assert!(after.running);
        assert_eq!(after.total, before.total);
        assert!(after.processed >= before.processed);

        f.pool.block_on(handle).unwrap().unwrap();
        assert_eq!(f.runner.status().processed, 5);
        assert!(other.join("x.pdf").exists());
    }

    #[test]
    fn test_stop_takes_effect_between_files() {
        let reader = ScriptedReader::new()
            .otherwise(GOOD)
            .delay(Duration::from_millis(30));
        let names: Vec<String> = (0..10).map(|i| format!("{i:02}.pdf")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let f = fixture(reader, &refs);

        let handle = f.runner.start(&f.inbox, no_archive()).unwrap();
        let start = Instant::now();
        while f.runner.status().processed == 0 && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
        }
        f.runner.stop();
        f.pool.block_on(handle).unwrap().unwrap();

        let status = f.runner.status();
        assert!(!status.running);
        assert!(status.processed >= 1 && status.processed < 10);
        assert_eq!(status.processed, f.runner.results().len());
        assert_eq!(status.processed, f.store.len());
    }

    #[test]
    fn test_stopped_run_does_not_leak_into_next_run() {
        let reader = ScriptedReader::new()
            .otherwise(GOOD)
            .delay(Duration::from_millis(50));
        let order = reader.order.clone();
        let f = fixture(reader, &["a0.pdf", "a1.pdf", "a2.pdf", "a3.pdf"]);
        let next = f.dir.path().join("next");
        std::fs::create_dir_all(&next).unwrap();
        for i in 0..4 {
            std::fs::write(next.join(format!("b{i}.pdf")), format!("next {i}")).unwrap();
        }

        let first = f.runner.start(&f.inbox, no_archive()).unwrap();
        let start = Instant::now();
        while f.runner.status().current_file.is_none() && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(2));
        }
        f.runner.stop();
        let second = f.runner.start(&next, no_archive()).unwrap();

        f.pool.block_on(first).unwrap().unwrap();
        f.pool.block_on(second).unwrap().unwrap();

        let parsed = order.lock().unwrap().clone();
        let from_first = parsed.iter().filter(|n| n.starts_with('a')).count();
        assert!(from_first <= 2, "stopped run kept going: {parsed:?}");

        let status = f.runner.status();
        assert!(!status.running);
        assert_eq!((status.processed, status.total), (4, 4));
        let names: Vec<String> = f.runner.results().into_iter().map(|r| r.filename).collect();
        assert_eq!(names, vec!["b0.pdf", "b1.pdf", "b2.pdf", "b3.pdf"]);
        assert_eq!(f.store.len(), 4 + from_first);
    }

    #[test]
    fn test_restart_resets_counters() {
        let f = fixture(ScriptedReader::new().otherwise(GOOD), &["a.pdf", "b.pdf"]);
        let handle = f.runner.start(&f.inbox, no_archive()).unwrap();
        f.pool.block_on(handle).unwrap().unwrap();

        std::fs::remove_file(f.inbox.join("b.pdf")).unwrap();
        let handle = f.runner.start(&f.inbox, no_archive()).unwrap();
        f.pool.block_on(handle).unwrap().unwrap();

        let status = f.runner.status();
        assert_eq!((status.processed, status.total), (1, 1));
        assert_eq!(f.runner.results().len(), 1);
        assert_eq!(f.store.len(), 3);
    }

    #[test]
    fn test_invalid_folder() {
        let f = fixture(ScriptedReader::new(), &[]);
        let err = f.runner.start(Path::new("/nonexistent"), no_archive()).unwrap_err();
        assert!(matches!(err, IngestError::InvalidPath(_)));
        assert!(!f.runner.is_running());
    }

    #[test]
    fn test_recursive_snapshot() {
        let f = fixture(
            ScriptedReader::new().otherwise(GOOD),
            &["top.pdf", "sub/inner.pdf", "sub/deeper/last.png"],
        );

        let flat = snapshot(&f.inbox, Path::new("/nonexistent"), &IngestConfig::default(), false).unwrap();
        assert_eq!(flat, vec![f.inbox.join("top.pdf")]);

        let all = snapshot(&f.inbox, Path::new("/nonexistent"), &IngestConfig::default(), true).unwrap();
        assert_eq!(
            all,
            vec![
                f.inbox.join("sub/deeper/last.png"),
                f.inbox.join("sub/inner.pdf"),
                f.inbox.join("top.pdf"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_recursive_snapshot_skips_symlinked_dirs() {
        let f = fixture(ScriptedReader::new(), &["a.pdf"]);
        std::os::unix::fs::symlink(&f.inbox, f.inbox.join("loop")).unwrap();

        let all = snapshot(&f.inbox, Path::new("/nonexistent"), &IngestConfig::default(), true).unwrap();
        assert_eq!(all, vec![f.inbox.join("a.pdf")]);
    }

    #[test]
    fn test_recursive_snapshot_skips_archive() {
        let f = fixture(ScriptedReader::new(), &["a.pdf", "archive/old.pdf"]);
        let all = snapshot(&f.inbox, &f.inbox.join("archive"), &IngestConfig::default(), true).unwrap();
        assert_eq!(all, vec![f.inbox.join("a.pdf")]);
    }
}
