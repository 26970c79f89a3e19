//! Folder watcher: parses and archives files as they appear in a folder.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::store::ResultStore;
use crate::archive::{archive_name, move_to_archive};
use crate::engine::ExtractionEngine;
use crate::error::IngestError;
use crate::models::config::{IngestConfig, WatcherConfig};

/// Watcher state as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatcherStatus {
    pub running: bool,
    pub watch_path: Option<PathBuf>,
    pub processed: usize,
}

struct WatchSession {
    path: PathBuf,
    stop_tx: mpsc::Sender<()>,
    thread: thread::JoinHandle<HashSet<PathBuf>>,
}

/// Watches one folder at a time on a dedicated listener thread.
///
/// New files with a supported extension are parsed once their size stops
/// changing, appended to the store and moved into the archive. A path is
/// handled at most once for the life of the watcher, across restarts. The
/// handled-path set is never pruned.
pub struct FolderWatcher {
    engine: Arc<ExtractionEngine>,
    store: Arc<ResultStore>,
    archive_dir: PathBuf,
    ingest: IngestConfig,
    config: WatcherConfig,
    use_cache: bool,
    session: Option<WatchSession>,
    /// Owned by the listener thread while a session runs.
    handled: HashSet<PathBuf>,
    processed: Arc<AtomicUsize>,
}

impl FolderWatcher {
    pub fn new(
        engine: Arc<ExtractionEngine>,
        store: Arc<ResultStore>,
        archive_dir: impl Into<PathBuf>,
        ingest: IngestConfig,
        config: WatcherConfig,
    ) -> Self {
        Self {
            engine,
            store,
            archive_dir: archive_dir.into(),
            ingest,
            config,
            use_cache: true,
            session: None,
            handled: HashSet::new(),
            processed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Start watching `path`, stopping any running session first.
    ///
    /// Files already in the folder are handled like new arrivals.
    pub fn start(&mut self, path: &Path) -> Result<(), IngestError> {
        if self.session.is_some() {
            self.stop();
        }

        if !path.is_dir() {
            return Err(IngestError::InvalidPath(path.to_path_buf()));
        }
        let path = path.canonicalize()?;

        let listener = Listener {
            folder: path.clone(),
            engine: self.engine.clone(),
            store: self.store.clone(),
            archive_dir: self.archive_dir.clone(),
            ingest: self.ingest.clone(),
            config: self.config.clone(),
            use_cache: self.use_cache,
            handled: std::mem::take(&mut self.handled),
            processed: self.processed.clone(),
        };

        let (stop_tx, stop_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("docket-watcher".to_string())
            .spawn(move || listener.run(stop_rx))?;

        info!("Watching {}", path.display());
        self.session = Some(WatchSession {
            path,
            stop_tx,
            thread,
        });
        Ok(())
    }

    /// Stop the listener and wait for its thread to finish. Idempotent.
    ///
    /// A file being parsed when `stop` is called is finished first.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        // A closed channel also ends the listener.
        let _ = session.stop_tx.send(());
        match session.thread.join() {
            Ok(handled) => self.handled = handled,
            Err(_) => error!("Watcher thread for {} panicked", session.path.display()),
        }
        info!("Stopped watching {}", session.path.display());
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn status(&self) -> WatcherStatus {
        WatcherStatus {
            running: self.session.is_some(),
            watch_path: self.session.as_ref().map(|s| s.path.clone()),
            processed: self.processed.load(Ordering::SeqCst),
        }
    }
}

impl Drop for FolderWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved onto the listener thread.
struct Listener {
    folder: PathBuf,
    engine: Arc<ExtractionEngine>,
    store: Arc<ResultStore>,
    archive_dir: PathBuf,
    ingest: IngestConfig,
    config: WatcherConfig,
    use_cache: bool,
    handled: HashSet<PathBuf>,
    processed: Arc<AtomicUsize>,
}

impl Listener {
    /// Poll the folder until told to stop; returns the handled-path set.
    fn run(mut self, stop_rx: mpsc::Receiver<()>) -> HashSet<PathBuf> {
        // Empty on the first pass, so files already present count as created.
        let mut seen: HashSet<PathBuf> = HashSet::new();

        loop {
            match list_files(&self.folder, &self.ingest) {
                Ok(files) => {
                    for file in files.iter().filter(|f| !seen.contains(*f)) {
                        self.on_created(file);
                    }
                    seen = files.into_iter().collect();
                }
                Err(e) => warn!("Cannot list {}: {}", self.folder.display(), e),
            }

            match stop_rx.recv_timeout(self.config.poll_interval()) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.handled
    }

    fn on_created(&mut self, path: &Path) {
        if self.handled.contains(path) {
            debug!("Already handled {}", path.display());
            return;
        }

        if !wait_for_ready(path, self.config.ready_interval(), self.config.ready_timeout()) {
            warn!("File not ready after timeout, skipping: {}", path.display());
            return;
        }

        self.handled.insert(path.to_path_buf());

        let result = self.engine.parse(path, self.use_cache);
        self.store.append(result.clone());
        self.processed.fetch_add(1, Ordering::SeqCst);

        let name = archive_name(&result, path);
        match move_to_archive(path, &self.archive_dir, &name) {
            Ok(target) => info!("{} -> {}", result.filename, target.display()),
            Err(e) => error!("Failed to archive {}: {}", path.display(), e),
        }
    }
}

/// Supported files directly in `folder`, in name order.
fn list_files(folder: &Path, ingest: &IngestConfig) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if path.is_file() && ingest.is_supported(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Wait until two size reads `interval` apart agree on a nonzero size.
///
/// On timeout, a file with a nonzero size is accepted anyway.
pub fn wait_for_ready(path: &Path, interval: Duration, timeout: Duration) -> bool {
    let start = Instant::now();
    let mut last: Option<u64> = None;

    while start.elapsed() < timeout {
        match std::fs::metadata(path) {
            Ok(meta) => {
                let size = meta.len();
                if size > 0 && last == Some(size) {
                    return true;
                }
                last = Some(size);
            }
            Err(_) => last = None,
        }
        thread::sleep(interval);
    }

    last.is_some_and(|size| size > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::ExtractionConfig;
    use crate::reader::testing::ScriptedReader;
    use pretty_assertions::assert_eq;

    const GOOD: &str = "Amazon\nRechnungsnummer: INV-2024-001234";

    struct Fixture {
        _dir: tempfile::TempDir,
        inbox: PathBuf,
        archive: PathBuf,
        store: Arc<ResultStore>,
        reader: ScriptedReader,
        watcher: FolderWatcher,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("inbox");
        let archive = dir.path().join("archive");
        std::fs::create_dir_all(&inbox).unwrap();

        let reader = ScriptedReader::new().otherwise(GOOD);
        let engine = Arc::new(ExtractionEngine::new(
            Box::new(reader.clone()),
            &ExtractionConfig::default(),
        ));
        let store = Arc::new(ResultStore::new(100));
        let config = WatcherConfig {
            poll_interval_ms: 10,
            ready_interval_ms: 5,
            ready_timeout_secs: 1,
        };
        let watcher = FolderWatcher::new(
            engine,
            store.clone(),
            &archive,
            IngestConfig::default(),
            config,
        );

        Fixture {
            _dir: dir,
            inbox,
            archive,
            store,
            reader,
            watcher,
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn archived(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[test]
    fn test_existing_files_processed_in_order() {
        let mut f = fixture();
        for name in ["c.pdf", "a.pdf", "b.png", "notes.txt"] {
            std::fs::write(f.inbox.join(name), b"data").unwrap();
        }

        f.watcher.start(&f.inbox).unwrap();
        assert!(wait_until(|| f.store.len() == 3));
        f.watcher.stop();

        assert_eq!(*f.reader.order.lock().unwrap(), vec!["a.pdf", "b.png", "c.pdf"]);
        assert_eq!(
            archived(&f.archive),
            vec![
                "Amazon_INV-2024-001234_0.pdf",
                "Amazon_INV-2024-001234_0.png",
                "Amazon_INV-2024-001234_0_1.pdf",
            ]
        );
        // unsupported files stay where they are
        assert!(f.inbox.join("notes.txt").exists());
        assert_eq!(f.watcher.status().processed, 3);
    }

    #[test]
    fn test_new_file_is_picked_up() {
        let mut f = fixture();
        f.watcher.start(&f.inbox).unwrap();

        std::fs::write(f.inbox.join("late.pdf"), b"data").unwrap();
        assert!(wait_until(|| f.store.len() == 1));
        assert_eq!(f.store.snapshot()[0].filename, "late.pdf");
        assert!(!f.inbox.join("late.pdf").exists());
    }

    #[test]
    fn test_same_path_is_parsed_once() {
        let mut f = fixture();
        f.watcher.start(&f.inbox).unwrap();

        let path = f.inbox.join("dup.pdf");
        std::fs::write(&path, b"first").unwrap();
        assert!(wait_until(|| f.store.len() == 1));

        // second creation of the identical path
        std::fs::write(&path, b"second").unwrap();
        thread::sleep(Duration::from_millis(200));
        f.watcher.stop();

        assert_eq!(f.reader.call_count(), 1);
        assert!(path.exists());
    }

    #[test]
    fn test_handled_paths_survive_restart() {
        let mut f = fixture();
        f.watcher.start(&f.inbox).unwrap();
        let path = f.inbox.join("dup.pdf");
        std::fs::write(&path, b"first").unwrap();
        assert!(wait_until(|| f.store.len() == 1));
        f.watcher.stop();

        std::fs::write(&path, b"again").unwrap();
        f.watcher.start(&f.inbox).unwrap();
        thread::sleep(Duration::from_millis(200));
        f.watcher.stop();

        assert_eq!(f.reader.call_count(), 1);
    }

    #[test]
    fn test_status_and_idempotent_stop() {
        let mut f = fixture();
        assert_eq!(
            f.watcher.status(),
            WatcherStatus {
                running: false,
                watch_path: None,
                processed: 0
            }
        );

        f.watcher.start(&f.inbox).unwrap();
        let status = f.watcher.status();
        assert!(status.running);
        assert_eq!(status.watch_path, Some(f.inbox.canonicalize().unwrap()));

        f.watcher.stop();
        f.watcher.stop();
        assert!(!f.watcher.is_running());
    }

    #[test]
    fn test_restart_switches_folder() {
        let mut f = fixture();
        let other = f.inbox.parent().unwrap().join("other");
        std::fs::create_dir_all(&other).unwrap();

        f.watcher.start(&f.inbox).unwrap();
        f.watcher.start(&other).unwrap();
        assert_eq!(f.watcher.status().watch_path, Some(other.canonicalize().unwrap()));
    }

    #[test]
    fn test_missing_folder_is_rejected() {
        let mut f = fixture();
        let err = f.watcher.start(Path::new("/nonexistent/inbox")).unwrap_err();
        assert!(matches!(err, IngestError::InvalidPath(_)));
        assert!(!f.watcher.is_running());
    }

    #[test]
    fn test_ready_gate() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.pdf");
        let full = dir.path().join("full.pdf");
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&full, b"content").unwrap();

        let interval = Duration::from_millis(5);
        let timeout = Duration::from_millis(50);
        assert!(wait_for_ready(&full, interval, timeout));
        assert!(!wait_for_ready(&empty, interval, timeout));
        assert!(!wait_for_ready(&dir.path().join("missing.pdf"), interval, timeout));
    }

    #[test]
    fn test_growing_file_accepted_at_timeout() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("growing.pdf");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"%PDF").unwrap();

        let writer = thread::spawn(move || {
            for _ in 0..300 {
                file.write_all(b"x").unwrap();
                file.flush().unwrap();
                thread::sleep(Duration::from_millis(1));
            }
        });

        let start = Instant::now();
        let ready = wait_for_ready(&path, Duration::from_millis(20), Duration::from_millis(100));
        let waited = start.elapsed();
        writer.join().unwrap();

        assert!(ready);
        assert!(waited < Duration::from_millis(250));
    }
}
