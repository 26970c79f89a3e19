//! Configuration structures for the ingestion pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the docket pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocketConfig {
    /// Field extraction and scoring configuration.
    pub extraction: ExtractionConfig,

    /// Result cache configuration.
    pub cache: CacheConfig,

    /// Folder watcher configuration.
    pub watcher: WatcherConfig,

    /// Batch runner configuration.
    pub batch: BatchConfig,

    /// Shared result store configuration.
    pub store: StoreConfig,

    /// Upload path and worker pool configuration.
    pub ingest: IngestConfig,

    /// Working directories.
    pub paths: PathsConfig,

    /// Reader (PDF/OCR) configuration.
    pub reader: ReaderConfig,
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Minimum confidence for `success` (vendor and invoice number also required).
    pub success_threshold: u8,

    /// Vendor candidates containing any of these are rejected.
    pub vendor_exclusions: Vec<String>,

    /// VAT ids that are never reported (typically the receiving company's own).
    pub vat_exclusions: Vec<String>,

    /// Look for the vendor in header/footer region text before the full text.
    pub use_regions: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            success_threshold: 50,
            vendor_exclusions: [
                "gmail",
                "googlemail",
                "gmx",
                "outlook",
                "hotmail",
                "yahoo",
                "icloud",
                "t-online",
                "example",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            vat_exclusions: Vec::new(),
            use_regions: true,
        }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Consult and fill the cache when parsing.
    pub enabled: bool,

    /// Cache file; `None` keeps the cache in memory only.
    pub file: Option<PathBuf>,

    /// Eviction starts above this many entries.
    pub max_entries: usize,

    /// Entries older than this are expired.
    pub ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: Some(PathBuf::from("data/cache/ocr_cache.json")),
            max_entries: 1000,
            ttl_hours: 24 * 7,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }
}

/// Folder watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// How often the listener looks for new files.
    pub poll_interval_ms: u64,

    /// Interval between two size reads of a new file.
    pub ready_interval_ms: u64,

    /// Give up waiting for a stable size after this long.
    pub ready_timeout_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            ready_interval_ms: 500,
            ready_timeout_secs: 30,
        }
    }
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ready_interval(&self) -> Duration {
        Duration::from_millis(self.ready_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

/// Batch runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Descend into sub-folders when taking the snapshot.
    pub recursive: bool,

    /// Move processed files into the archive by default.
    pub archive: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            archive: true,
        }
    }
}

/// Result store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Oldest records are dropped beyond this count.
    pub max_results: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { max_results: 1000 }
    }
}

/// Upload path and worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Threads available for blocking extraction work.
    pub workers: usize,

    /// Largest accepted upload in bytes.
    pub max_upload_bytes: usize,

    /// Accepted file extensions (lower case, without dot).
    pub extensions: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            max_upload_bytes: 50 * 1024 * 1024,
            extensions: ["pdf", "jpg", "jpeg", "png", "tiff", "tif"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl IngestConfig {
    /// Whether `path` carries one of the accepted extensions.
    pub fn is_supported(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let ext = e.to_lowercase();
                self.extensions.iter().any(|s| *s == ext)
            })
            .unwrap_or(false)
    }
}

/// Working directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Uploaded files land here before parsing.
    pub input_dir: PathBuf,

    /// Reports are written here.
    pub output_dir: PathBuf,

    /// Processed files are moved here under their archive name.
    pub archive_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/input"),
            output_dir: PathBuf::from("data/output"),
            archive_dir: PathBuf::from("data/archive"),
        }
    }
}

impl PathsConfig {
    /// Create all working directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.input_dir, &self.output_dir, &self.archive_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Reader (PDF text layer and OCR) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Minimum text-layer length before a PDF is treated as scanned.
    pub min_text_length: usize,

    /// Directory containing OCR model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            min_text_length: 50,
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
        }
    }
}

impl ReaderConfig {
    /// Whether all OCR model files are present.
    pub fn has_models(&self) -> bool {
        [&self.detection_model, &self.recognition_model, &self.dictionary]
            .iter()
            .all(|name| self.model_dir.join(name).exists())
    }
}

impl DocketConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
