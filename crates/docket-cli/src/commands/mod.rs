pub mod batch;
pub mod cache;
pub mod config;
pub mod process;
pub mod watch;

use std::path::{Path, PathBuf};

use docket_core::{DocketConfig, FileReader, Pipeline};
use tracing::debug;

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docket")
        .join("config.json")
}

/// The file given with `--config`, or the per-user default.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map(Path::to_path_buf).unwrap_or_else(default_config_path)
}

/// Load the configuration, falling back to defaults when no file exists.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<DocketConfig> {
    let path = config_path(explicit);
    if path.exists() {
        debug!("Loading config from {}", path.display());
        Ok(DocketConfig::from_file(&path)?)
    } else if explicit.is_some() {
        anyhow::bail!("Config file not found: {}", path.display())
    } else {
        Ok(DocketConfig::default())
    }
}

/// Build the ingestion pipeline with the configured reader.
pub fn build_pipeline(config: DocketConfig) -> anyhow::Result<Pipeline> {
    let reader = FileReader::from_config(&config.reader);
    if !reader.has_ocr() {
        debug!("OCR unavailable, reading PDF text layers only");
    }
    Ok(Pipeline::new(config, Box::new(reader))?)
}
