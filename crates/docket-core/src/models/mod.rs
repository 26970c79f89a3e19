//! Data models and configuration.

pub mod config;
pub mod document;

pub use config::DocketConfig;
pub use document::{DocumentFields, ExtractionResult, Status};
