//! Document readers: the text, barcode and region source for extraction.
//!
//! A reader is not reentrant. Its methods take `&mut self`, and the engine
//! keeps its reader behind the parser lock.

#[cfg(feature = "native")]
mod ocr;
mod pdf;

#[cfg(feature = "native")]
pub use ocr::OcrReader;
pub use pdf::{PdfDocument, PdfTextReader};

use std::path::Path;

use tracing::{debug, warn};

use crate::error::ReaderError;
use crate::models::config::ReaderConfig;

/// What a reader recognized on one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recognition {
    /// Full document text.
    pub text: String,

    /// Decoded barcode / QR payloads, in page order.
    pub barcodes: Vec<String>,

    /// Text of the top page region, if the reader provides regions.
    pub header_text: Option<String>,

    /// Text of the bottom page region, if the reader provides regions.
    pub footer_text: Option<String>,
}

impl Recognition {
    /// Recognition carrying text only.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_barcodes<I, S>(mut self, payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.barcodes = payloads.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_regions(mut self, header: impl Into<String>, footer: impl Into<String>) -> Self {
        self.header_text = Some(header.into());
        self.footer_text = Some(footer.into());
        self
    }
}

/// Source of recognized text for a document on disk.
pub trait DocumentReader: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Recognize the document at `path`.
    fn recognize(&mut self, path: &Path) -> Result<Recognition, ReaderError>;

    /// Digits read from the top-right corner of the first page.
    ///
    /// Readers without page images return `Ok(None)`.
    fn corner_digits(&mut self, _path: &Path) -> Result<Option<String>, ReaderError> {
        Ok(None)
    }
}

pub(crate) fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Reader dispatching by file type.
///
/// PDFs go through the text layer first and fall back to OCR when the text
/// layer is shorter than `min_text_length`. Images always need OCR.
pub struct FileReader {
    pdf: PdfTextReader,
    ocr: Option<Box<dyn DocumentReader>>,
    min_text_length: usize,
    /// Whether the last `recognize` went through OCR, and for which file.
    last_ocr: Option<std::path::PathBuf>,
}

impl FileReader {
    /// Text-layer only reader.
    pub fn text_only(min_text_length: usize) -> Self {
        Self {
            pdf: PdfTextReader::new(),
            ocr: None,
            min_text_length,
            last_ocr: None,
        }
    }

    /// Use `ocr` for scanned PDFs and images.
    pub fn with_ocr(mut self, ocr: Box<dyn DocumentReader>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    /// Build from configuration, loading OCR models when they are present.
    pub fn from_config(config: &ReaderConfig) -> Self {
        let reader = Self::text_only(config.min_text_length);

        #[cfg(feature = "native")]
        {
            if config.has_models() {
                match OcrReader::from_config(config) {
                    Ok(ocr) => return reader.with_ocr(Box::new(ocr)),
                    Err(e) => warn!("OCR unavailable: {}", e),
                }
            } else {
                warn!(
                    "OCR models not found in {}, only PDF text layers can be read",
                    config.model_dir.display()
                );
            }
        }

        #[cfg(not(feature = "native"))]
        warn!("Built without OCR support, only PDF text layers can be read");

        reader
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    fn ocr(&mut self, path: &Path) -> Result<&mut Box<dyn DocumentReader>, ReaderError> {
        self.ocr.as_mut().ok_or_else(|| {
            ReaderError::Unsupported(format!("{} needs OCR, which is not available", path.display()))
        })
    }
}

impl DocumentReader for FileReader {
    fn name(&self) -> &'static str {
        "file"
    }

    fn recognize(&mut self, path: &Path) -> Result<Recognition, ReaderError> {
        self.last_ocr = None;

        if is_pdf(path) {
            let recognition = self.pdf.recognize(path)?;
            let length = recognition.text.trim().chars().count();
            if length >= self.min_text_length {
                return Ok(recognition);
            }
            if self.ocr.is_none() && length > 0 {
                warn!("{}: short text layer and no OCR, using it anyway", path.display());
                return Ok(recognition);
            }
            debug!("{}: text layer has {} chars, falling back to OCR", path.display(), length);
        }

        let recognition = self.ocr(path)?.recognize(path)?;
        self.last_ocr = Some(path.to_path_buf());
        Ok(recognition)
    }

    fn corner_digits(&mut self, path: &Path) -> Result<Option<String>, ReaderError> {
        if self.last_ocr.as_deref() != Some(path) {
            return Ok(None);
        }
        self.ocr(path)?.corner_digits(path)
    }
}
