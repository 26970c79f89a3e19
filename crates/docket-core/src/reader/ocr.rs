//! Page recognition backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use super::pdf::PdfDocument;
use super::{is_pdf, DocumentReader, Recognition};
use crate::error::ReaderError;
use crate::models::config::ReaderConfig;

/// Share of the page height used for the header and footer regions.
const REGION_SHARE: f32 = 0.20;

/// OCR reader for scanned PDFs and images.
///
/// Recognizes the full page plus header and footer strips, and offers a
/// digits-only pass over the top-right quadrant.
pub struct OcrReader {
    engine: pure_onnx_ocr::engine::OcrEngine,
    last_page: PageSlot,
}

/// Page of the last recognized document, handed once to the `corner_digits`
/// call that follows it. A path can be rewritten between documents, so the
/// page is never reused by a later `recognize`.
#[derive(Default)]
struct PageSlot(Option<(PathBuf, DynamicImage)>);

impl PageSlot {
    fn put(&mut self, path: &Path, page: DynamicImage) {
        self.0 = Some((path.to_path_buf(), page));
    }

    fn clear(&mut self) {
        self.0 = None;
    }

    /// The stored page if it belongs to `path`. Empties the slot either way.
    fn take_for(&mut self, path: &Path) -> Option<DynamicImage> {
        match self.0.take() {
            Some((last, page)) if last == path => Some(page),
            _ => None,
        }
    }
}

impl OcrReader {
    /// Create a reader from the model files named in the configuration.
    pub fn from_config(config: &ReaderConfig) -> Result<Self, ReaderError> {
        let dir = &config.model_dir;
        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&dir.join(&config.detection_model))
            .rec_model_path(&dir.join(&config.recognition_model))
            .dictionary_path(&dir.join(&config.dictionary))
            .build()
            .map_err(|e| ReaderError::Ocr(format!("failed to load models: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", dir.display());
        Ok(Self {
            engine,
            last_page: PageSlot::default(),
        })
    }

    fn run(&self, image: &DynamicImage) -> Result<String, ReaderError> {
        let results = self
            .engine
            .run_from_image(image)
            .map_err(|e| ReaderError::Ocr(e.to_string()))?;

        Ok(results
            .iter()
            .map(|r| r.text.replace("[UNK]", " "))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

impl DocumentReader for OcrReader {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn recognize(&mut self, path: &Path) -> Result<Recognition, ReaderError> {
        let start = Instant::now();
        self.last_page.clear();
        let page = read_page(path)?;
        let (width, height) = page.dimensions();

        let text = self.run(&page)?;
        let (header, footer) = regions(&page);
        let header_text = self.run(&header)?;
        let footer_text = self.run(&footer)?;

        debug!(
            "OCR of {} ({}x{}): {} chars in {}ms",
            path.display(),
            width,
            height,
            text.len(),
            start.elapsed().as_millis()
        );

        self.last_page.put(path, page);
        Ok(Recognition {
            text,
            barcodes: Vec::new(),
            header_text: Some(header_text),
            footer_text: Some(footer_text),
        })
    }

    fn corner_digits(&mut self, path: &Path) -> Result<Option<String>, ReaderError> {
        let page = match self.last_page.take_for(path) {
            Some(page) => page,
            None => read_page(path)?,
        };
        let text = self.run(&corner(&page))?;

        // digits-only pass: everything else separates digit runs
        let digits: String = text
            .chars()
            .map(|c| if c.is_ascii_digit() { c } else { ' ' })
            .collect();
        let digits = digits.split_whitespace().collect::<Vec<_>>().join(" ");

        Ok(if digits.is_empty() { None } else { Some(digits) })
    }
}

/// First page of a PDF, or the image itself, read from disk.
fn read_page(path: &Path) -> Result<DynamicImage, ReaderError> {
    if is_pdf(path) {
        PdfDocument::open(path)?
            .first_page_image()
            .ok_or_else(|| ReaderError::Unsupported(format!("{}: no page image", path.display())))
    } else {
        Ok(image::open(path)?)
    }
}

/// Top and bottom strips of the page.
fn regions(page: &DynamicImage) -> (DynamicImage, DynamicImage) {
    let (width, height) = page.dimensions();
    let strip = ((height as f32) * REGION_SHARE).max(1.0) as u32;
    let header = page.crop_imm(0, 0, width, strip);
    let footer = page.crop_imm(0, height.saturating_sub(strip), width, strip);
    (header, footer)
}

/// Top-right quadrant: height 0-50 %, width 50-100 %.
fn corner(page: &DynamicImage) -> DynamicImage {
    let (width, height) = page.dimensions();
    let left = width / 2;
    page.crop_imm(left, 0, width - left, (height / 2).max(1))
}
