//! PDF text layer and page image access using lopdf and pdf-extract.

use std::path::Path;

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace};

use super::{DocumentReader, Recognition};
use crate::error::ReaderError;

/// A loaded (and if needed decrypted) PDF document.
pub struct PdfDocument {
    document: Document,
    raw_data: Vec<u8>,
}

impl PdfDocument {
    /// Load a PDF from bytes. Encrypted files are opened with the empty password.
    pub fn load(data: &[u8]) -> Result<Self, ReaderError> {
        let mut document = Document::load_mem(data).map_err(|e| ReaderError::Pdf(e.to_string()))?;

        let raw_data = if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(ReaderError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract needs the decrypted bytes
            let mut decrypted = Vec::new();
            document
                .save_to(&mut decrypted)
                .map_err(|e| ReaderError::Pdf(format!("failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        if document.get_pages().is_empty() {
            return Err(ReaderError::NoPages);
        }

        debug!("Loaded PDF with {} pages", document.get_pages().len());
        Ok(Self { document, raw_data })
    }

    /// Load a PDF from a file.
    pub fn open(path: &Path) -> Result<Self, ReaderError> {
        let data = std::fs::read(path)?;
        Self::load(&data)
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Text layer of the whole document.
    pub fn text(&self) -> Result<String, ReaderError> {
        pdf_extract::extract_text_from_mem(&self.raw_data).map_err(|e| ReaderError::Pdf(e.to_string()))
    }

    /// Image of the first page of a scanned document.
    ///
    /// Uses the first decodable image XObject of page one, then any image
    /// object in the file.
    pub fn first_page_image(&self) -> Option<DynamicImage> {
        let doc = &self.document;
        let pages = doc.get_pages();
        let page_id = *pages.get(&1)?;

        if let Some(resources) = page_resources(doc, page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
                    for (_name, obj_ref) in xobj_dict.iter() {
                        if let Ok((_, obj)) = doc.dereference(obj_ref) {
                            if let Some(img) = decode_image_object(doc, obj) {
                                return Some(img);
                            }
                        }
                    }
                }
            }
        }

        debug!("No XObject image on page 1, scanning all objects");
        doc.objects.values().find_map(|object| decode_image_object(doc, object))
    }
}

fn decode_image_object(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
    trace!("Found image object: {}x{}", width, height);

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                // JPEG data, already compressed
                return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Skipping image with unsupported filter");
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);

    if bits != 8 {
        trace!("Unsupported bits per component: {}", bits);
        return None;
    }

    raw_to_image(&data, width, height, color_space)
}

/// Build an RGBA image from 8-bit RGB or gray samples.
fn raw_to_image(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize) * (height as usize);

    let channels = match color_space {
        b"DeviceRGB" | b"RGB" => 3,
        b"DeviceGray" | b"G" => 1,
        _ => return None,
    };
    if data.len() < pixels * channels {
        trace!("Image data too short: {} < {}", data.len(), pixels * channels);
        return None;
    }

    let mut rgba = Vec::with_capacity(pixels * 4);
    for px in data[..pixels * channels].chunks_exact(channels) {
        match px {
            [r, g, b] => rgba.extend_from_slice(&[*r, *g, *b, 255]),
            [gray] => rgba.extend_from_slice(&[*gray, *gray, *gray, 255]),
            _ => return None,
        }
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

/// Resources dictionary of a page, following `Parent` inheritance.
fn page_resources(doc: &Document, node_id: ObjectId) -> Option<lopdf::Dictionary> {
    let Object::Dictionary(dict) = doc.get_object(node_id).ok()? else {
        return None;
    };

    if let Ok(resources) = dict.get(b"Resources") {
        if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
            return Some(res_dict.clone());
        }
    }

    match dict.get(b"Parent") {
        Ok(Object::Reference(parent_id)) => page_resources(doc, *parent_id),
        _ => None,
    }
}

/// Reader for born-digital PDFs: returns the text layer only.
///
/// Regions, barcodes and corner digits are not available from a text layer.
#[derive(Debug, Default)]
pub struct PdfTextReader;

impl PdfTextReader {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentReader for PdfTextReader {
    fn name(&self) -> &'static str {
        "pdf-text"
    }

    fn recognize(&mut self, path: &Path) -> Result<Recognition, ReaderError> {
        let document = PdfDocument::open(path)?;
        let text = document.text()?;
        debug!("{}: {} chars in text layer", path.display(), text.len());
        Ok(Recognition::from_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_a_pdf_error() {
        assert!(matches!(PdfDocument::load(b"not a pdf"), Err(ReaderError::Pdf(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut reader = PdfTextReader::new();
        let err = reader.recognize(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(matches!(err, ReaderError::Io(_)));
    }

    #[test]
    fn test_raw_gray_image() {
        let img = raw_to_image(&[0, 128, 255, 64], 2, 2, b"DeviceGray").unwrap();
        assert_eq!(img.width(), 2);
        assert_eq!(img.to_rgba8().get_pixel(1, 0).0, [128, 128, 128, 255]);
    }

    #[test]
    fn test_raw_image_too_short() {
        assert!(raw_to_image(&[0, 0, 0], 2, 2, b"DeviceRGB").is_none());
        assert!(raw_to_image(&[0; 16], 2, 2, b"DeviceCMYK").is_none());
    }
}
