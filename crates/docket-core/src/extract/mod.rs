//! Rule-based field extraction and confidence scoring.

pub mod internal;
pub mod invoice;
pub mod patterns;
pub mod score;
pub mod vat;
pub mod vendor;

pub use internal::{extract_internal_from_barcodes, extract_internal_from_corner};
pub use invoice::extract_invoice_number;
pub use score::{confidence, disposition, ConfidenceScorer};
pub use vat::{extract_vat_id, is_valid_vat_id, normalize_vat_id, VatExtractor};
pub use vendor::{extract_vendor, VendorExtractor};

use tracing::debug;

use crate::models::config::ExtractionConfig;
use crate::models::DocumentFields;
use crate::reader::Recognition;

/// Extracts all text-derived fields from a recognition.
///
/// The corner-digit fallback for the internal number needs the reader and is
/// driven by the engine.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    vendor: VendorExtractor,
    vat: VatExtractor,
    use_regions: bool,
}

impl FieldExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            vendor: VendorExtractor::new().with_exclusions(&config.vendor_exclusions),
            vat: VatExtractor::new().with_exclusions(&config.vat_exclusions),
            use_regions: config.use_regions,
        }
    }

    /// Extract the fields found in `recognition`.
    pub fn extract(&self, recognition: &Recognition) -> DocumentFields {
        let text = recognition.text.as_str();
        let (header, footer) = if self.use_regions {
            (recognition.header_text.as_deref(), recognition.footer_text.as_deref())
        } else {
            (None, None)
        };

        let fields = DocumentFields {
            internal_number: extract_internal_from_barcodes(&recognition.barcodes),
            vendor: self.vendor.extract(text, header, footer),
            invoice_number: extract_invoice_number(text),
            vat_id: self.vat.extract(text),
        };

        debug!(
            "Extracted vendor={:?} invoice={:?} internal={:?} vat={:?}",
            fields.vendor, fields.invoice_number, fields.internal_number, fields.vat_id
        );
        fields
    }
}
