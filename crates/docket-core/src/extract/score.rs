//! Confidence scoring and disposition.

use crate::models::{DocumentFields, Status};

/// Weight of a present vendor.
pub const VENDOR_WEIGHT: u32 = 30;
/// Weight of a present invoice number.
pub const INVOICE_WEIGHT: u32 = 30;
/// Weight of a present internal number.
pub const INTERNAL_WEIGHT: u32 = 30;
/// Weight of a present VAT id.
pub const VAT_WEIGHT: u32 = 10;

/// Default minimum confidence for `success`.
pub const DEFAULT_THRESHOLD: u8 = 50;

/// Sum of the weights of the present fields, capped at 100.
pub fn confidence(fields: &DocumentFields) -> u8 {
    let weights = [
        (fields.vendor.is_some(), VENDOR_WEIGHT),
        (fields.invoice_number.is_some(), INVOICE_WEIGHT),
        (fields.internal_number.is_some(), INTERNAL_WEIGHT),
        (fields.vat_id.is_some(), VAT_WEIGHT),
    ];
    let sum: u32 = weights
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, weight)| weight)
        .sum();
    sum.min(100) as u8
}

/// `Success` when the score reaches the threshold and both vendor and
/// invoice number are present, `Review` otherwise.
pub fn disposition(fields: &DocumentFields, confidence: u8, threshold: u8) -> Status {
    if confidence >= threshold && fields.vendor.is_some() && fields.invoice_number.is_some() {
        Status::Success
    } else {
        Status::Review
    }
}

/// Scores extracted fields against a fixed threshold.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScorer {
    threshold: u8,
}

impl ConfidenceScorer {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Confidence and disposition for the fields.
    pub fn score(&self, fields: &DocumentFields) -> (u8, Status) {
        let confidence = confidence(fields);
        (confidence, disposition(fields, confidence, self.threshold))
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
