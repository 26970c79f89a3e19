//! Extraction record types shared by every ingestion path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fields extracted from one document.
///
/// Every field is independently present or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFields {
    /// Vendor (issuer) name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    /// Vendor's invoice or receipt number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,

    /// Organization-specific tracking number (barcode or handwritten).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_number: Option<String>,

    /// VAT identification number, normalized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_id: Option<String>,
}

impl DocumentFields {
    /// Whether no field at all was extracted.
    pub fn is_empty(&self) -> bool {
        self.vendor.is_none()
            && self.invoice_number.is_none()
            && self.internal_number.is_none()
            && self.vat_id.is_none()
    }
}

/// Disposition of an extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Not processed yet.
    #[default]
    Pending,
    /// Confidence above threshold with vendor and invoice number.
    Success,
    /// Needs a human to look at it.
    Review,
    /// Extraction failed.
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Review => "review",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of parsing one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// File name (without directory) of the parsed document.
    pub filename: String,

    /// Extracted fields.
    #[serde(flatten)]
    pub fields: DocumentFields,

    /// Confidence score (0 - 100).
    pub confidence: u8,

    /// Disposition.
    pub status: Status,

    /// Failure message when `status` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the document was parsed.
    pub timestamp: DateTime<Utc>,
}

impl ExtractionResult {
    /// A pending record for `filename`, stamped now.
    pub fn pending(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            fields: DocumentFields::default(),
            confidence: 0,
            status: Status::Pending,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// A failed record keeping whatever fields were resolved before the failure.
    ///
    /// Confidence is left at zero.
    pub fn failed(filename: impl Into<String>, fields: DocumentFields, error: impl ToString) -> Self {
        Self {
            fields,
            status: Status::Error,
            error: Some(error.to_string()),
            ..Self::pending(filename)
        }
    }

    pub fn vendor(&self) -> Option<&str> {
        self.fields.vendor.as_deref()
    }

    pub fn invoice_number(&self) -> Option<&str> {
        self.fields.invoice_number.as_deref()
    }

    pub fn internal_number(&self) -> Option<&str> {
        self.fields.internal_number.as_deref()
    }

    pub fn vat_id(&self) -> Option<&str> {
        self.fields.vat_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Review).unwrap(), "\"review\"");
        assert_eq!(Status::Success.to_string(), "success");
    }

    #[test]
    fn test_result_json_is_flat() {
        let mut result = ExtractionResult::pending("scan.pdf");
        result.fields.vendor = Some("DHL".to_string());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["vendor"], "DHL");
        assert_eq!(json["status"], "pending");
        assert!(json.get("vat_id").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failed_keeps_partial_fields() {
        let fields = DocumentFields {
            vendor: Some("IKEA".to_string()),
            ..Default::default()
        };
        let result = ExtractionResult::failed("a.png", fields, "OCR failed");

        assert_eq!(result.status, Status::Error);
        assert_eq!(result.vendor(), Some("IKEA"));
        assert_eq!(result.confidence, 0);
        assert_eq!(result.error.as_deref(), Some("OCR failed"));
    }
}
