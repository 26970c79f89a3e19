//! Internal tracking number extraction.
//!
//! The number usually arrives in a barcode payload such as `SN<00012345>`.
//! When no payload carries it, a digits-only recognition pass over the
//! top-right page corner is the fallback source.

use super::patterns::{BARCODE_INTERNAL, CORNER_DIGITS};

/// First internal number found across the payloads, in payload order.
pub fn extract_internal_from_barcodes<S: AsRef<str>>(payloads: &[S]) -> Option<String> {
    payloads.iter().find_map(|payload| {
        BARCODE_INTERNAL
            .captures(payload.as_ref())
            .map(|caps| strip_leading_zeros(&caps[1]))
    })
}

/// First run of four or more digits in the corner text, without leading zeros.
pub fn extract_internal_from_corner(corner_text: &str) -> Option<String> {
    let digits = CORNER_DIGITS.find(corner_text)?.as_str();
    Some(match digits.parse::<u64>() {
        Ok(n) => n.to_string(),
        Err(_) => strip_leading_zeros(digits),
    })
}

fn strip_leading_zeros(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
