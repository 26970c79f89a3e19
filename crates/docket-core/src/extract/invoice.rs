//! Invoice number extraction.

use tracing::{debug, trace};

use super::patterns::{INVOICE_NUMBER_PATTERNS, NOT_INVOICE_CONTEXT};

/// Characters inspected before a match for a competing label.
pub const CONTEXT_CHARS: usize = 20;

/// Shortest accepted invoice number.
pub const MIN_INVOICE_LEN: usize = 5;

/// Extract the invoice number from text.
///
/// Patterns are tried in order and the first accepted match wins. A match is
/// rejected when the text right before it names a different kind of number
/// (customer, order, reference, account) or when the value is too short.
pub fn extract_invoice_number(text: &str) -> Option<String> {
    for pattern in INVOICE_NUMBER_PATTERNS.iter() {
        let Some(caps) = pattern.captures(text) else { continue };
        let (Some(full), Some(value)) = (caps.get(0), caps.get(1)) else { continue };

        let context = preceding_chars(text, full.start(), CONTEXT_CHARS);
        if NOT_INVOICE_CONTEXT.is_match(context) {
            debug!("Skipping {:?}: preceded by {:?}", value.as_str(), context);
            continue;
        }

        let value = value.as_str().trim();
        if value.chars().count() < MIN_INVOICE_LEN {
            trace!("Skipping {:?}: too short", value);
            continue;
        }

        return Some(value.to_string());
    }

    None
}

/// Up to `n` characters of `text` ending at byte offset `end`.
pub(crate) fn preceding_chars(text: &str, end: usize, n: usize) -> &str {
    let head = &text[..end];
    let start = head
        .char_indices()
        .rev()
        .nth(n.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    &head[start..]
}
