//! Vendor name extraction.

use tracing::debug;

use super::patterns::{EMAIL_DOMAIN, KNOWN_VENDORS, SENDER_PATTERNS};

/// Vendor extractor with an exclusion list.
///
/// Rules, in order: known-vendor aliases in the header region, in the footer
/// region, in the full text; then the e-mail domain; then a labeled
/// "from/company" line. A candidate containing an exclusion entry is dropped
/// and the next rule is tried.
#[derive(Debug, Clone, Default)]
pub struct VendorExtractor {
    exclusions: Vec<String>,
}

impl VendorExtractor {
    /// Create a vendor extractor without exclusions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject candidates containing any of these (case-insensitive).
    pub fn with_exclusions<I, S>(mut self, exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclusions = exclusions
            .into_iter()
            .map(|s| s.as_ref().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    /// Extract the vendor from the full text and optional region texts.
    pub fn extract(&self, text: &str, header: Option<&str>, footer: Option<&str>) -> Option<String> {
        let rules: [(&str, Option<String>); 5] = [
            ("header alias", header.and_then(find_known_vendor)),
            ("footer alias", footer.and_then(find_known_vendor)),
            ("text alias", find_known_vendor(text)),
            ("email domain", find_email_vendor(text)),
            ("sender label", find_labeled_vendor(text)),
        ];

        for (rule, candidate) in rules {
            let Some(candidate) = candidate else { continue };
            if self.is_excluded(&candidate) {
                debug!("Vendor candidate {:?} from {} is excluded", candidate, rule);
                continue;
            }
            debug!("Vendor {:?} found by {}", candidate, rule);
            return Some(candidate);
        }

        None
    }

    fn is_excluded(&self, candidate: &str) -> bool {
        let candidate = candidate.to_lowercase();
        self.exclusions.iter().any(|e| candidate.contains(e.as_str()))
    }
}

/// Extract the vendor from text using default settings (no exclusions, no regions).
pub fn extract_vendor(text: &str) -> Option<String> {
    VendorExtractor::new().extract(text, None, None)
}

/// First known vendor whose alias occurs in `text`.
pub fn find_known_vendor(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    KNOWN_VENDORS
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|alias| lower.contains(alias)))
        .map(|(name, _)| name.to_string())
}

fn find_email_vendor(text: &str) -> Option<String> {
    EMAIL_DOMAIN.captures(text).map(|caps| title_case(&caps[1]))
}

fn find_labeled_vendor(text: &str) -> Option<String> {
    SENDER_PATTERNS.iter().find_map(|pattern| {
        let caps = pattern.captures(text)?;
        let words: Vec<&str> = caps[1].split_whitespace().take(3).collect();
        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    })
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
