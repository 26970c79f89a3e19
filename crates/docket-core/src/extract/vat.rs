//! VAT identification number extraction and validation.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::patterns::{VAT_FORMATS, VAT_ID_PATTERNS, VAT_SEPARATORS};

/// VAT id extractor with an exclusion list.
#[derive(Debug, Clone, Default)]
pub struct VatExtractor {
    exclusions: HashSet<String>,
}

impl VatExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never report these ids. Entries are normalized like extracted values.
    pub fn with_exclusions<I, S>(mut self, exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclusions = exclusions
            .into_iter()
            .map(|s| normalize_vat_id(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    /// First VAT id that matches a pattern, is not excluded and passes its
    /// country format check.
    pub fn extract(&self, text: &str) -> Option<String> {
        for pattern in VAT_ID_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                let Some(raw) = caps.get(1) else { continue };
                let vat = normalize_vat_id(raw.as_str());

                if self.exclusions.contains(&vat) {
                    debug!("VAT id {} is excluded", vat);
                    continue;
                }
                if !is_valid_vat_id(&vat) {
                    trace!("VAT id candidate {} failed format check", vat);
                    continue;
                }

                return Some(vat);
            }
        }

        None
    }
}

/// Extract a VAT id without exclusions.
pub fn extract_vat_id(text: &str) -> Option<String> {
    VatExtractor::new().extract(text)
}

/// Remove blanks, dots, slashes and dashes; upper-case the rest.
pub fn normalize_vat_id(raw: &str) -> String {
    VAT_SEPARATORS.replace_all(raw, "").to_uppercase()
}

/// Country key used to look up the format of a normalized id.
///
/// Switzerland and Austria are recognized by their three-letter prefixes.
pub fn vat_country(vat: &str) -> Option<&'static str> {
    if vat.starts_with("CHE") {
        return Some("CH");
    }
    if vat.starts_with("ATU") {
        return Some("AT");
    }
    let prefix = vat.get(..2)?;
    VAT_FORMATS
        .iter()
        .find(|(country, _)| *country == prefix)
        .map(|(country, _)| *country)
}

/// Whether a normalized id matches the format of its country.
pub fn is_valid_vat_id(vat: &str) -> bool {
    let Some(country) = vat_country(vat) else {
        return false;
    };
    VAT_FORMATS
        .iter()
        .find(|(c, _)| *c == country)
        .map(|(_, format)| format.is_match(vat))
        .unwrap_or(false)
}
