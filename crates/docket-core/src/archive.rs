//! Archive file names and moves.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::models::{ExtractionResult, Status};

lazy_static! {
    static ref NOT_VENDOR_CHAR: Regex = Regex::new(r"[^\w\s-]").unwrap();
    static ref NOT_INVOICE_CHAR: Regex = Regex::new(r"[^\w-]").unwrap();
}

/// Placeholder for a missing vendor or invoice number in `warn_` names.
const UNKNOWN: &str = "UNKNOWN";

/// Archive name for `result`, using the current local time for the fallback.
pub fn archive_name(result: &ExtractionResult, original: &Path) -> String {
    archive_name_at(result, original, Local::now())
}

/// Archive name for `result`.
///
/// - success with vendor and invoice: `{vendor}_{invoice}_{internal}{ext}`
/// - some field present: `warn_{vendor}_{invoice}_{internal}{ext}`
/// - nothing extracted: `warn_{%Y%m%d_%H%M%S}_{original file name}`
pub fn archive_name_at(result: &ExtractionResult, original: &Path, at: DateTime<Local>) -> String {
    let vendor = result.vendor();
    let invoice = result.invoice_number();
    let internal = result.internal_number();

    if vendor.is_none() && invoice.is_none() && internal.is_none() {
        let name = original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| result.filename.clone());
        return format!("warn_{}_{}", at.format("%Y%m%d_%H%M%S"), name);
    }

    let ext = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    let vendor_clean = vendor.map(sanitize_vendor).filter(|v| !v.is_empty());
    let invoice_clean = invoice.map(sanitize_invoice).filter(|i| !i.is_empty());
    let internal_clean = internal.map(sanitize_internal).unwrap_or_else(|| "0".to_string());

    match (result.status, vendor_clean, invoice_clean) {
        (Status::Success, Some(v), Some(i)) => format!("{}_{}_{}{}", v, i, internal_clean, ext),
        (_, v, i) => format!(
            "warn_{}_{}_{}{}",
            v.as_deref().unwrap_or(UNKNOWN),
            i.as_deref().unwrap_or(UNKNOWN),
            internal_clean,
            ext
        ),
    }
}

/// Keep word characters, blanks and hyphens, then drop the blanks.
fn sanitize_vendor(vendor: &str) -> String {
    NOT_VENDOR_CHAR
        .replace_all(vendor, "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn sanitize_invoice(invoice: &str) -> String {
    NOT_INVOICE_CHAR.replace_all(invoice, "").into_owned()
}

/// Digits only, without leading zeros.
fn sanitize_internal(internal: &str) -> String {
    let digits: String = internal.chars().filter(|c| c.is_ascii_digit()).collect();
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Move `source` into `archive_dir` as `name`, never overwriting.
///
/// An existing target gets a `_1`, `_2`, ... suffix before the extension.
/// The target is reserved with an exclusive create before the move, so
/// concurrent moves under the same name each get their own file. Falls back
/// to copy and remove when a rename crosses filesystems.
pub fn move_to_archive(source: &Path, archive_dir: &Path, name: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(archive_dir)?;
    let target = reserve_target(archive_dir, name)?;

    if let Err(e) = std::fs::rename(source, &target) {
        debug!("Rename failed ({}), copying {}", e, source.display());
        if let Err(e) = std::fs::copy(source, &target) {
            let _ = std::fs::remove_file(&target);
            return Err(e);
        }
        if let Err(e) = std::fs::remove_file(source) {
            warn!("Archived copy of {} but could not remove it: {}", source.display(), e);
        }
    }

    debug!("Archived {} -> {}", source.display(), target.display());
    Ok(target)
}

/// Create an empty placeholder at the first free name in `dir`.
fn reserve_target(dir: &Path, name: &str) -> std::io::Result<PathBuf> {
    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for n in 0u32.. {
        let candidate = if n == 0 {
            dir.join(name)
        } else {
            dir.join(format!("{}_{}{}", stem, n, ext))
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free archive name for {}", name),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentFields;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn result(
        status: Status,
        vendor: Option<&str>,
        invoice: Option<&str>,
        internal: Option<&str>,
    ) -> ExtractionResult {
        ExtractionResult {
            fields: DocumentFields {
                vendor: vendor.map(String::from),
                invoice_number: invoice.map(String::from),
                internal_number: internal.map(String::from),
                vat_id: None,
            },
            status,
            ..ExtractionResult::pending("scan.pdf")
        }
    }

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_success_name() {
        let r = result(Status::Success, Some("Amazon GmbH"), Some("INV-2024-01"), Some("00042"));
        assert_eq!(
            archive_name_at(&r, Path::new("/in/scan.pdf"), at()),
            "AmazonGmbH_INV-2024-01_42.pdf"
        );
    }

    #[test]
    fn test_extension_is_lower_cased() {
        let r = result(Status::Success, Some("IKEA"), Some("12345678"), None);
        assert_eq!(archive_name_at(&r, Path::new("SCAN.PDF"), at()), "IKEA_12345678_0.pdf");
    }

    #[test]
    fn test_review_gets_warn_prefix() {
        let r = result(Status::Review, Some("Conrad"), Some("RE/2024/77"), None);
        assert_eq!(
            archive_name_at(&r, Path::new("scan.png"), at()),
            "warn_Conrad_RE202477_0.png"
        );
    }

    #[test]
    fn test_missing_fields_are_unknown() {
        let r = result(Status::Review, None, None, Some("815"));
        assert_eq!(
            archive_name_at(&r, Path::new("scan.pdf"), at()),
            "warn_UNKNOWN_UNKNOWN_815.pdf"
        );
    }

    #[test]
    fn test_error_with_partial_fields() {
        let r = result(Status::Error, Some("Amazon"), Some("INV-12345"), None);
        assert_eq!(
            archive_name_at(&r, Path::new("scan.pdf"), at()),
            "warn_Amazon_INV-12345_0.pdf"
        );
    }

    #[test]
    fn test_nothing_extracted_uses_timestamp() {
        let r = result(Status::Review, None, None, None);
        assert_eq!(
            archive_name_at(&r, Path::new("/in/Scan 01.PDF"), at()),
            "warn_20240309_140507_Scan 01.PDF"
        );
    }

    #[test]
    fn test_vendor_punctuation_removed() {
        assert_eq!(sanitize_vendor("Müller & Söhne, K.G."), "MüllerSöhneKG");
        assert_eq!(sanitize_internal("SN-000"), "0");
    }

    #[test]
    fn test_move_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("archive");

        let mut targets = Vec::new();
        for i in 0..3 {
            let source = dir.path().join(format!("in{i}.pdf"));
            std::fs::write(&source, format!("doc {i}")).unwrap();
            targets.push(move_to_archive(&source, &archive, "Amazon_INV1_0.pdf").unwrap());
            assert!(!source.exists());
        }

        let names: Vec<_> = targets
            .iter()
            .map(|t| t.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Amazon_INV1_0.pdf", "Amazon_INV1_0_1.pdf", "Amazon_INV1_0_2.pdf"]);
        assert_eq!(std::fs::read_to_string(&targets[0]).unwrap(), "doc 0");
    }

    #[test]
    fn test_concurrent_moves_keep_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("archive");
        let sources: Vec<PathBuf> = (0..8)
            .map(|i| {
                let path = dir.path().join(format!("in{i}.pdf"));
                std::fs::write(&path, format!("document {i}")).unwrap();
                path
            })
            .collect();

        let handles: Vec<_> = sources
            .into_iter()
            .map(|source| {
                let archive = archive.clone();
                std::thread::spawn(move || move_to_archive(&source, &archive, "Amazon_INV-1_0.pdf").unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut contents: Vec<String> = std::fs::read_dir(&archive)
            .unwrap()
            .map(|e| std::fs::read_to_string(e.unwrap().path()).unwrap())
            .collect();
        contents.sort();
        let expected: Vec<String> = (0..8).map(|i| format!("document {i}")).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn test_failed_move_leaves_no_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("archive");

        assert!(move_to_archive(&dir.path().join("missing.pdf"), &archive, "a.pdf").is_err());
        assert_eq!(std::fs::read_dir(&archive).unwrap().count(), 0);
    }
}
