//! Regex patterns for invoice field extraction.
//!
//! Order inside each list is significant: earlier patterns win.

use lazy_static::lazy_static;
use regex::Regex;

/// Known vendors and the lower-case aliases that identify them.
pub const KNOWN_VENDORS: &[(&str, &[&str])] = &[
    ("Amazon", &["amazon", "amzn"]),
    ("DHL", &["dhl", "deutsche post"]),
    ("UPS", &["ups", "united parcel"]),
    ("FedEx", &["fedex", "federal express"]),
    ("Deutsche Telekom", &["telekom", "t-mobile"]),
    ("Vodafone", &["vodafone"]),
    ("O2", &["o2", "telefonica"]),
    ("IKEA", &["ikea"]),
    ("MediaMarkt", &["media markt", "mediamarkt"]),
    ("Saturn", &["saturn"]),
    ("Conrad", &["conrad"]),
    ("Reichelt", &["reichelt"]),
    ("RS Components", &["rs-online", "rs components"]),
    ("Mouser", &["mouser"]),
    ("DigiKey", &["digi-key", "digikey"]),
    ("Farnell", &["farnell"]),
    ("Würth", &["würth", "wuerth", "wurth"]),
    ("Hoffmann", &["hoffmann group", "hoffmann-group"]),
    ("Grainger", &["grainger"]),
    ("Mercateo", &["mercateo"]),
    ("Staples", &["staples"]),
    ("Office Depot", &["office depot"]),
    ("Viking", &["viking"]),
    ("Büroshop24", &["büroshop24", "bueroshop24"]),
];

lazy_static! {
    // Vendor fallbacks
    pub static ref EMAIL_DOMAIN: Regex = Regex::new(
        r"@([a-zA-Z0-9-]+)\.[a-zA-Z]{2,}"
    ).unwrap();

    pub static ref SENDER_PATTERNS: Vec<Regex> = vec![
        Regex::new(
            r"(?i)\b(?:verkauft von|sold by|von|from)[:\s]+([a-z][a-z0-9\s&]+?)(?:\s*[,\n]|$)"
        ).unwrap(),
        Regex::new(
            r"(?i)\b(?:Firma|Company)[:\s]+([a-z][a-z0-9\s&]+?)(?:\s*[,\n]|$)"
        ).unwrap(),
    ];

    // Invoice number patterns (German and English labels)
    pub static ref INVOICE_NUMBER_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)Rechnungsnummer[:\s]*([A-Z0-9-]+)").unwrap(),
        Regex::new(r"(?i)Rechnung[- ]?(?:Nr|No|Nummer)[.:\s]*([A-Z0-9-]+)").unwrap(),
        Regex::new(r"(?i)Invoice[- ]?(?:Nr|No|Number)[.:\s]*([A-Z0-9-]+)").unwrap(),
        Regex::new(r"(?i)Beleg[- ]?(?:Nr|No|Nummer)[.:\s]*([A-Z0-9-]+)").unwrap(),
        Regex::new(r"(?i)Referenz(?:nummer)?[:\s]*([A-Z0-9-]+)").unwrap(),
        Regex::new(r"(?i)(?:Nr|No)[.:\s]+([A-Z]{2}[A-Z0-9]{8,})").unwrap(),
    ];

    /// Labels of numbers that look like invoice numbers but are not.
    pub static ref NOT_INVOICE_CONTEXT: Regex = Regex::new(
        r"(?i)kunden|customer|client|bestell|order|auftrag|referenz|reference|\bref\b|konto|account"
    ).unwrap();

    // VAT id patterns. The value accepts blanks, dots, slashes and dashes
    // between digit groups; they are removed by normalization.
    pub static ref VAT_ID_PATTERNS: Vec<Regex> = vec![
        Regex::new(concat!(
            r"(?i)\bUSt[.\-]?(?:Id|Ident)(?:[.\-]?Nr)?[.:\s\-]*",
            r"((?:ATU|CHE|[A-Z]{2})[ \t.\-/]*\d[\d \t.\-/]{6,}\d(?:B\d{2})?(?:[ \t]?(?:MWST|TVA|IVA))?)"
        )).unwrap(),
        Regex::new(concat!(
            r"(?i)\bVAT[.\s\-]*(?:ID|No|Number|Reg(?:istration)?)?[.:\s\-]*(?:No\.?)?[.:\s\-]*",
            r"((?:ATU|CHE|[A-Z]{2})[ \t.\-/]*\d[\d \t.\-/]{6,}\d(?:B\d{2})?(?:[ \t]?(?:MWST|TVA|IVA))?)"
        )).unwrap(),
        Regex::new(concat!(
            r"(?i)\b(?:UID|TVA|IVA|MWST|BTW)(?:[.\-]?Nr)?[.:\s\-]*",
            r"((?:ATU|CHE|[A-Z]{2})[ \t.\-/]*\d[\d \t.\-/]{6,}\d(?:B\d{2})?(?:[ \t]?(?:MWST|TVA|IVA))?)"
        )).unwrap(),
        Regex::new(r"(?i)\b(ATU\d{8}|CHE\d{9}|[A-Z]{2}\d{9,12})\b").unwrap(),
    ];

    /// Characters removed when normalizing a VAT id.
    pub static ref VAT_SEPARATORS: Regex = Regex::new(r"[\s./\-]").unwrap();

    /// Per-country VAT id formats, keyed by the prefix used for lookup.
    pub static ref VAT_FORMATS: Vec<(&'static str, Regex)> = [
        ("AT", r"^ATU\d{8}$"),
        ("BE", r"^BE[01]\d{9}$"),
        ("BG", r"^BG\d{9,10}$"),
        ("CH", r"^CHE\d{9}(?:MWST|TVA|IVA)?$"),
        ("CY", r"^CY\d{8}[A-Z]$"),
        ("CZ", r"^CZ\d{8,10}$"),
        ("DE", r"^DE\d{9}$"),
        ("DK", r"^DK\d{8}$"),
        ("EE", r"^EE\d{9}$"),
        ("EL", r"^EL\d{9}$"),
        ("ES", r"^ES[A-Z0-9]\d{7}[A-Z0-9]$"),
        ("FI", r"^FI\d{8}$"),
        ("FR", r"^FR[A-Z0-9]{2}\d{9}$"),
        ("GB", r"^GB(?:\d{9}|\d{12})$"),
        ("HR", r"^HR\d{11}$"),
        ("HU", r"^HU\d{8}$"),
        ("IE", r"^IE\d[A-Z0-9+*]\d{5}[A-Z]{1,2}$"),
        ("IT", r"^IT\d{11}$"),
        ("LT", r"^LT(?:\d{9}|\d{12})$"),
        ("LU", r"^LU\d{8}$"),
        ("LV", r"^LV\d{11}$"),
        ("MT", r"^MT\d{8}$"),
        ("NL", r"^NL\d{9}B\d{2}$"),
        ("PL", r"^PL\d{10}$"),
        ("PT", r"^PT\d{9}$"),
        ("RO", r"^RO\d{2,10}$"),
        ("SE", r"^SE\d{12}$"),
        ("SI", r"^SI\d{8}$"),
        ("SK", r"^SK\d{10}$"),
    ]
    .into_iter()
    .map(|(prefix, pattern)| (prefix, Regex::new(pattern).unwrap()))
    .collect();

    // Internal number: "SN" label in a barcode payload, e.g. SN<00012345>, SN[42], SN: 7
    pub static ref BARCODE_INTERNAL: Regex = Regex::new(
        r"(?i)\bSN\s*[<\[:]?\s*(\d+)"
    ).unwrap();

    // Internal number: handwritten digits in the page corner
    pub static ref CORNER_DIGITS: Regex = Regex::new(r"\d{4,}").unwrap();
}
