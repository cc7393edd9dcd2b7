//! Schema inference from bounded samples.
//!
//! - [`sniff`]: delimiter and quoting detection over a fixed byte prefix
//! - [`text`]: per-column numeric votes over delimited-text records
//! - [`json`]: per-key votes over decoded JSON objects
//!
//! Inference never produces a Bool or Time column from delimited text; JSON booleans can infer
//! to [`crate::types::Kind::Bool`].

pub mod json;
pub mod sniff;
pub mod text;

use std::sync::LazyLock;

use regex::Regex;

pub use json::infer_json_schema;
pub use sniff::{Sniffed, SNIFF_PREFIX, sniff};
pub use text::{column_names, infer_text_kinds, infer_text_schema};

/// Default number of records sampled for inference.
pub const DEFAULT_SAMPLE_ROWS: usize = 100;

/// Options for schema inference and text parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceOptions {
    /// First text record holds column names. When `false`, names are `col_<index>`.
    pub has_header: bool,
    /// Pin the field delimiter. When `None`, it is sniffed from the input prefix.
    pub delimiter: Option<u8>,
    /// Number of records sampled after the header.
    pub sample_rows: usize,
    /// Fail on wrong field counts and unparsable values instead of repairing them.
    pub strict: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: None,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            strict: false,
        }
    }
}

/// Record-shape repairs made while reading delimited text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShapeReport {
    /// Records with fewer fields than columns; missing trailing cells were left null.
    pub short_records: u64,
    /// Records with more fields than columns; extra fields were ignored.
    pub long_records: u64,
}

impl ShapeReport {
    pub fn is_clean(&self) -> bool {
        self.short_records == 0 && self.long_records == 0
    }

    /// Human-readable summary, or `None` when no record needed repair.
    pub fn warning_summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.short_records > 0 {
            parts.push(format!(
                "{} short record(s) padded with nulls",
                self.short_records
            ));
        }
        if self.long_records > 0 {
            parts.push(format!(
                "{} long record(s) had extra fields ignored",
                self.long_records
            ));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?[0-9]*\.?[0-9]+([eE][-+]?[0-9]+)?$").expect("numeric pattern is valid")
});

/// How a single trimmed text sample votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextClass {
    Blank,
    BoolLiteral,
    Integer,
    Decimal,
    Other,
}

pub(crate) fn classify_text(raw: &str) -> TextClass {
    let v = raw.trim();
    if v.is_empty() {
        TextClass::Blank
    } else if NUMERIC.is_match(v) {
        if v.contains(['.', 'e', 'E']) {
            TextClass::Decimal
        } else {
            TextClass::Integer
        }
    } else if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false") {
        TextClass::BoolLiteral
    } else {
        TextClass::Other
    }
}
