//! Column kind votes for delimited text.

use std::collections::HashSet;

use crate::error::{JanitorError, JanitorResult};
use crate::types::{ColumnSchema, Kind, Schema};

use super::{TextClass, classify_text};

/// Infer one kind per column from sampled records.
///
/// Per column, non-blank values vote numeric or non-numeric; `true`/`false` literals abstain.
/// A numeric majority gives Int when every numeric value is integer-looking, Float otherwise;
/// anything else (including no votes at all) gives String. Records shorter than `ncols` do not
/// vote for the missing columns.
pub fn infer_text_kinds<S: AsRef<str>>(rows: &[Vec<S>], ncols: usize) -> Vec<Kind> {
    (0..ncols)
        .map(|c| {
            let (mut numeric, mut integer, mut other) = (0usize, 0usize, 0usize);
            for cell in rows.iter().filter_map(|r| r.get(c)) {
                match classify_text(cell.as_ref()) {
                    TextClass::Integer => {
                        numeric += 1;
                        integer += 1;
                    }
                    TextClass::Decimal => numeric += 1,
                    TextClass::Other => other += 1,
                    TextClass::Blank | TextClass::BoolLiteral => {}
                }
            }
            if numeric > other {
                if integer == numeric { Kind::Int } else { Kind::Float }
            } else {
                Kind::String
            }
        })
        .collect()
}

/// Column names from an optional header row.
///
/// Without a header, names are `col_<index>`. Header names are trimmed; blank names become
/// `col_<index>` and repeated names get a `_<n>` suffix so the result is always unique.
pub fn column_names(header: Option<&[String]>, ncols: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(ncols);
    let mut names = Vec::with_capacity(ncols);
    for i in 0..ncols {
        let base = header
            .and_then(|h| h.get(i))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map_or_else(|| format!("col_{i}"), str::to_string);
        let mut name = base.clone();
        let mut n = 1;
        while seen.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        seen.insert(name.clone());
        names.push(name);
    }
    names
}

/// Build a schema from an optional header and sampled records.
///
/// The column count is the header width, or the first record's width without a header.
pub fn infer_text_schema(header: Option<&[String]>, rows: &[Vec<String>]) -> JanitorResult<Schema> {
    let ncols = match (header, rows.first()) {
        (Some(h), _) => h.len(),
        (None, Some(first)) => first.len(),
        (None, None) => return Err(JanitorError::inference("input has no records")),
    };
    let names = column_names(header, ncols);
    let kinds = infer_text_kinds(rows, ncols);
    Schema::new(
        names
            .into_iter()
            .zip(kinds)
            .map(|(name, kind)| ColumnSchema::new(name, kind))
            .collect(),
    )
}
