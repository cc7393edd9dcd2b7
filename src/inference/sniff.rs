//! Delimiter and quote sniffing.
//!
//! Best effort: the most frequent candidate byte in the prefix wins, and any double quote in the
//! prefix switches the reader to lenient quoting.

use tracing::debug;

/// Number of leading bytes inspected.
pub const SNIFF_PREFIX: usize = 4096;

/// Candidate delimiters, in tie-break order.
const CANDIDATES: [u8; 4] = [b',', b'\t', b';', b'|'];

/// Result of sniffing an input prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    pub delimiter: u8,
    /// Quotes were seen; the reader must tolerate irregular quoting.
    pub lenient_quotes: bool,
}

/// Sniff the delimiter and quoting mode from the first [`SNIFF_PREFIX`] bytes of `prefix`.
pub fn sniff(prefix: &[u8]) -> Sniffed {
    let prefix = &prefix[..prefix.len().min(SNIFF_PREFIX)];
    let mut counts = [0usize; CANDIDATES.len()];
    let mut quotes = 0usize;
    for &b in prefix {
        if b == b'"' {
            quotes += 1;
        } else if let Some(i) = CANDIDATES.iter().position(|&c| c == b) {
            counts[i] += 1;
        }
    }

    let mut best = 0;
    for i in 1..CANDIDATES.len() {
        if counts[i] > counts[best] {
            best = i;
        }
    }
    let sniffed = Sniffed {
        delimiter: CANDIDATES[best],
        lenient_quotes: quotes > 0,
    };
    debug!(
        delimiter = %char::from(sniffed.delimiter).escape_default(),
        quotes,
        "sniffed text input"
    );
    sniffed
}
