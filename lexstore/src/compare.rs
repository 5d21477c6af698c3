//! Line comparators driving binary search over sorted files
//!
//! A comparator is a total order over candidate lines consistent with the
//! on-disk sort order of its file; a comparator that disagrees with the
//! file order yields undefined search results. Comparators accept either a
//! full line or a bare key as the right-hand side, comparing on the leading
//! field. Header lines order before every record line.

use std::cmp::Ordering;

/// Prefix marking header lines in every content file.
const HEADER_PREFIX: char = ' ';

/// Returns true for license/version header lines.
pub(crate) fn is_header_line(line: &str) -> bool {
    line.starts_with(HEADER_PREFIX)
}

/// Closed set of line orderings, one per content-file family. Selected per
/// category at provider construction and overridable before open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// Orders index lines by lemma.
    IndexLine { case_sensitive: bool },
    /// Orders data lines by their leading decimal byte offset.
    OffsetLine,
    /// Orders exception lines by surface form, ignoring case.
    ExceptionLine,
    /// Orders sense lines by full sense key.
    SenseKeyLine,
}

impl Comparator {
    /// Compare a candidate line against another line or bare key.
    pub fn compare(self, line: &str, key: &str) -> Ordering {
        match (is_header_line(line), is_header_line(key)) {
            (true, true) => return line.cmp(key),
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        let a = leading_field(line);
        let b = leading_field(key);
        match self {
            Self::IndexLine {
                case_sensitive: true,
            }
            | Self::SenseKeyLine => a.cmp(b),
            Self::IndexLine {
                case_sensitive: false,
            }
            | Self::ExceptionLine => caseless_cmp(a, b),
            Self::OffsetLine => match (a.parse::<u64>(), b.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => a.cmp(b),
            },
        }
    }
}

fn leading_field(s: &str) -> &str {
    s.split_whitespace().next().unwrap_or("")
}

fn caseless_cmp(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.chars().map(|c| c.to_ascii_lowercase()))
}
