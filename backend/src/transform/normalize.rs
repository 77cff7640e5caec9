//! Field-level normalization of survey cells.
//!
//! Nothing here fails: bad input becomes `None`, a skipped score, or the
//! original value passed through.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::RangeInclusive;

use crate::config::OsKeywords;
use crate::models::Cell;
use crate::transform::resolver::normalize;

/// Date-only formats, tried in order.
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d"];

/// Timestamp formats (form exports), tried after the date-only ones.
pub const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?\d+(?:[.,]\d+)?").expect("static regex"));

/// Outcome of reading one score cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreCell {
    /// Blank, whitespace or NaN.
    Missing,
    /// Present but not an integer in range.
    Malformed,
    Score(i64),
}

/// Coerce a score cell: direct integer first, then decimal comma to point
/// and truncation.
pub fn coerce_score(cell: &Cell, range: &RangeInclusive<i64>) -> ScoreCell {
    if cell.is_empty() {
        return ScoreCell::Missing;
    }

    let value = match cell {
        Cell::Number(n) if n.is_finite() => Some(n.trunc() as i64),
        Cell::Text(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.replace(',', ".")
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    };

    match value {
        Some(score) if range.contains(&score) => ScoreCell::Score(score),
        _ => ScoreCell::Malformed,
    }
}

/// Numeric measurement (size, seconds). Accepts decimal commas and a
/// trailing unit ("2,5 MB").
pub fn coerce_number(cell: &Cell) -> Option<f64> {
    if cell.is_empty() {
        return None;
    }
    let value = match cell {
        Cell::Number(n) => Some(*n),
        Cell::Text(s) => {
            let s = s.trim();
            s.replace(',', ".").parse::<f64>().ok().or_else(|| {
                LEADING_NUMBER
                    .find(s)
                    .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
            })
        }
        _ => None,
    };
    value.filter(|n| n.is_finite())
}

/// Parse a date. Text is tried against [`DATE_FORMATS`] then
/// [`DATETIME_FORMATS`]; date cells pass as-is; anything else comes back
/// unchanged.
pub fn parse_date(cell: &Cell) -> Cell {
    match cell {
        Cell::Text(raw) => {
            let s = raw.trim();
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .or_else(|| {
                    DATETIME_FORMATS
                        .iter()
                        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                        .map(|dt| dt.date())
                })
                .map(Cell::Date)
                .unwrap_or_else(|| cell.clone())
        }
        other => other.clone(),
    }
}

/// Infer "ios" / "android" from free device text.
///
/// A keyword matches a whole token or a token's prefix ("iphone13"); the
/// substring "android" anywhere also counts. No match stays `None`.
pub fn infer_os(device: &str, keywords: &OsKeywords) -> Option<&'static str> {
    let text = normalize(device);
    let tokens: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let hits = |list: &[String]| {
        list.iter().any(|kw| {
            let kw = normalize(kw);
            !kw.is_empty() && tokens.iter().any(|t| t.starts_with(kw.as_str()))
        })
    };

    if hits(&keywords.ios) {
        Some("ios")
    } else if text.contains("android") || hits(&keywords.android) {
        Some("android")
    } else {
        None
    }
}
