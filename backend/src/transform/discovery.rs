//! Sheet discovery for multi-sheet workbooks.
//!
//! Score sheets are those with at least one `... Puan` header; transfer
//! sheets are those with a sent-photo/sent-video size header. When nothing
//! matches, selection falls back to position: first sheet for scores,
//! second for transfers.

use serde::Serialize;

use crate::models::{SourceTable, Workbook};
use crate::transform::expander::is_score_header;
use crate::transform::resolver::normalize;

/// "Sent" markers.
const SENT_TOKENS: &[&str] = &["gonderilen", "gonderim", "upload"];
/// Content markers.
const CONTENT_TOKENS: &[&str] = &["fotograf", "foto", "video"];
/// Size markers.
const SIZE_TOKENS: &[&str] = &["boyut", "size"];

/// How a sheet list was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// Header content matched.
    Matched,
    /// Positional fallback.
    Positional,
    None,
}

/// Sheets picked for each transform, by index into the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSelection {
    pub score_sheets: Vec<usize>,
    pub score_selection: Selection,
    pub transfer_sheets: Vec<usize>,
    pub transfer_selection: Selection,
}

impl SheetSelection {
    pub fn score_tables<'w>(&self, workbook: &'w Workbook) -> Vec<&'w SourceTable> {
        self.score_sheets.iter().map(|&i| &workbook.sheets[i]).collect()
    }

    pub fn transfer_tables<'w>(&self, workbook: &'w Workbook) -> Vec<&'w SourceTable> {
        self.transfer_sheets
            .iter()
            .map(|&i| &workbook.sheets[i])
            .collect()
    }
}

/// Whether a header names a sent-photo/sent-video size.
pub fn is_transfer_header(header: &str) -> bool {
    let text = normalize(header);
    let has = |tokens: &[&str]| tokens.iter().any(|t| text.contains(t));
    has(SENT_TOKENS) && has(CONTENT_TOKENS) && has(SIZE_TOKENS)
}

pub fn is_score_sheet(sheet: &SourceTable) -> bool {
    sheet.headers.iter().any(|h| is_score_header(h))
}

pub fn is_transfer_sheet(sheet: &SourceTable) -> bool {
    sheet.headers.iter().any(|h| is_transfer_header(h))
}

/// Pick score and transfer sheets. A sheet may serve both roles.
pub fn discover(workbook: &Workbook) -> SheetSelection {
    let matching = |pred: fn(&SourceTable) -> bool| -> Vec<usize> {
        workbook
            .sheets
            .iter()
            .enumerate()
            .filter(|(_, s)| pred(s))
            .map(|(i, _)| i)
            .collect()
    };

    let (score_sheets, score_selection) = match matching(is_score_sheet) {
        found if !found.is_empty() => (found, Selection::Matched),
        _ if !workbook.sheets.is_empty() => (vec![0], Selection::Positional),
        _ => (Vec::new(), Selection::None),
    };

    let (transfer_sheets, transfer_selection) = match matching(is_transfer_sheet) {
        found if !found.is_empty() => (found, Selection::Matched),
        _ if workbook.sheets.len() > 1 => (vec![1], Selection::Positional),
        _ => (Vec::new(), Selection::None),
    };

    SheetSelection {
        score_sheets,
        score_selection,
        transfer_sheets,
        transfer_selection,
    }
}
