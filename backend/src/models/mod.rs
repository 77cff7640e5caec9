//! Domain models for the Pivotload conversion pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Cell`] - Loosely typed spreadsheet value
//! - [`SourceTable`] / [`Workbook`] - Wide-form input as read from a file
//! - [`OutputTable`] - Rectangular long-form output with a fixed column list
//! - [`App`] / [`scenario_label`] - Fixed application set and scenario catalog
//! - [`FunctionRecord`] / [`TransferRecord`] - One output observation each

pub mod catalog;
pub mod records;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;

pub use catalog::{scenario_label, App, SCENARIOS};
pub use records::{
    columns, ContentKind, Continuity, Direction, FunctionField, FunctionRecord, Record,
    TransferField, TransferRecord,
};

// =============================================================================
// Cell
// =============================================================================

/// A single loosely typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Cell {
    /// Blank / missing.
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    /// Text cell from anything string-like.
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Null when `value` is `None`.
    pub fn from_text(value: Option<String>) -> Self {
        value.map(Cell::Text).unwrap_or_default()
    }

    /// Null when `value` is `None`.
    pub fn from_number(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or_default()
    }

    /// Missing values: blanks, whitespace-only text and NaN.
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// Trimmed display string, `None` for missing values.
    pub fn as_text(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(match self {
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => format_number(*n),
            Cell::Bool(b) => b.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
            Cell::Empty => return None,
        })
    }

    /// Ordering used when sorting output rows. Missing values sort last,
    /// values of different kinds order as bool < number < date < text.
    pub fn sort_cmp(&self, other: &Cell) -> Ordering {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }
        match (self, other) {
            (Cell::Bool(a), Cell::Bool(b)) => a.cmp(b),
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Date(a), Cell::Date(b)) => a.cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.trim().cmp(b.trim()),
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Cell::Bool(_) => 0,
            Cell::Number(_) => 1,
            Cell::Date(_) => 2,
            Cell::Text(_) => 3,
            Cell::Empty => 4,
        }
    }

    /// JSON form used by previews: dates as ISO strings, NaN as null.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Empty => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Cell::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Integral floats print without a fractional part ("4", not "4.0").
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// =============================================================================
// Source tables
// =============================================================================

/// One sheet of wide-form input: free-text headers plus rows of cells.
///
/// Rows are always exactly as wide as the header list.
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    /// Sheet name (or file stem for CSV input).
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl SourceTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.headers.len(), Cell::Empty);
        self.rows.push(row);
    }

    /// Builder form of [`SourceTable::push_row`].
    pub fn with_row(mut self, row: Vec<Cell>) -> Self {
        self.push_row(row);
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Position of the first header equal to `header`.
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Cell at (`row`, `header`); missing headers read as empty.
    pub fn cell(&self, row: usize, header: Option<&str>) -> &Cell {
        header
            .and_then(|h| self.column_index(h))
            .and_then(|col| self.rows.get(row).and_then(|r| r.get(col)))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Cell at (`row`, `col`) by position.
    pub fn cell_at(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}

/// A parsed input file: its sheets in workbook order.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub name: String,
    pub sheets: Vec<SourceTable>,
}

impl Workbook {
    pub fn new(name: impl Into<String>, sheets: Vec<SourceTable>) -> Self {
        Self {
            name: name.into(),
            sheets,
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&SourceTable> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

// =============================================================================
// Output tables
// =============================================================================

/// Rectangular long-form table whose columns are exactly the requested list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl OutputTable {
    /// Project records onto `columns`. Columns the record type does not
    /// produce come out entirely null.
    pub fn from_records<R: Record>(records: &[R], columns: &[String]) -> Self {
        let fields: Vec<Option<R::Field>> = columns.iter().map(|c| R::field_for(c)).collect();
        let rows = records
            .iter()
            .map(|record| {
                fields
                    .iter()
                    .map(|field| field.map(|f| record.get(f)).unwrap_or_default())
                    .collect()
            })
            .collect();

        Self {
            columns: columns.to_vec(),
            rows,
        }
    }

    /// Re-select columns by exact name; unknown names become null columns.
    pub fn project(&self, columns: &[String]) -> Self {
        let positions: Vec<Option<usize>> = columns
            .iter()
            .map(|c| self.columns.iter().position(|own| own == c))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|p| p.and_then(|i| row.get(i).cloned()).unwrap_or_default())
                    .collect()
            })
            .collect();

        Self {
            columns: columns.to_vec(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Vec<&Cell> {
        match self.columns.iter().position(|c| c == name) {
            Some(i) => self.rows.iter().map(|r| &r[i]).collect(),
            None => Vec::new(),
        }
    }

    /// First `n` rows as JSON objects keyed by column name.
    pub fn to_json_records(&self, n: usize) -> Vec<Value> {
        self.rows
            .iter()
            .take(n)
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.clone(), v.to_json()))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_emptiness() {
        assert!(Cell::Empty.is_empty());
        assert!(Cell::text("   ").is_empty());
        assert!(Cell::Number(f64::NAN).is_empty());
        assert!(!Cell::Number(0.0).is_empty());
        assert!(!Cell::text("x").is_empty());
    }

    #[test]
    fn test_cell_as_text() {
        assert_eq!(Cell::Number(4.0).as_text().as_deref(), Some("4"));
        assert_eq!(Cell::Number(8.25).as_text().as_deref(), Some("8.25"));
        assert_eq!(Cell::text("  Wifi ").as_text().as_deref(), Some("Wifi"));
        assert_eq!(Cell::Empty.as_text(), None);
    }

    #[test]
    fn test_sort_cmp_missing_last() {
        let a = Cell::text("Ali");
        assert_eq!(a.sort_cmp(&Cell::Empty), Ordering::Less);
        assert_eq!(Cell::Empty.sort_cmp(&a), Ordering::Greater);
        assert_eq!(Cell::text("Ali").sort_cmp(&Cell::text("Veli")), Ordering::Less);
    }

    #[test]
    fn test_source_table_rows_match_headers() {
        let table = SourceTable::new("s", vec!["a".into(), "b".into()])
            .with_row(vec![Cell::text("1")])
            .with_row(vec![Cell::text("1"), Cell::text("2"), Cell::text("3")]);

        assert_eq!(table.rows[0].len(), 2);
        assert_eq!(table.rows[1].len(), 2);
        assert_eq!(table.cell(0, Some("b")), &Cell::Empty);
        assert_eq!(table.cell(1, Some("b")), &Cell::text("2"));
        assert_eq!(table.cell(1, Some("missing")), &Cell::Empty);
        assert_eq!(table.cell(1, None), &Cell::Empty);
    }

    #[test]
    fn test_project_adds_null_columns() {
        let table = OutputTable {
            columns: vec!["A".into(), "C".into()],
            rows: vec![vec![Cell::Number(1.0), Cell::text("c")]],
        };
        let projected = table.project(&["A".into(), "B".into(), "C".into()]);

        assert_eq!(projected.columns, vec!["A", "B", "C"]);
        assert_eq!(
            projected.rows[0],
            vec![Cell::Number(1.0), Cell::Empty, Cell::text("c")]
        );
    }

    #[test]
    fn test_json_records() {
        let table = OutputTable {
            columns: vec!["Tarih".into(), "Puan".into()],
            rows: vec![vec![
                Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()),
                Cell::Number(4.0),
            ]],
        };
        let json = table.to_json_records(10);
        assert_eq!(json[0]["Tarih"], "2024-03-15");
        assert_eq!(json[0]["Puan"], 4.0);
    }
}
