//! Input reading: CSV with encoding and delimiter auto-detection, and
//! spreadsheet workbooks (see [`workbook`]).
//!
//! Every input ends up as a [`Workbook`] of [`SourceTable`]s; a CSV file is
//! a workbook with one sheet named after the file stem.

pub mod workbook;

pub use workbook::{cell_from_data, parse_workbook_bytes, parse_workbook_file};

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::ReadError;
use crate::models::{Cell, SourceTable, Workbook};

/// Extensions read as delimited text.
pub const CSV_EXTENSIONS: &[&str] = &["csv", "txt", "tsv"];

/// CSV parsing error with the line it occurred on
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl From<csv::Error> for CsvError {
    fn from(e: csv::Error) -> Self {
        let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
        CsvError::new(line, e.to_string())
    }
}

/// Parsed CSV with the settings that were detected
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub table: SourceTable,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

// =============================================================================
// Detection
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-9" | "latin5" | "windows-1254" | "cp1254" => "windows-1254".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> Result<String, CsvError> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).to_string(),
        // Survey exports from Turkish-locale Excel
        "windows-1254" | "cp1254" | "iso-8859-9" => {
            encoding_rs::WINDOWS_1254.decode(bytes).0.to_string()
        }
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.to_string()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => enc.decode(bytes).0.to_string(),
            None => String::from_utf8_lossy(bytes).to_string(),
        },
    };

    Ok(decoded.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

// =============================================================================
// Parsing
// =============================================================================

/// Header text, or `Unnamed: <i>` when blank.
pub fn header_name(raw: &str, index: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        format!("Unnamed: {}", index)
    } else {
        trimmed.to_string()
    }
}

/// Rename repeated headers `X.1`, `X.2`, ... in column order, so a name
/// always points at one column.
pub fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();

    headers
        .into_iter()
        .map(|header| {
            let mut name = header.clone();
            if taken.contains(&name) {
                let n = next_suffix.entry(header.clone()).or_insert(1);
                while taken.contains(&name) {
                    name = format!("{}.{}", header, n);
                    *n += 1;
                }
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}

/// Parse CSV text into a table with explicit delimiter.
///
/// Values stay text; blank values become [`Cell::Empty`]. Blank lines are
/// skipped and ragged rows are padded or cut to the header width.
///
/// # Example
/// ```ignore
/// let table = parse_csv_str("Ad Soyad;Bip Txt Puan\nAli;4", ';', "yanitlar")?;
/// assert_eq!(table.rows[0][1], Cell::text("4"));
/// ```
pub fn parse_csv_str(content: &str, delimiter: char, name: &str) -> Result<SourceTable, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = dedupe_headers(
        reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| header_name(h, i))
            .collect(),
    );

    if headers.is_empty() || (headers.len() == 1 && headers[0].starts_with("Unnamed")) {
        return Err(CsvError::new(1, "Empty CSV file: no header row"));
    }

    let mut table = SourceTable::new(name, headers);
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|v| v.is_empty()) {
            continue;
        }
        let row = record
            .iter()
            .map(|v| {
                if v.is_empty() {
                    Cell::Empty
                } else {
                    Cell::text(v)
                }
            })
            .collect();
        table.push_row(row);
    }

    Ok(table)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8], name: &str) -> Result<ParseResult, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    let table = parse_csv_str(&content, delimiter, name)?;

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
    })
}

// =============================================================================
// Dispatch
// =============================================================================

/// Whether a file name is read as CSV rather than as a spreadsheet.
pub fn is_csv_name(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| CSV_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string()
}

/// Read uploaded bytes, choosing the reader from the file name's extension.
pub fn read_input_bytes(bytes: &[u8], file_name: &str) -> Result<Workbook, ReadError> {
    if bytes.is_empty() {
        return Err(ReadError::EmptyFile);
    }

    if is_csv_name(file_name) {
        let parsed = parse_bytes_auto(bytes, &file_stem(file_name))?;
        Ok(Workbook::new(file_name, vec![parsed.table]))
    } else {
        parse_workbook_bytes(bytes, file_name)
    }
}

/// Read an input file from disk.
///
/// # Example
/// ```ignore
/// let workbook = read_input_file("anket_faz6.xlsx")?;
/// println!("Sheets: {:?}", workbook.sheet_names());
/// ```
pub fn read_input_file<P: AsRef<Path>>(path: P) -> Result<Workbook, ReadError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("input");
    read_input_bytes(&bytes, file_name)
}
