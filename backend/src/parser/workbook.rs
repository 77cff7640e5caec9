//! Spreadsheet reading (xlsx, xls, xlsb, ods) via calamine.
//!
//! The first row of each sheet's used range is its header row.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDateTime;
use std::io::Cursor;
use std::path::Path;

use super::{dedupe_headers, header_name};
use crate::error::ReadError;
use crate::models::{Cell, SourceTable, Workbook};

/// Convert one calamine cell.
pub fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if !dt.is_duration() => Cell::Date(value.date()),
            _ => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|d| Cell::Date(d.date()))
            .or_else(|_| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Cell::Date))
            .unwrap_or_else(|_| Cell::text(s)),
        Data::DurationIso(s) => Cell::text(s),
    }
}

fn header_text(data: &Data) -> String {
    match data {
        Data::Empty | Data::Error(_) => String::new(),
        other => cell_from_data(other).as_text().unwrap_or_default(),
    }
}

/// Build a table from a sheet's rows: first row headers, the rest data,
/// trailing empty rows dropped.
pub fn table_from_rows<'a, I>(name: &str, mut rows: I) -> SourceTable
where
    I: Iterator<Item = &'a [Data]>,
{
    let headers = match rows.next() {
        Some(first) => dedupe_headers(
            first
                .iter()
                .enumerate()
                .map(|(i, d)| header_name(&header_text(d), i))
                .collect(),
        ),
        None => Vec::new(),
    };

    let mut table = SourceTable::new(name, headers);
    for row in rows {
        table.push_row(row.iter().map(cell_from_data).collect());
    }
    while table
        .rows
        .last()
        .is_some_and(|r| r.iter().all(Cell::is_empty))
    {
        table.rows.pop();
    }
    table
}

/// Read every sheet of a spreadsheet held in memory.
pub fn parse_workbook_bytes(bytes: &[u8], name: &str) -> Result<Workbook, ReadError> {
    let workbook_error = |message: String| ReadError::Workbook {
        name: name.to_string(),
        message,
    };

    let mut sheets = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| workbook_error(e.to_string()))?;

    let sheet_names = sheets.sheet_names();
    if sheet_names.is_empty() {
        return Err(ReadError::NoSheets(name.to_string()));
    }

    let mut tables = Vec::with_capacity(sheet_names.len());
    for sheet_name in &sheet_names {
        let range = sheets
            .worksheet_range(sheet_name)
            .map_err(|e| workbook_error(format!("sheet '{}': {}", sheet_name, e)))?;
        tables.push(table_from_rows(sheet_name, range.rows()));
    }

    Ok(Workbook::new(name, tables))
}

/// Read a spreadsheet file from disk.
pub fn parse_workbook_file<P: AsRef<Path>>(path: P) -> Result<Workbook, ReadError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("workbook");
    parse_workbook_bytes(&bytes, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook as XlsxWorkbook};

    #[test]
    fn test_cell_from_data() {
        assert_eq!(cell_from_data(&Data::Int(4)), Cell::Number(4.0));
        assert_eq!(cell_from_data(&Data::Float(2.5)), Cell::Number(2.5));
        assert_eq!(cell_from_data(&Data::String("  ".into())), Cell::Empty);
        assert_eq!(cell_from_data(&Data::String("Ali".into())), Cell::text("Ali"));
        assert_eq!(cell_from_data(&Data::Bool(true)), Cell::Bool(true));
        assert_eq!(cell_from_data(&Data::Empty), Cell::Empty);
        assert_eq!(
            cell_from_data(&Data::DateTimeIso("2024-03-15T10:30:00".into())),
            Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
    }

    #[test]
    fn test_table_from_rows() {
        let rows = vec![
            vec![Data::String("Ad Soyad".into()), Data::Empty, Data::String("Bip Txt Puan".into())],
            vec![Data::String("Ali".into()), Data::Empty, Data::Float(4.0)],
            vec![Data::Empty, Data::Empty, Data::Empty],
        ];
        let table = table_from_rows("Yanıtlar", rows.iter().map(Vec::as_slice));

        assert_eq!(table.headers, vec!["Ad Soyad", "Unnamed: 1", "Bip Txt Puan"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows[0][2], Cell::Number(4.0));
    }

    #[test]
    fn test_table_from_rows_renames_repeated_headers() {
        let rows = vec![
            vec![
                Data::String("Bip Txt Puan".into()),
                Data::String("Yorum".into()),
                Data::String("Bip Call Puan".into()),
                Data::String("Yorum".into()),
            ],
            vec![
                Data::Float(4.0),
                Data::String("txt yorumu".into()),
                Data::Float(2.0),
                Data::String("call yorumu".into()),
            ],
        ];
        let table = table_from_rows("Yanıtlar", rows.iter().map(Vec::as_slice));

        assert_eq!(table.headers[3], "Yorum.1");
        assert_eq!(table.cell(0, Some("Yorum.1")), &Cell::text("call yorumu"));
    }

    #[test]
    fn test_parse_generated_workbook() {
        let mut book = XlsxWorkbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");

        let sheet = book.add_worksheet();
        sheet.set_name("Yanıtlar").unwrap();
        sheet.write_string(0, 0, "Ad Soyad").unwrap();
        sheet.write_string(0, 1, "Tarih").unwrap();
        sheet.write_string(0, 2, "Bip Txt Puan").unwrap();
        sheet.write_string(1, 0, "Ayşe").unwrap();
        let date = ExcelDateTime::from_ymd(2024, 3, 15).unwrap();
        sheet.write_datetime_with_format(1, 1, &date, &date_format).unwrap();
        sheet.write_number(1, 2, 5).unwrap();

        let transfer = book.add_worksheet();
        transfer.set_name("Transfer").unwrap();
        transfer.write_string(0, 0, "Bip Gönderilen Fotoğraf Boyutu").unwrap();

        let bytes = book.save_to_buffer().unwrap();
        let wb = parse_workbook_bytes(&bytes, "anket.xlsx").unwrap();

        assert_eq!(wb.sheet_names(), vec!["Yanıtlar", "Transfer"]);
        let answers = &wb.sheets[0];
        assert_eq!(answers.rows[0][0], Cell::text("Ayşe"));
        assert_eq!(
            answers.rows[0][1],
            Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
        assert_eq!(answers.rows[0][2], Cell::Number(5.0));
        assert_eq!(wb.sheets[1].row_count(), 0);
    }

    #[test]
    fn test_unreadable_bytes() {
        let err = parse_workbook_bytes(b"plain text", "bozuk.xlsx").unwrap_err();
        assert!(matches!(err, ReadError::Workbook { ref name, .. } if name == "bozuk.xlsx"));
    }
}
