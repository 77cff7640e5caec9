//! Output workbook writing.
//!
//! Two modes, both taking finished [`OutputTable`]s:
//!
//! - [`write_portable`] builds a new workbook, one sheet per table, each
//!   registered as a filterable Excel table.
//! - [`write_into_template`] opens a report template, replaces the data
//!   rows under each target sheet's header and stretches the sheet's table
//!   objects over the new rows. Everything else in the template (other
//!   sheets, charts, pivot caches, named ranges) is left as it was.

use calamine::{open_workbook_auto_from_rs, Reader};
use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{Format, Table, TableColumn, Workbook};
use std::io::Cursor;

use crate::error::{WriterError, WriterResult};
use crate::models::{Cell, OutputTable};
use crate::parser::workbook::table_from_rows;

/// Sheet holding the Functions table.
pub const FUNCTIONS_SHEET: &str = "Fonksiyonlar Data";
/// Sheet holding the Upload/Download table.
pub const TRANSFER_SHEET: &str = "UploadDownload Data";

pub const FUNCTIONS_TABLE: &str = "FonksiyonlarData";
pub const TRANSFER_TABLE: &str = "UploadDownloadData";

/// Number format of date cells.
pub const DATE_FORMAT: &str = "yyyy-mm-dd";

/// One table and where it goes.
#[derive(Debug, Clone, Copy)]
pub struct SheetOutput<'a> {
    pub sheet_name: &'a str,
    /// Excel table name used by [`write_portable`].
    pub table_name: &'a str,
    pub table: &'a OutputTable,
}

impl<'a> SheetOutput<'a> {
    pub fn functions(table: &'a OutputTable) -> Self {
        Self {
            sheet_name: FUNCTIONS_SHEET,
            table_name: FUNCTIONS_TABLE,
            table,
        }
    }

    pub fn transfers(table: &'a OutputTable) -> Self {
        Self {
            sheet_name: TRANSFER_SHEET,
            table_name: TRANSFER_TABLE,
            table,
        }
    }
}

/// `num_days_from_ce` of 1899-12-30, the spreadsheet date epoch.
const EXCEL_EPOCH_DAYS: i32 = 693_594;

/// Spreadsheet serial number of a date.
pub fn excel_serial(date: NaiveDate) -> f64 {
    (date.num_days_from_ce() - EXCEL_EPOCH_DAYS) as f64
}

// =============================================================================
// Portable workbook
// =============================================================================

/// New workbook with one sheet and one Excel table per output.
pub fn write_portable(outputs: &[SheetOutput]) -> WriterResult<Vec<u8>> {
    let mut book = Workbook::new();
    let date_format = Format::new().set_num_format(DATE_FORMAT);

    for output in outputs {
        let sheet = book.add_worksheet();
        sheet.set_name(output.sheet_name)?;

        let table = output.table;
        for (r, row) in table.rows.iter().enumerate() {
            let r = (r + 1) as u32;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                match cell {
                    Cell::Empty => {}
                    Cell::Number(n) if n.is_nan() => {}
                    Cell::Number(n) => {
                        sheet.write_number(r, c, *n)?;
                    }
                    Cell::Bool(b) => {
                        sheet.write_boolean(r, c, *b)?;
                    }
                    Cell::Text(s) => {
                        sheet.write_string(r, c, s)?;
                    }
                    Cell::Date(d) => {
                        sheet.write_number_with_format(r, c, excel_serial(*d), &date_format)?;
                    }
                }
            }
        }

        if table.columns.is_empty() {
            continue;
        }
        let columns: Vec<TableColumn> = table
            .columns
            .iter()
            .map(|name| TableColumn::new().set_header(name))
            .collect();
        let excel_table = Table::new()
            .set_name(output.table_name)
            .set_columns(&columns);
        let last_row = table.len().max(1) as u32;
        let last_col = (table.columns.len() - 1) as u16;
        sheet.add_table(0, 0, last_row, last_col, &excel_table)?;
        sheet.autofit();
    }

    Ok(book.save_to_buffer()?)
}

// =============================================================================
// Template workbook
// =============================================================================

fn template_error(e: impl std::fmt::Display) -> WriterError {
    WriterError::Template(e.to_string())
}

/// Header row of `sheet` in a template, read without modifying it.
pub fn template_columns(template: &[u8], sheet: &str) -> WriterResult<Vec<String>> {
    let mut book = open_workbook_auto_from_rs(Cursor::new(template)).map_err(template_error)?;
    if !book.sheet_names().iter().any(|s| s == sheet) {
        return Err(WriterError::SheetNotFound(sheet.to_string()));
    }
    let range = book.worksheet_range(sheet).map_err(template_error)?;
    Ok(table_from_rows(sheet, range.rows()).headers)
}

/// Write tables into a copy of `template` and return the new bytes.
///
/// Each target sheet keeps its row-1 header. When every header cell is
/// filled, the headers set the column order and the table is re-projected
/// onto them; otherwise the table's own columns are used.
pub fn write_into_template(template: &[u8], outputs: &[SheetOutput]) -> WriterResult<Vec<u8>> {
    let mut book =
        umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(template), true)
            .map_err(template_error)?;

    for output in outputs {
        let sheet = book
            .get_sheet_by_name_mut(output.sheet_name)
            .ok_or_else(|| WriterError::SheetNotFound(output.sheet_name.to_string()))?;

        let width = sheet.get_highest_column();
        let headers: Vec<String> = (1..=width)
            .map(|col| sheet.get_value((col, 1)).trim().to_string())
            .collect();
        let table = if !headers.is_empty() && headers.iter().all(|h| !h.is_empty()) {
            output.table.project(&headers)
        } else {
            output.table.clone()
        };

        let highest = sheet.get_highest_row();
        if highest > 1 {
            sheet.remove_row(&2, &(highest - 1));
        }

        if table.columns.len() != headers.len() || headers.iter().any(String::is_empty) {
            for (c, name) in table.columns.iter().enumerate() {
                sheet
                    .get_cell_mut(((c + 1) as u32, 1))
                    .set_value_string(name.clone());
            }
        }

        for (r, row) in table.rows.iter().enumerate() {
            let r = (r + 2) as u32;
            for (c, value) in row.iter().enumerate() {
                let coordinate = ((c + 1) as u32, r);
                match value {
                    Cell::Empty => {}
                    Cell::Number(n) if n.is_nan() => {}
                    Cell::Number(n) => {
                        sheet.get_cell_mut(coordinate).set_value_number(*n);
                    }
                    Cell::Bool(b) => {
                        sheet.get_cell_mut(coordinate).set_value_bool(*b);
                    }
                    Cell::Text(s) => {
                        sheet.get_cell_mut(coordinate).set_value_string(s.clone());
                    }
                    Cell::Date(d) => {
                        let cell = sheet.get_cell_mut(coordinate);
                        cell.set_value_number(excel_serial(*d));
                        cell.get_style_mut()
                            .get_number_format_mut()
                            .set_format_code(DATE_FORMAT);
                    }
                }
            }
        }

        let last_col = table.columns.len().max(1) as u32;
        let last_row = (table.len() + 1).max(2) as u32;
        for excel_table in sheet.get_tables_mut().iter_mut() {
            excel_table.set_area(((1, 1), (last_col, last_row)));
        }
    }

    let mut out = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut out)
        .map_err(|e| WriterError::Xlsx(e.to_string()))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_workbook_bytes;

    fn sample(columns: &[&str], rows: Vec<Vec<Cell>>) -> OutputTable {
        OutputTable {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            rows,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_excel_serial() {
        assert_eq!(excel_serial(date(1900, 1, 1)), 2.0);
        assert_eq!(excel_serial(date(2024, 3, 15)), 45366.0);
    }

    #[test]
    fn test_portable_roundtrip() {
        let functions = sample(
            &["Faz", "Tarih", "Puan", "Yorum"],
            vec![
                vec![
                    Cell::text("Faz 6"),
                    Cell::Date(date(2024, 3, 15)),
                    Cell::Number(4.0),
                    Cell::Empty,
                ],
                vec![Cell::text("Faz 6"), Cell::Empty, Cell::Number(2.0), Cell::text("yavaş")],
            ],
        );
        let transfers = sample(&["Faz", "Hız"], Vec::new());

        let bytes = write_portable(&[
            SheetOutput::functions(&functions),
            SheetOutput::transfers(&transfers),
        ])
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rapor.xlsx");
        std::fs::write(&path, &bytes).unwrap();
        let wb = crate::parser::parse_workbook_file(&path).unwrap();

        assert_eq!(wb.sheet_names(), vec![FUNCTIONS_SHEET, TRANSFER_SHEET]);
        let sheet = &wb.sheets[0];
        assert_eq!(sheet.headers, functions.columns);
        assert_eq!(sheet.row_count(), 2);
        assert_eq!(sheet.rows[0][1], Cell::Date(date(2024, 3, 15)));
        assert_eq!(sheet.rows[0][2], Cell::Number(4.0));
        assert_eq!(sheet.rows[1][3], Cell::text("yavaş"));
        assert_eq!(wb.sheets[1].headers, vec!["Faz", "Hız"]);
        assert_eq!(wb.sheets[1].row_count(), 0);
    }

    fn template() -> Vec<u8> {
        let mut book = Workbook::new();

        let data = book.add_worksheet();
        data.set_name(FUNCTIONS_SHEET).unwrap();
        for (c, h) in ["Faz", "Puan", "Cihaz"].iter().enumerate() {
            data.write_string(0, c as u16, *h).unwrap();
        }
        for r in 1..=5u32 {
            data.write_string(r, 0, "eski").unwrap();
            data.write_number(r, 1, 1.0).unwrap();
        }
        let columns: Vec<TableColumn> = ["Faz", "Puan", "Cihaz"]
            .iter()
            .map(|h| TableColumn::new().set_header(*h))
            .collect();
        let table = Table::new().set_name(FUNCTIONS_TABLE).set_columns(&columns);
        data.add_table(0, 0, 5, 2, &table).unwrap();

        let dashboard = book.add_worksheet();
        dashboard.set_name("Dashboard").unwrap();
        dashboard.write_string(0, 0, "Özet").unwrap();

        book.save_to_buffer().unwrap()
    }

    #[test]
    fn test_template_write_replaces_rows() {
        let functions = sample(
            &["Puan", "Faz", "Devamlılık"],
            vec![
                vec![Cell::Number(5.0), Cell::text("Faz 7"), Cell::text("OK")],
                vec![Cell::Number(3.0), Cell::text("Faz 7"), Cell::text("NOK")],
            ],
        );

        let bytes = write_into_template(&template(), &[SheetOutput::functions(&functions)]).unwrap();
        let wb = parse_workbook_bytes(&bytes, "rapor.xlsx").unwrap();

        let sheet = wb.sheet(FUNCTIONS_SHEET).unwrap();
        assert_eq!(sheet.headers, vec!["Faz", "Puan", "Cihaz"]);
        assert_eq!(sheet.row_count(), 2);
        assert_eq!(
            sheet.rows[0],
            vec![Cell::text("Faz 7"), Cell::Number(5.0), Cell::Empty]
        );
        assert_eq!(sheet.rows[1][1], Cell::Number(3.0));

        let dashboard = wb.sheet("Dashboard").unwrap();
        assert_eq!(dashboard.headers, vec!["Özet"]);
    }

    #[test]
    fn test_template_missing_sheet() {
        let table = sample(&["Faz"], Vec::new());
        let err = write_into_template(&template(), &[SheetOutput::transfers(&table)]).unwrap_err();
        assert!(matches!(err, WriterError::SheetNotFound(ref s) if s == TRANSFER_SHEET));
    }

    #[test]
    fn test_template_columns() {
        let bytes = template();
        assert_eq!(
            template_columns(&bytes, FUNCTIONS_SHEET).unwrap(),
            vec!["Faz", "Puan", "Cihaz"]
        );
        assert!(matches!(
            template_columns(&bytes, TRANSFER_SHEET),
            Err(WriterError::SheetNotFound(_))
        ));
        assert!(matches!(
            template_columns(b"not a workbook", FUNCTIONS_SHEET),
            Err(WriterError::Template(_))
        ));
    }
}
