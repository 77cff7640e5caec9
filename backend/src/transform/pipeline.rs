//! High-level conversion API: workbook in, report tables out.
//!
//! This module combines all steps: reading, sheet discovery, expansion,
//! the upload/download sub-transform, assembly and output rendering. It is
//! the only transform module that logs.
//!
//! # Example
//!
//! ```rust,ignore
//! use pivotload::transform::pipeline::{convert_file, render};
//! use pivotload::config::ConvertOptions;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = convert_file("anket_faz6.xlsx", &ConvertOptions::default())?;
//!     println!("{} Functions rows", result.functions.len());
//!     std::fs::write("rapor.xlsx", render(&result, None)?)?;
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::Path;

use crate::api::logs::{log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::config::ConvertOptions;
use crate::error::{ConvertError, PipelineError, PipelineResult, WriterError};
use crate::models::{OutputTable, Workbook};
use crate::parser::{read_input_bytes, read_input_file};
use crate::transform::discovery::{discover, Selection};
use crate::transform::expander::{self, ExpansionStats, ParticipantNumbers};
use crate::transform::transfer::{self, TransferStats};
use crate::writer::{
    template_columns, write_into_template, write_portable, SheetOutput, FUNCTIONS_SHEET,
    TRANSFER_SHEET,
};

/// Result of one conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    /// Long-form Functions table.
    pub functions: OutputTable,

    /// Upload/Download table; `None` when the sub-transform is disabled.
    pub transfers: Option<OutputTable>,

    /// Sheets expanded for scores.
    pub score_sheets: Vec<String>,

    /// Sheets used for transfers.
    pub transfer_sheets: Vec<String>,

    pub stats: ConversionStats,
}

/// Counters gathered across all sheets.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    pub functions: ExpansionStats,
    pub transfers: TransferStats,
    pub participants: usize,
}

/// Convert an in-memory workbook.
///
/// Participant numbers are shared by every sheet of this call and by both
/// tables, and are discarded afterwards.
pub fn convert_workbook(
    workbook: &Workbook,
    options: &ConvertOptions,
) -> PipelineResult<ConversionResult> {
    let config = options.expander_config()?;

    log_info(format!(
        "📖 {} ({} sheet(s))",
        workbook.name,
        workbook.sheets.len()
    ));

    let selection = discover(workbook);
    let score_tables = selection.score_tables(workbook);
    if score_tables.is_empty() {
        return Err(ConvertError::NoScoreSheet(workbook.name.clone()).into());
    }
    if selection.score_selection == Selection::Positional {
        log_warning(format!(
            "No '... Puan' column found, reading scores from first sheet '{}'",
            score_tables[0].name
        ));
    }

    let mut numbers = ParticipantNumbers::new();
    let mut stats = ConversionStats::default();
    let mut records = Vec::new();

    log_info("🔄 Expanding score columns...");
    for sheet in &score_tables {
        if sheet.headers.is_empty() {
            return Err(ConvertError::EmptyColumns {
                sheet: sheet.name.clone(),
            }
            .into());
        }

        let (sheet_records, sheet_stats) = expander::expand_records(sheet, &config, &mut numbers);
        log_info_indent(
            format!(
                "{}: {} score column(s), {} row(s)",
                sheet.name, sheet_stats.score_columns, sheet_stats.rows_emitted
            ),
            1,
        );
        if sheet_stats.malformed_scores > 0 {
            log_warning_indent(
                format!(
                    "{} score cell(s) not readable as an integer in {}..={}",
                    sheet_stats.malformed_scores,
                    config.score_range.start(),
                    config.score_range.end()
                ),
                1,
            );
        }
        if !sheet_stats.unresolved.is_empty() {
            log_warning_indent(
                format!("Unresolved: {}", sheet_stats.unresolved.join(", ")),
                1,
            );
        }

        records.extend(sheet_records);
        stats.functions.merge(sheet_stats);
    }

    let functions = expander::assemble(records, &config.functions_columns);
    log_success(format!("{} Functions row(s)", functions.len()));

    let mut transfer_sheets = Vec::new();
    let transfers = if config.include_transfers {
        let tables = selection.transfer_tables(workbook);
        if tables.is_empty() {
            log_warning("No transfer sheet found");
        } else if selection.transfer_selection == Selection::Positional {
            log_warning(format!(
                "No sent-size column found, reading transfers from '{}'",
                tables[0].name
            ));
        }

        let mut transfer_records = Vec::new();
        for sheet in tables {
            if sheet.headers.is_empty() {
                return Err(ConvertError::EmptyColumns {
                    sheet: sheet.name.clone(),
                }
                .into());
            }
            let (sheet_records, sheet_stats) =
                transfer::expand_transfers(sheet, &config, &mut numbers);
            log_info_indent(
                format!(
                    "{}: {} trial(s), {} row(s)",
                    sheet.name, sheet_stats.trial_columns, sheet_stats.rows_emitted
                ),
                1,
            );
            transfer_records.extend(sheet_records);
            stats.transfers.merge(sheet_stats);
            transfer_sheets.push(sheet.name.clone());
        }

        let table = transfer::assemble(transfer_records, &config.transfer_columns);
        log_success(format!("{} Upload/Download row(s)", table.len()));
        Some(table)
    } else {
        None
    };

    stats.participants = numbers.len();

    Ok(ConversionResult {
        functions,
        transfers,
        score_sheets: score_tables.iter().map(|s| s.name.clone()).collect(),
        transfer_sheets,
        stats,
    })
}

/// Read and convert uploaded bytes.
pub fn convert_bytes(
    bytes: &[u8],
    file_name: &str,
    options: &ConvertOptions,
) -> PipelineResult<ConversionResult> {
    let workbook = read_input_bytes(bytes, file_name)?;
    convert_workbook(&workbook, options)
}

/// Read and convert a file.
pub fn convert_file<P: AsRef<Path>>(
    path: P,
    options: &ConvertOptions,
) -> PipelineResult<ConversionResult> {
    let workbook = read_input_file(path)?;
    convert_workbook(&workbook, options)
}

/// Take the template's header rows as target columns, where the options
/// do not already fix them. Unreadable templates only log a warning.
pub fn apply_template_columns(options: &mut ConvertOptions, template: &[u8]) {
    let adopt = |sheet: &str, target: &mut Option<Vec<String>>| {
        if target.is_some() {
            return;
        }
        match template_columns(template, sheet) {
            Ok(headers)
                if !headers.is_empty() && !headers.iter().any(|h| h.starts_with("Unnamed")) =>
            {
                log_info_indent(format!("{}: {} template column(s)", sheet, headers.len()), 1);
                *target = Some(headers);
            }
            Ok(_) => log_warning(format!("Template sheet '{}' has no usable header row", sheet)),
            Err(e) => log_warning(format!("Template columns not used: {}", e)),
        }
    };

    adopt(FUNCTIONS_SHEET, &mut options.functions_columns);
    adopt(TRANSFER_SHEET, &mut options.transfer_columns);
}

/// Serialize a conversion to xlsx bytes, into `template` when given.
pub fn render(result: &ConversionResult, template: Option<&[u8]>) -> PipelineResult<Vec<u8>> {
    let mut outputs = vec![SheetOutput::functions(&result.functions)];
    if let Some(transfers) = &result.transfers {
        outputs.push(SheetOutput::transfers(transfers));
    }

    let bytes = match template {
        Some(template) => {
            log_info("📝 Writing into template...");
            match write_into_template(template, &outputs) {
                Err(WriterError::SheetNotFound(sheet)) if sheet == TRANSFER_SHEET => {
                    log_warning(format!(
                        "Template has no '{}' sheet, writing Functions only",
                        TRANSFER_SHEET
                    ));
                    write_into_template(template, &outputs[..1])?
                }
                other => other?,
            }
        }
        None => {
            log_info("📝 Writing new workbook...");
            write_portable(&outputs)?
        }
    };

    log_success(format!("Workbook ready ({} bytes)", bytes.len()));
    Ok(bytes)
}

/// Convert and render in one step.
pub fn convert_to_xlsx(
    bytes: &[u8],
    file_name: &str,
    options: &ConvertOptions,
    template: Option<&[u8]>,
) -> Result<(Vec<u8>, ConversionResult), PipelineError> {
    let mut options = options.clone();
    if let Some(template) = template {
        apply_template_columns(&mut options, template);
    }
    let result = convert_bytes(bytes, file_name, &options)?;
    let xlsx = render(&result, template)?;
    Ok((xlsx, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;
    use crate::error::ReadError;
    use crate::models::{columns, Cell, SourceTable};

    fn h(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn t(s: &str) -> Cell {
        Cell::text(s)
    }

    fn survey() -> Workbook {
        let answers = SourceTable::new(
            "Yanıtlar",
            h(&["Ad Soyad", "Tarih", "Cihaz", "Bip Txt Puan", "Bip Txt Yorum", "Telegram Call Puan"]),
        )
        .with_row(vec![t("Veli"), t("02.03.2024"), t("Redmi Note 12"), t("2"), t("yavaş"), t("5")])
        .with_row(vec![t("Ali"), t("01.03.2024"), t("iPhone 15"), t("4"), Cell::Empty, t("x")]);

        let transfer = SourceTable::new(
            "Transfer",
            h(&["Ad Soyad", "Tarih", "Bip Gönderilen Fotoğraf Boyutu", "Bip Fotoğraf Gönderme Süresi"]),
        )
        .with_row(vec![t("Ali"), t("01.03.2024"), Cell::Number(10.0), Cell::Number(5.0)])
        .with_row(vec![t("Can"), t("03.03.2024"), Cell::Number(4.0), Cell::Number(0.0)]);

        Workbook::new("anket.xlsx", vec![answers, transfer])
    }

    #[test]
    fn test_report_conversion() {
        let result = convert_workbook(&survey(), &ConvertOptions::default()).unwrap();

        assert_eq!(result.score_sheets, vec!["Yanıtlar"]);
        assert_eq!(result.transfer_sheets, vec!["Transfer"]);
        assert_eq!(result.functions.columns, columns::owned(columns::REPORT_FUNCTIONS));
        assert_eq!(result.functions.len(), 3);
        assert_eq!(result.stats.functions.malformed_scores, 1);

        let who = result.functions.column(columns::PARTICIPANT);
        assert_eq!(who[0], &t("Ali"));
        let numbers = result.functions.column(columns::PARTICIPANT_NO);
        assert_eq!(numbers[0], &t("2"));

        let os = result.functions.column(columns::OS);
        assert_eq!(os[0], &t("ios"));
        assert_eq!(os[1], &t("android"));

        let transfers = result.transfers.unwrap();
        assert_eq!(transfers.len(), 2);
        let speed = transfers.column(columns::SPEED);
        assert_eq!(speed[0], &Cell::Number(2.0));
        assert_eq!(speed[1], &Cell::Empty);
        // Can only appears on the transfer sheet and is numbered after the others.
        assert_eq!(transfers.column(columns::PARTICIPANT_NO)[1], &t("3"));
        assert_eq!(result.stats.participants, 3);
    }

    #[test]
    fn test_legacy_profile() {
        let options = ConvertOptions {
            profile: Profile::Legacy,
            ..Default::default()
        };
        let result = convert_workbook(&survey(), &options).unwrap();

        assert_eq!(result.functions.columns, columns::owned(columns::LEGACY_FUNCTIONS));
        assert!(result.transfers.is_none());
        assert!(result.functions.column(columns::OS).iter().all(|c| c.is_empty()));
        assert_eq!(result.stats.participants, 0);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let options = ConvertOptions {
            continuity_threshold: 9,
            ..Default::default()
        };
        assert!(matches!(
            convert_workbook(&survey(), &options),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_structural_errors() {
        let empty = Workbook::new("bos.xlsx", Vec::new());
        assert!(matches!(
            convert_workbook(&empty, &ConvertOptions::default()),
            Err(PipelineError::Convert(ConvertError::NoScoreSheet(_)))
        ));

        let headerless = Workbook::new("x.xlsx", vec![SourceTable::new("Sheet1", Vec::new())]);
        assert!(matches!(
            convert_workbook(&headerless, &ConvertOptions::default()),
            Err(PipelineError::Convert(ConvertError::EmptyColumns { ref sheet })) if sheet == "Sheet1"
        ));

        assert!(matches!(
            convert_bytes(b"", "bos.csv", &ConvertOptions::default()),
            Err(PipelineError::Read(ReadError::EmptyFile))
        ));
    }

    #[test]
    fn test_csv_conversion() {
        let csv = "Ad Soyad;Whatsapp Gm Puan;Whatsapp Gm Yorum\nAli;4;iyi\nVeli;;\n";
        let result = convert_bytes(csv.as_bytes(), "yanitlar.csv", &ConvertOptions::default()).unwrap();

        assert_eq!(result.functions.len(), 1);
        assert_eq!(
            result.functions.column("Whatsapp Yorum")[0],
            &t("iyi")
        );
        assert_eq!(result.transfers.map(|t| t.len()), Some(0));
    }

    #[test]
    fn test_render_portable_and_template() {
        let result = convert_workbook(&survey(), &ConvertOptions::default()).unwrap();
        let portable = render(&result, None).unwrap();

        let wb = crate::parser::parse_workbook_bytes(&portable, "rapor.xlsx").unwrap();
        assert_eq!(wb.sheet_names(), vec![FUNCTIONS_SHEET, TRANSFER_SHEET]);
        assert_eq!(wb.sheets[0].row_count(), 3);

        // A portable output doubles as a template for the next run.
        let (again, _) = convert_to_xlsx(
            b"Ad Soyad,Bip Im Puan\nZeynep,5\n",
            "yeni.csv",
            &ConvertOptions::default(),
            Some(&portable),
        )
        .unwrap();
        let wb = crate::parser::parse_workbook_bytes(&again, "rapor.xlsx").unwrap();
        let sheet = wb.sheet(FUNCTIONS_SHEET).unwrap();
        assert_eq!(sheet.headers, columns::owned(columns::REPORT_FUNCTIONS));
        assert_eq!(sheet.row_count(), 1);
        assert_eq!(sheet.rows[0][1], t("Zeynep"));
    }
}
