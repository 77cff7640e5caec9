//! REST API types for frontend integration.

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::OutputTable;
use crate::transform::pipeline::{ConversionResult, ConversionStats};

/// Rows returned per table by the preview endpoint.
pub const PREVIEW_ROWS: usize = 50;

/// Response sent to frontend after a preview conversion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready", "warning"
    pub status: String,

    pub functions: TablePreview,

    /// Absent when the profile skips transfers
    pub transfers: Option<TablePreview>,

    pub metadata: ResponseMetadata,
}

/// First rows of one output table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub total_rows: usize,
    pub rows: Vec<Value>,
}

impl TablePreview {
    pub fn new(table: &OutputTable, limit: usize) -> Self {
        Self {
            columns: table.columns.clone(),
            total_rows: table.len(),
            rows: table.to_json_records(limit),
        }
    }
}

/// Metadata about the conversion
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub file_name: String,
    pub score_sheets: Vec<String>,
    pub transfer_sheets: Vec<String>,
    pub stats: ConversionStats,
}

/// Result of a multipart upload before conversion
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub file_name: Option<String>,
    pub file: Option<Vec<u8>>,
    pub template: Option<Vec<u8>>,
    pub phase: Option<String>,
    pub threshold: Option<i64>,
    pub profile: Option<String>,
}

impl PreviewResponse {
    pub fn new(file_name: &str, result: &ConversionResult, limit: usize) -> Self {
        let stats = &result.stats.functions;
        let clean = stats.malformed_scores == 0 && stats.unresolved.is_empty();

        Self {
            job_id: Uuid::new_v4().to_string(),
            status: if clean { "ready" } else { "warning" }.to_string(),
            functions: TablePreview::new(&result.functions, limit),
            transfers: result
                .transfers
                .as_ref()
                .map(|t| TablePreview::new(t, limit)),
            metadata: ResponseMetadata {
                file_name: file_name.to_string(),
                score_sheets: result.score_sheets.clone(),
                transfer_sheets: result.transfer_sheets.clone(),
                stats: result.stats.clone(),
            },
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    fn result() -> ConversionResult {
        ConversionResult {
            functions: OutputTable {
                columns: vec!["Faz".into(), "Puan".into()],
                rows: (0..80)
                    .map(|_| vec![Cell::text("Faz 6"), Cell::Number(4.0)])
                    .collect(),
            },
            transfers: None,
            score_sheets: vec!["Yanıtlar".into()],
            transfer_sheets: Vec::new(),
            stats: ConversionStats::default(),
        }
    }

    #[test]
    fn test_preview_truncates_rows() {
        let response = PreviewResponse::new("anket.xlsx", &result(), PREVIEW_ROWS);

        assert_eq!(response.status, "ready");
        assert_eq!(response.functions.total_rows, 80);
        assert_eq!(response.functions.rows.len(), PREVIEW_ROWS);
        assert_eq!(response.functions.rows[0]["Puan"], 4.0);
        assert!(response.transfers.is_none());
    }

    #[test]
    fn test_preview_json_is_camel_case() {
        let value = serde_json::to_value(PreviewResponse::new("a.csv", &result(), 1)).unwrap();
        assert!(value.get("jobId").is_some());
        assert_eq!(value["metadata"]["scoreSheets"][0], "Yanıtlar");
        assert_eq!(value["functions"]["totalRows"], 80);
    }

    #[test]
    fn test_error_response() {
        let value = error_response("Sheet 'X' not found in template");
        assert_eq!(value["status"], "error");
        assert!(value["error"].as_str().unwrap().contains("'X'"));
    }
}
