//! Error types for the Pivotload conversion pipeline.
//!
//! Only structural problems are errors. Noisy survey data (unparseable
//! scores, missing columns, odd dates) degrades to skipped rows or null
//! fields inside the transform and never reaches these types.
//!
//! - [`ReadError`] - Input workbook / CSV reading errors
//! - [`ConvertError`] - Missing structure in the source workbook
//! - [`WriterError`] - Output workbook errors
//! - [`ConfigError`] - Invalid options or config files
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::parser::CsvError;

// =============================================================================
// Input Errors
// =============================================================================

/// Errors while reading an input file into a [`crate::models::Workbook`].
#[derive(Debug, Error)]
pub enum ReadError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// The spreadsheet container could not be opened.
    #[error("Cannot read workbook '{name}': {message}")]
    Workbook { name: String, message: String },

    /// Invalid CSV content.
    #[error("Invalid CSV: {0}")]
    Csv(#[from] CsvError),

    /// Empty file.
    #[error("Input file is empty")]
    EmptyFile,

    /// The workbook has no worksheets at all.
    #[error("Workbook '{0}' contains no sheets")]
    NoSheets(String),
}

// =============================================================================
// Conversion Errors
// =============================================================================

/// Structural failures that abort a conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// No sheet could be selected for score expansion.
    #[error("Workbook '{0}' has no sheet to read scores from")]
    NoScoreSheet(String),

    /// A selected sheet has no header row.
    #[error("Sheet '{sheet}' has no columns")]
    EmptyColumns { sheet: String },
}

// =============================================================================
// Writer Errors
// =============================================================================

/// Errors while producing the output workbook.
#[derive(Debug, Error)]
pub enum WriterError {
    /// Target sheet missing from the template.
    #[error("Sheet '{0}' not found in template")]
    SheetNotFound(String),

    /// The template could not be opened.
    #[error("Cannot read template: {0}")]
    Template(String),

    /// Serialization failed.
    #[error("Cannot write workbook: {0}")]
    Xlsx(String),
}

impl From<rust_xlsxwriter::XlsxError> for WriterError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        WriterError::Xlsx(err.to_string())
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid conversion options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Continuity threshold outside the score scale.
    #[error("Continuity threshold must be between 1 and 5, got {0}")]
    InvalidThreshold(i64),

    /// Score range with min above max.
    #[error("Invalid score range {min}..={max}")]
    InvalidScoreRange { min: i64, max: i64 },

    /// Config file could not be read.
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for [`crate::config::ConvertOptions`].
    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::convert_workbook`]
/// and friends. It wraps all lower-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input reading error.
    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    /// Structural conversion error.
    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// Output writing error.
    #[error("Writer error: {0}")]
    Writer(#[from] WriterError),

    /// Options error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for input reading.
pub type ReadResult<T> = Result<T, ReadError>;

/// Result type for output writing.
pub type WriterResult<T> = Result<T, WriterError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
