//! # Pivotload - survey workbooks to long-form report tables
//!
//! Pivotload reads wide survey response sheets, where each participant row
//! carries one `<App> <Scenario> Puan` column per test, and pivots them into
//! one row per (participant, app, scenario) for the report workbook.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ xlsx / csv  │────▶│   Parser    │────▶│  Transform  │────▶│   Writer    │
//! │  (survey)   │     │ (calamine)  │     │ (resolve +  │     │ (portable / │
//! │             │     │             │     │   expand)   │     │  template)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pivotload::{convert_file, render, ConvertOptions};
//!
//! let result = convert_file("anket.xlsx", &ConvertOptions::default())?;
//! println!("{} Functions rows", result.functions.len());
//! std::fs::write("rapor.xlsx", render(&result, None)?)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, tables, records and the app/scenario catalog
//! - [`config`] - Conversion options and profiles
//! - [`parser`] - CSV and spreadsheet reading
//! - [`transform`] - Column resolution, row expansion and the pipeline
//! - [`writer`] - xlsx output
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Reading
pub mod parser;

// Transformation
pub mod transform;

// Writing
pub mod writer;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ConvertError, PipelineError, ReadError, ServerError, WriterError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    scenario_label, App, Cell, OutputTable, SourceTable, Workbook, SCENARIOS,
};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::{CommentLookup, ConvertOptions, OsKeywords, Profile};

// =============================================================================
// Re-exports - Reading
// =============================================================================

pub use parser::{
    parse_bytes_auto, parse_workbook_bytes, read_input_bytes, read_input_file, CsvError,
    ParseResult,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    discover, expand, expand_transfers, resolve, resolve_any, ColumnResolver, ExpanderConfig,
    ExpansionStats, ParticipantNumbers, SheetSelection, TransferStats,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    apply_template_columns, convert_bytes, convert_file, convert_to_xlsx, convert_workbook,
    render, ConversionResult, ConversionStats,
};

// =============================================================================
// Re-exports - Writer
// =============================================================================

pub use writer::{template_columns, write_into_template, write_portable, SheetOutput};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::server::output_file_name;
pub use api::types::{error_response, PreviewResponse, TablePreview};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, MAX_UPLOAD_BYTES};
}
