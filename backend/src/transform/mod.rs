//! Transformation module.
//!
//! This module handles wide survey sheets to long-form report tables:
//! - Resolver: fuzzy header lookup
//! - Normalize: score, number, date and OS normalization
//! - Expander: score columns to Functions records
//! - Transfer: upload/download trials to transfer records
//! - Discovery: picking sheets in a multi-sheet workbook
//! - Pipeline: main conversion pipeline

pub mod discovery;
pub mod expander;
pub mod normalize;
pub mod pipeline;
pub mod resolver;
pub mod transfer;

pub use discovery::{discover, SheetSelection};
pub use expander::{expand, ExpanderConfig, ExpansionStats, ParticipantNumbers};
pub use pipeline::*;
pub use resolver::{resolve, resolve_any, ColumnResolver};
pub use transfer::{expand_transfers, TransferStats};
