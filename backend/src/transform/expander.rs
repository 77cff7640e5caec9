//! Row Expander: wide survey sheet → long-form Functions records.
//!
//! # Architecture
//!
//! ```text
//! Survey sheet (wide)                              Functions rows (long)
//! ┌─────────┬──────────────┬───────────────┐      ┌─────────┬──────┬──────┬───────┐
//! │ Ad Soyad│ Bip Txt Puan │ Bip Txt Yorum │      │ Ali     │ bip  │ txt  │ 4 OK  │
//! │ Ali     │ 4            │ iyi           │  →   │ Ali     │ wa   │ call │ 2 NOK │
//! │ ...     │ Whatsapp Call Puan ...       │      │ ...     │      │      │       │
//! └─────────┴──────────────┴───────────────┘      └─────────┴──────┴──────┴───────┘
//! ```
//!
//! Every `<App> <Scenario> Puan` header is a pivot column. Each non-empty,
//! coercible score cell in it becomes one [`FunctionRecord`]; the rest of
//! the row (participant, date, OS, network, version, device) is looked up
//! through the [`ColumnResolver`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::ops::RangeInclusive;

use crate::config::{CommentLookup, OsKeywords};
use crate::models::{
    columns, scenario_label, App, Cell, Continuity, FunctionRecord, OutputTable, SourceTable,
};
use crate::transform::normalize::{coerce_score, infer_os, parse_date, ScoreCell};
use crate::transform::resolver::{normalize, ColumnResolver};

/// Trailing marker of score columns.
pub const SCORE_SUFFIX: &str = "Puan";

/// Token identifying comment columns.
pub const COMMENT_TOKEN: &str = "yorum";

static SCORE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\S+)\s+(.+?)\s+puan$").expect("static regex"));

// =============================================================================
// Phrasing catalog
// =============================================================================

/// Candidate phrasings per semantic field, tried in order.
pub mod phrasings {
    pub const PARTICIPANT: &[&str] = &["Ad Soyad", "Adınız Soyadınız", "Katılımcı", "İsim"];
    pub const DATE: &[&str] = &["Tarih", "Test Tarihi", "Zaman damgası", "Timestamp"];
    pub const OS: &[&str] = &["Cihaz OS", "OS", "İşletim Sistemi"];
    pub const NETWORK: &[&str] = &["Bağlantı türü", "Network", "wifi/lte"];
    pub const DEVICE: &[&str] = &["Cihaz", "Cihaz Modeli", "Cihaz Marka Model"];

    /// `{app}` is replaced by the app's display name.
    pub const VERSION: &[&str] = &["{app} Uygulama Versiyon", "{app} Versiyon"];

    pub fn for_app(templates: &[&str], app: super::App) -> Vec<String> {
        templates
            .iter()
            .map(|t| t.replace("{app}", app.display_name()))
            .collect()
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Resolved switches for one conversion.
#[derive(Debug, Clone)]
pub struct ExpanderConfig {
    pub phase: String,
    pub continuity_threshold: i64,
    pub score_range: RangeInclusive<i64>,
    pub infer_os: bool,
    pub number_participants: bool,
    pub include_transfers: bool,
    pub comment_lookup: CommentLookup,
    pub os_keywords: OsKeywords,
    pub functions_columns: Vec<String>,
    pub transfer_columns: Vec<String>,
}

impl ExpanderConfig {
    /// Everything on, default report columns.
    pub fn report(phase: impl Into<String>, continuity_threshold: i64) -> Self {
        Self {
            phase: phase.into(),
            continuity_threshold,
            score_range: 1..=5,
            infer_os: true,
            number_participants: true,
            include_transfers: true,
            comment_lookup: CommentLookup::Adjacent,
            os_keywords: OsKeywords::default(),
            functions_columns: columns::owned(columns::REPORT_FUNCTIONS),
            transfer_columns: columns::owned(columns::TRANSFERS),
        }
    }
}

// =============================================================================
// Participant numbering
// =============================================================================

/// Participant → sequence number, in first-seen order. One per conversion.
#[derive(Debug, Default, Clone)]
pub struct ParticipantNumbers {
    seen: HashMap<String, usize>,
}

impl ParticipantNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number for `participant`, assigning the next one on first sight.
    pub fn number_for(&mut self, participant: &str) -> usize {
        let next = self.seen.len() + 1;
        *self.seen.entry(participant.to_string()).or_insert(next)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Counters for what the expander dropped or could not find.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpansionStats {
    pub score_columns: usize,
    pub rows_emitted: usize,
    pub empty_scores: usize,
    pub malformed_scores: usize,
    /// Semantic fields that resolved to no header.
    pub unresolved: Vec<String>,
}

impl ExpansionStats {
    pub fn merge(&mut self, other: ExpansionStats) {
        self.score_columns += other.score_columns;
        self.rows_emitted += other.rows_emitted;
        self.empty_scores += other.empty_scores;
        self.malformed_scores += other.malformed_scores;
        for field in other.unresolved {
            if !self.unresolved.contains(&field) {
                self.unresolved.push(field);
            }
        }
    }
}

// =============================================================================
// Column discovery
// =============================================================================

/// Per-row context columns shared by the Functions and transfer transforms.
#[derive(Debug, Clone, Default)]
pub struct CommonColumns<'h> {
    pub participant: Option<&'h str>,
    pub date: Option<&'h str>,
    pub os: Option<&'h str>,
    pub network: Option<&'h str>,
    pub device: Option<&'h str>,
    pub versions: Vec<(App, Option<&'h str>)>,
}

impl<'h> CommonColumns<'h> {
    pub fn resolve(resolver: &ColumnResolver<'h>) -> Self {
        let (os, device) = resolver.resolve_distinct(phrasings::OS, phrasings::DEVICE);

        Self {
            participant: resolver.resolve_any(phrasings::PARTICIPANT),
            date: resolver.resolve_any(phrasings::DATE),
            os,
            network: resolver.resolve_any(phrasings::NETWORK),
            device,
            versions: App::ALL
                .into_iter()
                .map(|app| (app, resolve_version(resolver, app)))
                .collect(),
        }
    }

    pub fn version(&self, app: App) -> Option<&'h str> {
        self.versions
            .iter()
            .find(|(a, _)| *a == app)
            .and_then(|(_, h)| *h)
    }

    /// Names of the fields that did not resolve.
    pub fn unresolved(&self) -> Vec<String> {
        let mut missing: Vec<String> = [
            (columns::PARTICIPANT, self.participant),
            (columns::DATE, self.date),
            (columns::OS, self.os),
            (columns::NETWORK, self.network),
            (columns::DEVICE, self.device),
        ]
        .into_iter()
        .filter(|(_, h)| h.is_none())
        .map(|(name, _)| name.to_string())
        .collect();

        missing.extend(
            self.versions
                .iter()
                .filter(|(_, h)| h.is_none())
                .map(|(app, _)| format!("{} {}", app.display_name(), columns::VERSION)),
        );
        missing
    }

    /// Context values of one source row.
    pub fn row_context(
        &self,
        source: &SourceTable,
        row: usize,
        app: App,
        config: &ExpanderConfig,
    ) -> RowContext {
        let text = |header: Option<&str>| source.cell(row, header).as_text();

        let device = text(self.device);
        let os = text(self.os).or_else(|| {
            if config.infer_os {
                device
                    .as_deref()
                    .and_then(|d| infer_os(d, &config.os_keywords))
                    .map(str::to_string)
            } else {
                None
            }
        });

        RowContext {
            participant: text(self.participant),
            date: parse_date(source.cell(row, self.date)),
            os,
            network: text(self.network),
            version: text(self.version(app)),
            device,
        }
    }
}

/// Version column of `app`. Headers led by another app's name are never
/// taken ("Bip Uygulama Versiyon" is close to "Whatsapp Uygulama Versiyon").
fn resolve_version<'h>(resolver: &ColumnResolver<'h>, app: App) -> Option<&'h str> {
    let foreign: Vec<&str> = resolver
        .headers()
        .iter()
        .filter(|h| {
            h.split_whitespace()
                .next()
                .and_then(App::from_prefix)
                .is_some_and(|other| other != app)
        })
        .map(String::as_str)
        .collect();
    let candidates = phrasings::for_app(phrasings::VERSION, app);
    resolver.resolve_any_excluding(&candidates, &foreign)
}

/// Identity fields of one (row, app) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RowContext {
    pub participant: Option<String>,
    pub date: Cell,
    pub os: Option<String>,
    pub network: Option<String>,
    pub version: Option<String>,
    pub device: Option<String>,
}

impl RowContext {
    /// Sequence tag for this row's participant, when numbering is on.
    pub fn participant_no(
        &self,
        config: &ExpanderConfig,
        numbers: &mut ParticipantNumbers,
    ) -> Option<usize> {
        if !config.number_participants {
            return None;
        }
        self.participant.as_deref().map(|p| numbers.number_for(p))
    }
}

/// A discovered `<App> <Scenario> Puan` column.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreColumn {
    pub header: String,
    pub index: usize,
    pub app: App,
    /// Scenario text as written in the header.
    pub scenario: String,
    /// Catalog label, or the scenario text when unknown.
    pub test_area: String,
    pub comment_header: Option<String>,
    /// Position of the comment column; header texts may repeat.
    pub comment_index: Option<usize>,
}

/// Parse a header as a score column: `(app prefix, scenario text)`.
pub fn split_score_header(header: &str) -> Option<(&str, &str)> {
    SCORE_HEADER
        .captures(header.trim())
        .and_then(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
}

/// Whether `header` looks like a score column, whatever its app prefix.
pub fn is_score_header(header: &str) -> bool {
    split_score_header(header).is_some()
}

fn is_comment_header(header: &str) -> bool {
    normalize(header).contains(COMMENT_TOKEN)
}

/// Every score column of a header list, in header order. Prefixes that
/// are not one of the supported apps are skipped.
pub fn find_score_columns(headers: &[String], lookup: CommentLookup) -> Vec<ScoreColumn> {
    let resolver = ColumnResolver::new(headers);
    let non_comment: Vec<&str> = headers
        .iter()
        .filter(|h| !is_comment_header(h))
        .map(String::as_str)
        .collect();

    headers
        .iter()
        .enumerate()
        .filter_map(|(index, header)| {
            let (prefix, scenario) = split_score_header(header)?;
            let app = App::from_prefix(prefix)?;

            let adjacent = headers
                .get(index + 1)
                .filter(|next| is_comment_header(next))
                .map(|_| index + 1);
            let comment_index = match lookup {
                CommentLookup::Adjacent => adjacent,
                CommentLookup::Fuzzy => adjacent.or_else(|| {
                    let target = format!("{} {} Yorum", app.display_name(), scenario);
                    resolver.resolve_position(&target, &non_comment)
                }),
            };

            Some(ScoreColumn {
                header: header.clone(),
                index,
                app,
                scenario: scenario.to_string(),
                test_area: scenario_label(scenario),
                comment_header: comment_index.map(|i| headers[i].clone()),
                comment_index,
            })
        })
        .collect()
}

// =============================================================================
// Expansion
// =============================================================================

/// Number participants in row order, at the first row holding a valid
/// score in any column.
fn number_in_row_order(
    source: &SourceTable,
    common: &CommonColumns,
    score_columns: &[ScoreColumn],
    config: &ExpanderConfig,
    numbers: &mut ParticipantNumbers,
) {
    for row in 0..source.row_count() {
        let scored = score_columns.iter().any(|column| {
            matches!(
                coerce_score(source.cell_at(row, column.index), &config.score_range),
                ScoreCell::Score(_)
            )
        });
        if !scored {
            continue;
        }
        if let Some(participant) = source.cell(row, common.participant).as_text() {
            numbers.number_for(&participant);
        }
    }
}

/// Expand one sheet into unsorted Functions records.
///
/// `numbers` is shared by all sheets of one conversion.
pub fn expand_records(
    source: &SourceTable,
    config: &ExpanderConfig,
    numbers: &mut ParticipantNumbers,
) -> (Vec<FunctionRecord>, ExpansionStats) {
    let resolver = ColumnResolver::new(&source.headers);
    let common = CommonColumns::resolve(&resolver);
    let score_columns = find_score_columns(&source.headers, config.comment_lookup);

    let mut stats = ExpansionStats {
        score_columns: score_columns.len(),
        unresolved: common.unresolved(),
        ..Default::default()
    };
    let mut records = Vec::new();

    if config.number_participants {
        number_in_row_order(source, &common, &score_columns, config, numbers);
    }

    for column in &score_columns {
        for row in 0..source.row_count() {
            let score = match coerce_score(source.cell_at(row, column.index), &config.score_range)
            {
                ScoreCell::Score(score) => score,
                ScoreCell::Missing => {
                    stats.empty_scores += 1;
                    continue;
                }
                ScoreCell::Malformed => {
                    stats.malformed_scores += 1;
                    continue;
                }
            };

            let context = common.row_context(source, row, column.app, config);
            let participant_no = context.participant_no(config, numbers);
            let comment = column
                .comment_index
                .and_then(|i| source.cell_at(row, i).as_text());

            records.push(FunctionRecord {
                phase: config.phase.clone(),
                participant: context.participant,
                participant_no,
                continuity: Continuity::classify(score, config.continuity_threshold),
                date: context.date,
                test_area: column.test_area.clone(),
                os: context.os,
                app: column.app,
                network: context.network,
                version: context.version,
                score,
                comment,
                device: context.device,
            });
        }
    }

    stats.rows_emitted = records.len();
    (records, stats)
}

/// Stable sort by (participant, date, app, test area).
pub fn sort_records(records: &mut [FunctionRecord]) {
    records.sort_by(|a, b| {
        Cell::from_text(a.participant.clone())
            .sort_cmp(&Cell::from_text(b.participant.clone()))
            .then_with(|| a.date.sort_cmp(&b.date))
            .then_with(|| a.app.value().cmp(b.app.value()))
            .then_with(|| a.test_area.cmp(&b.test_area))
    });
}

/// Sort records and project them onto the target column list.
pub fn assemble(mut records: Vec<FunctionRecord>, columns: &[String]) -> OutputTable {
    sort_records(&mut records);
    OutputTable::from_records(&records, columns)
}

/// Expand one sheet into a finished table with exactly `target_columns`.
pub fn expand(
    source: &SourceTable,
    phase: &str,
    continuity_threshold: i64,
    target_columns: &[String],
) -> OutputTable {
    let config = ExpanderConfig {
        functions_columns: target_columns.to_vec(),
        ..ExpanderConfig::report(phase, continuity_threshold)
    };
    let mut numbers = ParticipantNumbers::new();
    let (records, _) = expand_records(source, &config, &mut numbers);
    assemble(records, &config.functions_columns)
}
