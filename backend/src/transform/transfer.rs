//! Upload/Download sub-transform.
//!
//! A transfer sheet carries, per app, up to four trials (photo/video ×
//! upload/download), each measured by a local size, a counterpart size and
//! an elapsed time. Every trial with data becomes one [`TransferRecord`].
//!
//! Measurement headers are resolved together with
//! [`ColumnResolver::resolve_unique`] so near-identical phrasings
//! ("Fotoğraf Gönderme Süresi" / "Fotoğraf İndirme Süresi") never share
//! a column.

use serde::Serialize;

use crate::models::{App, Cell, ContentKind, Direction, OutputTable, SourceTable, TransferRecord};
use crate::transform::expander::{CommonColumns, ExpanderConfig, ParticipantNumbers};
use crate::transform::normalize::coerce_number;
use crate::transform::resolver::ColumnResolver;

/// Trials in emission order.
pub const TRIALS: [(ContentKind, Direction); 4] = [
    (ContentKind::Photo, Direction::Upload),
    (ContentKind::Photo, Direction::Download),
    (ContentKind::Video, Direction::Upload),
    (ContentKind::Video, Direction::Download),
];

/// Header phrasings per measurement. `{app}` and `{kind}` are substituted.
mod phrasings {
    pub const UPLOAD_SIZE: &[&str] = &[
        "{app} Gönderilen {kind} Boyutu",
        "{app} {kind} Gönderilen Boyut",
        "{app} {kind} Upload Boyut",
    ];
    pub const UPLOAD_COUNTERPART: &[&str] = &[
        "{app} Alıcıya Ulaşan {kind} Boyutu",
        "{app} {kind} Alınan Boyut",
    ];
    pub const UPLOAD_ELAPSED: &[&str] = &["{app} {kind} Gönderme Süresi", "{app} {kind} Upload Süresi"];

    pub const DOWNLOAD_SIZE: &[&str] = &[
        "{app} İndirilen {kind} Boyutu",
        "{app} {kind} İndirilen Boyut",
        "{app} {kind} Download Boyut",
    ];
    pub const DOWNLOAD_COUNTERPART: &[&str] = &[
        "{app} Gönderenin {kind} Boyutu",
        "{app} {kind} Kaynak Boyut",
    ];
    pub const DOWNLOAD_ELAPSED: &[&str] =
        &["{app} {kind} İndirme Süresi", "{app} {kind} Download Süresi"];
}

/// Survey wording of a content kind.
pub fn kind_word(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Photo => "Fotoğraf",
        ContentKind::Video => "Video",
    }
}

fn expand_phrasings(templates: &[&str], app: App, kind: ContentKind) -> Vec<String> {
    templates
        .iter()
        .map(|t| {
            t.replace("{app}", app.display_name())
                .replace("{kind}", kind_word(kind))
        })
        .collect()
}

fn measure_phrasings(app: App, kind: ContentKind, direction: Direction) -> [Vec<String>; 3] {
    let (size, counterpart, elapsed) = match direction {
        Direction::Upload => (
            phrasings::UPLOAD_SIZE,
            phrasings::UPLOAD_COUNTERPART,
            phrasings::UPLOAD_ELAPSED,
        ),
        Direction::Download => (
            phrasings::DOWNLOAD_SIZE,
            phrasings::DOWNLOAD_COUNTERPART,
            phrasings::DOWNLOAD_ELAPSED,
        ),
    };
    [
        expand_phrasings(size, app, kind),
        expand_phrasings(counterpart, app, kind),
        expand_phrasings(elapsed, app, kind),
    ]
}

// =============================================================================
// Column discovery
// =============================================================================

/// Resolved measurement headers of one (app, kind, direction) trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialColumns<'h> {
    pub app: App,
    pub kind: ContentKind,
    pub direction: Direction,
    pub size: Option<&'h str>,
    pub counterpart_size: Option<&'h str>,
    pub elapsed: Option<&'h str>,
}

impl TrialColumns<'_> {
    pub fn is_resolved(&self) -> bool {
        self.size.is_some() || self.counterpart_size.is_some() || self.elapsed.is_some()
    }
}

/// Resolve every trial's measurement headers on one sheet.
pub fn resolve_trials<'h>(resolver: &ColumnResolver<'h>) -> Vec<TrialColumns<'h>> {
    let keys: Vec<(App, ContentKind, Direction)> = App::ALL
        .into_iter()
        .flat_map(|app| TRIALS.into_iter().map(move |(kind, dir)| (app, kind, dir)))
        .collect();

    let candidates: Vec<Vec<String>> = keys
        .iter()
        .flat_map(|&(app, kind, dir)| measure_phrasings(app, kind, dir))
        .collect();
    let fields: Vec<&[String]> = candidates.iter().map(Vec::as_slice).collect();
    let found = resolver.resolve_unique(&fields);

    keys.into_iter()
        .zip(found.chunks(3))
        .map(|((app, kind, direction), headers)| TrialColumns {
            app,
            kind,
            direction,
            size: headers[0],
            counterpart_size: headers[1],
            elapsed: headers[2],
        })
        .collect()
}

// =============================================================================
// Expansion
// =============================================================================

/// Counters for the transfer sheet.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferStats {
    /// Trials with at least one resolved measurement column.
    pub trial_columns: usize,
    pub rows_emitted: usize,
    /// Upload trials with data but no outbound size.
    pub uploads_without_size: usize,
}

impl TransferStats {
    pub fn merge(&mut self, other: TransferStats) {
        self.trial_columns += other.trial_columns;
        self.rows_emitted += other.rows_emitted;
        self.uploads_without_size += other.uploads_without_size;
    }
}

/// `size / elapsed`, only for a strictly positive elapsed time.
pub fn speed(size: Option<f64>, elapsed: Option<f64>) -> Option<f64> {
    match (size, elapsed) {
        (Some(size), Some(elapsed)) if elapsed > 0.0 => Some(size / elapsed),
        _ => None,
    }
}

/// Expand one transfer sheet into unsorted records.
pub fn expand_transfers(
    source: &SourceTable,
    config: &ExpanderConfig,
    numbers: &mut ParticipantNumbers,
) -> (Vec<TransferRecord>, TransferStats) {
    let resolver = ColumnResolver::new(&source.headers);
    let common = CommonColumns::resolve(&resolver);
    let trials: Vec<TrialColumns> = resolve_trials(&resolver)
        .into_iter()
        .filter(TrialColumns::is_resolved)
        .collect();

    let mut stats = TransferStats {
        trial_columns: trials.len(),
        ..Default::default()
    };
    let mut records = Vec::new();

    for row in 0..source.row_count() {
        for trial in &trials {
            let measure = |header: Option<&str>| coerce_number(source.cell(row, header));
            let size = measure(trial.size);
            let counterpart_size = measure(trial.counterpart_size);
            let elapsed = measure(trial.elapsed);

            if size.is_none() && counterpart_size.is_none() && elapsed.is_none() {
                continue;
            }
            if trial.direction == Direction::Upload && size.is_none() {
                stats.uploads_without_size += 1;
                continue;
            }

            let context = common.row_context(source, row, trial.app, config);
            let participant_no = context.participant_no(config, numbers);

            records.push(TransferRecord {
                phase: config.phase.clone(),
                participant: context.participant,
                participant_no,
                date: context.date,
                os: context.os,
                app: trial.app,
                network: context.network,
                version: context.version,
                direction: trial.direction,
                kind: trial.kind,
                size,
                counterpart_size,
                elapsed,
                speed: speed(size, elapsed),
                device: context.device,
            });
        }
    }

    stats.rows_emitted = records.len();
    (records, stats)
}

/// Stable sort by (participant, date, app).
pub fn sort_transfers(records: &mut [TransferRecord]) {
    records.sort_by(|a, b| {
        Cell::from_text(a.participant.clone())
            .sort_cmp(&Cell::from_text(b.participant.clone()))
            .then_with(|| a.date.sort_cmp(&b.date))
            .then_with(|| a.app.value().cmp(b.app.value()))
    });
}

pub fn assemble(mut records: Vec<TransferRecord>, columns: &[String]) -> OutputTable {
    sort_transfers(&mut records);
    OutputTable::from_records(&records, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::columns;

    fn h(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn t(s: &str) -> Cell {
        Cell::text(s)
    }

    fn config() -> ExpanderConfig {
        ExpanderConfig::report("Faz 6", 4)
    }

    #[test]
    fn test_speed() {
        assert_eq!(speed(Some(10.0), Some(0.0)), None);
        assert_eq!(speed(Some(10.0), Some(5.0)), Some(2.0));
        assert_eq!(speed(Some(10.0), None), None);
        assert_eq!(speed(None, Some(5.0)), None);
        assert_eq!(speed(Some(10.0), Some(-1.0)), None);
    }

    #[test]
    fn test_resolve_trials_keeps_directions_apart() {
        let headers = h(&[
            "Bip Gönderilen Fotoğraf Boyutu",
            "Bip Fotoğraf Gönderme Süresi",
            "Bip İndirilen Fotoğraf Boyutu",
            "Bip Fotoğraf İndirme Süresi",
        ]);
        let resolver = ColumnResolver::new(&headers);
        let trials = resolve_trials(&resolver);

        let find = |kind: ContentKind, dir: Direction| {
            trials
                .iter()
                .find(|c| c.app == App::Bip && c.kind == kind && c.direction == dir)
                .cloned()
                .unwrap()
        };

        let up = find(ContentKind::Photo, Direction::Upload);
        assert_eq!(up.size, Some("Bip Gönderilen Fotoğraf Boyutu"));
        assert_eq!(up.elapsed, Some("Bip Fotoğraf Gönderme Süresi"));
        assert_eq!(up.counterpart_size, None);

        let down = find(ContentKind::Photo, Direction::Download);
        assert_eq!(down.size, Some("Bip İndirilen Fotoğraf Boyutu"));
        assert_eq!(down.elapsed, Some("Bip Fotoğraf İndirme Süresi"));

        assert!(trials
            .iter()
            .filter(|c| c.app != App::Bip || c.kind == ContentKind::Video)
            .all(|c| !c.is_resolved()));
    }

    #[test]
    fn test_upload_requires_size() {
        let source = SourceTable::new(
            "transfer",
            h(&[
                "Ad Soyad",
                "Whatsapp Gönderilen Video Boyutu",
                "Whatsapp Video Gönderme Süresi",
            ]),
        )
        .with_row(vec![t("Ali"), Cell::Number(10.0), Cell::Number(5.0)])
        .with_row(vec![t("Veli"), Cell::Empty, Cell::Number(4.0)])
        .with_row(vec![t("Can"), Cell::Empty, Cell::Empty]);

        let (records, stats) = expand_transfers(&source, &config(), &mut ParticipantNumbers::new());

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.participant.as_deref(), Some("Ali"));
        assert_eq!(r.app, App::Whatsapp);
        assert_eq!(r.kind, ContentKind::Video);
        assert_eq!(r.direction, Direction::Upload);
        assert_eq!(r.speed, Some(2.0));
        assert_eq!(stats.uploads_without_size, 1);
        assert_eq!(stats.rows_emitted, 1);
    }

    #[test]
    fn test_download_emitted_on_any_measure() {
        let source = SourceTable::new(
            "transfer",
            h(&[
                "Ad Soyad",
                "Telegram İndirilen Fotoğraf Boyutu",
                "Telegram Fotoğraf İndirme Süresi",
            ]),
        )
        .with_row(vec![t("Ali"), Cell::Empty, t("3,5")])
        .with_row(vec![t("Veli"), t("12 MB"), Cell::Number(0.0)]);

        let (records, _) = expand_transfers(&source, &config(), &mut ParticipantNumbers::new());

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].size, None);
        assert_eq!(records[0].elapsed, Some(3.5));
        assert_eq!(records[0].speed, None);
        assert_eq!(records[1].size, Some(12.0));
        assert_eq!(records[1].speed, None);
        assert!(records.iter().all(|r| r.direction == Direction::Download));
    }

    #[test]
    fn test_numbering_shared_with_functions_sheet() {
        let source = SourceTable::new(
            "transfer",
            h(&["Ad Soyad", "Bip Gönderilen Fotoğraf Boyutu"]),
        )
        .with_row(vec![t("Veli"), Cell::Number(1.0)])
        .with_row(vec![t("Ali"), Cell::Number(2.0)]);

        let mut numbers = ParticipantNumbers::new();
        numbers.number_for("Ali");
        let (records, _) = expand_transfers(&source, &config(), &mut numbers);

        assert_eq!(records[0].participant_no, Some(2));
        assert_eq!(records[1].participant_no, Some(1));
    }

    #[test]
    fn test_assemble_sorts_and_projects() {
        let source = SourceTable::new(
            "transfer",
            h(&[
                "Ad Soyad",
                "Tarih",
                "Whatsapp Gönderilen Fotoğraf Boyutu",
                "Bip Gönderilen Fotoğraf Boyutu",
            ]),
        )
        .with_row(vec![t("Veli"), t("2024-03-02"), Cell::Number(4.0), Cell::Number(6.0)])
        .with_row(vec![t("Ali"), t("2024-03-02"), Cell::Number(8.0), Cell::Empty]);

        let (records, _) = expand_transfers(&source, &config(), &mut ParticipantNumbers::new());
        let table = assemble(records, &columns::owned(columns::TRANSFERS));

        assert_eq!(table.columns, columns::owned(columns::TRANSFERS));
        let who: Vec<_> = table
            .column(columns::PARTICIPANT)
            .iter()
            .map(|c| c.as_text().unwrap())
            .collect();
        let apps: Vec<_> = table
            .column(columns::APP)
            .iter()
            .map(|c| c.as_text().unwrap())
            .collect();
        assert_eq!(who, vec!["Ali", "Veli", "Veli"]);
        assert_eq!(apps, vec!["whatsapp", "bip", "whatsapp"]);
        assert_eq!(table.column(columns::DIRECTION)[0], &t("upload"));
        assert_eq!(table.column(columns::CONTENT)[0], &t("photo"));
        assert_eq!(table.column(columns::SPEED)[0], &Cell::Empty);
    }
}
