//! Long-form output records and the column names they project onto.

use serde::{Deserialize, Serialize};

use super::catalog::App;
use super::Cell;
use crate::transform::resolver::compact;

/// Output column names as they appear in the report template.
pub mod columns {
    pub const PHASE: &str = "Faz";
    pub const PARTICIPANT: &str = "Katılımcı";
    pub const PARTICIPANT_NO: &str = "Katılımcı No";
    pub const CONTINUITY: &str = "Devamlılık";
    pub const DATE: &str = "Tarih";
    pub const TEST_AREA: &str = "Test Alanı";
    pub const OS: &str = "OS";
    pub const APP: &str = "Uygulama";
    pub const NETWORK: &str = "Network";
    pub const VERSION: &str = "Versiyon";
    pub const SCORE: &str = "Puan";
    pub const COMMENT: &str = "Yorum";
    pub const DEVICE: &str = "Cihaz";

    pub const DIRECTION: &str = "Yön";
    pub const CONTENT: &str = "İçerik";
    pub const SIZE: &str = "Boyut";
    pub const COUNTERPART_SIZE: &str = "Karşı Boyut";
    pub const ELAPSED: &str = "Süre";
    pub const SPEED: &str = "Hız";

    /// The original single-table layout.
    pub const LEGACY_FUNCTIONS: &[&str] = &[
        PHASE, TEST_AREA, OS, APP, NETWORK, VERSION, SCORE, COMMENT, DEVICE,
    ];

    /// "Fonksiyonlar Data" sheet of the report template.
    pub const REPORT_FUNCTIONS: &[&str] = &[
        PHASE,
        PARTICIPANT,
        PARTICIPANT_NO,
        CONTINUITY,
        DATE,
        TEST_AREA,
        OS,
        APP,
        NETWORK,
        VERSION,
        SCORE,
        "Bip Yorum",
        "Whatsapp Yorum",
        "Telegram Yorum",
        DEVICE,
    ];

    /// "UploadDownload Data" sheet of the report template.
    pub const TRANSFERS: &[&str] = &[
        PHASE,
        PARTICIPANT,
        PARTICIPANT_NO,
        DATE,
        OS,
        APP,
        NETWORK,
        VERSION,
        DIRECTION,
        CONTENT,
        SIZE,
        COUNTERPART_SIZE,
        ELAPSED,
        SPEED,
        DEVICE,
    ];

    pub fn owned(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }
}

/// A record type that can be projected onto arbitrary column lists.
pub trait Record {
    type Field: Copy;

    /// Field produced for a column name, matched case/diacritic/space-insensitively.
    fn field_for(column: &str) -> Option<Self::Field>;

    fn get(&self, field: Self::Field) -> Cell;
}

fn lookup<F: Copy>(table: &[(&str, F)], column: &str) -> Option<F> {
    let key = compact(column);
    table
        .iter()
        .find(|(name, _)| compact(name) == key)
        .map(|(_, field)| *field)
}

// =============================================================================
// Continuity
// =============================================================================

/// Pass/fail verdict of a score against the continuity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Continuity {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NOK")]
    Nok,
}

impl Continuity {
    pub fn classify(score: i64, threshold: i64) -> Self {
        if score >= threshold {
            Continuity::Ok
        } else {
            Continuity::Nok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Continuity::Ok => "OK",
            Continuity::Nok => "NOK",
        }
    }
}

// =============================================================================
// Functions records
// =============================================================================

/// One participant rating one scenario on one app.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionRecord {
    pub phase: String,
    pub participant: Option<String>,
    /// Sequence tag assigned on first encounter, when numbering is enabled.
    pub participant_no: Option<usize>,
    pub continuity: Continuity,
    /// Parsed date, or the raw value when no format matched.
    pub date: Cell,
    pub test_area: String,
    pub os: Option<String>,
    pub app: App,
    pub network: Option<String>,
    pub version: Option<String>,
    pub score: i64,
    pub comment: Option<String>,
    pub device: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionField {
    Phase,
    Participant,
    ParticipantNo,
    Continuity,
    Date,
    TestArea,
    Os,
    App,
    Network,
    Version,
    Score,
    /// Comment regardless of app.
    Comment,
    /// Comment only on rows of this app.
    AppComment(App),
    Device,
}

const FUNCTION_FIELDS: &[(&str, FunctionField)] = &[
    (columns::PHASE, FunctionField::Phase),
    (columns::PARTICIPANT, FunctionField::Participant),
    (columns::PARTICIPANT_NO, FunctionField::ParticipantNo),
    (columns::CONTINUITY, FunctionField::Continuity),
    (columns::DATE, FunctionField::Date),
    (columns::TEST_AREA, FunctionField::TestArea),
    (columns::OS, FunctionField::Os),
    (columns::APP, FunctionField::App),
    (columns::NETWORK, FunctionField::Network),
    (columns::VERSION, FunctionField::Version),
    (columns::SCORE, FunctionField::Score),
    (columns::COMMENT, FunctionField::Comment),
    (columns::DEVICE, FunctionField::Device),
];

impl Record for FunctionRecord {
    type Field = FunctionField;

    fn field_for(column: &str) -> Option<FunctionField> {
        lookup(FUNCTION_FIELDS, column).or_else(|| {
            let key = compact(column);
            App::ALL
                .into_iter()
                .find(|app| compact(&format!("{} {}", app.display_name(), columns::COMMENT)) == key)
                .map(FunctionField::AppComment)
        })
    }

    fn get(&self, field: FunctionField) -> Cell {
        match field {
            FunctionField::Phase => Cell::text(&self.phase),
            FunctionField::Participant => Cell::from_text(self.participant.clone()),
            FunctionField::ParticipantNo => {
                Cell::from_text(self.participant_no.map(|n| n.to_string()))
            }
            FunctionField::Continuity => Cell::text(self.continuity.as_str()),
            FunctionField::Date => self.date.clone(),
            FunctionField::TestArea => Cell::text(&self.test_area),
            FunctionField::Os => Cell::from_text(self.os.clone()),
            FunctionField::App => Cell::text(self.app.value()),
            FunctionField::Network => Cell::from_text(self.network.clone()),
            FunctionField::Version => Cell::from_text(self.version.clone()),
            FunctionField::Score => Cell::Number(self.score as f64),
            FunctionField::Comment => Cell::from_text(self.comment.clone()),
            FunctionField::AppComment(app) if app == self.app => {
                Cell::from_text(self.comment.clone())
            }
            FunctionField::AppComment(_) => Cell::Empty,
            FunctionField::Device => Cell::from_text(self.device.clone()),
        }
    }
}

// =============================================================================
// Transfer records
// =============================================================================

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upload,
    Download,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upload => "upload",
            Direction::Download => "download",
        }
    }
}

/// Transferred content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Photo,
    Video,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Photo => "photo",
            ContentKind::Video => "video",
        }
    }
}

/// One file transfer trial by one participant on one app.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRecord {
    pub phase: String,
    pub participant: Option<String>,
    pub participant_no: Option<usize>,
    pub date: Cell,
    pub os: Option<String>,
    pub app: App,
    pub network: Option<String>,
    pub version: Option<String>,
    pub direction: Direction,
    pub kind: ContentKind,
    pub size: Option<f64>,
    pub counterpart_size: Option<f64>,
    pub elapsed: Option<f64>,
    /// `size / elapsed`, only when elapsed is strictly positive.
    pub speed: Option<f64>,
    pub device: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferField {
    Phase,
    Participant,
    ParticipantNo,
    Date,
    Os,
    App,
    Network,
    Version,
    Direction,
    Content,
    Size,
    CounterpartSize,
    Elapsed,
    Speed,
    Device,
}

const TRANSFER_FIELDS: &[(&str, TransferField)] = &[
    (columns::PHASE, TransferField::Phase),
    (columns::PARTICIPANT, TransferField::Participant),
    (columns::PARTICIPANT_NO, TransferField::ParticipantNo),
    (columns::DATE, TransferField::Date),
    (columns::OS, TransferField::Os),
    (columns::APP, TransferField::App),
    (columns::NETWORK, TransferField::Network),
    (columns::VERSION, TransferField::Version),
    (columns::DIRECTION, TransferField::Direction),
    (columns::CONTENT, TransferField::Content),
    (columns::SIZE, TransferField::Size),
    (columns::COUNTERPART_SIZE, TransferField::CounterpartSize),
    (columns::ELAPSED, TransferField::Elapsed),
    (columns::SPEED, TransferField::Speed),
    (columns::DEVICE, TransferField::Device),
];

impl Record for TransferRecord {
    type Field = TransferField;

    fn field_for(column: &str) -> Option<TransferField> {
        lookup(TRANSFER_FIELDS, column)
    }

    fn get(&self, field: TransferField) -> Cell {
        match field {
            TransferField::Phase => Cell::text(&self.phase),
            TransferField::Participant => Cell::from_text(self.participant.clone()),
            TransferField::ParticipantNo => {
                Cell::from_text(self.participant_no.map(|n| n.to_string()))
            }
            TransferField::Date => self.date.clone(),
            TransferField::Os => Cell::from_text(self.os.clone()),
            TransferField::App => Cell::text(self.app.value()),
            TransferField::Network => Cell::from_text(self.network.clone()),
            TransferField::Version => Cell::from_text(self.version.clone()),
            TransferField::Direction => Cell::text(self.direction.as_str()),
            TransferField::Content => Cell::text(self.kind.as_str()),
            TransferField::Size => Cell::from_number(self.size),
            TransferField::CounterpartSize => Cell::from_number(self.counterpart_size),
            TransferField::Elapsed => Cell::from_number(self.elapsed),
            TransferField::Speed => Cell::from_number(self.speed),
            TransferField::Device => Cell::from_text(self.device.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuity_threshold() {
        assert_eq!(Continuity::classify(3, 4), Continuity::Nok);
        assert_eq!(Continuity::classify(4, 4), Continuity::Ok);
        assert_eq!(Continuity::classify(5, 4), Continuity::Ok);
    }

    #[test]
    fn test_field_lookup_is_forgiving() {
        assert_eq!(
            FunctionRecord::field_for("TEST ALANI"),
            Some(FunctionField::TestArea)
        );
        assert_eq!(
            FunctionRecord::field_for("Katilimci No"),
            Some(FunctionField::ParticipantNo)
        );
        assert_eq!(
            FunctionRecord::field_for("WhatsApp Yorum"),
            Some(FunctionField::AppComment(App::Whatsapp))
        );
        assert_eq!(FunctionRecord::field_for("Notlar"), None);
        assert_eq!(TransferRecord::field_for("Hiz"), Some(TransferField::Speed));
    }

    #[test]
    fn test_app_comment_slot_routing() {
        let record = FunctionRecord {
            phase: "Faz 6".into(),
            participant: None,
            participant_no: None,
            continuity: Continuity::Ok,
            date: Cell::Empty,
            test_area: "IM - Genel".into(),
            os: None,
            app: App::Telegram,
            network: None,
            version: None,
            score: 5,
            comment: Some("hızlı".into()),
            device: None,
        };

        assert_eq!(
            record.get(FunctionField::AppComment(App::Telegram)),
            Cell::text("hızlı")
        );
        assert_eq!(record.get(FunctionField::AppComment(App::Bip)), Cell::Empty);
        assert_eq!(record.get(FunctionField::Score), Cell::Number(5.0));
    }
}
