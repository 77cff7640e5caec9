//! Fixed application set and scenario (test area) catalog.

use serde::{Deserialize, Serialize};

use crate::transform::resolver::normalize;

// =============================================================================
// Applications
// =============================================================================

/// One of the three messaging applications covered by the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum App {
    Bip,
    Whatsapp,
    Telegram,
}

impl App {
    pub const ALL: [App; 3] = [App::Bip, App::Whatsapp, App::Telegram];

    /// Prefix as it appears in survey column names.
    pub fn display_name(&self) -> &'static str {
        match self {
            App::Bip => "Bip",
            App::Whatsapp => "Whatsapp",
            App::Telegram => "Telegram",
        }
    }

    /// Value written to output rows.
    pub fn value(&self) -> &'static str {
        match self {
            App::Bip => "bip",
            App::Whatsapp => "whatsapp",
            App::Telegram => "telegram",
        }
    }

    /// Match a column-name prefix ("Bip", "WhatsApp", "TELEGRAM").
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        let wanted = normalize(prefix);
        App::ALL.into_iter().find(|app| app.value() == wanted)
    }
}

// =============================================================================
// Scenarios
// =============================================================================

/// Scenario code → test area label.
pub const SCENARIOS: &[(&str, &str)] = &[
    ("txt", "IM - 1-1 txt mesaj"),
    ("gm", "IM - Grup mesajlaşması"),
    ("im", "IM - Genel"),
    ("media", "IM - Medya paylaşımı"),
    ("voip", "Voip - 1-1 Görüntülü görüşme"),
    ("gsg", "Voip - Grup sesli görüşme"),
    ("ggg", "Voip - Grup görüntülü görüşme"),
    ("call", "Voip - 1-1 Sesli görüşme"),
];

/// Lookup code for free scenario text: normalized, alphanumerics only.
pub fn scenario_code(scenario: &str) -> String {
    normalize(scenario)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Test area label for scenario text; unknown codes keep the raw text.
pub fn scenario_label(scenario: &str) -> String {
    let code = scenario_code(scenario);
    SCENARIOS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| scenario.trim().to_string())
}
