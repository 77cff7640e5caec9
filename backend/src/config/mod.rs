//! Conversion options.
//!
//! One [`Profile`] value picks the transform variant; individual switches
//! can still be overridden. Options come from CLI flags, multipart form
//! fields, or a JSON file:
//!
//! ```json
//! {
//!   "phase": "Faz 7",
//!   "continuity_threshold": 4,
//!   "profile": "report",
//!   "os_keywords": { "ios": ["iphone", "ipad"], "android": ["samsung", "tecno"] }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::models::columns;
use crate::transform::expander::ExpanderConfig;

/// Environment variable naming a default config file.
pub const CONFIG_ENV: &str = "PIVOTLOAD_CONFIG";

/// Environment variable overriding the server port.
pub const PORT_ENV: &str = "PIVOTLOAD_PORT";

// =============================================================================
// Switches
// =============================================================================

/// Transform variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Single nine-column Functions table, no OS inference, no numbering,
    /// no transfers.
    Legacy,
    /// Two-sheet report build.
    #[default]
    Report,
}

impl std::str::FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(Profile::Legacy),
            "report" => Ok(Profile::Report),
            other => Err(format!("unknown profile '{}' (expected legacy or report)", other)),
        }
    }
}

/// How the comment column of a score column is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentLookup {
    /// Only the header right after the score column.
    #[default]
    Adjacent,
    /// Adjacent first, then a fuzzy search for "<App> <scenario> Yorum".
    Fuzzy,
}

/// Device keyword tables used to infer the OS from device text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsKeywords {
    pub ios: Vec<String>,
    pub android: Vec<String>,
}

impl Default for OsKeywords {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            ios: owned(&["iphone", "ipad", "ios", "apple"]),
            android: owned(&[
                "samsung", "galaxy", "xiaomi", "redmi", "poco", "huawei", "honor", "oppo",
                "vivo", "realme", "oneplus", "pixel", "google", "motorola", "nokia", "sony",
                "lg", "tecno", "infinix", "casper", "reeder", "tcl",
            ]),
        }
    }
}

// =============================================================================
// Options
// =============================================================================

/// Per-call conversion options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Phase label written to every row.
    pub phase: String,

    /// Minimum score counted as continuity "OK" (1..=5).
    pub continuity_threshold: i64,

    /// Accepted score range; scores outside it are dropped as malformed.
    pub score_range: (i64, i64),

    pub profile: Profile,

    /// Column list for the Functions table (template header row).
    pub functions_columns: Option<Vec<String>>,

    /// Column list for the Upload/Download table.
    pub transfer_columns: Option<Vec<String>>,

    pub comment_lookup: CommentLookup,

    pub os_keywords: OsKeywords,

    /// Overrides of the profile's switches.
    pub infer_os: Option<bool>,
    pub number_participants: Option<bool>,
    pub include_transfers: Option<bool>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            phase: "Faz 6".to_string(),
            continuity_threshold: 4,
            score_range: (1, 5),
            profile: Profile::default(),
            functions_columns: None,
            transfer_columns: None,
            comment_lookup: CommentLookup::default(),
            os_keywords: OsKeywords::default(),
            infer_os: None,
            number_participants: None,
            include_transfers: None,
        }
    }
}

impl ConvertOptions {
    /// Load options from a JSON file; absent keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Resolve profile, overrides and defaults into the expander's config.
    pub fn expander_config(&self) -> Result<ExpanderConfig, ConfigError> {
        if !(1..=5).contains(&self.continuity_threshold) {
            return Err(ConfigError::InvalidThreshold(self.continuity_threshold));
        }
        let (min, max) = self.score_range;
        if min > max {
            return Err(ConfigError::InvalidScoreRange { min, max });
        }

        let report = self.profile == Profile::Report;
        let default_functions = if report {
            columns::REPORT_FUNCTIONS
        } else {
            columns::LEGACY_FUNCTIONS
        };

        Ok(ExpanderConfig {
            phase: self.phase.clone(),
            continuity_threshold: self.continuity_threshold,
            score_range: min..=max,
            infer_os: self.infer_os.unwrap_or(report),
            number_participants: self.number_participants.unwrap_or(report),
            include_transfers: self.include_transfers.unwrap_or(report),
            comment_lookup: self.comment_lookup,
            os_keywords: self.os_keywords.clone(),
            functions_columns: self
                .functions_columns
                .clone()
                .unwrap_or_else(|| columns::owned(default_functions)),
            transfer_columns: self
                .transfer_columns
                .clone()
                .unwrap_or_else(|| columns::owned(columns::TRANSFERS)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = ConvertOptions::default();
        assert_eq!(opts.phase, "Faz 6");
        assert_eq!(opts.continuity_threshold, 4);
        assert_eq!(opts.profile, Profile::Report);
        assert_eq!(opts.comment_lookup, CommentLookup::Adjacent);
    }

    #[test]
    fn test_profile_switches() {
        let report = ConvertOptions::default().expander_config().unwrap();
        assert!(report.infer_os && report.number_participants && report.include_transfers);
        assert_eq!(report.functions_columns.len(), columns::REPORT_FUNCTIONS.len());

        let legacy = ConvertOptions {
            profile: Profile::Legacy,
            ..Default::default()
        }
        .expander_config()
        .unwrap();
        assert!(!legacy.infer_os && !legacy.number_participants && !legacy.include_transfers);
        assert_eq!(legacy.functions_columns, columns::owned(columns::LEGACY_FUNCTIONS));
    }

    #[test]
    fn test_overrides_beat_profile() {
        let config = ConvertOptions {
            profile: Profile::Legacy,
            infer_os: Some(true),
            functions_columns: Some(vec!["Faz".into(), "Puan".into()]),
            ..Default::default()
        }
        .expander_config()
        .unwrap();
        assert!(config.infer_os);
        assert!(!config.number_participants);
        assert_eq!(config.functions_columns, vec!["Faz", "Puan"]);
    }

    #[test]
    fn test_threshold_validation() {
        for bad in [0, 6, -1] {
            let opts = ConvertOptions {
                continuity_threshold: bad,
                ..Default::default()
            };
            assert!(matches!(
                opts.expander_config(),
                Err(ConfigError::InvalidThreshold(t)) if t == bad
            ));
        }
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let opts: ConvertOptions =
            serde_json::from_str(r#"{ "phase": "Faz 7", "profile": "legacy" }"#).unwrap();
        assert_eq!(opts.phase, "Faz 7");
        assert_eq!(opts.profile, Profile::Legacy);
        assert_eq!(opts.continuity_threshold, 4);
        assert!(opts.os_keywords.ios.contains(&"iphone".to_string()));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, r#"{ "continuity_threshold": 3, "comment_lookup": "fuzzy" }"#)
            .unwrap();

        let opts = ConvertOptions::from_file(&path).unwrap();
        assert_eq!(opts.continuity_threshold, 3);
        assert_eq!(opts.comment_lookup, CommentLookup::Fuzzy);

        assert!(matches!(
            ConvertOptions::from_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_profile_from_str() {
        assert_eq!("Legacy".parse::<Profile>(), Ok(Profile::Legacy));
        assert!("other".parse::<Profile>().is_err());
    }
}
