//! Behavior-label normalization and track classification
//!
//! Labels arrive with inconsistent case, dash variants, and spacing. A
//! normalized form feeds both track classification here and the categorical
//! lookups in the coding scheme. The prefix sets that assign labels to
//! tracks are injected configuration, not hardcoded.

use crate::types::Track;
use serde::{Deserialize, Serialize};

/// Normalize a raw behavior label: trim, lowercase, unify en/em dashes to a
/// plain hyphen, collapse internal whitespace. Blank input yields `None`.
pub fn normalize_label(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase().replace(['\u{2013}', '\u{2014}'], "-");
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Prefix taxonomy assigning normalized behavior labels to tracks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackTaxonomy {
    /// Prefixes classified as the activity track
    pub activity_prefixes: Vec<String>,
    /// Prefixes classified as the posture track
    pub posture_prefixes: Vec<String>,
}

impl Default for TrackTaxonomy {
    fn default() -> Self {
        Self {
            activity_prefixes: [
                "sl-", "pc-", "ha-", "ca-", "wrk-", "edu-", "org-", "pur-", "eat-", "les-",
                "ex-", "trav-", "other-",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            posture_prefixes: ["sb-", "la-", "wa-", "sp-"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl TrackTaxonomy {
    /// Classify a raw behavior label into a track.
    ///
    /// Activity prefixes are tested first, then posture prefixes. Anything
    /// else, including null labels and not-coded sentinels, is `Other`.
    pub fn classify(&self, behavior: Option<&str>) -> Track {
        let Some(norm) = behavior.and_then(normalize_label) else {
            return Track::Other;
        };
        if self
            .activity_prefixes
            .iter()
            .any(|p| norm.starts_with(p.as_str()))
        {
            return Track::Activity;
        }
        if self
            .posture_prefixes
            .iter()
            .any(|p| norm.starts_with(p.as_str()))
        {
            return Track::Posture;
        }
        Track::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(
            normalize_label("  WRK-  General  "),
            Some("wrk- general".to_string())
        );
        assert_eq!(
            normalize_label("SB\u{2013} Sitting"),
            Some("sb- sitting".to_string())
        );
        assert_eq!(
            normalize_label("SB\u{2014} Lying"),
            Some("sb- lying".to_string())
        );
        assert_eq!(normalize_label(""), None);
        assert_eq!(normalize_label("   "), None);
    }

    #[test]
    fn test_classify_activity() {
        let taxonomy = TrackTaxonomy::default();
        assert_eq!(taxonomy.classify(Some("WRK- General")), Track::Activity);
        assert_eq!(
            taxonomy.classify(Some("trav- Passenger (Car/Truck/Motorcycle)")),
            Track::Activity
        );
        assert_eq!(taxonomy.classify(Some("SL- Sleep")), Track::Activity);
    }

    #[test]
    fn test_classify_posture() {
        let taxonomy = TrackTaxonomy::default();
        assert_eq!(taxonomy.classify(Some("SB- Sitting")), Track::Posture);
        assert_eq!(taxonomy.classify(Some("la- Stand and Move")), Track::Posture);
        assert_eq!(taxonomy.classify(Some("WA- Walk")), Track::Posture);
        assert_eq!(taxonomy.classify(Some("SP- Bike")), Track::Posture);
    }

    #[test]
    fn test_classify_other() {
        let taxonomy = TrackTaxonomy::default();
        assert_eq!(taxonomy.classify(Some("Private/Not Coded")), Track::Other);
        assert_eq!(taxonomy.classify(Some("Start Posture")), Track::Other);
        assert_eq!(taxonomy.classify(None), Track::Other);
        assert_eq!(taxonomy.classify(Some("  ")), Track::Other);
    }

    #[test]
    fn test_activity_prefix_wins_over_posture() {
        // "trav-" is an activity prefix even though walking is also a posture
        let taxonomy = TrackTaxonomy::default();
        assert_eq!(taxonomy.classify(Some("TRAV- Walking")), Track::Activity);
    }
}
