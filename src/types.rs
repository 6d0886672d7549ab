//! Core data types for the alignment pipeline
//!
//! This module defines the typed records that flow through the pipeline:
//! raw events as exported by the observation software, their normalized
//! form, the per-second grids, and the merged/coded output rows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Event kinds recorded by the observation software
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Onset of a new state; the only kind retained for expansion
    #[serde(rename = "State start")]
    StateStart,
    /// End of a state
    #[serde(rename = "State stop")]
    StateStop,
    /// Instantaneous point event
    #[serde(rename = "Point")]
    Point,
    /// For custom/unknown kinds, carried through verbatim
    #[serde(untagged)]
    Other(String),
}

/// One raw coded event, immutable once read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Structured observation identifier, e.g. `"AM_3_2_J_FINAL"`
    pub observation: String,
    /// Behavior label as coded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
    /// Modifier slots as coded (up to four)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier_1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier_2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier_3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier_4: Option<String>,
    /// Session-relative event time as recorded (`"H:MM:SS.f"`, `"MM:SS"`,
    /// bare seconds, or blank)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_relative: Option<String>,
    /// Kind of record
    pub event_kind: EventKind,
}

/// One row of the session log: per-session metadata keyed like the events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLogEntry {
    /// Subject identifier
    pub subject: i64,
    /// Observation session index within the subject
    pub session: i64,
    /// Wall-clock session start, 12-hour format (`"6:43:57 PM"` or `"4:43 PM"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

/// Composite key identifying one observation session
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SessionKey {
    /// Subject identifier
    pub subject: i64,
    /// Observation session index within the subject
    pub session: i64,
}

impl SessionKey {
    pub fn new(subject: i64, session: i64) -> Self {
        Self { subject, session }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject, self.session)
    }
}

/// Track classification of a behavior label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    /// What the subject is doing
    Activity,
    /// Body position / movement
    Posture,
    /// Neither track; excluded from expansion
    Other,
}

/// A raw event after key parsing, time normalization, and track classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Session this event belongs to
    pub key: SessionKey,
    /// Track assigned from the behavior label
    pub track: Track,
    /// Parsed session-relative seconds; `None` when the raw string was
    /// unparseable
    pub seconds: Option<f64>,
    /// Behavior label as coded
    pub behavior: Option<String>,
    pub modifier_1: Option<String>,
    pub modifier_2: Option<String>,
    pub modifier_3: Option<String>,
    pub modifier_4: Option<String>,
    /// Wall-clock display time of the event (session start + relative offset)
    pub start_clock: Option<String>,
}

/// Attribute bundle carried forward through per-second expansion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarriedAttrs {
    pub behavior: Option<String>,
    pub modifier_1: Option<String>,
    pub modifier_2: Option<String>,
    pub modifier_3: Option<String>,
    pub modifier_4: Option<String>,
    /// Wall-clock display time of the governing event
    pub start_clock: Option<String>,
}

impl From<&NormalizedEvent> for CarriedAttrs {
    fn from(event: &NormalizedEvent) -> Self {
        Self {
            behavior: event.behavior.clone(),
            modifier_1: event.modifier_1.clone(),
            modifier_2: event.modifier_2.clone(),
            modifier_3: event.modifier_3.clone(),
            modifier_4: event.modifier_4.clone(),
            start_clock: event.start_clock.clone(),
        }
    }
}

/// One second of a track's dense grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSlot {
    /// Integer second within the session
    pub second: i64,
    /// Human-readable relative-time label for this slot
    pub rel_time: String,
    /// Carried-forward attributes; `None` only when no event precedes this
    /// second anywhere in the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<CarriedAttrs>,
}

/// Dense, gapless per-second grid for one (session, track)
///
/// Invariants: no second repeated; `slots.len() == end - start + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeGrid {
    pub key: SessionKey,
    pub track: Track,
    pub slots: Vec<GridSlot>,
}

impl TimeGrid {
    /// Empty grid for a session/track with no usable events
    pub fn empty(key: SessionKey, track: Track) -> Self {
        Self {
            key,
            track,
            slots: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// First second of the grid, if any
    pub fn start_second(&self) -> Option<i64> {
        self.slots.first().map(|s| s.second)
    }

    /// Last second of the grid, if any
    pub fn end_second(&self) -> Option<i64> {
        self.slots.last().map(|s| s.second)
    }
}

/// Outer join of the two tracks' grids at one (session, second)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedRecord {
    pub key: SessionKey,
    pub second: i64,
    /// Relative-time display label (rides the activity grid, gap-filled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_time: Option<String>,
    /// Wall-clock display time (rides the activity grid, gap-filled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_clock: Option<String>,
    /// Behavior from the activity track at this second, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_behavior: Option<String>,
    /// Behavior from the posture track at this second, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posture_behavior: Option<String>,
    /// Combined label after precedence resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
    /// Activity-track modifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier_1: Option<String>,
    /// Intensity-bearing modifier: posture-track value preferred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier_2: Option<String>,
    /// Activity-track modifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier_3: Option<String>,
}

/// A merged record plus its derived categorical columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodedRecord {
    /// Source merged record
    pub merged: MergedRecord,
    /// Canonical activity label resolved from the activity-track behavior
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broad_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waves_domain: Option<String>,
    /// Posture class resolved from the combined behavior
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posture_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posture_broad: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posture_waves: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waves_sedentary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waves_intensity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_type: Option<String>,
}

/// One row of the final per-second table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondRecord {
    pub subject: i64,
    pub session: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posture_waves: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_clock: Option<String>,
}

impl From<CodedRecord> for SecondRecord {
    fn from(coded: CodedRecord) -> Self {
        Self {
            subject: coded.merged.key.subject,
            session: coded.merged.key.session,
            rel_time: coded.merged.rel_time,
            activity_type: coded.activity_type,
            posture_waves: coded.posture_waves,
            intensity: coded.intensity,
            start_clock: coded.merged.start_clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_serialization() {
        let kind = EventKind::StateStart;
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "\"State start\"");

        let parsed: EventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, EventKind::StateStart);
    }

    #[test]
    fn test_event_kind_unknown_passthrough() {
        let parsed: EventKind = serde_json::from_str("\"State point\"").unwrap();
        assert_eq!(parsed, EventKind::Other("State point".to_string()));
    }

    #[test]
    fn test_raw_event_deserialization() {
        let json = r#"{
            "observation": "AM_3_2_J_FINAL",
            "behavior": "WRK- General",
            "modifier_3": "Office/Admin",
            "time_relative": "0:05:12.40",
            "event_kind": "State start"
        }"#;

        let event: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.observation, "AM_3_2_J_FINAL");
        assert_eq!(event.behavior.as_deref(), Some("WRK- General"));
        assert_eq!(event.modifier_1, None);
        assert_eq!(event.modifier_3.as_deref(), Some("Office/Admin"));
        assert_eq!(event.event_kind, EventKind::StateStart);
    }

    #[test]
    fn test_session_key_ordering() {
        let mut keys = vec![
            SessionKey::new(2, 1),
            SessionKey::new(1, 2),
            SessionKey::new(1, 1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                SessionKey::new(1, 1),
                SessionKey::new(1, 2),
                SessionKey::new(2, 1),
            ]
        );
        assert_eq!(SessionKey::new(3, 2).to_string(), "3/2");
    }

    #[test]
    fn test_time_grid_bounds() {
        let key = SessionKey::new(1, 1);
        let grid = TimeGrid {
            key,
            track: Track::Activity,
            slots: vec![
                GridSlot {
                    second: 4,
                    rel_time: "00:00:04".to_string(),
                    attrs: None,
                },
                GridSlot {
                    second: 5,
                    rel_time: "00:00:05".to_string(),
                    attrs: None,
                },
            ],
        };
        assert_eq!(grid.start_second(), Some(4));
        assert_eq!(grid.end_second(), Some(5));
        assert_eq!(grid.len(), 2);
        assert!(TimeGrid::empty(key, Track::Posture).is_empty());
    }
}
