//! NDJSON / JSON ingestion for events and session-log rows
//!
//! Reading spreadsheet exports into these shapes happens upstream; this
//! module only parses the serialized forms and offers a batch pre-flight
//! check for the common data defects.

use crate::error::PipelineError;
use crate::sessions::parse_session_key;
use crate::timeparse::parse_relative_seconds;
use crate::types::{EventKind, RawEvent, SessionLogEntry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Adapter for parsing event and session-log datasets
pub struct EventAdapter;

impl EventAdapter {
    /// Parse a JSON array of raw events
    pub fn parse_events_array(json: &str) -> Result<Vec<RawEvent>, PipelineError> {
        let events: Vec<RawEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse newline-delimited JSON of raw events
    pub fn parse_events_ndjson(ndjson: &str) -> Result<Vec<RawEvent>, PipelineError> {
        parse_ndjson(ndjson)
    }

    /// Parse a JSON array of session-log rows
    pub fn parse_log_array(json: &str) -> Result<Vec<SessionLogEntry>, PipelineError> {
        let entries: Vec<SessionLogEntry> = serde_json::from_str(json)?;
        Ok(entries)
    }

    /// Parse newline-delimited JSON of session-log rows
    pub fn parse_log_ndjson(ndjson: &str) -> Result<Vec<SessionLogEntry>, PipelineError> {
        parse_ndjson(ndjson)
    }

    /// Pre-flight check over a batch of events.
    ///
    /// Flags state-start events whose observation identifier will not split
    /// into a session key, or whose relative time will not parse. Both are
    /// non-fatal in the pipeline (such events are dropped); the findings
    /// exist for operator follow-up.
    pub fn validate_events(events: &[RawEvent]) -> Vec<EventFinding> {
        events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.event_kind == EventKind::StateStart)
            .filter_map(|(index, event)| {
                if parse_session_key(&event.observation).is_none() {
                    return Some(EventFinding {
                        index,
                        observation: event.observation.clone(),
                        issue: EventIssue::MalformedObservation,
                    });
                }
                let parses = event
                    .time_relative
                    .as_deref()
                    .and_then(parse_relative_seconds)
                    .is_some();
                if !parses {
                    return Some(EventFinding {
                        index,
                        observation: event.observation.clone(),
                        issue: EventIssue::UnparseableTime,
                    });
                }
                None
            })
            .collect()
    }
}

fn parse_ndjson<T: DeserializeOwned>(ndjson: &str) -> Result<Vec<T>, PipelineError> {
    let mut rows = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(trimmed) {
            Ok(row) => rows.push(row),
            Err(e) => {
                return Err(PipelineError::ParseError(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(rows)
}

/// One pre-flight finding for an event row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFinding {
    pub index: usize,
    pub observation: String,
    pub issue: EventIssue,
}

/// What the pre-flight check found wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventIssue {
    MalformedObservation,
    UnparseableTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_events_ndjson() {
        let ndjson = r#"
{"observation": "AM_1_1_J", "behavior": "WRK- General", "time_relative": "0:00:00", "event_kind": "State start"}

{"observation": "AM_1_1_J", "behavior": "SB-Sitting", "time_relative": "0:00:05", "event_kind": "State start"}
"#;
        let events = EventAdapter::parse_events_ndjson(ndjson).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].behavior.as_deref(), Some("SB-Sitting"));
    }

    #[test]
    fn test_parse_events_ndjson_bad_line() {
        let ndjson = "{\"observation\": \"AM_1_1\", \"event_kind\": \"State start\"}\nnot json\n";
        let err = EventAdapter::parse_events_ndjson(ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_log_array() {
        let json = r#"[
            {"subject": 1, "session": 1, "start_time": "6:43:57 PM"},
            {"subject": 1, "session": 2}
        ]"#;
        let log = EventAdapter::parse_log_array(json).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].start_time, None);
    }

    #[test]
    fn test_validate_events_findings() {
        let events = vec![
            RawEvent {
                observation: "AM_1_1_J".to_string(),
                behavior: Some("WRK- General".to_string()),
                modifier_1: None,
                modifier_2: None,
                modifier_3: None,
                modifier_4: None,
                time_relative: Some("0:00:00".to_string()),
                event_kind: EventKind::StateStart,
            },
            RawEvent {
                observation: "BADKEY".to_string(),
                behavior: None,
                modifier_1: None,
                modifier_2: None,
                modifier_3: None,
                modifier_4: None,
                time_relative: Some("0:00:01".to_string()),
                event_kind: EventKind::StateStart,
            },
            RawEvent {
                observation: "AM_1_1_J".to_string(),
                behavior: Some("SB-Sitting".to_string()),
                modifier_1: None,
                modifier_2: None,
                modifier_3: None,
                modifier_4: None,
                time_relative: Some("nan".to_string()),
                event_kind: EventKind::StateStart,
            },
            // non state-start rows are not checked
            RawEvent {
                observation: "ALSO_BAD".to_string(),
                behavior: None,
                modifier_1: None,
                modifier_2: None,
                modifier_3: None,
                modifier_4: None,
                time_relative: None,
                event_kind: EventKind::Point,
            },
        ];

        let findings = EventAdapter::validate_events(&events);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].issue, EventIssue::MalformedObservation);
        assert_eq!(findings[0].index, 1);
        assert_eq!(findings[1].issue, EventIssue::UnparseableTime);
        assert_eq!(findings[1].index, 2);
    }
}
