//! Session keys and session-log metadata
//!
//! Events identify their session through a structured observation
//! identifier; the session log carries per-session wall-clock start times.
//! The two join on the composite (subject, session) key, and the join must
//! be many-to-one: a duplicated log key is a key-construction defect
//! upstream and fails hard.

use crate::error::PipelineError;
use crate::timeparse::{format_clock_12h, parse_clock_12h};
use crate::types::{SessionKey, SessionLogEntry};
use chrono::{Duration, NaiveTime};
use std::collections::{HashMap, HashSet};

/// Split a structured observation identifier into its session key.
///
/// The second and third `_`-separated segments carry the subject id and the
/// session index (`"AM_3_2_J_FINAL"` is subject 3, session 2). Identifiers
/// that do not split into two numeric segments yield `None`.
pub fn parse_session_key(observation: &str) -> Option<SessionKey> {
    let mut parts = observation.split('_');
    let _study = parts.next()?;
    let subject = parts.next()?.trim().parse::<i64>().ok()?;
    let session = parts.next()?.trim().parse::<i64>().ok()?;
    Some(SessionKey::new(subject, session))
}

/// Build the (subject, session) -> wall-clock start map from the session log.
///
/// Entries with a missing or unparseable start time contribute no clock,
/// which is not an error. A key appearing more than once is.
pub fn build_start_times(
    log: &[SessionLogEntry],
) -> Result<HashMap<SessionKey, NaiveTime>, PipelineError> {
    let mut seen: HashSet<SessionKey> = HashSet::new();
    let mut clocks: HashMap<SessionKey, NaiveTime> = HashMap::new();

    for entry in log {
        let key = SessionKey::new(entry.subject, entry.session);
        if !seen.insert(key) {
            return Err(PipelineError::JoinCardinality {
                key: key.to_string(),
                count: 2,
            });
        }
        if let Some(raw) = entry.start_time.as_deref() {
            if let Some(t) = parse_clock_12h(raw) {
                clocks.insert(key, t);
            }
        }
    }

    Ok(clocks)
}

/// Wall-clock display label for an event `seconds` into a session that
/// started at `start`. Wraps past midnight, matching the time-only display.
pub fn clock_label(start: NaiveTime, seconds: f64) -> String {
    let offset = Duration::milliseconds((seconds * 1000.0).round() as i64);
    format_clock_12h(start + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_key() {
        assert_eq!(
            parse_session_key("AM_3_2_J_FINAL"),
            Some(SessionKey::new(3, 2))
        );
        assert_eq!(parse_session_key("AM_12_1"), Some(SessionKey::new(12, 1)));
    }

    #[test]
    fn test_parse_session_key_malformed() {
        assert_eq!(parse_session_key("AM_x_2"), None);
        assert_eq!(parse_session_key("AM_3"), None);
        assert_eq!(parse_session_key(""), None);
        assert_eq!(parse_session_key("AM03DO1"), None);
    }

    #[test]
    fn test_build_start_times() {
        let log = vec![
            SessionLogEntry {
                subject: 1,
                session: 1,
                start_time: Some("6:43:57 PM".to_string()),
            },
            SessionLogEntry {
                subject: 1,
                session: 2,
                start_time: Some("4:43 PM".to_string()),
            },
            SessionLogEntry {
                subject: 2,
                session: 1,
                start_time: None,
            },
        ];
        let clocks = build_start_times(&log).unwrap();
        assert_eq!(
            clocks.get(&SessionKey::new(1, 1)),
            Some(&NaiveTime::from_hms_opt(18, 43, 57).unwrap())
        );
        assert_eq!(
            clocks.get(&SessionKey::new(1, 2)),
            Some(&NaiveTime::from_hms_opt(16, 43, 0).unwrap())
        );
        // missing start time: no clock, no error
        assert!(!clocks.contains_key(&SessionKey::new(2, 1)));
    }

    #[test]
    fn test_duplicate_log_key_fails() {
        let log = vec![
            SessionLogEntry {
                subject: 1,
                session: 1,
                start_time: Some("8:00:27 AM".to_string()),
            },
            SessionLogEntry {
                subject: 1,
                session: 1,
                start_time: Some("9:00:00 AM".to_string()),
            },
        ];
        let err = build_start_times(&log).unwrap_err();
        assert!(matches!(err, PipelineError::JoinCardinality { .. }));
    }

    #[test]
    fn test_clock_label() {
        let start = NaiveTime::from_hms_opt(8, 0, 27).unwrap();
        assert_eq!(clock_label(start, 0.0), "08:00:27 AM");
        assert_eq!(clock_label(start, 93.0), "08:02:00 AM");
        // wraps past midnight
        let late = NaiveTime::from_hms_opt(23, 59, 0).unwrap();
        assert_eq!(clock_label(late, 120.0), "12:01:00 AM");
    }
}
