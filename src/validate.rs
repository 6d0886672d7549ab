//! Structural consistency checks over a coded per-second grid
//!
//! Read-only reporting: findings are never repaired here. Run against the
//! grid before non-codable removal so the statistics reflect the full span.

use crate::types::{CodedRecord, SessionKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// How many worst-covered sessions to list in the report
const WORST_COVERAGE_LIMIT: usize = 10;

/// A (session, second) pair that appears more than once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateFinding {
    pub key: SessionKey,
    pub second: i64,
    pub count: usize,
}

/// A break in a session's per-second contiguity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapFinding {
    pub key: SessionKey,
    pub from_second: i64,
    pub to_second: i64,
}

/// A session whose slot count does not match its inclusive span
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanFinding {
    pub key: SessionKey,
    pub slots: usize,
    pub expected: i64,
}

/// Per-session label coverage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCoverage {
    pub key: SessionKey,
    pub coverage: f64,
}

/// Coverage distribution across sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageStats {
    pub min: f64,
    pub median: f64,
    pub max: f64,
    /// Worst-covered sessions, lowest first
    pub worst: Vec<SessionCoverage>,
}

/// Validation findings for one grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Unique id of this validation run
    pub report_id: String,
    pub sessions: usize,
    pub records: usize,
    pub duplicate_seconds: Vec<DuplicateFinding>,
    pub gaps: Vec<GapFinding>,
    pub span_mismatches: Vec<SpanFinding>,
    /// Absent when the grid is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageStats>,
}

impl ValidationReport {
    /// True when no structural finding was raised. Coverage is
    /// informational and does not affect cleanliness.
    pub fn is_clean(&self) -> bool {
        self.duplicate_seconds.is_empty() && self.gaps.is_empty() && self.span_mismatches.is_empty()
    }
}

/// Validate a coded grid: uniqueness, contiguity, span integrity, coverage.
pub fn validate_grid(records: &[CodedRecord]) -> ValidationReport {
    let mut by_session: BTreeMap<SessionKey, Vec<(i64, bool)>> = BTreeMap::new();
    for record in records {
        by_session
            .entry(record.merged.key)
            .or_default()
            .push((record.merged.second, record.merged.behavior.is_some()));
    }

    let mut duplicate_seconds = Vec::new();
    let mut gaps = Vec::new();
    let mut span_mismatches = Vec::new();
    let mut coverages: Vec<SessionCoverage> = Vec::new();

    for (key, seconds) in &by_session {
        let mut sorted = seconds.clone();
        sorted.sort_by_key(|(second, _)| *second);

        let mut run = 0usize;
        for window in sorted.windows(2) {
            let (prev, next) = (window[0].0, window[1].0);
            if prev == next {
                run += 1;
            } else {
                if run > 0 {
                    duplicate_seconds.push(DuplicateFinding {
                        key: *key,
                        second: prev,
                        count: run + 1,
                    });
                    run = 0;
                }
                if next - prev != 1 {
                    gaps.push(GapFinding {
                        key: *key,
                        from_second: prev,
                        to_second: next,
                    });
                }
            }
        }
        if run > 0 {
            if let Some(&(last, _)) = sorted.last() {
                duplicate_seconds.push(DuplicateFinding {
                    key: *key,
                    second: last,
                    count: run + 1,
                });
            }
        }

        if let (Some(&(first, _)), Some(&(last, _))) = (sorted.first(), sorted.last()) {
            let expected = last - first + 1;
            if sorted.len() as i64 != expected {
                span_mismatches.push(SpanFinding {
                    key: *key,
                    slots: sorted.len(),
                    expected,
                });
            }
        }

        let labeled = sorted.iter().filter(|(_, has)| *has).count();
        let coverage = if sorted.is_empty() {
            0.0
        } else {
            labeled as f64 / sorted.len() as f64
        };
        coverages.push(SessionCoverage {
            key: *key,
            coverage,
        });
    }

    let coverage = coverage_stats(coverages);

    ValidationReport {
        report_id: Uuid::new_v4().to_string(),
        sessions: by_session.len(),
        records: records.len(),
        duplicate_seconds,
        gaps,
        span_mismatches,
        coverage,
    }
}

fn coverage_stats(mut coverages: Vec<SessionCoverage>) -> Option<CoverageStats> {
    if coverages.is_empty() {
        return None;
    }
    coverages.sort_by(|a, b| {
        a.coverage
            .partial_cmp(&b.coverage)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let values: Vec<f64> = coverages.iter().map(|c| c.coverage).collect();
    let min = values[0];
    let max = values[values.len() - 1];
    let median = if values.len() % 2 == 1 {
        values[values.len() / 2]
    } else {
        let mid = values.len() / 2;
        (values[mid - 1] + values[mid]) / 2.0
    };

    let worst = coverages
        .into_iter()
        .take(WORST_COVERAGE_LIMIT)
        .collect();

    Some(CoverageStats {
        min,
        median,
        max,
        worst,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MergedRecord;

    fn make_record(key: SessionKey, second: i64, behavior: Option<&str>) -> CodedRecord {
        CodedRecord {
            merged: MergedRecord {
                key,
                second,
                rel_time: None,
                start_clock: None,
                activity_behavior: None,
                posture_behavior: None,
                behavior: behavior.map(|b| b.to_string()),
                modifier_1: None,
                modifier_2: None,
                modifier_3: None,
            },
            activity_label: None,
            activity_type: None,
            broad_domain: None,
            waves_domain: None,
            posture_class: None,
            posture_broad: None,
            posture_waves: None,
            waves_sedentary: None,
            intensity: None,
            waves_intensity: None,
            work_type: None,
        }
    }

    fn dense_session(key: SessionKey, start: i64, end: i64) -> Vec<CodedRecord> {
        (start..=end)
            .map(|s| make_record(key, s, Some("WRK- General")))
            .collect()
    }

    #[test]
    fn test_clean_grid() {
        let mut records = dense_session(SessionKey::new(1, 1), 0, 9);
        records.extend(dense_session(SessionKey::new(1, 2), 4, 20));

        let report = validate_grid(&records);
        assert!(report.is_clean());
        assert_eq!(report.sessions, 2);
        assert_eq!(report.records, 27);
        let coverage = report.coverage.unwrap();
        assert_eq!(coverage.min, 1.0);
        assert_eq!(coverage.max, 1.0);
    }

    #[test]
    fn test_duplicate_second_detected() {
        let mut records = dense_session(SessionKey::new(1, 1), 0, 5);
        records.push(make_record(SessionKey::new(1, 1), 3, Some("WRK- General")));

        let report = validate_grid(&records);
        assert!(!report.is_clean());
        assert_eq!(report.duplicate_seconds.len(), 1);
        assert_eq!(report.duplicate_seconds[0].second, 3);
        assert_eq!(report.duplicate_seconds[0].count, 2);
        // the duplicate also breaks the span/slot accounting
        assert_eq!(report.span_mismatches.len(), 1);
    }

    #[test]
    fn test_gap_detected() {
        let mut records = dense_session(SessionKey::new(2, 1), 0, 4);
        records.extend(dense_session(SessionKey::new(2, 1), 8, 10));

        let report = validate_grid(&records);
        assert_eq!(report.gaps.len(), 1);
        assert_eq!(report.gaps[0].from_second, 4);
        assert_eq!(report.gaps[0].to_second, 8);
        assert_eq!(report.gaps[0].key, SessionKey::new(2, 1));
        // a gap implies a span mismatch too
        assert_eq!(report.span_mismatches.len(), 1);
        assert_eq!(report.span_mismatches[0].slots, 8);
        assert_eq!(report.span_mismatches[0].expected, 11);
    }

    #[test]
    fn test_coverage_stats() {
        let mut records = dense_session(SessionKey::new(1, 1), 0, 9);
        // second session: half the seconds unlabeled
        let key = SessionKey::new(1, 2);
        for s in 0..10 {
            let behavior = if s < 5 { Some("WRK- General") } else { None };
            records.push(make_record(key, s, behavior));
        }

        let report = validate_grid(&records);
        let coverage = report.coverage.unwrap();
        assert_eq!(coverage.min, 0.5);
        assert_eq!(coverage.max, 1.0);
        assert_eq!(coverage.median, 0.75);
        assert_eq!(coverage.worst[0].key, key);
        assert_eq!(coverage.worst[0].coverage, 0.5);
    }

    #[test]
    fn test_empty_grid() {
        let report = validate_grid(&[]);
        assert!(report.is_clean());
        assert_eq!(report.sessions, 0);
        assert!(report.coverage.is_none());
    }

    #[test]
    fn test_single_slot_session() {
        let records = dense_session(SessionKey::new(9, 1), 4, 4);
        let report = validate_grid(&records);
        assert!(report.is_clean());
    }
}
