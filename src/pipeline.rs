//! Pipeline orchestration
//!
//! Public API for end-to-end alignment. Stages are explicit: each takes the
//! previous stage's output and returns a new value, with no state shared
//! between sessions. Sessions are processed independently and concatenated
//! in key order, so the output ordering is stable regardless of how the
//! per-session work is scheduled.

use crate::classify::TrackTaxonomy;
use crate::coding::{encode_session, finalize_session, CodingScheme};
use crate::error::PipelineError;
use crate::expand::expand_track;
use crate::merge::{merge_tracks, LabelPrecedence};
use crate::sessions::{build_start_times, clock_label, parse_session_key};
use crate::timeparse::parse_relative_seconds;
use crate::types::{
    CodedRecord, EventKind, NormalizedEvent, RawEvent, SecondRecord, SessionKey, SessionLogEntry,
    Track,
};
use crate::validate::{validate_grid, ValidationReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Results of one end-to-end alignment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignedOutput {
    /// Final per-second rows, ordered by (subject, session, second)
    pub records: Vec<SecondRecord>,
    /// Validation of the grid before non-codable removal
    pub report: ValidationReport,
    /// Sessions that produced at least one event
    pub sessions: usize,
    /// State-start events considered
    pub events_in: usize,
    /// State-start events dropped for a malformed observation identifier
    pub events_unkeyed: usize,
    /// Rows removed as non-codable
    pub non_codable_removed: usize,
}

/// Align raw events into a per-second table (stateless, one-shot, default
/// taxonomy and coding scheme).
pub fn align_events(
    events: &[RawEvent],
    log: &[SessionLogEntry],
) -> Result<AlignedOutput, PipelineError> {
    GridProcessor::new().process(events, log)
}

/// Configurable alignment processor.
///
/// Holds the injected track taxonomy, coding scheme, and label-precedence
/// policy. The processor itself is stateless across runs.
pub struct GridProcessor {
    taxonomy: TrackTaxonomy,
    scheme: CodingScheme,
    precedence: LabelPrecedence,
}

impl Default for GridProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl GridProcessor {
    /// Create a processor with the default taxonomy and coding scheme
    pub fn new() -> Self {
        Self {
            taxonomy: TrackTaxonomy::default(),
            scheme: CodingScheme::default(),
            precedence: LabelPrecedence::default(),
        }
    }

    /// Create a processor with a specific label-precedence policy
    pub fn with_precedence(precedence: LabelPrecedence) -> Self {
        Self {
            precedence,
            ..Self::new()
        }
    }

    /// Create a fully configured processor
    pub fn with_config(
        taxonomy: TrackTaxonomy,
        scheme: CodingScheme,
        precedence: LabelPrecedence,
    ) -> Self {
        Self {
            taxonomy,
            scheme,
            precedence,
        }
    }

    /// Run the full pipeline over one batch of events and session-log rows.
    pub fn process(
        &self,
        events: &[RawEvent],
        log: &[SessionLogEntry],
    ) -> Result<AlignedOutput, PipelineError> {
        // Stage 1: session metadata map; duplicate log keys fail hard
        let clocks = build_start_times(log)?;

        // Stage 2: keep state starts, parse keys and times, classify tracks
        let mut events_in = 0usize;
        let mut events_unkeyed = 0usize;
        let mut normalized: Vec<NormalizedEvent> = Vec::new();
        for event in events {
            if event.event_kind != EventKind::StateStart {
                continue;
            }
            events_in += 1;
            let Some(key) = parse_session_key(&event.observation) else {
                events_unkeyed += 1;
                continue;
            };
            let seconds = event
                .time_relative
                .as_deref()
                .and_then(parse_relative_seconds);
            let track = self.taxonomy.classify(event.behavior.as_deref());
            let start_clock = match (clocks.get(&key), seconds) {
                (Some(&start), Some(s)) => Some(clock_label(start, s)),
                _ => None,
            };
            normalized.push(NormalizedEvent {
                key,
                track,
                seconds,
                behavior: event.behavior.clone(),
                modifier_1: event.modifier_1.clone(),
                modifier_2: event.modifier_2.clone(),
                modifier_3: event.modifier_3.clone(),
                modifier_4: event.modifier_4.clone(),
                start_clock,
            });
        }

        // Stage 3: group by session, ordered by key
        let mut by_session: BTreeMap<SessionKey, Vec<NormalizedEvent>> = BTreeMap::new();
        for event in normalized {
            by_session.entry(event.key).or_default().push(event);
        }
        let groups: Vec<(SessionKey, Vec<NormalizedEvent>)> = by_session.into_iter().collect();
        let sessions = groups.len();

        // Stage 4: expand, merge, and encode each session independently
        let coded_sessions = self.map_sessions(&groups);

        // Stage 5: ordered concatenation, then validate the pre-removal grid
        let mut coded: Vec<CodedRecord> = Vec::new();
        for session_records in coded_sessions {
            coded.extend(session_records);
        }
        let report = validate_grid(&coded);

        // Stage 6: per-session non-codable removal and stabilization
        let mut records: Vec<SecondRecord> = Vec::with_capacity(coded.len());
        let mut non_codable_removed = 0usize;
        let mut chunk: Vec<CodedRecord> = Vec::new();
        for record in coded {
            let boundary = chunk
                .last()
                .map(|prev| prev.merged.key != record.merged.key)
                .unwrap_or(false);
            if boundary {
                let (kept, removed) = finalize_session(std::mem::take(&mut chunk), &self.scheme);
                non_codable_removed += removed;
                records.extend(kept.into_iter().map(SecondRecord::from));
            }
            chunk.push(record);
        }
        if !chunk.is_empty() {
            let (kept, removed) = finalize_session(chunk, &self.scheme);
            non_codable_removed += removed;
            records.extend(kept.into_iter().map(SecondRecord::from));
        }

        Ok(AlignedOutput {
            records,
            report,
            sessions,
            events_in,
            events_unkeyed,
            non_codable_removed,
        })
    }

    /// Expand both tracks, merge, and encode one session.
    fn process_session(&self, key: SessionKey, events: &[NormalizedEvent]) -> Vec<CodedRecord> {
        let activity: Vec<NormalizedEvent> = events
            .iter()
            .filter(|e| e.track == Track::Activity)
            .cloned()
            .collect();
        let posture: Vec<NormalizedEvent> = events
            .iter()
            .filter(|e| e.track == Track::Posture)
            .cloned()
            .collect();

        let activity_grid = expand_track(key, Track::Activity, &activity);
        let posture_grid = expand_track(key, Track::Posture, &posture);
        let merged = merge_tracks(key, &activity_grid, &posture_grid, self.precedence);
        encode_session(merged, &self.scheme)
    }

    #[cfg(feature = "parallel")]
    fn map_sessions(&self, groups: &[(SessionKey, Vec<NormalizedEvent>)]) -> Vec<Vec<CodedRecord>> {
        groups
            .par_iter()
            .map(|(key, events)| self.process_session(*key, events))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn map_sessions(&self, groups: &[(SessionKey, Vec<NormalizedEvent>)]) -> Vec<Vec<CodedRecord>> {
        groups
            .iter()
            .map(|(key, events)| self.process_session(*key, events))
            .collect()
    }
}
