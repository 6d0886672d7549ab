//! Per-second expansion of one session's track events
//!
//! Turns a sparse, possibly-duplicated sequence of timestamped events into a
//! dense, gapless grid with one slot per integer second, each slot carrying
//! forward the attributes of the most recent event at or before it.

use crate::timeparse::format_hms;
use crate::types::{CarriedAttrs, GridSlot, NormalizedEvent, SessionKey, TimeGrid, Track};
use std::cmp::Ordering;

/// Offsets within this of zero count as a true zero start
const ON_TIME_EPSILON: f64 = 1e-6;

/// Fractional nudge applied to the first display label of a late-starting
/// session so the label encodes the true start offset
const LATE_START_NUDGE: f64 = 0.01;

/// Expand one session's events, already restricted to one track, into a
/// dense per-second grid.
///
/// Events without a parseable relative time are dropped. Within a second the
/// last write wins: the event with the largest fractional time, ties broken
/// by input order. The grid spans `[start ..= end]` where `end` is the floor
/// of the latest event time and `start` is zero for an on-time session or
/// the ceiling of the earliest event time for a late-starting one. Empty
/// input yields an empty grid.
pub fn expand_track(key: SessionKey, track: Track, events: &[NormalizedEvent]) -> TimeGrid {
    let mut timed: Vec<(i64, f64, &NormalizedEvent)> = events
        .iter()
        .filter_map(|e| e.seconds.map(|s| (s.floor() as i64, s, e)))
        .collect();
    if timed.is_empty() {
        return TimeGrid::empty(key, track);
    }

    // Stable sort by (event second, fractional time); equal keys keep input
    // order so keep-last resolves ties deterministically.
    timed.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then(a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
    });

    // Last write wins within each second.
    let mut winners: Vec<(i64, f64, &NormalizedEvent)> = Vec::with_capacity(timed.len());
    for entry in timed {
        if let Some(last) = winners.last_mut() {
            if last.0 == entry.0 {
                *last = entry;
                continue;
            }
        }
        winners.push(entry);
    }

    // winners is ordered by second, so the span bounds sit at the ends.
    let min_time = winners.first().map(|w| w.1).unwrap_or(0.0);
    let max_time = winners.last().map(|w| w.1).unwrap_or(0.0);

    let (start_second, late_start) = if min_time.abs() <= ON_TIME_EPSILON {
        (0, false)
    } else {
        (min_time.ceil() as i64, true)
    };
    let mut end_second = max_time.floor() as i64;
    if end_second < start_second {
        end_second = start_second;
    }

    // Forward-fill across [floor(min_time) ..= end]; the prefix before
    // `start_second` only seeds the carry and is not emitted.
    let seed_second = min_time.floor() as i64;
    let mut slots = Vec::with_capacity((end_second - start_second + 1).max(0) as usize);
    let mut cursor = 0usize;
    let mut carried: Option<CarriedAttrs> = None;
    for second in seed_second..=end_second {
        while cursor < winners.len() && winners[cursor].0 <= second {
            carried = Some(CarriedAttrs::from(winners[cursor].2));
            cursor += 1;
        }
        if second < start_second {
            continue;
        }
        let rel_time = if late_start && second == start_second {
            format_hms(min_time + LATE_START_NUDGE, 2)
        } else {
            format_hms(second as f64, 0)
        };
        slots.push(GridSlot {
            second,
            rel_time,
            attrs: carried.clone(),
        });
    }

    TimeGrid { key, track, slots }
}
