//! Cross-track merge of per-second grids
//!
//! Outer-joins the activity and posture grids for one session on the second
//! index, reconciles overlapping fields by precedence, and closes
//! join-induced gaps in the session-level display fields.

use crate::types::{GridSlot, MergedRecord, SessionKey, TimeGrid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which track's label wins when both are present at the same second.
///
/// The observed coding convention puts the activity label first; the rule is
/// a policy here rather than a constant because it has not been confirmed by
/// the coding manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPrecedence {
    #[default]
    ActivityFirst,
    PostureFirst,
}

/// Outer-join the two tracks' grids for one session.
///
/// A second present in only one track yields a record with the other
/// track's fields unset. Per merged second: the combined label follows
/// `precedence`, modifiers 1 and 3 come from the activity track only, and
/// the intensity-bearing modifier 2 prefers the posture track. The display
/// fields (relative-time label, wall clock) ride the activity grid and are
/// forward- then back-filled across the merged sequence.
pub fn merge_tracks(
    key: SessionKey,
    activity: &TimeGrid,
    posture: &TimeGrid,
    precedence: LabelPrecedence,
) -> Vec<MergedRecord> {
    let mut joined: BTreeMap<i64, (Option<&GridSlot>, Option<&GridSlot>)> = BTreeMap::new();
    for slot in &activity.slots {
        joined.entry(slot.second).or_default().0 = Some(slot);
    }
    for slot in &posture.slots {
        joined.entry(slot.second).or_default().1 = Some(slot);
    }

    let mut records: Vec<MergedRecord> = Vec::with_capacity(joined.len());
    for (&second, (act_slot, pos_slot)) in &joined {
        let act = act_slot.and_then(|s| s.attrs.as_ref());
        let pos = pos_slot.and_then(|s| s.attrs.as_ref());

        let activity_behavior = act.and_then(|a| a.behavior.clone());
        let posture_behavior = pos.and_then(|p| p.behavior.clone());
        let behavior = match precedence {
            LabelPrecedence::ActivityFirst => activity_behavior
                .clone()
                .or_else(|| posture_behavior.clone()),
            LabelPrecedence::PostureFirst => posture_behavior
                .clone()
                .or_else(|| activity_behavior.clone()),
        };

        records.push(MergedRecord {
            key,
            second,
            rel_time: act_slot.map(|s| s.rel_time.clone()),
            start_clock: act.and_then(|a| a.start_clock.clone()),
            activity_behavior,
            posture_behavior,
            behavior,
            modifier_1: act.and_then(|a| a.modifier_1.clone()),
            modifier_2: pos
                .and_then(|p| p.modifier_2.clone())
                .or_else(|| act.and_then(|a| a.modifier_2.clone())),
            modifier_3: act.and_then(|a| a.modifier_3.clone()),
        });
    }

    fill_display_fields(&mut records);
    records
}

/// Forward-fill then back-fill the display fields across the merged,
/// second-ordered sequence.
fn fill_display_fields(records: &mut [MergedRecord]) {
    let mut last_rel: Option<String> = None;
    let mut last_clock: Option<String> = None;
    for record in records.iter_mut() {
        match &record.rel_time {
            Some(v) => last_rel = Some(v.clone()),
            None => record.rel_time = last_rel.clone(),
        }
        match &record.start_clock {
            Some(v) => last_clock = Some(v.clone()),
            None => record.start_clock = last_clock.clone(),
        }
    }

    let mut next_rel: Option<String> = None;
    let mut next_clock: Option<String> = None;
    for record in records.iter_mut().rev() {
        match &record.rel_time {
            Some(v) => next_rel = Some(v.clone()),
            None => record.rel_time = next_rel.clone(),
        }
        match &record.start_clock {
            Some(v) => next_clock = Some(v.clone()),
            None => record.start_clock = next_clock.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CarriedAttrs, Track};

    fn make_slot(second: i64, behavior: &str, modifier_2: Option<&str>, clock: Option<&str>) -> GridSlot {
        GridSlot {
            second,
            rel_time: crate::timeparse::format_hms(second as f64, 0),
            attrs: Some(CarriedAttrs {
                behavior: Some(behavior.to_string()),
                modifier_1: None,
                modifier_2: modifier_2.map(|m| m.to_string()),
                modifier_3: None,
                modifier_4: None,
                start_clock: clock.map(|c| c.to_string()),
            }),
        }
    }

    fn make_grid(track: Track, slots: Vec<GridSlot>) -> TimeGrid {
        TimeGrid {
            key: SessionKey::new(1, 1),
            track,
            slots,
        }
    }

    #[test]
    fn test_activity_label_wins() {
        let activity = make_grid(
            Track::Activity,
            vec![make_slot(5, "WRK- General", None, None)],
        );
        let posture = make_grid(Track::Posture, vec![make_slot(5, "SB- Sitting", None, None)]);

        let merged = merge_tracks(
            SessionKey::new(1, 1),
            &activity,
            &posture,
            LabelPrecedence::ActivityFirst,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].behavior.as_deref(), Some("WRK- General"));
        assert_eq!(merged[0].activity_behavior.as_deref(), Some("WRK- General"));
        assert_eq!(merged[0].posture_behavior.as_deref(), Some("SB- Sitting"));
    }

    #[test]
    fn test_posture_first_policy() {
        let activity = make_grid(
            Track::Activity,
            vec![make_slot(5, "WRK- General", None, None)],
        );
        let posture = make_grid(Track::Posture, vec![make_slot(5, "SB- Sitting", None, None)]);

        let merged = merge_tracks(
            SessionKey::new(1, 1),
            &activity,
            &posture,
            LabelPrecedence::PostureFirst,
        );
        assert_eq!(merged[0].behavior.as_deref(), Some("SB- Sitting"));
    }

    #[test]
    fn test_one_sided_seconds_survive() {
        let activity = make_grid(
            Track::Activity,
            vec![
                make_slot(3, "WRK- General", None, None),
                make_slot(4, "WRK- General", None, None),
            ],
        );
        let posture = make_grid(
            Track::Posture,
            vec![
                make_slot(4, "SB- Sitting", None, None),
                make_slot(5, "SB- Sitting", None, None),
                make_slot(6, "WA- Walk", None, None),
            ],
        );

        let merged = merge_tracks(
            SessionKey::new(1, 1),
            &activity,
            &posture,
            LabelPrecedence::ActivityFirst,
        );
        let seconds: Vec<i64> = merged.iter().map(|r| r.second).collect();
        assert_eq!(seconds, vec![3, 4, 5, 6]);
        // posture-only seconds keep the posture label as combined
        assert_eq!(merged[2].behavior.as_deref(), Some("SB- Sitting"));
        assert_eq!(merged[2].activity_behavior, None);
        assert_eq!(merged[3].behavior.as_deref(), Some("WA- Walk"));
    }

    #[test]
    fn test_intensity_modifier_prefers_posture() {
        let activity = make_grid(
            Track::Activity,
            vec![make_slot(5, "WRK- General", Some("Light"), None)],
        );
        let posture = make_grid(
            Track::Posture,
            vec![make_slot(5, "WA- Walk", Some("Moderate"), None)],
        );

        let merged = merge_tracks(
            SessionKey::new(1, 1),
            &activity,
            &posture,
            LabelPrecedence::ActivityFirst,
        );
        assert_eq!(merged[0].modifier_2.as_deref(), Some("Moderate"));

        // falls back to the activity value when posture has none
        let posture = make_grid(Track::Posture, vec![make_slot(5, "WA- Walk", None, None)]);
        let merged = merge_tracks(
            SessionKey::new(1, 1),
            &activity,
            &posture,
            LabelPrecedence::ActivityFirst,
        );
        assert_eq!(merged[0].modifier_2.as_deref(), Some("Light"));
    }

    #[test]
    fn test_display_fields_filled_across_join_gaps() {
        let activity = make_grid(
            Track::Activity,
            vec![make_slot(4, "WRK- General", None, Some("08:00:04 AM"))],
        );
        let posture = make_grid(
            Track::Posture,
            vec![
                make_slot(2, "SB- Sitting", None, None),
                make_slot(3, "SB- Sitting", None, None),
                make_slot(5, "SB- Sitting", None, None),
            ],
        );

        let merged = merge_tracks(
            SessionKey::new(1, 1),
            &activity,
            &posture,
            LabelPrecedence::ActivityFirst,
        );
        // leading posture-only seconds back-fill from the activity grid,
        // trailing ones forward-fill
        assert_eq!(merged[0].second, 2);
        assert_eq!(merged[0].rel_time.as_deref(), Some("00:00:04"));
        assert_eq!(merged[0].start_clock.as_deref(), Some("08:00:04 AM"));
        assert_eq!(merged[3].second, 5);
        assert_eq!(merged[3].rel_time.as_deref(), Some("00:00:04"));
    }

    #[test]
    fn test_empty_tracks() {
        let key = SessionKey::new(1, 1);
        let empty_a = TimeGrid::empty(key, Track::Activity);
        let empty_p = TimeGrid::empty(key, Track::Posture);
        assert!(merge_tracks(key, &empty_a, &empty_p, LabelPrecedence::ActivityFirst).is_empty());

        // one empty track still yields the other track's seconds
        let posture = make_grid(Track::Posture, vec![make_slot(0, "SB- Sitting", None, None)]);
        let merged = merge_tracks(key, &empty_a, &posture, LabelPrecedence::ActivityFirst);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].behavior.as_deref(), Some("SB- Sitting"));
    }
}
