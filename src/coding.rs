//! Categorical coding of merged per-second records
//!
//! The label taxonomy lives in an injected `CodingScheme`; the encoding pass
//! itself is taxonomy-agnostic. `CodingScheme::default()` carries the
//! study's coding tables: canonical activity labels with their category
//! triples, posture classes with their category pairs, intensity rules, and
//! the non-codable sentinels.

use crate::classify::normalize_label;
use crate::types::{CodedRecord, MergedRecord};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Category triple attached to a canonical activity label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityMeta {
    pub activity_type: String,
    pub broad_domain: String,
    pub waves_domain: String,
}

impl ActivityMeta {
    fn new(activity_type: &str, broad_domain: &str, waves_domain: &str) -> Self {
        Self {
            activity_type: activity_type.to_string(),
            broad_domain: broad_domain.to_string(),
            waves_domain: waves_domain.to_string(),
        }
    }
}

/// Category pair attached to a posture class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostureMeta {
    pub posture_broad: String,
    pub posture_waves: String,
}

impl PostureMeta {
    fn new(posture_broad: &str, posture_waves: &str) -> Self {
        Self {
            posture_broad: posture_broad.to_string(),
            posture_waves: posture_waves.to_string(),
        }
    }
}

/// How a posture rule matches the normalized behavior label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Prefix,
}

/// One posture-classification rule, evaluated in declaration order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostureRule {
    pub pattern: String,
    pub match_kind: MatchKind,
    pub class: String,
}

impl PostureRule {
    fn exact(pattern: &str, class: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            match_kind: MatchKind::Exact,
            class: class.to_string(),
        }
    }

    fn prefix(pattern: &str, class: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            match_kind: MatchKind::Prefix,
            class: class.to_string(),
        }
    }
}

/// Injected label-to-category configuration for the encoding pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodingScheme {
    /// Normalized behavior label -> canonical activity label
    pub activity_aliases: HashMap<String, String>,
    /// Normalized-prefix rules tested before the alias table
    pub activity_prefix_rules: Vec<(String, String)>,
    /// Canonical activity label -> category triple
    pub activity_meta: HashMap<String, ActivityMeta>,
    /// Canonical labels whose modifier 3 carries a work type
    pub work_labels: HashSet<String>,
    /// Canonical label refined by modifier 1 (sport/exercise participation)
    pub ex_participating_label: String,
    /// Canonical-label prefix that coalesces to `ex_meta`
    pub ex_prefix: String,
    /// Meta applied to every `ex_prefix` label
    pub ex_meta: ActivityMeta,
    /// Posture-classification rules over the normalized combined behavior
    pub posture_rules: Vec<PostureRule>,
    /// Posture class -> category pair
    pub posture_meta: HashMap<String, PostureMeta>,
    /// Behavior prefixes that directly imply sedentary intensity
    pub sedentary_behavior_prefixes: Vec<String>,
    /// Exact normalized behaviors that imply light intensity
    pub light_behaviors: HashSet<String>,
    /// Canonical activity label marking non-codable rows
    pub non_codable_label: String,
    /// Raw behavior sentinels (trimmed, lowercased) marking non-codable rows
    pub non_codable_behaviors: HashSet<String>,
}

impl Default for CodingScheme {
    fn default() -> Self {
        let non_codable = "OTHER- Non-Codable (delete these rows from dataset)";

        let activity_aliases: HashMap<String, String> = [
            ("sl- sleep", "SL- Sleep"),
            ("pc- groom, health-related", "PC- Groom, Health-Related"),
            ("pc- other personal care", "PC- Other Personal Care"),
            ("ha- housework", "HA- Housework"),
            ("ha- food prep and cleanup", "HA- Food Prep and Cleanup"),
            (
                "ha- interior maintenance, repair, & decoration",
                "HA- Interior Maintenance, Repair, & Decoration",
            ),
            (
                "ha- exterior maintenance, repair, & decoration",
                "HA- Exterior Maintenance, Repair, & Decoration",
            ),
            ("ha- lawn, garden and houseplants", "HA- Lawn, Garden and Houseplants"),
            ("ha- animals and pets", "HA- Animals and Pets"),
            (
                "ha- household management/other household activities",
                "HA- Household Management/Other household activities",
            ),
            ("ca- caring for and helping children", "CA- Caring for and Helping Children"),
            ("ca- caring for and helping adults", "CA- Caring for and Helping Adults"),
            ("wrk- general", "WRK- General**"),
            ("wrk- screen based", "WRK- Desk/Screen Based"),
            ("edu- taking class, research, homework", "EDU- Taking Class, Research, Homework"),
            ("edu- extracurricular", "EDU- Extracurricular"),
            ("org- church, spiritual", "ORG- Church, Spiritual"),
            ("org- volunteer", "Volunteer Work (ORG - Volunteer Work)"),
            ("pur- purchasing goods and services", "PUR- Purchasing Goods and Services"),
            ("eat- eating and drinking, waiting", "EAT- Eating and Drinking, Waiting"),
            (
                "les- socializing, communicating, leisure time not screen",
                "LES- Socializing, Communicating, Non-Screen Based",
            ),
            (
                "les- screen based leisure time (tv, video game, computer)",
                "LES- Screen-Based (TV, Video Game, Computer, Phone)",
            ),
            (
                "les- screen-based (tv, video game, computer, phone)",
                "LES- Screen-Based (TV, Video Game, Computer, Phone)",
            ),
            (
                "ex- participating in sport, exercise or recreation",
                "EX- Participating in Sport, Exercise or Recreation***",
            ),
            (
                "ex- attending sport, recreational event, or performance",
                "EX- Attending Sport, Exercise Recreation Event, or Performance",
            ),
            ("trav- passenger (car/truck/motorcycle)", "TRAV- Passenger (Car/Truck/Motorcycle)"),
            ("trav- driver (car/truck/motorcycle)", "TRAV- Driver (Car/Truck/Motorcycle)"),
            (
                "trav- passenger (bus, train, tram, plane, boat, ship)",
                "TRAV- Passenger (Bus, Train, Tram, Plane, Boat, Ship)",
            ),
            ("trav- biking", "TRAV- Biking"),
            ("trav- walking", "TRAV-Walking"),
            ("trav-walking", "TRAV-Walking"),
            ("trav- general", "TRAV- General"),
            ("other- non codable", non_codable),
            ("private/not coded", non_codable),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let activity_prefix_rules = vec![
            (
                "les- screen".to_string(),
                "LES- Screen-Based (TV, Video Game, Computer, Phone)".to_string(),
            ),
            (
                "trav- passenger (bus".to_string(),
                "TRAV- Passenger (Bus, Train, Tram, Plane, Boat, Ship)".to_string(),
            ),
        ];

        let activity_meta: HashMap<String, ActivityMeta> = [
            ("SL- Sleep", ("sleep", "sleep", "household_personal")),
            ("PC- Groom, Health-Related", ("pc_groom", "personal", "household_personal")),
            ("PC- Other Personal Care", ("pc_other", "personal", "household_personal")),
            ("HA- Housework", ("ha_housework", "household", "household_personal")),
            ("HA- Food Prep and Cleanup", ("ha_food", "household", "household_personal")),
            (
                "HA- Interior Maintenance, Repair, & Decoration",
                ("ha_interior", "maintenance_repair", "household_personal"),
            ),
            (
                "HA- Exterior Maintenance, Repair, & Decoration",
                ("ha_exterior", "maintenance_repair", "household_personal"),
            ),
            ("HA- Lawn, Garden and Houseplants", ("ha_lawn", "lawn_garden", "household_personal")),
            ("HA- Animals and Pets", ("ha_pets", "household", "household_personal")),
            (
                "HA- Household Management/Other household activities",
                ("ha_other", "household", "household_personal"),
            ),
            ("CA- Caring for and Helping Children", ("care_children", "household", "household_personal")),
            ("CA- Caring for and Helping Adults", ("care_adults", "household", "household_personal")),
            ("WRK- General**", ("work_general", "work_education", "work_education")),
            ("WRK- Desk/Screen Based", ("work_screen", "work_education", "work_education")),
            (
                "EDU- Taking Class, Research, Homework",
                ("edu_class", "work_education", "work_education"),
            ),
            ("EDU- Extracurricular", ("edu_other", "work_education", "work_education")),
            ("ORG- Church, Spiritual", ("com_church", "purchase_other", "purchase_other")),
            (
                "Volunteer Work (ORG - Volunteer Work)",
                ("com_volunteer", "purchase_other", "purchase_other"),
            ),
            (
                "PUR- Purchasing Goods and Services",
                ("com_purchase", "purchase_other", "purchase_other"),
            ),
            ("EAT- Eating and Drinking, Waiting", ("ha_eat", "personal", "household_personal")),
            (
                "LES- Socializing, Communicating, Non-Screen Based",
                ("les_social", "leisure", "leisure"),
            ),
            (
                "LES- Screen-Based (TV, Video Game, Computer, Phone)",
                ("les_screen", "Leisure_Screen", "leisure"),
            ),
            (
                "EX- Participating in Sport, Exercise or Recreation***",
                ("ex_sport", "exercise", "leisure"),
            ),
            (
                "EX- Attending Sport, Exercise Recreation Event, or Performance",
                ("les_attend", "leisure", "leisure"),
            ),
            ("TRAV- Passenger (Car/Truck/Motorcycle)", ("trav_pass", "Trav_car", "transportation")),
            ("TRAV- Driver (Car/Truck/Motorcycle)", ("trav_drive", "Trav_car", "transportation")),
            (
                "TRAV- Passenger (Bus, Train, Tram, Plane, Boat, Ship)",
                ("trav_pass", "Trav_public", "transportation"),
            ),
            ("TRAV- Biking", ("trav_bike", "active_transportation", "transportation")),
            ("TRAV-Walking", ("trav_walk", "active_transportation", "transportation")),
            ("TRAV- General", ("trav_other", "transportation", "transportation")),
            (non_codable, ("non_codable", "non_codable", "non_codable")),
        ]
        .iter()
        .map(|(k, (a, b, w))| (k.to_string(), ActivityMeta::new(a, b, w)))
        .collect();

        let work_labels: HashSet<String> = ["WRK- General**", "WRK- Desk/Screen Based"]
            .iter()
            .map(|l| l.to_string())
            .collect();

        let posture_rules = vec![
            PostureRule::prefix("sb-sitting", "sitting"),
            PostureRule::prefix("sb-lying", "lying"),
            PostureRule::prefix("sb- lying", "lying"),
            PostureRule::prefix("la- kneeling", "kneel_squat"),
            PostureRule::exact("la- stretching", "stretch"),
            PostureRule::exact("la- stand and move", "stand_move"),
            PostureRule::exact("la- stand", "stand"),
            PostureRule::exact("wa- walk", "walk"),
            PostureRule::exact("wa- walking", "walk"),
            PostureRule::exact("trav- walking", "walk"),
            PostureRule::exact("trav-walking", "walk"),
            PostureRule::exact("wa-walk with load", "walk_load"),
            PostureRule::exact("wa- walk with load", "walk_load"),
            PostureRule::exact("wa- ascend stairs", "ascend"),
            PostureRule::exact("wa- descend stairs", "descend"),
            PostureRule::exact("wa- running", "running"),
            PostureRule::exact("sp- bike", "biking"),
            PostureRule::exact("sp- other sport movement", "sport_move"),
            PostureRule::exact("sp- swing", "sport_move"),
            PostureRule::exact("sp -kick", "sport_move"),
            PostureRule::exact("sp- jump", "sport_move"),
            PostureRule::exact("sp- muscle strengthening", "muscle_strength"),
            PostureRule::exact("private/not coded", "not_coded"),
        ];

        let posture_meta: HashMap<String, PostureMeta> = [
            ("sitting", ("sedentary", "sedentary")),
            ("lying", ("sedentary", "sedentary")),
            ("kneel_squat", ("sedentary", "mixed_move")),
            ("stretch", ("sport", "sport")),
            ("stand", ("stand_move", "mixed_move")),
            ("stand_move", ("stand_move", "mixed_move")),
            ("walk", ("walk", "walk")),
            ("walk_load", ("mod_walk", "walk")),
            ("ascend", ("mod_walk", "walk")),
            ("descend", ("mod_walk", "walk")),
            ("running", ("running", "running")),
            ("biking", ("biking", "biking")),
            ("sport_move", ("sport", "sport")),
            ("muscle_strength", ("sport", "sport")),
            ("not_coded", ("not_coded", "not_coded")),
        ]
        .iter()
        .map(|(k, (b, w))| (k.to_string(), PostureMeta::new(b, w)))
        .collect();

        Self {
            activity_aliases,
            activity_prefix_rules,
            activity_meta,
            work_labels,
            ex_participating_label: "EX- Participating in Sport, Exercise or Recreation***"
                .to_string(),
            ex_prefix: "EX-".to_string(),
            ex_meta: ActivityMeta::new("ex_sport", "exercise", "leisure"),
            posture_rules,
            posture_meta,
            sedentary_behavior_prefixes: ["sb-sitting", "sb-lying", "sb- lying", "la- kneeling"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            light_behaviors: ["la- stand", "la- stand and move", "la- stretching"]
                .iter()
                .map(|b| b.to_string())
                .collect(),
            non_codable_label: non_codable.to_string(),
            non_codable_behaviors: ["private/not coded"].iter().map(|b| b.to_string()).collect(),
        }
    }
}

impl CodingScheme {
    /// Resolve a raw activity-track behavior to its canonical activity label.
    pub fn canonical_activity(&self, behavior: Option<&str>) -> Option<String> {
        let norm = behavior.and_then(normalize_label)?;
        for (prefix, canonical) in &self.activity_prefix_rules {
            if norm.starts_with(prefix.as_str()) {
                return Some(canonical.clone());
            }
        }
        self.activity_aliases.get(&norm).cloned()
    }

    /// Category triple for a canonical activity label. Refined `EX-` labels
    /// coalesce to the participating-sport triple.
    pub fn activity_meta_for(&self, canonical: &str) -> Option<ActivityMeta> {
        if canonical.starts_with(self.ex_prefix.as_str()) {
            return Some(self.ex_meta.clone());
        }
        self.activity_meta.get(canonical).cloned()
    }

    /// Posture class for a combined behavior label, by the rule table.
    pub fn posture_class_for(&self, behavior: Option<&str>) -> Option<String> {
        let norm = behavior.and_then(normalize_label)?;
        for rule in &self.posture_rules {
            let hit = match rule.match_kind {
                MatchKind::Exact => norm == rule.pattern,
                MatchKind::Prefix => norm.starts_with(rule.pattern.as_str()),
            };
            if hit {
                return Some(rule.class.clone());
            }
        }
        None
    }

    pub fn posture_meta_for(&self, class: &str) -> Option<&PostureMeta> {
        self.posture_meta.get(class)
    }

    /// Intensity implied directly by the combined behavior, if any.
    pub fn intensity_from_behavior(&self, behavior: Option<&str>) -> Option<String> {
        let norm = behavior.and_then(normalize_label)?;
        if self
            .sedentary_behavior_prefixes
            .iter()
            .any(|p| norm.starts_with(p.as_str()))
        {
            return Some("sedentary".to_string());
        }
        if self.light_behaviors.contains(&norm) {
            return Some("light".to_string());
        }
        None
    }

    /// Whether a row must be removed from the final output.
    pub fn is_non_codable(&self, canonical: Option<&str>, behavior: Option<&str>) -> bool {
        if canonical == Some(self.non_codable_label.as_str()) {
            return true;
        }
        behavior
            .map(|b| self.non_codable_behaviors.contains(&b.trim().to_lowercase()))
            .unwrap_or(false)
    }
}

/// Refine the participating-sport canonical label with modifier 1
/// (`"Run/Jog"` becomes `"EX-run-jog"`).
fn refine_ex_label(modifier: &str) -> String {
    let joined = modifier
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .replace('/', "-");
    format!("EX-{joined}")
}

/// Normalize modifier 3 into a work-type code (`"SP- Hospiltality"` becomes
/// `"work_hospitality"`).
pub fn work_type_from_modifier(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let without_prefix = if trimmed.to_lowercase().starts_with("sp-") {
        trimmed[3..].trim_start()
    } else {
        trimmed
    };
    let joined = without_prefix
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .replace('/', "_")
        .replace("hospiltality", "hospitality");
    if joined.is_empty() {
        None
    } else {
        Some(format!("work_{joined}"))
    }
}

/// Normalize an intensity-bearing modifier value.
pub fn intensity_from_modifier(raw: Option<&str>) -> Option<String> {
    let s = raw?.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }
    if s.starts_with("vig") {
        return Some("vigorous".to_string());
    }
    if s.starts_with("mod") {
        return Some("moderate".to_string());
    }
    match s.as_str() {
        "light" => Some("light".to_string()),
        "sedentary" => Some("sedentary".to_string()),
        _ => None,
    }
}

/// Sedentary/active summary over posture class and activity-type code.
/// Sitting while driving or riding counts separately as `sed_drive`.
pub fn waves_sedentary(posture_class: Option<&str>, activity_type: Option<&str>) -> Option<String> {
    match posture_class? {
        "sitting" => {
            let driving = matches!(activity_type, Some("trav_drive") | Some("trav_pass"));
            Some(if driving { "sed_drive" } else { "sedentary" }.to_string())
        }
        "lying" | "kneel_squat" => Some("sedentary".to_string()),
        _ => Some("active".to_string()),
    }
}

/// Collapse moderate/vigorous into the combined `mvpa` bucket.
pub fn waves_intensity(intensity: Option<&str>) -> Option<String> {
    intensity.map(|i| {
        if i == "moderate" || i == "vigorous" {
            "mvpa".to_string()
        } else {
            i.to_string()
        }
    })
}

/// Encode one session's merged records into coded records.
///
/// Records must be ordered by second. Mapping happens per record; the
/// canonical activity label, posture class, intensity, and work type are
/// then forward-filled within the session so every second carries the most
/// recent known category.
pub fn encode_session(records: Vec<MergedRecord>, scheme: &CodingScheme) -> Vec<CodedRecord> {
    let mut coded: Vec<CodedRecord> = records
        .into_iter()
        .map(|merged| {
            let mut activity_label = scheme.canonical_activity(merged.activity_behavior.as_deref());
            if activity_label.as_deref() == Some(scheme.ex_participating_label.as_str()) {
                if let Some(m1) = merged.modifier_1.as_deref() {
                    activity_label = Some(refine_ex_label(m1));
                }
            }
            let work_type = work_type_from_modifier(merged.modifier_3.as_deref());
            CodedRecord {
                merged,
                activity_label,
                activity_type: None,
                broad_domain: None,
                waves_domain: None,
                posture_class: None,
                posture_broad: None,
                posture_waves: None,
                waves_sedentary: None,
                intensity: None,
                waves_intensity: None,
                work_type,
            }
        })
        .collect();

    ffill(&mut coded, |r: &mut CodedRecord| &mut r.activity_label);
    apply_activity_meta(&mut coded, scheme);

    // Posture and intensity read the posture-track label when that track is
    // present at the second; the combined label (activity-first) would hide
    // it wherever the tracks overlap.
    for record in coded.iter_mut() {
        record.posture_class = scheme.posture_class_for(posture_source(&record.merged));
    }
    ffill(&mut coded, |r: &mut CodedRecord| &mut r.posture_class);
    apply_posture_meta(&mut coded, scheme);

    for record in coded.iter_mut() {
        record.waves_sedentary =
            waves_sedentary(record.posture_class.as_deref(), record.activity_type.as_deref());
    }

    for record in coded.iter_mut() {
        record.intensity = scheme
            .intensity_from_behavior(posture_source(&record.merged))
            .or_else(|| intensity_from_modifier(record.merged.modifier_2.as_deref()));
    }
    ffill(&mut coded, |r: &mut CodedRecord| &mut r.intensity);
    for record in coded.iter_mut() {
        record.waves_intensity = waves_intensity(record.intensity.as_deref());
    }

    // work type sticks only to work-labeled seconds
    ffill(&mut coded, |r: &mut CodedRecord| &mut r.work_type);
    for record in coded.iter_mut() {
        let is_work = record
            .activity_label
            .as_deref()
            .map(|l| scheme.work_labels.contains(l))
            .unwrap_or(false);
        if !is_work {
            record.work_type = None;
        }
    }

    coded
}

/// Remove non-codable rows, then stabilize the categorical columns across
/// the seams the removal and the join left behind (forward- then back-fill,
/// with meta and the sedentary summary recomputed).
pub fn finalize_session(
    records: Vec<CodedRecord>,
    scheme: &CodingScheme,
) -> (Vec<CodedRecord>, usize) {
    let before = records.len();
    let mut kept: Vec<CodedRecord> = records
        .into_iter()
        .filter(|r| !scheme.is_non_codable(r.activity_label.as_deref(), r.merged.behavior.as_deref()))
        .collect();
    let removed = before - kept.len();

    ffill(&mut kept, |r: &mut CodedRecord| &mut r.activity_label);
    bfill(&mut kept, |r: &mut CodedRecord| &mut r.activity_label);
    apply_activity_meta(&mut kept, scheme);

    ffill(&mut kept, |r: &mut CodedRecord| &mut r.posture_class);
    bfill(&mut kept, |r: &mut CodedRecord| &mut r.posture_class);
    apply_posture_meta(&mut kept, scheme);

    for record in kept.iter_mut() {
        record.waves_sedentary =
            waves_sedentary(record.posture_class.as_deref(), record.activity_type.as_deref());
    }

    (kept, removed)
}

/// Label feeding the posture and intensity lookups at one second
fn posture_source(merged: &MergedRecord) -> Option<&str> {
    merged
        .posture_behavior
        .as_deref()
        .or(merged.behavior.as_deref())
}

fn apply_activity_meta(records: &mut [CodedRecord], scheme: &CodingScheme) {
    for record in records.iter_mut() {
        let meta = record
            .activity_label
            .as_deref()
            .and_then(|l| scheme.activity_meta_for(l));
        match meta {
            Some(m) => {
                record.activity_type = Some(m.activity_type);
                record.broad_domain = Some(m.broad_domain);
                record.waves_domain = Some(m.waves_domain);
            }
            None => {
                record.activity_type = None;
                record.broad_domain = None;
                record.waves_domain = None;
            }
        }
    }
}

fn apply_posture_meta(records: &mut [CodedRecord], scheme: &CodingScheme) {
    for record in records.iter_mut() {
        let meta = record
            .posture_class
            .as_deref()
            .and_then(|c| scheme.posture_meta_for(c).cloned());
        match meta {
            Some(m) => {
                record.posture_broad = Some(m.posture_broad);
                record.posture_waves = Some(m.posture_waves);
            }
            None => {
                record.posture_broad = None;
                record.posture_waves = None;
            }
        }
    }
}

fn ffill<F>(records: &mut [CodedRecord], mut field: F)
where
    F: FnMut(&mut CodedRecord) -> &mut Option<String>,
{
    let mut last: Option<String> = None;
    for record in records.iter_mut() {
        let slot = field(record);
        match slot {
            Some(v) => last = Some(v.clone()),
            None => *slot = last.clone(),
        }
    }
}

fn bfill<F>(records: &mut [CodedRecord], mut field: F)
where
    F: FnMut(&mut CodedRecord) -> &mut Option<String>,
{
    let mut next: Option<String> = None;
    for record in records.iter_mut().rev() {
        let slot = field(record);
        match slot {
            Some(v) => next = Some(v.clone()),
            None => *slot = next.clone(),
        }
    }
}
