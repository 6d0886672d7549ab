//! Time-string normalization and clock formatting
//!
//! Observation exports encode session-relative times in several shapes:
//! `"H:MM:SS.f"`, `"MM:SS.f"`, bare seconds, with comma or semicolon decimal
//! separators, or blank/"nan"/"none" placeholders. Everything normalizes to
//! seconds here. The session log carries wall-clock times in 12-hour format.

use chrono::NaiveTime;

/// Parse a session-relative time string into seconds.
///
/// Disambiguation is by colon count: two colons is `H:MM:SS`, one colon is
/// `MM:SS` with an implicit hour of zero, none is bare seconds. Unparseable
/// or blank input yields `None`, never an error.
pub fn parse_relative_seconds(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower == "nan" || lower == "none" {
        return None;
    }

    // Normalize comma/semicolon decimal separators before parsing.
    let cleaned = trimmed.replace([',', ';'], ".");

    let parts: Vec<&str> = cleaned.split(':').collect();
    match parts.len() {
        3 => hms_seconds(parts[0], parts[1], parts[2]),
        2 => hms_seconds("0", parts[0], parts[1]),
        1 => {
            if is_plain_number(&cleaned) {
                cleaned.parse::<f64>().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

fn hms_seconds(h: &str, m: &str, s: &str) -> Option<f64> {
    let hours = parse_digits(h)?;
    let minutes = parse_digits(m)?;
    if !is_plain_number(s) {
        return None;
    }
    let seconds = s.parse::<f64>().ok()?;
    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u64>().ok()
}

/// `digits` or `digits.digits`, nothing else (no sign, no exponent)
fn is_plain_number(s: &str) -> bool {
    let mut parts = s.splitn(2, '.');
    let int = parts.next().unwrap_or("");
    if int.is_empty() || !int.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match parts.next() {
        Some(frac) => !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit()),
        None => true,
    }
}

/// Format seconds as an `HH:MM:SS` label, with a fixed-width fractional
/// suffix when `decimals > 0`. Rounds at the requested scale.
pub fn format_hms(seconds: f64, decimals: u32) -> String {
    let scale = 10_i64.pow(decimals);
    let total_units = (seconds * scale as f64).round() as i64;
    let secs = total_units / scale;
    let frac = total_units % scale;
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if decimals == 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{h:02}:{m:02}:{s:02}.{frac:0width$}", width = decimals as usize)
    }
}

/// Parse a 12-hour wall-clock string; seconds are optional.
pub fn parse_clock_12h(raw: &str) -> Option<NaiveTime> {
    let s = raw.trim();
    NaiveTime::parse_from_str(s, "%I:%M:%S %p")
        .or_else(|_| NaiveTime::parse_from_str(s, "%I:%M %p"))
        .ok()
}

/// Render a wall-clock time in 12-hour display format.
pub fn format_clock_12h(t: NaiveTime) -> String {
    t.format("%I:%M:%S %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_hms_forms() {
        assert_eq!(parse_relative_seconds("0:05:12"), Some(312.0));
        assert_eq!(parse_relative_seconds("1:00:00"), Some(3600.0));
        assert_eq!(parse_relative_seconds("05:12"), Some(312.0));
        assert_eq!(parse_relative_seconds("12"), Some(12.0));
        assert_eq!(parse_relative_seconds("12.5"), Some(12.5));
    }

    #[test]
    fn test_parse_fractional_seconds() {
        assert_eq!(parse_relative_seconds("0:00:03.20"), Some(3.2));
        assert_eq!(parse_relative_seconds("00:03.2"), Some(3.2));
    }

    #[test]
    fn test_parse_alternate_decimal_separators() {
        assert_eq!(parse_relative_seconds("0:00:03,20"), Some(3.2));
        assert_eq!(parse_relative_seconds("0:00:03;20"), Some(3.2));
        assert_eq!(parse_relative_seconds("10,5"), Some(10.5));
    }

    #[test]
    fn test_parse_blank_and_sentinels() {
        assert_eq!(parse_relative_seconds(""), None);
        assert_eq!(parse_relative_seconds("   "), None);
        assert_eq!(parse_relative_seconds("nan"), None);
        assert_eq!(parse_relative_seconds("NaN"), None);
        assert_eq!(parse_relative_seconds("None"), None);
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_relative_seconds("abc"), None);
        assert_eq!(parse_relative_seconds("1:2:3:4"), None);
        assert_eq!(parse_relative_seconds("-5"), None);
        assert_eq!(parse_relative_seconds("1e3"), None);
        assert_eq!(parse_relative_seconds("12."), None);
        assert_eq!(parse_relative_seconds(".5"), None);
    }

    #[test]
    fn test_format_hms_whole_seconds() {
        assert_eq!(format_hms(0.0, 0), "00:00:00");
        assert_eq!(format_hms(312.0, 0), "00:05:12");
        assert_eq!(format_hms(3661.0, 0), "01:01:01");
    }

    #[test]
    fn test_format_hms_fractional() {
        assert_eq!(format_hms(3.21, 2), "00:00:03.21");
        assert_eq!(format_hms(3.216, 2), "00:00:03.22");
        // rounding can carry into the seconds field
        assert_eq!(format_hms(59.996, 2), "00:01:00.00");
    }

    #[test]
    fn test_parse_clock_12h() {
        assert_eq!(
            parse_clock_12h("6:43:57 PM"),
            NaiveTime::from_hms_opt(18, 43, 57)
        );
        assert_eq!(
            parse_clock_12h("4:43 PM"),
            NaiveTime::from_hms_opt(16, 43, 0)
        );
        assert_eq!(
            parse_clock_12h("8:00:27 AM"),
            NaiveTime::from_hms_opt(8, 0, 27)
        );
        assert_eq!(parse_clock_12h("25:00:00 PM"), None);
    }

    #[test]
    fn test_format_clock_12h() {
        let t = NaiveTime::from_hms_opt(18, 43, 57).unwrap();
        assert_eq!(format_clock_12h(t), "06:43:57 PM");
    }
}
