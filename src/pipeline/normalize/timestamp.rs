//! Timestamp normalization for export records.
//!
//! Exports write instants in several shapes (ISO with or without offset,
//! fractional seconds, space-separated, day-first dotted dates in markup,
//! Unix epoch numbers). Every shape collapses to a `NaiveDateTime` in UTC
//! when it carries an offset, or as written when it does not. Anything
//! unrecognized is `None`; callers always tolerate a missing timestamp.

use chrono::{DateTime, NaiveDateTime};

/// A single recognized textual layout.
#[derive(Debug, Clone, Copy)]
enum Pattern {
    /// No offset in the text; taken as written.
    Naive(&'static str),
    /// Carries an offset; converted to UTC.
    Offset(&'static str),
    Rfc3339,
}

impl Pattern {
    fn parse(&self, text: &str) -> Option<NaiveDateTime> {
        match self {
            Self::Naive(fmt) => NaiveDateTime::parse_from_str(text, fmt).ok(),
            Self::Offset(fmt) => DateTime::parse_from_str(text, fmt)
                .ok()
                .map(|dt| dt.naive_utc()),
            Self::Rfc3339 => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc()),
        }
    }
}

/// Ordered: the first pattern that matches wins.
const PATTERNS: &[Pattern] = &[
    Pattern::Naive("%Y-%m-%dT%H:%M:%S"),
    Pattern::Naive("%Y-%m-%d %H:%M:%S"),
    Pattern::Offset("%Y-%m-%dT%H:%M:%S%z"),
    Pattern::Offset("%Y-%m-%dT%H:%M:%S%.f%z"),
    Pattern::Naive("%Y-%m-%dT%H:%M:%S%.f"),
    Pattern::Rfc3339,
    Pattern::Naive("%d.%m.%Y %H:%M:%S"),
    Pattern::Naive("%d.%m.%Y %H:%M"),
    Pattern::Naive("%Y-%m-%d %H:%M"),
];

/// Layouts used by markup exports (dotted day-first or dashed year-first).
const MARKUP_PATTERNS: &[&str] = &[
    "%d.%m.%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a textual timestamp against the full pattern list.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    PATTERNS.iter().find_map(|pattern| pattern.parse(text))
}

/// Normalize a JSON value: strings go through [`parse_timestamp`], numbers
/// are Unix epoch seconds (UTC).
pub fn normalize_value(value: &serde_json::Value) -> Option<NaiveDateTime> {
    match value {
        serde_json::Value::String(text) => parse_timestamp(text),
        serde_json::Value::Number(number) => {
            if let Some(secs) = number.as_i64() {
                from_epoch_seconds(secs, 0)
            } else {
                let secs = number.as_f64()?;
                if !secs.is_finite() {
                    return None;
                }
                let whole = secs.floor();
                let nanos = ((secs - whole) * 1_000_000_000.0) as u32;
                from_epoch_seconds(whole as i64, nanos)
            }
        }
        _ => None,
    }
}

/// Epoch seconds carried as a digit string (the `date_unixtime` field).
pub fn parse_epoch_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    from_epoch_seconds(text.parse().ok()?, 0)
}

fn from_epoch_seconds(secs: i64, nanos: u32) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
}

/// Parse a markup date (`title` attribute or text of the date element).
///
/// Markup exports often append the writer's zone, e.g.
/// `01.01.2024 10:00:00 UTC+03:00`; such values are converted to UTC.
pub fn parse_markup_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let (local, offset) = match text.find(" UTC") {
        Some(pos) => (text[..pos].trim_end(), Some(text[pos + 4..].trim())),
        None => (text, None),
    };

    let naive = MARKUP_PATTERNS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(local, fmt).ok())?;

    match offset {
        None => Some(naive),
        Some("") => Some(naive),
        Some(offset) => {
            let offset = parse_utc_offset(offset)?;
            Some(naive - chrono::Duration::seconds(i64::from(offset)))
        }
    }
}

/// `+03:00`, `-0530`, `+3` → offset in seconds east of UTC.
fn parse_utc_offset(text: &str) -> Option<i32> {
    let (sign, digits) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };

    if !digits.bytes().all(|b| b.is_ascii_digit() || b == b':') {
        return None;
    }

    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 => digits.split_at(2),
        None => (digits, "0"),
    };

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}
