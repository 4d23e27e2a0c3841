//! HL7 timestamp parsing.
//!
//! C-CDA timestamps are `YYYYMMDDHHMMSS` prefixes of varying precision,
//! optionally followed by a timezone suffix (`Z` or `+/-HHMM`) which is
//! stripped and ignored.

use chrono::{NaiveDate, NaiveDateTime};

/// Parse an HL7 timestamp prefix into a naive datetime.
///
/// Accepted precisions, longest first: `YYYYMMDDHHMMSS`, `YYYYMMDDHHMM`,
/// `YYYYMMDDHH`, `YYYYMMDD`, `YYYYMM`, `YYYY`. Missing components default to
/// their minimum (January, day 1, midnight). Returns `None` for empty or
/// unparseable input.
pub fn parse_hl7_time(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if !trimmed.is_ascii() {
        return None;
    }
    let s = strip_timezone(trimmed);
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let digits = |range: std::ops::Range<usize>| -> Option<u32> {
        s.get(range).and_then(|part| part.parse().ok())
    };

    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month = if s.len() >= 6 { digits(4..6)? } else { 1 };
    let day = if s.len() >= 8 { digits(6..8)? } else { 1 };
    let hour = if s.len() >= 10 { digits(8..10)? } else { 0 };
    let minute = if s.len() >= 12 { digits(10..12)? } else { 0 };
    let second = if s.len() >= 14 { digits(12..14)? } else { 0 };

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

fn strip_timezone(s: &str) -> &str {
    let s = s.strip_suffix('Z').unwrap_or(s);
    // +/-HHMM offset; never match a leading sign
    for sep in ['+', '-'] {
        if let Some(idx) = s[1..].rfind(sep) {
            return &s[..idx + 1];
        }
    }
    s
}
