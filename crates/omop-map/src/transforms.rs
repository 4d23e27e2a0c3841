//! Field-value transforms named by rule files.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// How a raw extracted value becomes a typed column value.
///
/// The vocabulary transforms (`vocab`, `unit`, `route`, `value_vocab`) are
/// evaluated by the engine against the loaded vocabulary index; the rest are
/// plain conversions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Pass the raw string through unchanged.
    #[default]
    None,
    String,
    Int,
    Float,
    /// Timestamp truncated to midnight.
    Date,
    /// Timestamp kept as parsed.
    TimePtr,
    /// Replaced by the resolved concept id of the entry's vocab field.
    Vocab,
    /// UCUM unit code lookup.
    Unit,
    /// Route code lookup, SNOMED when the code system is not recognized.
    Route,
    /// Coded value lookup, SNOMED when the code system is not recognized.
    ValueVocab,
    /// `"code: display"`, or whichever half is non-empty.
    FormatSource,
}

/// Truncate a timestamp to midnight.
pub fn midnight(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date().and_hms_opt(0, 0, 0).unwrap_or(dt)
}

/// Combine a code and display name into one source value.
pub fn format_source_value(code: &str, display_name: &str) -> String {
    if !code.is_empty() && !display_name.is_empty() {
        format!("{code}: {display_name}")
    } else if !display_name.is_empty() {
        display_name.to_string()
    } else {
        code.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn transform_names_round_trip() {
        let t: Transform = serde_yaml::from_str("time_ptr").unwrap();
        assert_eq!(t, Transform::TimePtr);
        let t: Transform = serde_yaml::from_str("format_source").unwrap();
        assert_eq!(t, Transform::FormatSource);
        assert!(serde_yaml::from_str::<Transform>("camelCase").is_err());
    }

    #[test]
    fn midnight_truncates_time() {
        let dt = NaiveDate::from_ymd_opt(2023, 4, 15)
            .unwrap()
            .and_hms_opt(13, 45, 9)
            .unwrap();
        assert_eq!(
            midnight(dt),
            NaiveDate::from_ymd_opt(2023, 4, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn source_value_formatting() {
        assert_eq!(format_source_value("8480-6", "Systolic BP"), "8480-6: Systolic BP");
        assert_eq!(format_source_value("", "Systolic BP"), "Systolic BP");
        assert_eq!(format_source_value("8480-6", ""), "8480-6");
        assert_eq!(format_source_value("", ""), "");
    }
}
