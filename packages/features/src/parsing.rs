//! Field-level parsing shared by ingestion and inference.
//!
//! Timestamps, coordinates and administrative codes must parse identically
//! whether they come from the raw table or from a prediction request.

use chrono::{NaiveDate, NaiveDateTime};

/// Datetime formats accepted for incident timestamps, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    // City data portal export, e.g. `06/15/2023 02:00:00 PM`
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses an incident timestamp.
///
/// Date-only values (`YYYY-MM-DD`) resolve to midnight. Returns `None` for
/// empty or unrecognised text and for impossible calendar dates.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Parses a coordinate component. Returns `None` if empty, unparseable, or
/// not finite.
#[must_use]
pub fn parse_coordinate(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses an administrative code such as a beat or ward number.
///
/// Leading zeros are accepted (`"0332"` is beat 332), as are integral
/// float renderings (`"35.0"`) left behind by spreadsheet exports.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]
pub fn parse_code(s: &str) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(code) = s.parse::<u32>() {
        return Some(code);
    }

    let value = s.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX)
    {
        Some(value as u32)
    } else {
        None
    }
}

/// Trims a free-text field, mapping blank text to `None`.
#[must_use]
pub fn parse_text(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
