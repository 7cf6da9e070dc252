#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident count forecasting over the canonical feature table.
//!
//! The table is aggregated into a period-end count series at one
//! [`Granularity`], a [`Forecaster`] is fit on it, and future periods are
//! predicted with an uncertainty interval. [`evaluate_holdout`] measures a
//! forecaster against the most recent periods it was not fit on.

pub mod evaluate;
pub mod model;
pub mod series;

use std::path::Path;

use chrono::{Datelike as _, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use evaluate::{HoldoutReport, evaluate_holdout};
pub use model::{Forecaster, SeasonalTrendForecaster};
pub use series::{SeriesPoint, aggregate, aggregate_timestamps};

/// Errors that can occur while aggregating, fitting, or evaluating.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    /// The series is too short for the requested operation.
    #[error("Insufficient history: need at least {required} points, got {available}")]
    InsufficientHistory {
        /// Points needed.
        required: usize,
        /// Points available.
        available: usize,
    },

    /// The forecast horizon is unusable.
    #[error("Invalid horizon: {message}")]
    InvalidHorizon {
        /// Description of what went wrong.
        message: String,
    },

    /// `predict` was called before a successful `fit`.
    #[error("Forecaster has not been fit")]
    NotFitted,

    /// CSV encoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Period length of an aggregated series.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Granularity {
    /// Calendar months, labelled by month end.
    Monthly,
    /// Calendar quarters, labelled by quarter end.
    Quarterly,
    /// Calendar years, labelled by December 31.
    Yearly,
}

impl Granularity {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Monthly, Self::Quarterly, Self::Yearly]
    }

    /// Periods forecast and held out when no horizon is given.
    #[must_use]
    pub const fn default_horizon(self) -> usize {
        match self {
            Self::Monthly => 12,
            Self::Quarterly => 8,
            Self::Yearly => 3,
        }
    }

    /// Number of periods in one seasonal cycle.
    #[must_use]
    pub const fn season_length(self) -> usize {
        match self {
            Self::Monthly => 12,
            Self::Quarterly => 4,
            Self::Yearly => 1,
        }
    }

    /// Position of the period ending at `period_end` within its cycle.
    #[must_use]
    pub fn season_index(self, period_end: NaiveDate) -> usize {
        let month0 = period_end.month0() as usize;
        match self {
            Self::Monthly => month0,
            Self::Quarterly => month0 / 3,
            Self::Yearly => 0,
        }
    }

    /// Last day of the period containing `date`.
    #[must_use]
    pub fn period_end(self, date: NaiveDate) -> NaiveDate {
        let month = match self {
            Self::Monthly => date.month(),
            Self::Quarterly => date.month0() / 3 * 3 + 3,
            Self::Yearly => 12,
        };
        month_end(date.year(), month)
    }

    /// Period end directly after the period ending at `period_end`.
    #[must_use]
    pub fn next_period_end(self, period_end: NaiveDate) -> NaiveDate {
        period_end
            .succ_opt()
            .map_or(period_end, |next| self.period_end(next))
    }
}

fn month_end(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// One forecast period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Last day of the forecast period.
    pub period_end: NaiveDate,
    /// Point estimate of the incident count.
    pub estimate: f64,
    /// Lower bound of the 95% interval, never below zero.
    pub lower: f64,
    /// Upper bound of the 95% interval.
    pub upper: f64,
}

/// Writes forecast points as `period_end,estimate,lower,upper`.
///
/// # Errors
///
/// Returns [`ForecastError`] if the file cannot be created or written.
pub fn write_forecast_csv(path: &Path, points: &[ForecastPoint]) -> Result<(), ForecastError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for point in points {
        writer.serialize(point)?;
    }
    writer.flush()?;
    log::info!("Wrote {} forecast points to {}", points.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn period_ends_follow_calendar() {
        assert_eq!(Granularity::Monthly.period_end(date(2024, 2, 10)), date(2024, 2, 29));
        assert_eq!(Granularity::Monthly.period_end(date(2023, 12, 1)), date(2023, 12, 31));
        assert_eq!(Granularity::Quarterly.period_end(date(2023, 5, 2)), date(2023, 6, 30));
        assert_eq!(Granularity::Quarterly.period_end(date(2023, 11, 30)), date(2023, 12, 31));
        assert_eq!(Granularity::Yearly.period_end(date(2023, 1, 1)), date(2023, 12, 31));
    }

    #[test]
    fn next_period_end_rolls_over_year() {
        assert_eq!(Granularity::Monthly.next_period_end(date(2023, 12, 31)), date(2024, 1, 31));
        assert_eq!(Granularity::Quarterly.next_period_end(date(2023, 9, 30)), date(2023, 12, 31));
        assert_eq!(Granularity::Yearly.next_period_end(date(2023, 12, 31)), date(2024, 12, 31));
    }

    #[test]
    fn granularity_parses_case_insensitively() {
        assert_eq!(Granularity::from_str("Monthly").unwrap(), Granularity::Monthly);
        assert_eq!(Granularity::from_str("yearly").unwrap(), Granularity::Yearly);
        assert_eq!(Granularity::Quarterly.to_string(), "quarterly");
        assert!(Granularity::from_str("weekly").is_err());
    }

    #[test]
    fn default_horizons() {
        let horizons: Vec<usize> = Granularity::all()
            .iter()
            .map(|g| g.default_horizon())
            .collect();
        assert_eq!(horizons, vec![12, 8, 3]);
    }

    #[test]
    fn forecast_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast").join("forecast_monthly.csv");
        let points = vec![ForecastPoint {
            period_end: date(2024, 1, 31),
            estimate: 10.5,
            lower: 2.0,
            upper: 19.0,
        }];
        write_forecast_csv(&path, &points).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("period_end,estimate,lower,upper"));
        assert_eq!(lines.next(), Some("2024-01-31,10.5,2.0,19.0"));
    }
}
