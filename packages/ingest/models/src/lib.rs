#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Raw incident, canonical feature row, and build report types.
//!
//! A [`RawRecord`] is one incident exactly as read from the input table. The
//! dataset builder turns each usable raw record into a [`CanonicalRow`], the
//! enriched unit every downstream model trains on, and summarizes the pass in
//! a [`BuildReport`].

use std::time::Duration;

use chrono::NaiveDateTime;
use crime_insight_crime_models::{CrimeGroup, LocationGroup};
use serde::{Deserialize, Serialize};

/// Administrative codes attached to an incident.
///
/// Codes are optional per row; an absent code is encoded as `0` wherever a
/// numeric feature vector is required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdminCodes {
    /// Police beat.
    pub beat: Option<u32>,
    /// Police district.
    pub district: Option<u32>,
    /// City council ward.
    pub ward: Option<u32>,
    /// Community area.
    pub community_area: Option<u32>,
}

/// One incident as read from the raw input table.
///
/// Nothing here is validated beyond field-level parsing: the timestamp is
/// kept as raw text and coordinates that failed to parse are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// Raw timestamp text.
    pub date: Option<String>,
    /// Latitude (WGS84), if present and numeric.
    pub latitude: Option<f64>,
    /// Longitude (WGS84), if present and numeric.
    pub longitude: Option<f64>,
    /// Free-text location description.
    pub location_description: Option<String>,
    /// Administrative codes.
    pub codes: AdminCodes,
    /// Free-text primary crime type label.
    pub primary_type: Option<String>,
}

/// The enriched, persisted unit of the canonical feature table.
///
/// Field order here is the column order of the canonical CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    /// Parsed incident timestamp.
    pub date: NaiveDateTime,
    /// Free-text primary crime type label.
    pub primary_type: Option<String>,
    /// Free-text location description.
    pub location_description: Option<String>,
    /// Police beat.
    pub beat: Option<u32>,
    /// Police district.
    pub district: Option<u32>,
    /// City council ward.
    pub ward: Option<u32>,
    /// Community area.
    pub community_area: Option<u32>,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Calendar year.
    pub year: i32,
    /// Month of year, 1-12.
    pub month: u32,
    /// Day of month, 1-31.
    pub day: u32,
    /// Hour of day, 0-23.
    pub hour: u32,
    /// Day of week, Monday = 0.
    pub day_of_week: u32,
    /// 1 on Saturday and Sunday, else 0.
    pub is_weekend: u8,
    /// 1 spring, 2 summer, 3 fall, 4 winter.
    pub season: u8,
    /// 0 night, 1 morning, 2 afternoon, 3 evening.
    pub hour_group: u8,
    /// Grouped location description.
    pub location_group: LocationGroup,
    /// Zone id assigned by the fitted zone model.
    pub spatial_cluster: u32,
    /// 1 if the beat is in the hotspot beat set, else 0.
    pub hotspot_area: u8,
    /// Grouped crime type label.
    pub crime_group: CrimeGroup,
}

impl CanonicalRow {
    /// Administrative codes of this row.
    #[must_use]
    pub const fn codes(&self) -> AdminCodes {
        AdminCodes {
            beat: self.beat,
            district: self.district,
            ward: self.ward,
            community_area: self.community_area,
        }
    }
}

/// Why a raw record was left out of the canonical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowDefect {
    /// Timestamp missing or in no recognised format.
    UnparseableDate,
    /// Latitude or longitude missing.
    MissingCoordinates,
}

/// Summary of one dataset build pass.
///
/// Drop counters are disjoint: a record is counted under the first defect
/// found, checking the timestamp before the coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Raw records read.
    pub input_rows: u64,
    /// Records dropped for an unparseable or missing timestamp.
    pub unparseable_dates: u64,
    /// Records dropped for a missing latitude or longitude.
    pub missing_coordinates: u64,
    /// Canonical rows emitted.
    pub output_rows: u64,
    /// Number of points the zone model was fit on, if it was fit in this pass.
    pub zone_fit_sample: Option<u64>,
    /// Wall-clock duration of the pass.
    pub duration: Duration,
}

impl BuildReport {
    /// Counts one dropped record.
    pub const fn record_defect(&mut self, defect: RowDefect) {
        match defect {
            RowDefect::UnparseableDate => self.unparseable_dates += 1,
            RowDefect::MissingCoordinates => self.missing_coordinates += 1,
        }
    }

    /// Total records dropped for any reason.
    #[must_use]
    pub const fn dropped_rows(&self) -> u64 {
        self.unparseable_dates + self.missing_coordinates
    }

    /// Whether `output = input - dropped` holds.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.input_rows == self.output_rows + self.dropped_rows()
    }
}
