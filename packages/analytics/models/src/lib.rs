#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report row types and the zone region lookup table.
//!
//! Zone ids are opaque cluster indices; the human-readable region names,
//! descriptions, and risk levels a dashboard shows for them are configured
//! data held in a [`RegionTable`].

use std::collections::BTreeMap;

use crime_insight_crime_models::RiskLevel;
use serde::{Deserialize, Serialize};

/// Human-readable description of one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    /// Zone id this region describes.
    pub cluster_id: u32,
    /// Neighborhood name.
    pub name: String,
    /// Short description of the zone's crime profile.
    pub description: String,
    /// Risk level shown next to the zone.
    #[serde(default)]
    pub risk: RiskLevel,
}

impl RegionInfo {
    /// Entry returned for zones without a configured region.
    #[must_use]
    pub fn unknown(cluster_id: u32) -> Self {
        Self {
            cluster_id,
            name: "Unknown".to_string(),
            description: "No data".to_string(),
            risk: RiskLevel::Low,
        }
    }
}

/// Zone id to region lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionTable {
    regions: BTreeMap<u32, RegionInfo>,
}

impl RegionTable {
    /// Builds the table. A later entry for the same zone id replaces an
    /// earlier one.
    #[must_use]
    pub fn new(regions: impl IntoIterator<Item = RegionInfo>) -> Self {
        Self {
            regions: regions.into_iter().map(|r| (r.cluster_id, r)).collect(),
        }
    }

    /// Region of `cluster_id`, or [`RegionInfo::unknown`].
    #[must_use]
    pub fn lookup(&self, cluster_id: u32) -> RegionInfo {
        self.regions
            .get(&cluster_id)
            .cloned()
            .unwrap_or_else(|| RegionInfo::unknown(cluster_id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Configured regions in zone id order.
    pub fn iter(&self) -> impl Iterator<Item = &RegionInfo> {
        self.regions.values()
    }
}

/// A report row type with a fixed CSV header.
///
/// [`Self::HEADER`] lists the serialized field names in order, so a report
/// with no rows still gets a header line.
pub trait ReportRow: Serialize {
    const HEADER: &'static [&'static str];
}

/// Incident count of one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotEntry {
    pub cluster_id: u32,
    pub count: u64,
}

impl ReportRow for HotspotEntry {
    const HEADER: &'static [&'static str] = &["cluster_id", "count"];
}

/// Zone center joined with its region description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneCenterEntry {
    pub cluster_id: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub region: String,
    pub description: String,
    pub risk: RiskLevel,
}

impl ReportRow for ZoneCenterEntry {
    const HEADER: &'static [&'static str] = &[
        "cluster_id",
        "latitude",
        "longitude",
        "region",
        "description",
        "risk",
    ];
}

/// Incident count of one police beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatCount {
    pub beat: u32,
    pub count: u64,
}

impl ReportRow for BeatCount {
    const HEADER: &'static [&'static str] = &["beat", "count"];
}
