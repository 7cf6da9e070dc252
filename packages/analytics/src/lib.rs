#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reports over the canonical feature table.
//!
//! Each function produces the rows of one dashboard input: per-zone
//! incident counts, zone centers joined with their configured regions, and
//! the most frequent police beats. [`write_csv`] persists any of them.

use std::{collections::BTreeMap, path::Path};

use crime_insight_analytics_models::{
    BeatCount, HotspotEntry, RegionTable, ReportRow, ZoneCenterEntry,
};
use crime_insight_ingest_models::CanonicalRow;
use crime_insight_spatial::ZoneModel;
use thiserror::Error;

/// Errors that can occur while writing reports.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// CSV encoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Incident count per zone, busiest first. Ties are ordered by zone id.
#[must_use]
pub fn hotspot_report(rows: &[CanonicalRow]) -> Vec<HotspotEntry> {
    let mut report: Vec<HotspotEntry> = count_by(rows.iter().map(|r| r.spatial_cluster))
        .into_iter()
        .map(|(cluster_id, count)| HotspotEntry { cluster_id, count })
        .collect();
    report.sort_by(|a, b| b.count.cmp(&a.count).then(a.cluster_id.cmp(&b.cluster_id)));
    report
}

/// Every zone center of `model` with its region name, description, and
/// risk level, in zone id order.
#[must_use]
pub fn zone_center_table(model: &ZoneModel, regions: &RegionTable) -> Vec<ZoneCenterEntry> {
    model
        .zone_centers()
        .into_iter()
        .map(|center| {
            let region = regions.lookup(center.cluster_id);
            ZoneCenterEntry {
                cluster_id: center.cluster_id,
                latitude: center.latitude,
                longitude: center.longitude,
                region: region.name,
                description: region.description,
                risk: region.risk,
            }
        })
        .collect()
}

/// The `n` beats with the most incidents. Rows without a beat are not
/// counted.
#[must_use]
pub fn top_beats(rows: &[CanonicalRow], n: usize) -> Vec<BeatCount> {
    let mut beats: Vec<BeatCount> = count_by(rows.iter().filter_map(|r| r.beat))
        .into_iter()
        .map(|(beat, count)| BeatCount { beat, count })
        .collect();
    beats.sort_by(|a, b| b.count.cmp(&a.count).then(a.beat.cmp(&b.beat)));
    beats.truncate(n);
    beats
}

fn count_by(keys: impl Iterator<Item = u32>) -> BTreeMap<u32, u64> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Writes report rows as CSV with a header taken from the field names.
///
/// An empty report is written as the header line alone.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the file cannot be created or written.
pub fn write_csv<T: ReportRow>(path: &Path, rows: &[T]) -> Result<(), AnalyticsError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        writer.write_record(T::HEADER)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    log::info!("Wrote {} report rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crime_insight_analytics_models::RegionInfo;
    use crime_insight_crime_models::{CrimeGroup, LocationGroup, RiskLevel};
    use crime_insight_spatial::Coordinate;

    use super::*;

    fn row(zone: u32, beat: Option<u32>) -> CanonicalRow {
        CanonicalRow {
            date: NaiveDate::from_ymd_opt(2023, 6, 15)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap(),
            primary_type: None,
            location_description: None,
            beat,
            district: None,
            ward: None,
            community_area: None,
            latitude: 41.8,
            longitude: -87.6,
            year: 2023,
            month: 6,
            day: 15,
            hour: 14,
            day_of_week: 3,
            is_weekend: 0,
            season: 2,
            hour_group: 2,
            location_group: LocationGroup::Unknown,
            spatial_cluster: zone,
            hotspot_area: 0,
            crime_group: CrimeGroup::OtherCrime,
        }
    }

    #[test]
    fn hotspots_sort_by_count_then_zone() {
        let rows: Vec<CanonicalRow> = [3, 1, 3, 0, 1, 2, 3]
            .into_iter()
            .map(|z| row(z, None))
            .collect();
        let report = hotspot_report(&rows);
        let pairs: Vec<(u32, u64)> = report.iter().map(|e| (e.cluster_id, e.count)).collect();
        assert_eq!(pairs, vec![(3, 3), (1, 2), (0, 1), (2, 1)]);
    }

    #[test]
    fn top_beats_skips_missing_and_truncates() {
        let rows: Vec<CanonicalRow> = [Some(332), None, Some(925), Some(332), Some(414), None]
            .into_iter()
            .map(|b| row(0, b))
            .collect();
        let beats = top_beats(&rows, 2);
        assert_eq!(
            beats,
            vec![
                BeatCount { beat: 332, count: 2 },
                BeatCount { beat: 414, count: 1 },
            ]
        );
        assert!(top_beats(&[], 5).is_empty());
    }

    #[test]
    fn zone_centers_join_regions() {
        let model = ZoneModel::from_centers(vec![
            Coordinate::new(41.88, -87.63),
            Coordinate::new(41.78, -87.64),
        ])
        .unwrap();
        let regions = RegionTable::new([RegionInfo {
            cluster_id: 0,
            name: "Loop".to_string(),
            description: "Tourist theft.".to_string(),
            risk: RiskLevel::High,
        }]);

        let table = zone_center_table(&model, &regions);
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].region, "Loop");
        assert_eq!(table[0].risk, RiskLevel::High);
        assert_eq!(table[1].region, "Unknown");
        assert_eq!(table[1].risk, RiskLevel::Low);
        assert!((table[1].latitude - 41.78).abs() < 1e-12);
    }

    #[test]
    fn hotspot_csv_has_expected_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hotspots").join("hotspot_report.csv");
        let rows = vec![row(5, None), row(5, None), row(2, None)];
        write_csv(&path, &hotspot_report(&rows)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "cluster_id,count\n5,2\n2,1\n");
    }

    #[test]
    fn empty_reports_still_have_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hotspot_report.csv");
        write_csv(&path, &hotspot_report(&[])).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "cluster_id,count\n");

        let path = dir.path().join("zone_regions.csv");
        write_csv::<ZoneCenterEntry>(&path, &[]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "cluster_id,latitude,longitude,region,description,risk\n"
        );
    }

    fn serialized_header<T: ReportRow>(row: &T) -> String {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(row).unwrap();
        let bytes = writer.into_inner().unwrap();
        String::from_utf8(bytes).unwrap().lines().next().unwrap().to_string()
    }

    #[test]
    fn fixed_headers_match_serialized_field_names() {
        let hotspot = HotspotEntry {
            cluster_id: 1,
            count: 2,
        };
        assert_eq!(serialized_header(&hotspot), HotspotEntry::HEADER.join(","));

        let beat = BeatCount { beat: 111, count: 2 };
        assert_eq!(serialized_header(&beat), BeatCount::HEADER.join(","));

        let center = ZoneCenterEntry {
            cluster_id: 0,
            latitude: 41.88,
            longitude: -87.63,
            region: "Loop".to_string(),
            description: "Downtown".to_string(),
            risk: RiskLevel::High,
        };
        assert_eq!(serialized_header(&center), ZoneCenterEntry::HEADER.join(","));
    }
}
