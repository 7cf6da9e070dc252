//! Raw records to canonical feature rows.

use std::{sync::Arc, time::Instant};

use crime_insight_features::{DerivedRecord, FeatureDeriver};
use crime_insight_ingest_models::{BuildReport, CanonicalRow, RawRecord};
use crime_insight_spatial::{Coordinate, ZoneId, ZoneModel, ZonerParams};

use crate::{
    IngestError,
    progress::{ProgressCallback, null_progress},
};

/// Where the zone model used for enrichment comes from.
#[derive(Debug, Clone, Copy)]
pub enum ZoneSource<'a> {
    /// Fit a new model on the coordinates of every usable record, once,
    /// before any row is enriched.
    Fit(&'a ZonerParams),
    /// Reuse an already fitted model.
    Fitted(&'a ZoneModel),
}

/// Result of one build pass.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Canonical rows, in input order.
    pub rows: Vec<CanonicalRow>,
    /// The zone model every row was assigned with.
    pub zone_model: ZoneModel,
    /// Counters and timing.
    pub report: BuildReport,
}

impl BuildOutput {
    /// Whether the zone model was fit during this pass.
    #[must_use]
    pub const fn fitted_zone_model(&self) -> bool {
        self.report.zone_fit_sample.is_some()
    }
}

/// Builds the canonical feature table.
pub struct DatasetBuilder {
    deriver: FeatureDeriver,
    progress: Arc<dyn ProgressCallback>,
}

impl DatasetBuilder {
    /// Creates a builder around an injected feature deriver.
    #[must_use]
    pub fn new(deriver: FeatureDeriver) -> Self {
        Self {
            deriver,
            progress: null_progress(),
        }
    }

    /// Reports per-record progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// The deriver rows are built with.
    #[must_use]
    pub const fn deriver(&self) -> &FeatureDeriver {
        &self.deriver
    }

    /// Enriches `records` into canonical rows.
    ///
    /// A record is dropped if its timestamp does not parse, or else if a
    /// coordinate is missing. Every other record yields exactly one row, in
    /// input order.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Zone`] if a zone model has to be fit and the
    /// fit fails, e.g. with too few distinct coordinates.
    pub fn build(
        &self,
        records: &[RawRecord],
        zones: ZoneSource<'_>,
    ) -> Result<BuildOutput, IngestError> {
        let start = Instant::now();
        let mut report = BuildReport {
            input_rows: records.len() as u64,
            ..BuildReport::default()
        };

        self.progress.set_message("Deriving features".to_string());
        self.progress.set_total(records.len() as u64);

        let mut kept: Vec<(&RawRecord, DerivedRecord)> = Vec::with_capacity(records.len());
        for record in records {
            match self.deriver.derive_record(record) {
                Ok(derived) => kept.push((record, derived)),
                Err(defect) => report.record_defect(defect),
            }
            self.progress.inc(1);
        }

        let coordinates: Vec<Coordinate> = kept
            .iter()
            .map(|(_, d)| Coordinate::new(d.latitude, d.longitude))
            .collect();

        let zone_model = match zones {
            ZoneSource::Fit(params) => {
                self.progress.set_message("Fitting zones".to_string());
                let model = ZoneModel::fit(&coordinates, params)?;
                report.zone_fit_sample = Some(model.metadata().sample_size as u64);
                model
            }
            ZoneSource::Fitted(model) => model.clone(),
        };

        self.progress.set_message("Assigning zones".to_string());
        let zone_ids = zone_model.assign_batch(&coordinates);

        let rows: Vec<CanonicalRow> = kept
            .into_iter()
            .zip(zone_ids)
            .map(|((record, derived), zone)| canonical_row(record, &derived, zone))
            .collect();

        report.output_rows = rows.len() as u64;
        report.duration = start.elapsed();

        log::info!(
            "Built {} canonical rows from {} raw records in {:.1}s",
            report.output_rows,
            report.input_rows,
            report.duration.as_secs_f64()
        );
        log::info!(
            "Dropped {} records: {} unparseable dates, {} missing coordinates",
            report.dropped_rows(),
            report.unparseable_dates,
            report.missing_coordinates
        );

        self.progress.finish(format!(
            "{} rows ({} dropped)",
            report.output_rows,
            report.dropped_rows()
        ));

        Ok(BuildOutput {
            rows,
            zone_model,
            report,
        })
    }
}

fn canonical_row(record: &RawRecord, derived: &DerivedRecord, zone: ZoneId) -> CanonicalRow {
    let t = &derived.temporal;
    CanonicalRow {
        date: derived.timestamp,
        primary_type: record.primary_type.clone(),
        location_description: record.location_description.clone(),
        beat: record.codes.beat,
        district: record.codes.district,
        ward: record.codes.ward,
        community_area: record.codes.community_area,
        latitude: derived.latitude,
        longitude: derived.longitude,
        year: t.year,
        month: t.month,
        day: t.day,
        hour: t.hour,
        day_of_week: t.day_of_week,
        is_weekend: t.weekend_flag(),
        season: t.season.code(),
        hour_group: t.hour_group.code(),
        location_group: derived.location_group,
        spatial_cluster: zone,
        hotspot_area: derived.hotspot_area,
        crime_group: derived.crime_group,
    }
}

#[cfg(test)]
mod tests {
    use crime_insight_crime_models::{CrimeGroup, LocationGroup};
    use crime_insight_features::CategoryFeatures;
    use crime_insight_ingest_models::AdminCodes;
    use crime_insight_spatial::ZoneError;

    use super::*;

    fn record(date: Option<&str>, lat: Option<f64>, lng: Option<f64>) -> RawRecord {
        RawRecord {
            date: date.map(str::to_string),
            latitude: lat,
            longitude: lng,
            location_description: Some("123 MAIN STREET".to_string()),
            codes: AdminCodes {
                beat: Some(332),
                district: Some(11),
                ward: Some(29),
                community_area: Some(35),
            },
            primary_type: Some("THEFT".to_string()),
        }
    }

    fn two_zones() -> ZoneModel {
        ZoneModel::from_centers(vec![
            Coordinate::new(41.75, -87.60),
            Coordinate::new(41.95, -87.70),
        ])
        .unwrap()
    }

    #[test]
    fn reference_record_becomes_expected_row() {
        let builder = DatasetBuilder::new(FeatureDeriver::default());
        let zones = two_zones();
        let output = builder
            .build(
                &[record(Some("2023-06-15 14:00"), Some(41.88), Some(-87.63))],
                ZoneSource::Fitted(&zones),
            )
            .unwrap();

        assert_eq!(output.rows.len(), 1);
        let row = &output.rows[0];
        assert_eq!(row.month, 6);
        assert_eq!(row.season, 2);
        assert_eq!(row.hour_group, 2);
        assert_eq!(row.day_of_week, 3);
        assert_eq!(row.is_weekend, 0);
        assert_eq!(row.location_group, LocationGroup::Street);
        assert_eq!(row.hotspot_area, 1);
        assert_eq!(row.crime_group, CrimeGroup::PropertyCrime);
        assert_eq!(
            row.spatial_cluster,
            zones.assign(Coordinate::new(41.88, -87.63))
        );
        assert!(!output.fitted_zone_model());
    }

    #[test]
    fn record_without_description_or_latitude_is_dropped() {
        let builder = DatasetBuilder::new(FeatureDeriver::default());
        let mut incomplete = record(Some("2023-06-15 14:00"), None, Some(-87.63));
        incomplete.location_description = None;

        let output = builder
            .build(&[incomplete], ZoneSource::Fitted(&two_zones()))
            .unwrap();
        assert!(output.rows.is_empty());
        assert_eq!(output.report.missing_coordinates, 1);
        assert_eq!(output.report.unparseable_dates, 0);
    }

    #[test]
    fn output_count_is_input_minus_drops() {
        let builder = DatasetBuilder::new(FeatureDeriver::default());
        let records = vec![
            record(Some("2023-06-15 14:00"), Some(41.88), Some(-87.63)),
            record(Some("not a date"), Some(41.88), Some(-87.63)),
            record(None, None, None),
            record(Some("2023-06-16 01:30"), Some(41.70), None),
            record(Some("06/17/2023 11:15:00 PM"), Some(41.99), Some(-87.71)),
            record(Some("2023-06-18"), Some(0.0), Some(0.0)),
        ];

        let output = builder
            .build(&records, ZoneSource::Fitted(&two_zones()))
            .unwrap();
        let report = &output.report;
        assert_eq!(report.input_rows, 6);
        assert_eq!(report.unparseable_dates, 2);
        assert_eq!(report.missing_coordinates, 1);
        assert_eq!(report.output_rows, 3);
        assert!(report.is_consistent());
        assert_eq!(output.rows.len(), 3);
        assert_eq!(output.rows[1].hour, 23);
        assert_eq!(output.rows[1].is_weekend, 1);
    }

    #[test]
    fn fitting_zones_uses_every_usable_record() {
        let builder = DatasetBuilder::new(FeatureDeriver::default());
        let records: Vec<RawRecord> = (0..12)
            .map(|i| {
                let offset = f64::from(i) * 0.01;
                record(Some("2023-01-02 08:00"), Some(41.8 + offset), Some(-87.7 + offset))
            })
            .chain(std::iter::once(record(Some("2023-01-02 08:00"), None, None)))
            .collect();

        let params = ZonerParams {
            clusters: 3,
            n_init: 2,
            ..ZonerParams::default()
        };
        let output = builder.build(&records, ZoneSource::Fit(&params)).unwrap();
        assert!(output.fitted_zone_model());
        assert_eq!(output.report.zone_fit_sample, Some(12));
        assert_eq!(output.zone_model.clusters(), 3);
        assert!(output.rows.iter().all(|r| r.spatial_cluster < 3));
    }

    #[test]
    fn zone_fit_failure_aborts_build() {
        let builder = DatasetBuilder::new(FeatureDeriver::default());
        let records = vec![record(Some("2023-06-15 14:00"), Some(41.88), Some(-87.63)); 5];
        let err = builder
            .build(&records, ZoneSource::Fit(&ZonerParams::default()))
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Zone(ZoneError::InsufficientData {
                distinct: 1,
                requested: 30
            })
        ));
    }

    #[test]
    fn rows_reproduce_inference_features() {
        let deriver = FeatureDeriver::default();
        let builder = DatasetBuilder::new(deriver.clone());
        let raw = record(Some("2023-12-31 05:59"), Some(41.88), Some(-87.63));
        let output = builder
            .build(std::slice::from_ref(&raw), ZoneSource::Fitted(&two_zones()))
            .unwrap();

        let timestamp = output.rows[0].date;
        assert_eq!(
            CategoryFeatures::from_row(&output.rows[0]).values(),
            deriver.category_features(timestamp, raw.codes).values()
        );
    }

    #[test]
    fn progress_sees_every_record() {
        let progress = Arc::new(crate::progress::recording::RecordingProgress::default());
        let builder =
            DatasetBuilder::new(FeatureDeriver::default()).with_progress(progress.clone());
        let records = vec![
            record(Some("2023-06-15 14:00"), Some(41.88), Some(-87.63)),
            record(Some("bad"), Some(41.88), Some(-87.63)),
        ];
        builder
            .build(&records, ZoneSource::Fitted(&two_zones()))
            .unwrap();

        assert_eq!(*progress.totals.lock().unwrap(), vec![2]);
        assert_eq!(*progress.done.lock().unwrap(), 2);
        let messages = progress.messages.lock().unwrap();
        assert_eq!(messages.first().map(String::as_str), Some("Deriving features"));
        assert_eq!(messages.last().map(String::as_str), Some("1 rows (1 dropped)"));
    }
}
