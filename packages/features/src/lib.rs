#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-record feature derivation.
//!
//! [`FeatureDeriver`] is the single place where raw incident fields become
//! model features. The dataset builder calls it for every raw record and
//! every inference entry point calls it for ad-hoc requests, so the two
//! paths cannot drift apart.

pub mod hotspot;
pub mod labels;
pub mod parsing;
pub mod schema;
pub mod temporal;

use chrono::NaiveDateTime;
use crime_insight_crime_models::{CrimeGroup, LocationGroup, RankedRules};
use crime_insight_ingest_models::{AdminCodes, CanonicalRow, RawRecord, RowDefect};
use sha2::{Digest as _, Sha256};

pub use hotspot::HotspotBeats;
pub use schema::{
    CATEGORY_SCHEMA, FeatureSchema, FeatureVector, SchemaDescriptor, ZONE_SCHEMA,
};
pub use temporal::{HourGroup, Season, TemporalFeatures};

/// Errors raised when a feature vector does not follow the schema a model
/// expects.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Wrong number of values.
    #[error("schema {schema}: expected {expected} features, got {actual}")]
    LengthMismatch {
        /// Schema name.
        schema: &'static str,
        /// Schema width.
        expected: usize,
        /// Values supplied.
        actual: usize,
    },

    /// A named value is out of order or unknown.
    #[error("schema {schema}: field {position} should be '{expected}', got '{actual}'")]
    FieldMismatch {
        /// Schema name.
        schema: &'static str,
        /// Zero-based position of the first mismatch.
        position: usize,
        /// Field name the schema requires there.
        expected: String,
        /// Field name supplied.
        actual: String,
    },

    /// A persisted schema or feature configuration no longer matches.
    #[error("schema {schema}: fingerprint mismatch (trained with {expected}, current {actual})")]
    FingerprintMismatch {
        /// Schema name.
        schema: &'static str,
        /// Fingerprint recorded at training time.
        expected: String,
        /// Fingerprint of the current definition.
        actual: String,
    },
}

/// Everything derivable from one raw record without the zone model.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRecord {
    /// Parsed timestamp.
    pub timestamp: NaiveDateTime,
    /// Calendar features of the timestamp.
    pub temporal: TemporalFeatures,
    /// Grouped location description.
    pub location_group: LocationGroup,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Hotspot flag of the beat.
    pub hotspot_area: u8,
    /// Grouped crime type.
    pub crime_group: CrimeGroup,
}

/// Inputs of the category classifier, in schema order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryFeatures {
    /// Calendar features.
    pub temporal: TemporalFeatures,
    /// Administrative codes.
    pub codes: AdminCodes,
    /// Hotspot flag.
    pub hotspot_area: u8,
}

impl CategoryFeatures {
    /// Rebuilds the features stored in a canonical row.
    #[must_use]
    pub fn from_row(row: &CanonicalRow) -> Self {
        Self {
            temporal: TemporalFeatures {
                year: row.year,
                month: row.month,
                day: row.day,
                hour: row.hour,
                day_of_week: row.day_of_week,
                is_weekend: row.is_weekend == 1,
                season: Season::from_month(row.month),
                hour_group: HourGroup::from_hour(row.hour),
            },
            codes: row.codes(),
            hotspot_area: row.hotspot_area,
        }
    }

    /// Values in [`CATEGORY_SCHEMA`] order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        let t = &self.temporal;
        vec![
            f64::from(t.year),
            f64::from(t.month),
            f64::from(t.day),
            f64::from(t.hour),
            f64::from(t.day_of_week),
            f64::from(t.weekend_flag()),
            f64::from(t.season.code()),
            f64::from(t.hour_group.code()),
            code_value(self.codes.beat),
            code_value(self.codes.district),
            code_value(self.codes.ward),
            code_value(self.codes.community_area),
            f64::from(self.hotspot_area),
        ]
    }

    /// Schema-bound vector for inference.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if [`Self::values`] and [`CATEGORY_SCHEMA`]
    /// have drifted apart.
    pub fn to_vector(&self) -> Result<FeatureVector, SchemaError> {
        CATEGORY_SCHEMA.vector(self.values())
    }
}

/// Inputs of the zone predictor, in schema order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneFeatures {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Administrative codes.
    pub codes: AdminCodes,
}

impl ZoneFeatures {
    /// Zone features stored in a canonical row.
    #[must_use]
    pub const fn from_row(row: &CanonicalRow) -> Self {
        Self {
            latitude: row.latitude,
            longitude: row.longitude,
            codes: row.codes(),
        }
    }

    /// Values in [`ZONE_SCHEMA`] order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        vec![
            self.latitude,
            self.longitude,
            code_value(self.codes.beat),
            code_value(self.codes.district),
            code_value(self.codes.ward),
            code_value(self.codes.community_area),
        ]
    }

    /// Schema-bound vector for inference.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if [`Self::values`] and [`ZONE_SCHEMA`] have
    /// drifted apart.
    pub fn to_vector(&self) -> Result<FeatureVector, SchemaError> {
        ZONE_SCHEMA.vector(self.values())
    }
}

/// Absent codes encode as 0.
fn code_value(code: Option<u32>) -> f64 {
    code.map_or(0.0, f64::from)
}

/// Derives features from raw incident fields.
///
/// Holds the injected configuration (keyword rules and hotspot beats); it
/// has no other state.
#[derive(Debug, Clone)]
pub struct FeatureDeriver {
    location_rules: RankedRules<LocationGroup>,
    crime_rules: RankedRules<CrimeGroup>,
    hotspots: HotspotBeats,
}

impl Default for FeatureDeriver {
    fn default() -> Self {
        Self::new(
            RankedRules::location_defaults(),
            RankedRules::crime_defaults(),
            HotspotBeats::reference(),
        )
    }
}

impl FeatureDeriver {
    /// Creates a deriver from explicit configuration.
    #[must_use]
    pub const fn new(
        location_rules: RankedRules<LocationGroup>,
        crime_rules: RankedRules<CrimeGroup>,
        hotspots: HotspotBeats,
    ) -> Self {
        Self {
            location_rules,
            crime_rules,
            hotspots,
        }
    }

    /// The hotspot beat set in use.
    #[must_use]
    pub const fn hotspots(&self) -> &HotspotBeats {
        &self.hotspots
    }

    /// Derives every zone-independent feature of a raw record.
    ///
    /// # Errors
    ///
    /// Returns the [`RowDefect`] that excludes the record: the timestamp is
    /// checked first, then the coordinates.
    pub fn derive_record(&self, record: &RawRecord) -> Result<DerivedRecord, RowDefect> {
        let timestamp = record
            .date
            .as_deref()
            .and_then(parsing::parse_timestamp)
            .ok_or(RowDefect::UnparseableDate)?;

        let location_group = self.location_group(record.location_description.as_deref());

        let (Some(latitude), Some(longitude)) = (record.latitude, record.longitude) else {
            return Err(RowDefect::MissingCoordinates);
        };

        Ok(DerivedRecord {
            timestamp,
            temporal: TemporalFeatures::from_timestamp(timestamp),
            location_group,
            latitude,
            longitude,
            hotspot_area: self.hotspots.flag(record.codes.beat),
            crime_group: self.crime_group(record.primary_type.as_deref()),
        })
    }

    /// Groups a location description.
    #[must_use]
    pub fn location_group(&self, description: Option<&str>) -> LocationGroup {
        labels::classify_location(&self.location_rules, description)
    }

    /// Groups a primary crime type label.
    #[must_use]
    pub fn crime_group(&self, primary_type: Option<&str>) -> CrimeGroup {
        labels::classify_crime(&self.crime_rules, primary_type)
    }

    /// Category classifier inputs for an ad-hoc request.
    #[must_use]
    pub fn category_features(&self, timestamp: NaiveDateTime, codes: AdminCodes) -> CategoryFeatures {
        CategoryFeatures {
            temporal: TemporalFeatures::from_timestamp(timestamp),
            codes,
            hotspot_area: self.hotspots.flag(codes.beat),
        }
    }

    /// Zone predictor inputs for an ad-hoc request.
    #[must_use]
    pub const fn zone_features(&self, latitude: f64, longitude: f64, codes: AdminCodes) -> ZoneFeatures {
        ZoneFeatures {
            latitude,
            longitude,
            codes,
        }
    }

    /// SHA-256 over both model schemas, both keyword rule sets and the
    /// hotspot beat set.
    ///
    /// Two derivers with equal fingerprints produce identical rows and model
    /// inputs for identical records.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(CATEGORY_SCHEMA.fingerprint().as_bytes());
        hasher.update(ZONE_SCHEMA.fingerprint().as_bytes());
        hash_rules(&mut hasher, "location", &self.location_rules);
        hash_rules(&mut hasher, "crime", &self.crime_rules);
        hasher.update(b"hotspots");
        for beat in self.hotspots.iter() {
            hasher.update(beat.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Verifies that `expected` is this deriver's fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::FingerprintMismatch`] otherwise.
    pub fn ensure_fingerprint(&self, expected: &str) -> Result<(), SchemaError> {
        let actual = self.fingerprint();
        if actual == expected {
            Ok(())
        } else {
            log::error!("Feature configuration changed since training: {expected} != {actual}");
            Err(SchemaError::FingerprintMismatch {
                schema: "feature_config",
                expected: expected.to_string(),
                actual,
            })
        }
    }
}

/// Feeds rule order, categories, keywords and the fallback into `hasher`.
///
/// Every string is length-prefixed so adjacent keywords cannot run together.
fn hash_rules<C: AsRef<str> + Copy>(hasher: &mut Sha256, name: &str, rules: &RankedRules<C>) {
    fn field(hasher: &mut Sha256, text: &str) {
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }

    field(hasher, name);
    for (position, rule) in rules.rules().iter().enumerate() {
        hasher.update((position as u64).to_le_bytes());
        field(hasher, rule.category.as_ref());
        hasher.update((rule.keywords.len() as u64).to_le_bytes());
        for keyword in &rule.keywords {
            field(hasher, keyword);
        }
    }
    field(hasher, "fallback");
    field(hasher, rules.fallback().as_ref());
}

#[cfg(test)]
mod tests {
    use crime_insight_crime_models::KeywordRule;

    use super::*;

    fn raw(date: Option<&str>, lat: Option<f64>, lng: Option<f64>) -> RawRecord {
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
            primary_type: Some("AGGRAVATED BATTERY".to_string()),
        }
    }

    #[test]
    fn derives_reference_record() {
        let deriver = FeatureDeriver::default();
        let derived = deriver
            .derive_record(&raw(Some("2023-06-15 14:00"), Some(41.88), Some(-87.63)))
            .unwrap();
        assert_eq!(derived.temporal.month, 6);
        assert_eq!(derived.temporal.season, Season::Summer);
        assert_eq!(derived.temporal.hour_group, HourGroup::Afternoon);
        assert_eq!(derived.temporal.day_of_week, 3);
        assert!(!derived.temporal.is_weekend);
        assert_eq!(derived.location_group, LocationGroup::Street);
        assert_eq!(derived.hotspot_area, 1);
        assert_eq!(derived.crime_group, CrimeGroup::ViolentCrime);
    }

    #[test]
    fn date_is_checked_before_coordinates() {
        let deriver = FeatureDeriver::default();
        assert_eq!(
            deriver.derive_record(&raw(Some("garbage"), None, None)),
            Err(RowDefect::UnparseableDate)
        );
        assert_eq!(
            deriver.derive_record(&raw(Some("2023-06-15 14:00"), None, Some(-87.63))),
            Err(RowDefect::MissingCoordinates)
        );
    }

    #[test]
    fn inference_features_match_builder_features() {
        let deriver = FeatureDeriver::default();
        let record = raw(Some("2023-06-15 14:00"), Some(41.88), Some(-87.63));
        let derived = deriver.derive_record(&record).unwrap();

        let row = CanonicalRow {
            date: derived.timestamp,
            primary_type: record.primary_type.clone(),
            location_description: record.location_description.clone(),
            beat: record.codes.beat,
            district: record.codes.district,
            ward: record.codes.ward,
            community_area: record.codes.community_area,
            latitude: derived.latitude,
            longitude: derived.longitude,
            year: derived.temporal.year,
            month: derived.temporal.month,
            day: derived.temporal.day,
            hour: derived.temporal.hour,
            day_of_week: derived.temporal.day_of_week,
            is_weekend: derived.temporal.weekend_flag(),
            season: derived.temporal.season.code(),
            hour_group: derived.temporal.hour_group.code(),
            location_group: derived.location_group,
            spatial_cluster: 0,
            hotspot_area: derived.hotspot_area,
            crime_group: derived.crime_group,
        };

        let from_row = CategoryFeatures::from_row(&row).values();
        let from_request = deriver
            .category_features(derived.timestamp, record.codes)
            .values();
        assert_eq!(from_row, from_request);
        assert_eq!(from_row.len(), CATEGORY_SCHEMA.width());
    }

    #[test]
    fn typed_features_match_schema_width() {
        let deriver = FeatureDeriver::default();
        let codes = AdminCodes::default();
        let zone = deriver.zone_features(41.9, -87.7, codes);
        assert_eq!(zone.to_vector().unwrap().values().len(), ZONE_SCHEMA.width());
        assert_eq!(zone.values()[2], 0.0);
    }

    #[test]
    fn fingerprint_tracks_hotspot_set() {
        let reference = FeatureDeriver::default();
        let shifted = FeatureDeriver::new(
            RankedRules::location_defaults(),
            RankedRules::crime_defaults(),
            HotspotBeats::new([332]),
        );
        assert_eq!(reference.fingerprint(), FeatureDeriver::default().fingerprint());
        assert_ne!(reference.fingerprint(), shifted.fingerprint());
        assert!(shifted.ensure_fingerprint(&reference.fingerprint()).is_err());
    }

    #[test]
    fn fingerprint_tracks_keyword_rules() {
        let reference = FeatureDeriver::default();
        let relabelled = FeatureDeriver::new(
            RankedRules::location_defaults(),
            RankedRules::new(
                vec![KeywordRule::new(CrimeGroup::PropertyCrime, &["BATTERY"])],
                CrimeGroup::OtherCrime,
            ),
            HotspotBeats::reference(),
        );
        assert_eq!(reference.crime_group(Some("BATTERY")), CrimeGroup::ViolentCrime);
        assert_eq!(relabelled.crime_group(Some("BATTERY")), CrimeGroup::PropertyCrime);
        assert_ne!(reference.fingerprint(), relabelled.fingerprint());
        assert!(relabelled.ensure_fingerprint(&reference.fingerprint()).is_err());
    }

    #[test]
    fn fingerprint_tracks_rule_order_and_fallback() {
        let street = KeywordRule::new(LocationGroup::Street, &["PARKING"]);
        let business = KeywordRule::new(LocationGroup::Business, &["STORE"]);
        let deriver = |rules: Vec<KeywordRule<LocationGroup>>, fallback| {
            FeatureDeriver::new(
                RankedRules::new(rules, fallback),
                RankedRules::crime_defaults(),
                HotspotBeats::reference(),
            )
        };

        let base = deriver(vec![street.clone(), business.clone()], LocationGroup::Other);
        let swapped = deriver(vec![business.clone(), street.clone()], LocationGroup::Other);
        let fallback = deriver(vec![street.clone(), business.clone()], LocationGroup::Public);
        let merged = deriver(
            vec![KeywordRule::new(LocationGroup::Street, &["PARKINGSTORE"]), business],
            LocationGroup::Other,
        );

        let lowercase = deriver(
            vec![street, KeywordRule::new(LocationGroup::Business, &["store"])],
            LocationGroup::Other,
        );
        assert_eq!(base.fingerprint(), lowercase.fingerprint());
        assert_ne!(base.fingerprint(), swapped.fingerprint());
        assert_ne!(base.fingerprint(), fallback.fingerprint());
        assert_ne!(base.fingerprint(), merged.fingerprint());
    }
}
