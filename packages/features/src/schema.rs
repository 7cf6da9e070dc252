//! Versioned feature schemas shared by training and inference.
//!
//! Every model-facing feature vector is built against one of the static
//! schemas here. A trained model records the [`SchemaDescriptor`] it was
//! trained with, and refuses vectors whose schema fingerprint differs.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::SchemaError;

/// Semantic type of one feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Integral calendar component.
    Integer,
    /// 0/1 indicator.
    Flag,
    /// Small-cardinality integer code.
    Ordinal,
    /// Administrative code treated as a category id.
    Code,
    /// Real-valued measurement.
    Continuous,
}

impl FeatureKind {
    /// Stable name used in fingerprints.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Flag => "flag",
            Self::Ordinal => "ordinal",
            Self::Code => "code",
            Self::Continuous => "continuous",
        }
    }
}

/// One named, typed column of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureField {
    /// Column name.
    pub name: &'static str,
    /// Semantic type.
    pub kind: FeatureKind,
}

const fn field(name: &'static str, kind: FeatureKind) -> FeatureField {
    FeatureField { name, kind }
}

/// An ordered, versioned list of feature columns.
#[derive(Debug, PartialEq, Eq)]
pub struct FeatureSchema {
    /// Schema name.
    pub name: &'static str,
    /// Bumped whenever fields change.
    pub version: u32,
    /// Columns in vector order.
    pub fields: &'static [FeatureField],
}

/// Feature schema of the crime category classifier.
pub static CATEGORY_SCHEMA: FeatureSchema = FeatureSchema {
    name: "crime_category",
    version: 1,
    fields: &[
        field("year", FeatureKind::Integer),
        field("month", FeatureKind::Integer),
        field("day", FeatureKind::Integer),
        field("hour", FeatureKind::Integer),
        field("day_of_week", FeatureKind::Ordinal),
        field("is_weekend", FeatureKind::Flag),
        field("season", FeatureKind::Ordinal),
        field("hour_group", FeatureKind::Ordinal),
        field("beat", FeatureKind::Code),
        field("district", FeatureKind::Code),
        field("ward", FeatureKind::Code),
        field("community_area", FeatureKind::Code),
        field("hotspot_area", FeatureKind::Flag),
    ],
};

/// Feature schema of the zone predictor.
pub static ZONE_SCHEMA: FeatureSchema = FeatureSchema {
    name: "spatial_zone",
    version: 1,
    fields: &[
        field("latitude", FeatureKind::Continuous),
        field("longitude", FeatureKind::Continuous),
        field("beat", FeatureKind::Code),
        field("district", FeatureKind::Code),
        field("ward", FeatureKind::Code),
        field("community_area", FeatureKind::Code),
    ],
};

impl FeatureSchema {
    /// Column names in vector order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.fields.len()
    }

    /// SHA-256 over the schema name, version, and every `(name, kind)` pair
    /// in order, hex encoded.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update(self.version.to_le_bytes());
        for f in self.fields {
            hasher.update(b"|");
            hasher.update(f.name.as_bytes());
            hasher.update(b":");
            hasher.update(f.kind.as_str().as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Serializable description of this schema for model artifacts.
    #[must_use]
    pub fn descriptor(&self) -> SchemaDescriptor {
        SchemaDescriptor {
            name: self.name.to_string(),
            version: self.version,
            fields: self.fields.iter().map(|f| f.name.to_string()).collect(),
            fingerprint: self.fingerprint(),
        }
    }

    /// Wraps positional values in a vector bound to this schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::LengthMismatch`] if the value count differs
    /// from the schema width.
    pub fn vector(&'static self, values: Vec<f64>) -> Result<FeatureVector, SchemaError> {
        if values.len() != self.width() {
            return Err(SchemaError::LengthMismatch {
                schema: self.name,
                expected: self.width(),
                actual: values.len(),
            });
        }
        Ok(FeatureVector {
            schema: self,
            values,
        })
    }

    /// Builds a vector from `(name, value)` pairs that must list every
    /// field exactly in schema order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::LengthMismatch`] if fields are missing or
    /// extra, or [`SchemaError::FieldMismatch`] at the first position whose
    /// name differs from the schema.
    pub fn vector_from_named(
        &'static self,
        named: &[(&str, f64)],
    ) -> Result<FeatureVector, SchemaError> {
        if named.len() != self.width() {
            return Err(SchemaError::LengthMismatch {
                schema: self.name,
                expected: self.width(),
                actual: named.len(),
            });
        }
        for (position, (f, (name, _))) in self.fields.iter().zip(named).enumerate() {
            if f.name != *name {
                return Err(SchemaError::FieldMismatch {
                    schema: self.name,
                    position,
                    expected: f.name.to_string(),
                    actual: (*name).to_string(),
                });
            }
        }
        self.vector(named.iter().map(|(_, v)| *v).collect())
    }
}

/// A schema as recorded inside a persisted model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Schema name.
    pub name: String,
    /// Schema version.
    pub version: u32,
    /// Columns in vector order.
    pub fields: Vec<String>,
    /// Schema fingerprint at training time.
    pub fingerprint: String,
}

impl SchemaDescriptor {
    /// Verifies that this recorded schema is the same as `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::FingerprintMismatch`] naming the first
    /// differing aspect.
    pub fn ensure_matches(&self, schema: &FeatureSchema) -> Result<(), SchemaError> {
        let current = schema.fingerprint();
        if self.name == schema.name
            && self.version == schema.version
            && self.fields == schema.field_names()
            && self.fingerprint == current
        {
            return Ok(());
        }
        Err(SchemaError::FingerprintMismatch {
            schema: schema.name,
            expected: self.fingerprint.clone(),
            actual: current,
        })
    }
}

/// Feature values bound to the schema they were built for.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    schema: &'static FeatureSchema,
    values: Vec<f64>,
}

impl FeatureVector {
    /// The schema these values follow.
    #[must_use]
    pub const fn schema(&self) -> &'static FeatureSchema {
        self.schema
    }

    /// Values in schema order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Consumes the vector, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Value of the named field, if the schema has it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema
            .fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| self.values[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_schema_field_order_is_fixed() {
        assert_eq!(
            CATEGORY_SCHEMA.field_names(),
            vec![
                "year",
                "month",
                "day",
                "hour",
                "day_of_week",
                "is_weekend",
                "season",
                "hour_group",
                "beat",
                "district",
                "ward",
                "community_area",
                "hotspot_area",
            ]
        );
    }

    #[test]
    fn zone_schema_field_order_is_fixed() {
        assert_eq!(
            ZONE_SCHEMA.field_names(),
            vec![
                "latitude",
                "longitude",
                "beat",
                "district",
                "ward",
                "community_area"
            ]
        );
    }

    #[test]
    fn fingerprints_are_stable_and_distinct() {
        assert_eq!(CATEGORY_SCHEMA.fingerprint(), CATEGORY_SCHEMA.fingerprint());
        assert_eq!(CATEGORY_SCHEMA.fingerprint().len(), 64);
        assert_ne!(CATEGORY_SCHEMA.fingerprint(), ZONE_SCHEMA.fingerprint());
    }

    #[test]
    fn descriptor_matches_its_schema_only() {
        let descriptor = CATEGORY_SCHEMA.descriptor();
        assert!(descriptor.ensure_matches(&CATEGORY_SCHEMA).is_ok());
        assert!(descriptor.ensure_matches(&ZONE_SCHEMA).is_err());
    }

    #[test]
    fn reordered_descriptor_is_rejected() {
        let mut descriptor = ZONE_SCHEMA.descriptor();
        descriptor.fields.swap(0, 1);
        assert!(matches!(
            descriptor.ensure_matches(&ZONE_SCHEMA),
            Err(SchemaError::FingerprintMismatch { .. })
        ));
    }

    #[test]
    fn wrong_width_is_rejected() {
        let err = ZONE_SCHEMA.vector(vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::LengthMismatch {
                expected: 6,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn named_values_must_follow_schema_order() {
        let ok = ZONE_SCHEMA
            .vector_from_named(&[
                ("latitude", 41.88),
                ("longitude", -87.63),
                ("beat", 332.0),
                ("district", 11.0),
                ("ward", 29.0),
                ("community_area", 35.0),
            ])
            .unwrap();
        assert_eq!(ok.get("beat"), Some(332.0));

        let err = ZONE_SCHEMA
            .vector_from_named(&[
                ("longitude", -87.63),
                ("latitude", 41.88),
                ("beat", 332.0),
                ("district", 11.0),
                ("ward", 29.0),
                ("community_area", 35.0),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::FieldMismatch { position: 0, .. }
        ));

        let missing = ZONE_SCHEMA
            .vector_from_named(&[("latitude", 41.88), ("longitude", -87.63)])
            .unwrap_err();
        assert!(matches!(missing, SchemaError::LengthMismatch { .. }));
    }
}
