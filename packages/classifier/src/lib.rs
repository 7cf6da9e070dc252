#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Supervised models over the canonical feature table.
//!
//! * [`CategoryClassifier`] predicts the three-way crime group from
//!   spatiotemporal features.
//! * [`ZonePredictor`] predicts the spatial zone from coordinates and
//!   administrative codes.
//!
//! Both record the feature schema they were trained against and refuse
//! vectors built for any other schema. Artifacts are `MessagePack` files.

pub mod category;
mod forest;
pub mod zone;

use std::path::Path;

use crime_insight_features::SchemaError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub use category::CategoryClassifier;
pub use zone::ZonePredictor;

/// Version of the persisted model artifact layout.
pub const ARTIFACT_VERSION: u32 = 1;

/// Errors that can occur while training, persisting, or querying a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Feature vector or artifact does not follow the expected schema.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Too little data to train.
    #[error("Insufficient training data: {message}")]
    InsufficientData {
        /// Description of what is missing.
        message: String,
    },

    /// Training parameters are unusable.
    #[error("Invalid training parameters: {message}")]
    InvalidParameters {
        /// Description of what went wrong.
        message: String,
    },

    /// The underlying learner failed.
    #[error("Learner error: {message}")]
    Learner {
        /// Message reported by the learner.
        message: String,
    },

    /// The model produced a class index outside its label encoding.
    #[error("Predicted class index {index} outside label encoding of {classes} classes")]
    UnknownClass {
        /// Predicted index.
        index: u32,
        /// Number of known classes.
        classes: usize,
    },

    /// The artifact was trained against a different zone model or layout.
    #[error("Artifact mismatch: {message}")]
    ArtifactMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `MessagePack` encoding failed.
    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// `MessagePack` decoding failed.
    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Random forest training parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees.
    pub trees: u16,
    /// Maximum tree depth.
    pub max_depth: u16,
    /// Seeded row sample taken before splitting; `None` uses every row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_cap: Option<usize>,
    /// Fraction of rows held out for the test accuracy, in `[0, 1)`.
    pub test_fraction: f64,
    /// Seed for sampling, splitting, and tree bagging.
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::category()
    }
}

impl ForestParams {
    /// Defaults of the category classifier.
    #[must_use]
    pub const fn category() -> Self {
        Self {
            trees: 100,
            max_depth: 20,
            sample_cap: Some(700_000),
            test_fraction: 0.2,
            seed: 42,
        }
    }

    /// Defaults of the zone predictor.
    #[must_use]
    pub const fn zone() -> Self {
        Self {
            trees: 300,
            max_depth: 25,
            sample_cap: None,
            test_fraction: 0.2,
            seed: 42,
        }
    }

    /// Checks the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidParameters`] describing the first problem.
    pub fn validate(&self) -> Result<(), ModelError> {
        let problem = if self.trees == 0 {
            Some("trees must be at least 1".to_string())
        } else if self.max_depth == 0 {
            Some("max_depth must be at least 1".to_string())
        } else if self.sample_cap == Some(0) {
            Some("sample_cap must be at least 1".to_string())
        } else if !(0.0..1.0).contains(&self.test_fraction) {
            Some(format!(
                "test_fraction {} must be in [0, 1)",
                self.test_fraction
            ))
        } else {
            None
        };

        problem.map_or(Ok(()), |message| {
            Err(ModelError::InvalidParameters { message })
        })
    }
}

/// Accuracy of a trained model on its own split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Rows the forest was fit on.
    pub train_rows: usize,
    /// Rows held out.
    pub test_rows: usize,
    /// Accuracy on the training rows.
    pub train_accuracy: f64,
    /// Accuracy on the held-out rows, if any were held out.
    pub test_accuracy: Option<f64>,
    /// RFC 3339 training time.
    pub trained_at: String,
}

fn write_artifact<T: Serialize>(path: &Path, artifact: &T, kind: &str) -> Result<(), ModelError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = rmp_serde::to_vec_named(artifact)?;
    std::fs::write(path, &bytes)?;
    log::info!(
        "Saved {kind} ({} bytes) to {}",
        bytes.len(),
        path.display()
    );
    Ok(())
}

fn read_artifact<T: DeserializeOwned>(path: &Path, kind: &str) -> Result<T, ModelError> {
    let bytes = std::fs::read(path)?;
    let artifact = rmp_serde::from_slice(&bytes)?;
    log::info!("Loaded {kind} from {}", path.display());
    Ok(artifact)
}

fn ensure_version(version: u32) -> Result<(), ModelError> {
    if version == ARTIFACT_VERSION {
        Ok(())
    } else {
        Err(ModelError::ArtifactMismatch {
            message: format!("unsupported artifact version {version}"),
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveDate;
    use crime_insight_crime_models::{CrimeGroup, LocationGroup};
    use crime_insight_features::{FeatureDeriver, TemporalFeatures};
    use crime_insight_ingest_models::CanonicalRow;

    /// A canonical row built the way the dataset builder builds one.
    #[allow(clippy::too_many_arguments)]
    pub fn row(
        deriver: &FeatureDeriver,
        day: u32,
        hour: u32,
        beat: u32,
        district: u32,
        coords: (f64, f64),
        zone: u32,
        crime_group: CrimeGroup,
    ) -> CanonicalRow {
        let date = NaiveDate::from_ymd_opt(2023, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        let t = TemporalFeatures::from_timestamp(date);
        CanonicalRow {
            date,
            primary_type: None,
            location_description: None,
            beat: Some(beat),
            district: Some(district),
            ward: Some(district * 2),
            community_area: Some(district + 10),
            latitude: coords.0,
            longitude: coords.1,
            year: t.year,
            month: t.month,
            day: t.day,
            hour: t.hour,
            day_of_week: t.day_of_week,
            is_weekend: t.weekend_flag(),
            season: t.season.code(),
            hour_group: t.hour_group.code(),
            location_group: LocationGroup::Unknown,
            spatial_cluster: zone,
            hotspot_area: deriver.hotspots().flag(Some(beat)),
            crime_group,
        }
    }

    /// Small parameters so tests train quickly.
    pub const fn quick_params() -> super::ForestParams {
        super::ForestParams {
            trees: 15,
            max_depth: 6,
            sample_cap: None,
            test_fraction: 0.2,
            seed: 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_model_kind() {
        assert_eq!(ForestParams::default(), ForestParams::category());
        assert_eq!(ForestParams::category().sample_cap, Some(700_000));
        assert_eq!(ForestParams::zone().trees, 300);
        assert_eq!(ForestParams::zone().max_depth, 25);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let bad_fraction = ForestParams {
            test_fraction: 1.0,
            ..ForestParams::category()
        };
        assert!(bad_fraction.validate().is_err());

        let no_trees = ForestParams {
            trees: 0,
            ..ForestParams::zone()
        };
        assert!(no_trees.validate().is_err());
        assert!(ForestParams::zone().validate().is_ok());
    }
}
