//! Supervised approximation of the spatial zone assignment.

use std::path::Path;

use crime_insight_features::{
    FeatureDeriver, FeatureVector, SchemaDescriptor, ZONE_SCHEMA, ZoneFeatures,
};
use crime_insight_ingest_models::{AdminCodes, CanonicalRow};
use crime_insight_spatial::{ZoneId, ZoneModel};
use serde::{Deserialize, Serialize};

use crate::{
    ForestParams, ModelError, TrainingMetrics, ensure_version,
    forest::{self, Forest},
    read_artifact, write_artifact,
};

const KIND: &str = "zone predictor";

/// Predicts a zone id from coordinates and administrative codes.
///
/// Learned from the `spatial_cluster` labels of one zone model; it records
/// that model's fingerprint and is only meaningful next to it.
#[derive(Serialize, Deserialize)]
pub struct ZonePredictor {
    version: u32,
    schema: SchemaDescriptor,
    zone_model_fingerprint: String,
    clusters: usize,
    metrics: TrainingMetrics,
    forest: Forest,
}

impl ZonePredictor {
    /// Trains on canonical rows whose zones were assigned by `zone_model`.
    ///
    /// # Errors
    ///
    /// * [`ModelError::ArtifactMismatch`] if a row carries a zone id outside
    ///   `zone_model`'s range, i.e. the table was built with another model
    /// * [`ModelError::InsufficientData`] with fewer than two rows
    /// * [`ModelError::Learner`] if the forest cannot be fit
    pub fn train(
        rows: &[CanonicalRow],
        params: &ForestParams,
        zone_model: &ZoneModel,
    ) -> Result<Self, ModelError> {
        let clusters = zone_model.clusters();
        if let Some(row) = rows
            .iter()
            .find(|r| usize::try_from(r.spatial_cluster).ok().is_none_or(|z| z >= clusters))
        {
            return Err(ModelError::ArtifactMismatch {
                message: format!(
                    "row zone {} is outside the {clusters} zones of the given zone model",
                    row.spatial_cluster
                ),
            });
        }

        let features: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| ZoneFeatures::from_row(r).values())
            .collect();
        let labels: Vec<ZoneId> = rows.iter().map(|r| r.spatial_cluster).collect();

        let (forest, metrics) = forest::train(&features, &labels, params, KIND)?;

        Ok(Self {
            version: crate::ARTIFACT_VERSION,
            schema: ZONE_SCHEMA.descriptor(),
            zone_model_fingerprint: zone_model.fingerprint().to_string(),
            clusters,
            metrics,
            forest,
        })
    }

    /// Predicts the zone of one schema-bound feature vector.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Schema`] if `features` was built for a schema
    /// other than the one this model was trained with.
    pub fn predict(&self, features: &FeatureVector) -> Result<ZoneId, ModelError> {
        self.schema.ensure_matches(features.schema())?;
        let zone = forest::predict_one(&self.forest, features.values())?;
        if usize::try_from(zone).ok().is_none_or(|z| z >= self.clusters) {
            return Err(ModelError::UnknownClass {
                index: zone,
                classes: self.clusters,
            });
        }
        Ok(zone)
    }

    /// Builds zone features with `deriver` and predicts the zone.
    ///
    /// # Errors
    ///
    /// See [`Self::predict`].
    pub fn predict_location(
        &self,
        deriver: &FeatureDeriver,
        latitude: f64,
        longitude: f64,
        codes: AdminCodes,
    ) -> Result<ZoneId, ModelError> {
        let vector = deriver.zone_features(latitude, longitude, codes).to_vector()?;
        self.predict(&vector)
    }

    /// Checks that this predictor was trained on `zone_model`'s labels.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ArtifactMismatch`] otherwise.
    pub fn ensure_zone_model(&self, zone_model: &ZoneModel) -> Result<(), ModelError> {
        if self.zone_model_fingerprint == zone_model.fingerprint() {
            Ok(())
        } else {
            log::error!(
                "Zone predictor was trained on zone model {}, current is {}",
                self.zone_model_fingerprint,
                zone_model.fingerprint()
            );
            Err(ModelError::ArtifactMismatch {
                message: "zone predictor was trained on a different zone model".to_string(),
            })
        }
    }

    /// Number of zones of the zone model the labels came from.
    #[must_use]
    pub const fn clusters(&self) -> usize {
        self.clusters
    }

    /// Accuracy measured at training time.
    #[must_use]
    pub const fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Schema the model was trained against.
    #[must_use]
    pub const fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// Fingerprint of the zone model the labels came from.
    #[must_use]
    pub fn zone_model_fingerprint(&self) -> &str {
        &self.zone_model_fingerprint
    }

    /// Writes the model as a `MessagePack` artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if encoding or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        write_artifact(path, self, KIND)
    }

    /// Reads a model written by [`Self::save`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Schema`] if the recorded schema is not the
    /// current zone schema, or [`ModelError::ArtifactMismatch`] for an
    /// unknown artifact version.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let model: Self = read_artifact(path, KIND)?;
        ensure_version(model.version)?;
        model.schema.ensure_matches(&ZONE_SCHEMA)?;
        Ok(model)
    }
}
