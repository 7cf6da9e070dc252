//! Crime group classifier.

use std::{collections::BTreeSet, path::Path};

use chrono::NaiveDateTime;
use crime_insight_crime_models::CrimeGroup;
use crime_insight_features::{
    CATEGORY_SCHEMA, CategoryFeatures, FeatureDeriver, FeatureVector, SchemaDescriptor,
};
use crime_insight_ingest_models::{AdminCodes, CanonicalRow};
use serde::{Deserialize, Serialize};

use crate::{
    ForestParams, ModelError, TrainingMetrics, ensure_version,
    forest::{self, Forest},
    read_artifact, write_artifact,
};

const KIND: &str = "category classifier";

/// Predicts a [`CrimeGroup`] from spatiotemporal features.
///
/// The label encoding is the alphabetically sorted list of groups present
/// in the training rows; class index `i` decodes to `classes[i]`.
#[derive(Serialize, Deserialize)]
pub struct CategoryClassifier {
    version: u32,
    schema: SchemaDescriptor,
    feature_fingerprint: String,
    classes: Vec<CrimeGroup>,
    metrics: TrainingMetrics,
    forest: Forest,
}

impl CategoryClassifier {
    /// Trains on canonical rows built with `deriver`.
    ///
    /// # Errors
    ///
    /// * [`ModelError::InsufficientData`] with fewer than two rows
    /// * [`ModelError::InvalidParameters`] for unusable parameters
    /// * [`ModelError::Learner`] if the forest cannot be fit
    pub fn train(
        rows: &[CanonicalRow],
        params: &ForestParams,
        deriver: &FeatureDeriver,
    ) -> Result<Self, ModelError> {
        let mut classes: Vec<CrimeGroup> = rows
            .iter()
            .map(|r| r.crime_group)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        classes.sort_by_cached_key(ToString::to_string);

        let features: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| CategoryFeatures::from_row(r).values())
            .collect();
        let labels: Vec<u32> = rows
            .iter()
            .map(|r| encode(&classes, r.crime_group))
            .collect();

        let (forest, metrics) = forest::train(&features, &labels, params, KIND)?;
        log::info!(
            "Category classes: {}",
            classes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            version: crate::ARTIFACT_VERSION,
            schema: CATEGORY_SCHEMA.descriptor(),
            feature_fingerprint: deriver.fingerprint(),
            classes,
            metrics,
            forest,
        })
    }

    /// Predicts the group of one schema-bound feature vector.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Schema`] if `features` was built for a schema
    /// other than the one this model was trained with.
    pub fn predict(&self, features: &FeatureVector) -> Result<CrimeGroup, ModelError> {
        self.schema.ensure_matches(features.schema())?;
        let index = forest::predict_one(&self.forest, features.values())?;
        self.decode(index)
    }

    /// Derives features for an incident the same way the dataset builder
    /// does and predicts its group.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Schema`] if `deriver` is configured differently
    /// from the deriver the training rows were built with.
    pub fn predict_incident(
        &self,
        deriver: &FeatureDeriver,
        timestamp: NaiveDateTime,
        codes: AdminCodes,
    ) -> Result<CrimeGroup, ModelError> {
        deriver.ensure_fingerprint(&self.feature_fingerprint)?;
        let vector = deriver.category_features(timestamp, codes).to_vector()?;
        self.predict(&vector)
    }

    /// Label encoding, index = class id.
    #[must_use]
    pub fn classes(&self) -> &[CrimeGroup] {
        &self.classes
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

    /// Fingerprint of the deriver the training rows were built with.
    #[must_use]
    pub fn feature_fingerprint(&self) -> &str {
        &self.feature_fingerprint
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
    /// * [`ModelError::Schema`] if the recorded schema is not the current
    ///   category schema
    /// * [`ModelError::ArtifactMismatch`] for an unknown artifact version or
    ///   an empty label encoding
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let model: Self = read_artifact(path, KIND)?;
        ensure_version(model.version)?;
        model.schema.ensure_matches(&CATEGORY_SCHEMA)?;
        if model.classes.is_empty() {
            return Err(ModelError::ArtifactMismatch {
                message: "category model has no classes".to_string(),
            });
        }
        Ok(model)
    }

    fn decode(&self, index: u32) -> Result<CrimeGroup, ModelError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.classes.get(i))
            .copied()
            .ok_or(ModelError::UnknownClass {
                index,
                classes: self.classes.len(),
            })
    }
}

/// Position of `group` in the sorted label encoding.
#[allow(clippy::cast_possible_truncation)]
fn encode(classes: &[CrimeGroup], group: CrimeGroup) -> u32 {
    // `classes` is built from the same rows, so every label is present.
    classes.iter().position(|c| *c == group).unwrap_or_default() as u32
}
