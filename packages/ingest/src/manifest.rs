//! Build manifest stored next to the canonical table.
//!
//! Records which feature configuration and which zone model produced the
//! table, so trainers can refuse a table built with different settings.

use std::path::Path;

use crime_insight_features::FeatureDeriver;
use crime_insight_ingest_models::BuildReport;
use crime_insight_spatial::ZoneModel;
use serde::{Deserialize, Serialize};

use crate::{IngestError, ensure_parent_dir};

/// Current manifest schema version. Bump this when the manifest format
/// changes in a backward-incompatible way.
pub const MANIFEST_VERSION: u32 = 1;

/// Provenance of one canonical table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Manifest format version.
    pub version: u32,
    /// RFC 3339 time the table was written.
    pub created_at: String,
    /// Raw input the table was built from.
    pub source: String,
    /// [`FeatureDeriver::fingerprint`] at build time.
    pub feature_fingerprint: String,
    /// [`ZoneModel::fingerprint`] of the model rows were assigned with.
    pub zone_model_fingerprint: String,
    /// Counters of the build pass.
    pub report: BuildReport,
}

impl BuildManifest {
    /// Manifest for a finished build.
    #[must_use]
    pub fn new(
        source: &Path,
        deriver: &FeatureDeriver,
        zone_model: &ZoneModel,
        report: BuildReport,
    ) -> Self {
        Self {
            version: MANIFEST_VERSION,
            created_at: chrono::Utc::now().to_rfc3339(),
            source: source.display().to_string(),
            feature_fingerprint: deriver.fingerprint(),
            zone_model_fingerprint: zone_model.fingerprint().to_string(),
            report,
        }
    }

    /// Reads a manifest.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        let contents = std::fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&contents)?;
        log::info!("Loaded manifest from {}", path.display());
        Ok(manifest)
    }

    /// Writes the manifest.
    ///
    /// Uses an atomic write pattern (write to `.tmp`, then rename) to avoid
    /// corrupt manifests from interrupted writes.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), IngestError> {
        ensure_parent_dir(path)?;
        let tmp_path = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, path)?;
        log::info!("Saved manifest to {}", path.display());
        Ok(())
    }

    /// Checks that the table was built with `deriver` and `zone_model`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::StaleTable`] naming what changed.
    pub fn ensure_current(
        &self,
        deriver: &FeatureDeriver,
        zone_model: &ZoneModel,
    ) -> Result<(), IngestError> {
        if self.feature_fingerprint != deriver.fingerprint() {
            return Err(IngestError::StaleTable {
                message: "feature configuration changed since the table was built".to_string(),
            });
        }
        if self.zone_model_fingerprint != zone_model.fingerprint() {
            return Err(IngestError::StaleTable {
                message: "zone model differs from the one the table was built with".to_string(),
            });
        }
        Ok(())
    }
}
