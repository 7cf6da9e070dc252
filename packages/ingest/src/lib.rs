#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dataset builder for the incident feature pipeline.
//!
//! Reads the raw incident table, derives every per-record feature through
//! one shared [`FeatureDeriver`](crime_insight_features::FeatureDeriver),
//! assigns spatial zones with a model fit once per build, and writes the
//! canonical feature table that every downstream model trains on.

pub mod builder;
pub mod canonical;
pub mod manifest;
pub mod progress;
pub mod reader;

use std::path::Path;

use crime_insight_spatial::ZoneError;

pub use builder::{BuildOutput, DatasetBuilder, ZoneSource};
pub use canonical::{read_canonical_csv, write_canonical_csv};
pub use manifest::BuildManifest;
pub use reader::{read_raw_csv, read_raw_from};

/// Errors that can occur while building or reading the canonical table.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// CSV decoding or encoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The raw input lacks columns every record needs.
    #[error("Missing required columns: {}", .missing.join(", "))]
    MissingColumns {
        /// Required column names not found in the header.
        missing: Vec<String>,
    },

    /// The raw input has no header row.
    #[error("Input has no header row")]
    EmptyInput,

    /// Fitting or persisting the zone model failed.
    #[error("Zone model error: {0}")]
    Zone(#[from] ZoneError),

    /// A canonical table no longer matches the current configuration.
    #[error("Stale canonical table: {message}")]
    StaleTable {
        /// Description of what changed.
        message: String,
    },
}

/// Output locations of [`build_from_csv`].
#[derive(Debug, Clone, Copy)]
pub struct BuildTargets<'a> {
    /// Canonical feature table.
    pub canonical_csv: &'a Path,
    /// Zone model artifact, written only when the model is fit.
    pub zone_model: &'a Path,
    /// Zone center table, written only when the model is fit.
    pub centers_csv: &'a Path,
    /// Build manifest.
    pub manifest: &'a Path,
}

/// Reads `input`, builds the canonical table, and persists every output.
///
/// A freshly fit zone model is saved before the table so a partial run
/// never leaves rows referring to an unsaved model.
///
/// # Errors
///
/// Returns [`IngestError`] if reading, building, or any write fails.
pub fn build_from_csv(
    input: &Path,
    targets: &BuildTargets<'_>,
    builder: &DatasetBuilder,
    zones: ZoneSource<'_>,
) -> Result<BuildOutput, IngestError> {
    let records = read_raw_csv(input)?;
    let output = builder.build(&records, zones)?;

    if output.fitted_zone_model() {
        ensure_parent_dir(targets.zone_model)?;
        output.zone_model.save(targets.zone_model)?;
        ensure_parent_dir(targets.centers_csv)?;
        output.zone_model.write_centers_csv(targets.centers_csv)?;
    }

    write_canonical_csv(targets.canonical_csv, &output.rows)?;

    BuildManifest::new(
        input,
        builder.deriver(),
        &output.zone_model,
        output.report.clone(),
    )
    .save(targets.manifest)?;

    Ok(output)
}

/// Creates the parent directory of `path` if it does not exist.
///
/// # Errors
///
/// Returns [`IngestError::Io`] if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<(), IngestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
