//! Canonical artifact locations under the data directory.

use std::path::{Path, PathBuf};

use crime_insight_forecast::Granularity;
use serde::{Deserialize, Serialize};

/// Root of every file the pipeline reads or writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPaths {
    /// Data directory; relative paths resolve against the working directory.
    pub data_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl DataPaths {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Raw incident export read by `build` when no input is given.
    #[must_use]
    pub fn raw_csv(&self) -> PathBuf {
        self.data_dir.join("crimes.csv")
    }

    #[must_use]
    pub fn canonical_csv(&self) -> PathBuf {
        self.data_dir.join("cleaned_crimes.csv")
    }

    /// Build manifest written next to the canonical table.
    #[must_use]
    pub fn manifest(&self) -> PathBuf {
        self.data_dir.join("cleaned_crimes.manifest.json")
    }

    #[must_use]
    pub fn zone_model(&self) -> PathBuf {
        self.models_dir().join("zone_model.json")
    }

    #[must_use]
    pub fn category_model(&self) -> PathBuf {
        self.models_dir().join("category_model.msgpack")
    }

    #[must_use]
    pub fn zone_predictor(&self) -> PathBuf {
        self.models_dir().join("zone_predictor.msgpack")
    }

    #[must_use]
    pub fn cluster_centers(&self) -> PathBuf {
        self.hotspots_dir().join("cluster_centers.csv")
    }

    /// Zone centers joined with their configured regions.
    #[must_use]
    pub fn zone_regions(&self) -> PathBuf {
        self.hotspots_dir().join("zone_regions.csv")
    }

    #[must_use]
    pub fn hotspot_report(&self) -> PathBuf {
        self.hotspots_dir().join("hotspot_report.csv")
    }

    /// Forecast table for one granularity, e.g. `forecast/forecast_monthly.csv`.
    #[must_use]
    pub fn forecast(&self, granularity: Granularity) -> PathBuf {
        self.forecast_dir()
            .join(format!("forecast_{granularity}.csv"))
    }

    fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }

    fn hotspots_dir(&self) -> PathBuf {
        self.data_dir.join("hotspots")
    }

    fn forecast_dir(&self) -> PathBuf {
        self.data_dir.join("forecast")
    }

    /// Creates the data directory and its artifact subdirectories.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.data_dir.clone(),
            self.models_dir(),
            self.hotspots_dir(),
            self.forecast_dir(),
        ] {
            ensure_dir(&dir)?;
        }
        Ok(())
    }
}

/// Creates `dir` and its parents if missing.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.is_dir() {
        log::debug!("Creating directory {}", dir.display());
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
