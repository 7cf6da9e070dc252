#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial zoning of incident coordinates.
//!
//! A [`ZoneModel`] is fit once on a seeded sample of coordinates and is
//! read-only afterwards. Zone assignment is nearest-center lookup under
//! Euclidean distance in (latitude, longitude) space, used identically when
//! enriching the training table and when answering ad-hoc queries.

pub mod kmeans;

use std::{
    collections::BTreeSet,
    fs,
    path::Path,
};

use rand::{SeedableRng as _, rngs::StdRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Zone identifier, `0..K`.
pub type ZoneId = u32;

/// Version of the persisted zone model layout.
pub const ZONE_MODEL_VERSION: u32 = 1;

/// Errors that can occur while fitting, loading, or saving a zone model.
#[derive(Debug, thiserror::Error)]
pub enum ZoneError {
    /// Zoner parameters are unusable.
    #[error("Invalid zoner parameters: {message}")]
    InvalidParameters {
        /// Description of what went wrong.
        message: String,
    },

    /// Fewer distinct coordinates than requested zones.
    #[error("Insufficient data: {distinct} distinct coordinates for {requested} zones")]
    InsufficientData {
        /// Distinct coordinates in the fit sample.
        distinct: usize,
        /// Requested number of zones.
        requested: usize,
    },

    /// A coordinate is NaN or infinite.
    #[error("Non-finite coordinate at index {index}")]
    NonFiniteCoordinate {
        /// Position in the input slice.
        index: usize,
    },

    /// A persisted model is structurally invalid.
    #[error("Invalid zone model artifact: {message}")]
    InvalidArtifact {
        /// Description of what went wrong.
        message: String,
    },

    /// Persisted centers do not match their recorded fingerprint.
    #[error("Zone model fingerprint mismatch: recorded {expected}, computed {actual}")]
    FingerprintMismatch {
        /// Fingerprint stored in the artifact.
        expected: String,
        /// Fingerprint of the stored centers.
        actual: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Squared Euclidean distance in degree space.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dlat = self.latitude - other.latitude;
        let dlon = self.longitude - other.longitude;
        dlat.mul_add(dlat, dlon * dlon)
    }

    /// Whether both components are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Bit pattern used for exact distinctness, with `-0.0` folded into `0.0`.
    fn bits(self) -> (u64, u64) {
        // -0.0 + 0.0 is +0.0
        ((self.latitude + 0.0).to_bits(), (self.longitude + 0.0).to_bits())
    }
}

/// Parameters of a zone model fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZonerParams {
    /// Number of zones K.
    pub clusters: usize,
    /// Maximum number of coordinates the fit sees.
    pub sample_cap: usize,
    /// Seed for sampling and k-means.
    pub seed: u64,
    /// Independent k-means runs; the lowest inertia wins.
    pub n_init: u32,
    /// Lloyd iteration cap per run.
    pub max_iterations: usize,
    /// Convergence threshold on the largest center shift.
    pub tolerance: f64,
}

impl Default for ZonerParams {
    fn default() -> Self {
        Self {
            clusters: 30,
            sample_cap: 300_000,
            seed: 42,
            n_init: 10,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

impl ZonerParams {
    /// Checks the parameters without looking at any data.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::InvalidParameters`] describing the first problem.
    pub fn validate(&self) -> Result<(), ZoneError> {
        let problem = if self.clusters == 0 {
            Some("clusters must be at least 1".to_string())
        } else if u32::try_from(self.clusters).is_err() {
            Some(format!("clusters {} does not fit a zone id", self.clusters))
        } else if self.sample_cap < self.clusters {
            Some(format!(
                "sample_cap {} is smaller than clusters {}",
                self.sample_cap, self.clusters
            ))
        } else if self.n_init == 0 {
            Some("n_init must be at least 1".to_string())
        } else if self.max_iterations == 0 {
            Some("max_iterations must be at least 1".to_string())
        } else if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            Some(format!("tolerance {} must be finite and >= 0", self.tolerance))
        } else {
            None
        };

        problem.map_or(Ok(()), |message| Err(ZoneError::InvalidParameters { message }))
    }
}

/// How a zone model was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneModelMetadata {
    /// Number of zones K.
    pub clusters: usize,
    /// Coordinates the fit actually used.
    pub sample_size: usize,
    /// Coordinates offered to the fit before sampling.
    pub population_size: usize,
    /// Seed used for sampling and k-means.
    pub seed: u64,
    /// Independent k-means runs.
    pub n_init: u32,
    /// Inertia of the kept run over the fit sample.
    pub inertia: f64,
}

/// One persisted center with its explicit zone id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneCenter {
    /// Zone id.
    pub cluster_id: ZoneId,
    /// Center latitude.
    pub latitude: f64,
    /// Center longitude.
    pub longitude: f64,
}

#[derive(Serialize, Deserialize)]
struct ZoneModelFile {
    version: u32,
    metadata: ZoneModelMetadata,
    fingerprint: String,
    centers: Vec<ZoneCenter>,
}

/// A fitted, immutable set of zone centers.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneModel {
    centers: Vec<Coordinate>,
    metadata: ZoneModelMetadata,
    fingerprint: String,
}

impl ZoneModel {
    /// Fits zones on `coordinates`.
    ///
    /// At most `params.sample_cap` coordinates are used, drawn without
    /// replacement with `params.seed`. The same inputs and parameters always
    /// produce the same centers.
    ///
    /// # Errors
    ///
    /// * [`ZoneError::InvalidParameters`] for unusable parameters
    /// * [`ZoneError::NonFiniteCoordinate`] for NaN or infinite input
    /// * [`ZoneError::InsufficientData`] if the sample holds fewer distinct
    ///   coordinates than `params.clusters`
    pub fn fit(coordinates: &[Coordinate], params: &ZonerParams) -> Result<Self, ZoneError> {
        params.validate()?;
        if let Some(index) = coordinates.iter().position(|c| !c.is_finite()) {
            return Err(ZoneError::NonFiniteCoordinate { index });
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let sample = draw_sample(coordinates, params.sample_cap, &mut rng);

        let distinct = count_distinct(&sample);
        if distinct < params.clusters {
            log::warn!(
                "Cannot fit {} zones: only {distinct} distinct coordinates in a sample of {}",
                params.clusters,
                sample.len()
            );
            return Err(ZoneError::InsufficientData {
                distinct,
                requested: params.clusters,
            });
        }

        log::info!(
            "Fitting {} zones on {} of {} coordinates (seed={}, n_init={})",
            params.clusters,
            sample.len(),
            coordinates.len(),
            params.seed,
            params.n_init
        );

        let run = kmeans::fit_best(
            &sample,
            params.clusters,
            params.n_init,
            params.max_iterations,
            params.tolerance,
            &mut rng,
        );

        log::info!("Zone fit complete: inertia={:.6}", run.inertia);

        let metadata = ZoneModelMetadata {
            clusters: params.clusters,
            sample_size: sample.len(),
            population_size: coordinates.len(),
            seed: params.seed,
            n_init: params.n_init,
            inertia: run.inertia,
        };
        Ok(Self::with_metadata(run.centers, metadata))
    }

    /// Wraps known centers, e.g. fixtures or centers produced elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::InvalidParameters`] for an empty center list and
    /// [`ZoneError::NonFiniteCoordinate`] for NaN or infinite centers.
    pub fn from_centers(centers: Vec<Coordinate>) -> Result<Self, ZoneError> {
        if centers.is_empty() || u32::try_from(centers.len()).is_err() {
            return Err(ZoneError::InvalidParameters {
                message: format!("cannot build a zone model from {} centers", centers.len()),
            });
        }
        if let Some(index) = centers.iter().position(|c| !c.is_finite()) {
            return Err(ZoneError::NonFiniteCoordinate { index });
        }
        let metadata = ZoneModelMetadata {
            clusters: centers.len(),
            sample_size: 0,
            population_size: 0,
            seed: 0,
            n_init: 0,
            inertia: 0.0,
        };
        Ok(Self::with_metadata(centers, metadata))
    }

    fn with_metadata(centers: Vec<Coordinate>, metadata: ZoneModelMetadata) -> Self {
        let fingerprint = centers_fingerprint(&centers);
        Self {
            centers,
            metadata,
            fingerprint,
        }
    }

    /// Zone of a single coordinate.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn assign(&self, coordinate: Coordinate) -> ZoneId {
        // K is checked against u32 on every construction path.
        kmeans::nearest(&self.centers, coordinate).0 as ZoneId
    }

    /// Zones of many coordinates, in input order.
    #[must_use]
    pub fn assign_batch(&self, coordinates: &[Coordinate]) -> Vec<ZoneId> {
        coordinates.iter().map(|c| self.assign(*c)).collect()
    }

    /// Number of zones K.
    #[must_use]
    pub const fn clusters(&self) -> usize {
        self.centers.len()
    }

    /// Centers, index = zone id.
    #[must_use]
    pub fn centers(&self) -> &[Coordinate] {
        &self.centers
    }

    /// Centers with explicit zone ids.
    #[must_use]
    pub fn zone_centers(&self) -> Vec<ZoneCenter> {
        self.centers
            .iter()
            .zip(0..)
            .map(|(c, cluster_id)| ZoneCenter {
                cluster_id,
                latitude: c.latitude,
                longitude: c.longitude,
            })
            .collect()
    }

    /// Fit metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ZoneModelMetadata {
        &self.metadata
    }

    /// SHA-256 of the center coordinates in zone order.
    ///
    /// Models trained on zone ids record this value so they can detect a
    /// refit zone model.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Writes the model as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError`] if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ZoneError> {
        let file = ZoneModelFile {
            version: ZONE_MODEL_VERSION,
            metadata: self.metadata.clone(),
            fingerprint: self.fingerprint.clone(),
            centers: self.zone_centers(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(path, json)?;
        log::info!(
            "Saved zone model ({} zones) to {}",
            self.clusters(),
            path.display()
        );
        Ok(())
    }

    /// Reads a model written by [`Self::save`].
    ///
    /// # Errors
    ///
    /// * [`ZoneError::InvalidArtifact`] if the layout version is unknown,
    ///   zone ids are not exactly `0..K`, or K disagrees with the metadata
    /// * [`ZoneError::FingerprintMismatch`] if the centers were altered
    pub fn load(path: &Path) -> Result<Self, ZoneError> {
        let json = fs::read_to_string(path)?;
        let mut file: ZoneModelFile = serde_json::from_str(&json)?;

        if file.version != ZONE_MODEL_VERSION {
            return Err(ZoneError::InvalidArtifact {
                message: format!("unsupported zone model version {}", file.version),
            });
        }

        file.centers.sort_by_key(|c| c.cluster_id);
        let ids_ok = file
            .centers
            .iter()
            .zip(0..)
            .all(|(c, expected): (&ZoneCenter, ZoneId)| c.cluster_id == expected);
        if file.centers.is_empty() || !ids_ok {
            return Err(ZoneError::InvalidArtifact {
                message: "zone ids must be exactly 0..K".to_string(),
            });
        }
        if file.centers.len() != file.metadata.clusters {
            return Err(ZoneError::InvalidArtifact {
                message: format!(
                    "{} centers stored for {} clusters",
                    file.centers.len(),
                    file.metadata.clusters
                ),
            });
        }

        let centers: Vec<Coordinate> = file
            .centers
            .iter()
            .map(|c| Coordinate::new(c.latitude, c.longitude))
            .collect();
        let actual = centers_fingerprint(&centers);
        if actual != file.fingerprint {
            log::error!("Zone model at {} failed its fingerprint check", path.display());
            return Err(ZoneError::FingerprintMismatch {
                expected: file.fingerprint,
                actual,
            });
        }

        log::info!(
            "Loaded zone model ({} zones) from {}",
            centers.len(),
            path.display()
        );
        Ok(Self {
            centers,
            metadata: file.metadata,
            fingerprint: actual,
        })
    }

    /// Writes `cluster_id,latitude,longitude` rows.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError`] if the file cannot be written.
    pub fn write_centers_csv(&self, path: &Path) -> Result<(), ZoneError> {
        let mut writer = csv::Writer::from_path(path)?;
        for center in self.zone_centers() {
            writer.serialize(center)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Seeded sample without replacement, kept in input order. Inputs within
/// the cap are used whole.
fn draw_sample(coordinates: &[Coordinate], cap: usize, rng: &mut StdRng) -> Vec<Coordinate> {
    if coordinates.len() <= cap {
        return coordinates.to_vec();
    }
    let mut indices = rand::seq::index::sample(rng, coordinates.len(), cap).into_vec();
    indices.sort_unstable();
    indices.into_iter().map(|i| coordinates[i]).collect()
}

fn count_distinct(coordinates: &[Coordinate]) -> usize {
    coordinates
        .iter()
        .map(|c| c.bits())
        .collect::<BTreeSet<_>>()
        .len()
}

fn centers_fingerprint(centers: &[Coordinate]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((centers.len() as u64).to_le_bytes());
    for c in centers {
        hasher.update(c.latitude.to_bits().to_le_bytes());
        hasher.update(c.longitude.to_bits().to_le_bytes());
    }
    hex::encode(hasher.finalize())
}
