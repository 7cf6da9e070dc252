#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pipeline configuration.
//!
//! The default configuration is embedded from `config/default.toml`. A user
//! file, given explicitly or through the `CRIME_INSIGHT_CONFIG` environment
//! variable, is layered over it: tables merge key by key and any other value,
//! arrays included, replaces the default.
//!
//! Every tunable the pipeline has (zoner parameters, hotspot beats, model
//! parameters, region descriptions, keyword rules) is read here and injected
//! into the components that need it.

pub mod paths;

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use crime_insight_analytics_models::{RegionInfo, RegionTable};
use crime_insight_classifier::ForestParams;
use crime_insight_crime_models::{CrimeGroup, KeywordRule, LocationGroup, RankedRules};
use crime_insight_features::{FeatureDeriver, HotspotBeats};
use crime_insight_forecast::{Granularity, SeasonalTrendForecaster};
use crime_insight_spatial::ZonerParams;
use serde::{Deserialize, Serialize};

pub use paths::{DataPaths, ensure_dir};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "CRIME_INSIGHT_CONFIG";

/// Embedded default configuration.
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Errors that can occur while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or has unexpected keys.
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but its values are unusable.
    #[error("Invalid config: {message}")]
    Invalid {
        /// Description of the first problem found.
        message: String,
    },
}

/// Hotspot beat set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotConfig {
    pub beats: Vec<u32>,
}

/// Forecasting settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Shortest series a forecaster is fit on.
    pub min_history: usize,
}

/// Report settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Beats listed by the beat frequency ranking.
    pub top_beats: usize,
}

/// The complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub paths: DataPaths,
    pub zoner: ZonerParams,
    pub hotspots: HotspotConfig,
    pub category_model: ForestParams,
    pub zone_model: ForestParams,
    pub forecast: ForecastConfig,
    pub reports: ReportConfig,
    #[serde(default)]
    pub regions: Vec<RegionInfo>,
    /// Replaces the built-in location rules when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_rules: Option<Vec<KeywordRule<LocationGroup>>>,
    /// Replaces the built-in crime-type rules when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crime_rules: Option<Vec<KeywordRule<CrimeGroup>>>,
}

impl PipelineConfig {
    /// Loads the configuration from `explicit`, else from the file named by
    /// [`CONFIG_ENV`], else the embedded default alone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or
    /// validated.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path, source })?;
                Self::from_overlay(Some(&text))
            }
            None => {
                log::debug!("Using embedded default configuration");
                Self::from_overlay(None)
            }
        }
    }

    /// Layers `overlay` over the embedded default and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if either document fails to parse or the
    /// merged configuration is invalid.
    pub fn from_overlay(overlay: Option<&str>) -> Result<Self, ConfigError> {
        let mut merged: toml::Table = toml::from_str(DEFAULT_CONFIG)?;
        if let Some(text) = overlay {
            let overlay: toml::Table = toml::from_str(text)?;
            merge_tables(&mut merged, overlay);
        }
        let config: Self = toml::Value::Table(merged).try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.zoner.validate().map_err(|e| invalid(&format!("[zoner] {e}")))?;

        for (section, params) in [
            ("category_model", &self.category_model),
            ("zone_model", &self.zone_model),
        ] {
            params
                .validate()
                .map_err(|e| invalid(&format!("[{section}] {e}")))?;
            if params.test_fraction <= 0.0 {
                return Err(invalid(&format!(
                    "[{section}] test_fraction must be greater than 0"
                )));
            }
        }

        if self.forecast.min_history == 0 {
            return Err(invalid("[forecast] min_history must be at least 1"));
        }

        let mut seen = BTreeSet::new();
        for region in &self.regions {
            if !seen.insert(region.cluster_id) {
                return Err(invalid(&format!(
                    "[[regions]] cluster_id {} is listed more than once",
                    region.cluster_id
                )));
            }
            if usize::try_from(region.cluster_id)
                .ok()
                .is_none_or(|id| id >= self.zoner.clusters)
            {
                log::warn!(
                    "Region {} ({}) is outside the {} configured zones",
                    region.cluster_id,
                    region.name,
                    self.zoner.clusters
                );
            }
        }

        if self.hotspots.beats.is_empty() {
            log::warn!("No hotspot beats configured; every hotspot_area flag will be 0");
        }
        Ok(())
    }

    /// The feature deriver every build and inference path shares.
    #[must_use]
    pub fn feature_deriver(&self) -> FeatureDeriver {
        let location_rules = self
            .location_rules
            .clone()
            .map_or_else(RankedRules::location_defaults, |rules| {
                RankedRules::new(rules, LocationGroup::Other)
            });
        let crime_rules = self
            .crime_rules
            .clone()
            .map_or_else(RankedRules::crime_defaults, |rules| {
                RankedRules::new(rules, CrimeGroup::OtherCrime)
            });
        FeatureDeriver::new(
            location_rules,
            crime_rules,
            HotspotBeats::new(self.hotspots.beats.iter().copied()),
        )
    }

    #[must_use]
    pub fn region_table(&self) -> RegionTable {
        RegionTable::new(self.regions.iter().cloned())
    }

    /// Baseline forecaster honoring the configured minimum history.
    #[must_use]
    pub fn forecaster(&self, granularity: Granularity) -> SeasonalTrendForecaster {
        SeasonalTrendForecaster::new(granularity).with_min_history(self.forecast.min_history)
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_string(),
    }
}

/// Merges `overlay` into `base`. Nested tables merge recursively; any other
/// value replaces what `base` had.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use crime_insight_crime_models::RiskLevel;
    use crime_insight_ingest_models::RawRecord;

    use super::*;

    #[test]
    fn embedded_default_is_valid() {
        let config = PipelineConfig::from_overlay(None).unwrap();
        assert_eq!(config.zoner, ZonerParams::default());
        assert_eq!(config.category_model, ForestParams::category());
        assert_eq!(config.zone_model, ForestParams::zone());
        assert_eq!(config.hotspots.beats.len(), 10);
        assert_eq!(config.forecast.min_history, 3);
        assert_eq!(config.paths, DataPaths::default());

        let regions = config.region_table();
        assert_eq!(regions.len(), 30);
        assert_eq!(regions.lookup(4).risk, RiskLevel::High);
        assert_eq!(regions.lookup(9).risk, RiskLevel::Medium);
        assert_eq!(regions.lookup(24).name, "Rogers Park");
        assert_eq!(regions.lookup(30).name, "Unknown");
    }

    #[test]
    fn overlay_merges_tables_and_replaces_arrays() {
        let config = PipelineConfig::from_overlay(Some(
            r#"
            [paths]
            data_dir = "/tmp/crime"

            [zoner]
            clusters = 5

            [hotspots]
            beats = [111]

            [[regions]]
            cluster_id = 0
            name = "Center"
            description = "Only region."
            "#,
        ))
        .unwrap();

        assert_eq!(config.zoner.clusters, 5);
        assert_eq!(config.zoner.seed, 42);
        assert_eq!(config.zoner.sample_cap, 300_000);
        assert_eq!(config.paths.data_dir, Path::new("/tmp/crime"));
        assert_eq!(config.hotspots.beats, vec![111]);
        assert_eq!(config.regions.len(), 1);
        assert_eq!(config.regions[0].risk, RiskLevel::Low);
    }

    #[test]
    fn partial_zone_model_keeps_zone_defaults() {
        let config = PipelineConfig::from_overlay(Some("[zone_model]\ntrees = 50\n")).unwrap();
        assert_eq!(config.zone_model.trees, 50);
        assert_eq!(config.zone_model.max_depth, 25);
        assert_eq!(config.zone_model.sample_cap, None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let small_sample = PipelineConfig::from_overlay(Some("[zoner]\nsample_cap = 10\n"));
        assert!(matches!(small_sample, Err(ConfigError::Invalid { .. })));

        let zero_fraction =
            PipelineConfig::from_overlay(Some("[category_model]\ntest_fraction = 0.0\n"));
        assert!(matches!(zero_fraction, Err(ConfigError::Invalid { .. })));

        let duplicate = PipelineConfig::from_overlay(Some(
            r#"
            [[regions]]
            cluster_id = 3
            name = "A"
            description = "a"

            [[regions]]
            cluster_id = 3
            name = "B"
            description = "b"
            "#,
        ));
        assert!(matches!(duplicate, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn unknown_sections_are_parse_errors() {
        assert!(matches!(
            PipelineConfig::from_overlay(Some("[zonre]\nclusters = 4\n")),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn configured_rules_replace_builtins() {
        let config = PipelineConfig::from_overlay(Some(
            r#"
            [[crime_rules]]
            category = "PROPERTY_CRIME"
            keywords = ["ROBBERY"]
            "#,
        ))
        .unwrap();
        let deriver = config.feature_deriver();
        assert_eq!(deriver.crime_group(Some("robbery")), CrimeGroup::PropertyCrime);
        // Built-in violent keywords are gone.
        assert_eq!(deriver.crime_group(Some("BATTERY")), CrimeGroup::OtherCrime);
        assert_eq!(deriver.location_group(Some("SIDEWALK")), LocationGroup::Street);
    }

    #[test]
    fn default_deriver_matches_builtin_deriver() {
        let config = PipelineConfig::from_overlay(None).unwrap();
        assert_eq!(
            config.feature_deriver().fingerprint(),
            FeatureDeriver::default().fingerprint()
        );

        let record = RawRecord {
            date: Some("2023-06-15 14:00".to_string()),
            latitude: Some(41.8),
            longitude: Some(-87.6),
            ..RawRecord::default()
        };
        assert!(config.feature_deriver().derive_record(&record).is_ok());
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "[reports]\ntop_beats = 5\n").unwrap();
        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.reports.top_beats, 5);

        let missing = PipelineConfig::load(Some(&dir.path().join("missing.toml")));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
