//! Pipeline configuration
//!
//! Every value has a default, so an empty JSON object is a valid config file.
//! The CLI loads a file when one is given and then applies its own flags on
//! top.

use crate::error::{IgnisError, IgnisResult};
use crate::model::{GbmParams, CLASSIFIER_FILE, REGRESSOR_FILE};
use crate::record::ChannelLayout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Environment variable overriding [`ForecastConfig::model_dir`]
pub const MODEL_DIR_ENV: &str = "IGNIS_MODEL_DIR";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub gbm: GbmParams,
    pub forecast: ForecastConfig,
}

impl PipelineConfig {
    /// Read and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> IgnisResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IgnisResult<()> {
        self.data.validate()?;
        self.gbm.validate()?;
        self.forecast.validate()
    }
}

/// Shard locations and extraction limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding the TFRecord shards
    pub data_dir: PathBuf,
    pub train_prefix: String,
    pub train_shards: usize,
    pub test_prefix: String,
    pub test_shards: usize,
    pub max_train_samples: usize,
    pub max_test_samples: usize,
    /// Where extracted datasets are written
    pub output_dir: PathBuf,
    pub layout: ChannelLayout,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            train_prefix: "next_day_wildfire_spread_train".to_string(),
            train_shards: 10,
            test_prefix: "next_day_wildfire_spread_test".to_string(),
            test_shards: 2,
            max_train_samples: 20_000,
            max_test_samples: 2_000,
            output_dir: PathBuf::from("."),
            layout: ChannelLayout::default(),
        }
    }
}

impl DataConfig {
    pub fn validate(&self) -> IgnisResult<()> {
        if self.layout.side * self.layout.side != self.layout.length {
            return Err(IgnisError::Config(format!(
                "grid side {} does not match channel length {}",
                self.layout.side, self.layout.length
            )));
        }
        Ok(())
    }

    /// `{data_dir}/{train_prefix}_00.tfrecord` and onwards
    pub fn train_shard_paths(&self) -> Vec<PathBuf> {
        shard_paths(&self.data_dir, &self.train_prefix, self.train_shards)
    }

    pub fn test_shard_paths(&self) -> Vec<PathBuf> {
        shard_paths(&self.data_dir, &self.test_prefix, self.test_shards)
    }

    /// Extracted training set
    pub fn train_dataset_path(&self) -> PathBuf {
        self.output_dir.join("processed_train.json")
    }

    /// Extracted test set
    pub fn test_dataset_path(&self) -> PathBuf {
        self.output_dir.join("processed_test.json")
    }
}

fn shard_paths(dir: &Path, prefix: &str, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| dir.join(format!("{prefix}_{i:02}.tfrecord")))
        .collect()
}

/// Live lookups and model locations for the predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub forecast_url: String,
    pub elevation_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    pub default_brightness: f64,
    /// Elevation in meters used when the lookup fails
    pub fallback_elevation: f64,
    pub model_dir: PathBuf,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            elevation_url: "https://api.open-meteo.com/v1/elevation".to_string(),
            timeout_secs: 5,
            default_brightness: 350.0,
            fallback_elevation: 500.0,
            model_dir: PathBuf::from("."),
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> IgnisResult<()> {
        if self.timeout_secs == 0 {
            return Err(IgnisError::Config("timeout_secs must be > 0".to_string()));
        }
        if !self.default_brightness.is_finite() || self.default_brightness < 0.0 {
            return Err(IgnisError::Config(format!(
                "default_brightness must be a non-negative number, got {}",
                self.default_brightness
            )));
        }
        Ok(())
    }

    /// Replace `model_dir` with `$IGNIS_MODEL_DIR` when it is set
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = std::env::var_os(MODEL_DIR_ENV).filter(|d| !d.is_empty()) {
            self.model_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn classifier_path(&self) -> PathBuf {
        self.model_dir.join(CLASSIFIER_FILE)
    }

    pub fn regressor_path(&self) -> PathBuf {
        self.model_dir.join(REGRESSOR_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_names() {
        let data = DataConfig {
            data_dir: PathBuf::from("/shards"),
            ..DataConfig::default()
        };
        let train = data.train_shard_paths();
        assert_eq!(train.len(), 10);
        assert_eq!(
            train[0],
            PathBuf::from("/shards/next_day_wildfire_spread_train_00.tfrecord")
        );
        assert_eq!(
            train[9],
            PathBuf::from("/shards/next_day_wildfire_spread_train_09.tfrecord")
        );
        let test = data.test_shard_paths();
        assert_eq!(test.len(), 2);
        assert!(test[1].ends_with("next_day_wildfire_spread_test_01.tfrecord"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"gbm": {"n_estimators": 50}, "forecast": {"timeout_secs": 2}}"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.gbm.n_estimators, 50);
        assert_eq!(config.gbm.max_depth, 5);
        assert_eq!(config.forecast.timeout_secs, 2);
        assert_eq!(config.forecast.default_brightness, 350.0);
        assert_eq!(config.data.max_train_samples, 20_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PipelineConfig::default();
        config.forecast.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.data.layout.side = 10;
        assert!(matches!(config.validate(), Err(IgnisError::Config(_))));
    }

    #[test]
    fn test_model_paths() {
        let forecast = ForecastConfig {
            model_dir: PathBuf::from("/models"),
            ..ForecastConfig::default()
        };
        assert_eq!(
            forecast.classifier_path(),
            PathBuf::from("/models/wildfire_spread_classifier_advanced.json")
        );
        assert!(forecast
            .regressor_path()
            .ends_with("wildfire_spread_regressor_advanced.json"));
    }
}
