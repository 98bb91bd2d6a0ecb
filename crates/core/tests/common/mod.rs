//! Fixtures shared by the integration tests
#![allow(dead_code)]

use ignis_core::core_types::Meters;
use ignis_core::features::FeatureVector;
use ignis_core::forecast::{ConditionsSource, CurrentWeather};
use ignis_core::model::{SpreadClassifier, SpreadRegressor};
use ignis_core::record::{Example, FeatureValue, RecordWriter};
use ignis_core::{IgnisError, IgnisResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[ctor::ctor]
fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh scratch directory under the system temp dir
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ignis-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Serialized Example with `prev` burning pixels today and `next` tomorrow
///
/// Environmental channels are filled with constants so the feature vector is
/// predictable; `wind_speed` doubles as a signal the models can learn from.
pub fn fire_payload(prev: usize, next: usize, wind_speed: f32) -> Vec<u8> {
    let mask = |n: usize| {
        let mut m = vec![0.0f32; 4096];
        m[..n].fill(1.0);
        m
    };
    let mut example = Example::new();
    example.insert("PrevFireMask", FeatureValue::Floats(mask(prev)));
    example.insert("FireMask", FeatureValue::Floats(mask(next)));
    example.insert("elevation", FeatureValue::Floats(vec![350.0; 4096]));
    example.insert("th", FeatureValue::Floats(vec![90.0; 4096]));
    example.insert("vs", FeatureValue::Floats(vec![wind_speed; 4096]));
    example.insert("tmmn", FeatureValue::Floats(vec![285.0; 4096]));
    example.insert("tmmx", FeatureValue::Floats(vec![300.0; 4096]));
    example.insert("sph", FeatureValue::Floats(vec![0.005; 4096]));
    example.insert("pdsi", FeatureValue::Floats(vec![-1.5; 4096]));
    example.insert("NDVI", FeatureValue::Floats(vec![4000.0; 4096]));
    example.encode()
}

/// Write payloads as one TFRecord shard
pub fn write_shard(path: &Path, payloads: &[Vec<u8>]) {
    let mut writer = RecordWriter::create(path).unwrap();
    for p in payloads {
        writer.write_record(p).unwrap();
    }
    writer.finish().unwrap();
}

/// Classifier returning a fixed probability and remembering every input
#[derive(Debug, Clone, Default)]
pub struct FixedClassifier {
    pub probability: f64,
    pub seen: Arc<Mutex<Vec<FeatureVector>>>,
}

impl FixedClassifier {
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            seen: Arc::default(),
        }
    }
}

impl SpreadClassifier for FixedClassifier {
    fn spread_probability(&self, features: &FeatureVector) -> IgnisResult<f64> {
        self.seen.lock().unwrap().push(*features);
        Ok(self.probability)
    }

    fn will_spread(&self, _features: &FeatureVector) -> IgnisResult<bool> {
        Ok(self.probability > 0.5)
    }
}

/// Regressor returning a fixed raw ratio
#[derive(Debug, Clone, Copy)]
pub struct FixedRegressor(pub f64);

impl SpreadRegressor for FixedRegressor {
    fn spread_ratio(&self, _features: &FeatureVector) -> IgnisResult<f64> {
        Ok(self.0)
    }
}

/// Conditions source with canned answers; `None` simulates an outage
#[derive(Debug, Clone, Copy, Default)]
pub struct StubSource {
    pub weather: Option<CurrentWeather>,
    pub elevation: Option<f64>,
}

impl StubSource {
    pub fn offline() -> Self {
        Self::default()
    }
}

impl ConditionsSource for StubSource {
    fn current_weather(&self, _lat: f64, _lng: f64) -> IgnisResult<CurrentWeather> {
        self.weather.ok_or(IgnisError::UnexpectedResponse {
            endpoint: "forecast",
            message: "offline".to_string(),
        })
    }

    fn elevation(&self, _lat: f64, _lng: f64) -> IgnisResult<Meters> {
        self.elevation
            .map(Meters::new)
            .ok_or(IgnisError::UnexpectedResponse {
                endpoint: "elevation",
                message: "offline".to_string(),
            })
    }
}
