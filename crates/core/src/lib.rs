//! Ignis Core Library
//!
//! Wildfire spread prediction from next-day fire observations: reading the
//! satellite record shards, turning each record into a fixed feature vector,
//! training gradient-boosted spread models and forecasting spread around a
//! single detected fire.
//!
//! ## Pipeline
//!
//! - `record`: TFRecord framing and `tf.train.Example` decoding
//! - `features`: 23-feature extraction, filtering and dataset assembly
//! - `model`: boosted regression trees, evaluation metrics, persistence
//! - `forecast`: live conditions with fallbacks, spread projection, GeoJSON

// Core types and utilities
pub mod core_types;
pub mod config;
pub mod error;

// Offline pipeline
pub mod features;
pub mod model;
pub mod record;

// Runtime forecasting
pub mod forecast;

// Re-export core types
pub use core_types::{Celsius, Degrees, Kilometers, KilometersPerHour, Meters, Percent, Vec2};
pub use config::{DataConfig, ForecastConfig, PipelineConfig};
pub use error::{IgnisError, IgnisResult};

// Re-export pipeline types
pub use features::{Dataset, DatasetBuilder, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use model::{GbmParams, GradientBoostingClassifier, GradientBoostingRegressor};
pub use record::{ChannelLayout, Example, FireRecord, RecordReader, RecordWriter};

// Re-export forecasting types
pub use forecast::{PredictionRequest, PredictionResult, SpreadForecaster};
