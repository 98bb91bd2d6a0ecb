//! Feature engineering for spread models
//!
//! Reduces a decoded record's rasters to a fixed 23-element feature vector and
//! two labels. The same vector layout is rebuilt from single-point conditions
//! at forecast time, so the order of [`FEATURE_NAMES`] is a contract between
//! training and inference.
//!
//! # Layout
//!
//! ```text
//!  0..16  mean/max of elevation, th, vs, tmmn, tmmx, sph, pdsi, NDVI
//! 16..18  fire_sum, fire_mean (previous-day mask)
//! 18..20  wind_east, wind_north
//! 20..22  elevation × wind speed, drought × vegetation
//!     22  fire bounding-box width / height
//! ```

pub mod dataset;

pub use dataset::{Dataset, DatasetBuilder, DatasetStats};

use crate::core_types::{unit_from_radians, Celsius, Degrees, KilometersPerHour, Meters, Percent};
use crate::record::{Channel, FireRecord};
use serde::{Deserialize, Serialize};

/// Number of features in every vector
pub const FEATURE_COUNT: usize = 23;

/// Canonical feature names, in vector order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "elevation_mean",
    "elevation_max",
    "wind_dir_mean",
    "wind_dir_max",
    "wind_speed_mean",
    "wind_speed_max",
    "temp_min_mean",
    "temp_min_max",
    "temp_max_mean",
    "temp_max_max",
    "humidity_mean",
    "humidity_max",
    "drought_mean",
    "drought_max",
    "vegetation_mean",
    "vegetation_max",
    "fire_sum",
    "fire_mean",
    "wind_east",
    "wind_north",
    "wind_elevation",
    "drought_vegetation",
    "fire_shape_ratio",
];

/// Channels summarized by mean/max, in vector order
const ENVIRONMENTAL_CHANNELS: [Channel; 8] = [
    Channel::Elevation,
    Channel::WindDirection,
    Channel::WindSpeed,
    Channel::TempMin,
    Channel::TempMax,
    Channel::Humidity,
    Channel::Drought,
    Channel::Vegetation,
];

/// Records whose previous-day fire mask sums below this are dropped
pub const MIN_ACTIVE_FIRE_AREA: f64 = 10.0;

/// Smallest spread ratio kept in the dataset
pub const MIN_SPREAD_RATIO: f64 = 0.1;

/// Largest spread ratio kept in the dataset (also the regressor clip)
pub const MAX_SPREAD_RATIO: f64 = 10.0;

/// Ratios strictly above this are labelled as spreading
pub const SPREAD_LABEL_THRESHOLD: f64 = 1.2;

/// Shape ratio used when the mask has no usable footprint
pub const NEUTRAL_SHAPE_RATIO: f64 = 1.0;

/// Keeps the shape ratio finite for single-row fires
const SHAPE_RATIO_EPSILON: f64 = 1e-6;

/// Fixed-length model input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Borrow as a slice for model evaluation
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Value by canonical name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|&n| n == name)
            .map(|idx| self.0[idx])
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

/// A feature vector with both training targets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelledSample {
    pub features: FeatureVector,
    /// 1 when the fire grew by more than [`SPREAD_LABEL_THRESHOLD`]
    pub spread_label: u8,
    /// Next-day fire area over current fire area
    pub spread_ratio: f64,
}

/// Why a record produced no sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// Previous-day mask sums below [`MIN_ACTIVE_FIRE_AREA`]
    NoActiveFire { current_area: f64 },
    /// Ratio outside `[MIN_SPREAD_RATIO, MAX_SPREAD_RATIO]` or not finite
    ImplausibleRatio { ratio: f64 },
    /// A raster carried NaN or infinite values (sensor noise)
    NonFiniteFeature { name: &'static str },
}

/// Outcome of running the extractor over one record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extraction {
    Sample(LabelledSample),
    Skipped(SkipReason),
}

/// Mean and max of a channel (f64 accumulation)
fn mean_max(values: &[f32]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let sum: f64 = values.iter().map(|&v| f64::from(v)).sum();
    let max = values
        .iter()
        .map(|&v| f64::from(v))
        .fold(f64::NEG_INFINITY, f64::max);
    (sum / values.len() as f64, max)
}

fn channel_sum(values: &[f32]) -> f64 {
    values.iter().map(|&v| f64::from(v)).sum()
}

/// Bounding-box width/height of positive pixels in a square fire mask
///
/// Returns [`NEUTRAL_SHAPE_RATIO`] when the mask cannot be reshaped to
/// `side × side`, when it sums to zero or less, or when no pixel is positive.
pub fn fire_shape_ratio(mask: &[f32], side: usize) -> f64 {
    if side == 0 || mask.len() != side * side || channel_sum(mask) <= 0.0 {
        return NEUTRAL_SHAPE_RATIO;
    }

    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    for (idx, _) in mask.iter().enumerate().filter(|&(_, &v)| v > 0.0) {
        let (y, x) = (idx / side, idx % side);
        bounds = Some(match bounds {
            None => (x, x, y, y),
            Some((min_x, max_x, min_y, max_y)) => {
                (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y))
            }
        });
    }

    match bounds {
        Some((min_x, max_x, min_y, max_y)) => {
            let width = (max_x - min_x) as f64;
            let height = (max_y - min_y) as f64;
            width / (height + SHAPE_RATIO_EPSILON)
        }
        None => NEUTRAL_SHAPE_RATIO,
    }
}

/// Build the feature vector and labels for one record
///
/// `side` is the grid side used to reshape the previous-day fire mask.
pub fn extract(record: &FireRecord, side: usize) -> Extraction {
    let current_area = channel_sum(&record.prev_fire_mask);
    if current_area.is_nan() || current_area < MIN_ACTIVE_FIRE_AREA {
        return Extraction::Skipped(SkipReason::NoActiveFire { current_area });
    }

    let future_area = channel_sum(&record.fire_mask);
    let spread_ratio = future_area / current_area;
    if !spread_ratio.is_finite()
        || !(MIN_SPREAD_RATIO..=MAX_SPREAD_RATIO).contains(&spread_ratio)
    {
        return Extraction::Skipped(SkipReason::ImplausibleRatio {
            ratio: spread_ratio,
        });
    }

    let mut features = [0.0; FEATURE_COUNT];
    for (slot, channel) in ENVIRONMENTAL_CHANNELS.iter().enumerate() {
        let (mean, max) = mean_max(record.channel(*channel));
        features[slot * 2] = mean;
        features[slot * 2 + 1] = max;
    }

    let (fire_mean, _) = mean_max(&record.prev_fire_mask);
    features[16] = current_area;
    features[17] = fire_mean;

    let elevation_mean = features[0];
    let wind_dir_mean = features[2];
    let wind_speed_mean = features[4];
    let drought_mean = features[12];
    let vegetation_mean = features[14];

    let wind = unit_from_radians(wind_dir_mean.to_radians()) * wind_speed_mean;
    features[18] = wind.x;
    features[19] = wind.y;
    features[20] = elevation_mean * wind_speed_mean;
    features[21] = drought_mean * vegetation_mean;
    features[22] = fire_shape_ratio(&record.prev_fire_mask, side);

    if let Some(idx) = features.iter().position(|v| !v.is_finite()) {
        return Extraction::Skipped(SkipReason::NonFiniteFeature {
            name: FEATURE_NAMES[idx],
        });
    }

    Extraction::Sample(LabelledSample {
        features: FeatureVector(features),
        spread_label: u8::from(spread_ratio > SPREAD_LABEL_THRESHOLD),
        spread_ratio,
    })
}

/// Conditions at a single point, as gathered by the forecaster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointConditions {
    pub elevation: Meters,
    pub wind_direction: Degrees,
    pub wind_speed: KilometersPerHour,
    pub temp_min: Celsius,
    pub temp_max: Celsius,
    pub humidity: Percent,
    pub drought: f64,
    pub vegetation: f64,
    /// Fire radiative brightness, standing in for the fire-mask statistics
    pub brightness: f64,
}

impl PointConditions {
    /// Same layout as [`extract`], with mean = max for every channel
    pub fn feature_vector(&self) -> FeatureVector {
        let elevation = *self.elevation;
        let wind_dir = *self.wind_direction;
        let wind_speed = *self.wind_speed;
        let wind = unit_from_radians(self.wind_direction.to_radians()) * wind_speed;

        FeatureVector([
            elevation,
            elevation,
            wind_dir,
            wind_dir,
            wind_speed,
            wind_speed,
            *self.temp_min,
            *self.temp_min,
            *self.temp_max,
            *self.temp_max,
            *self.humidity,
            *self.humidity,
            self.drought,
            self.drought,
            self.vegetation,
            self.vegetation,
            self.brightness,
            self.brightness / 100.0,
            wind.x,
            wind.y,
            elevation * wind_speed,
            self.drought * self.vegetation,
            NEUTRAL_SHAPE_RATIO,
        ])
    }
}
