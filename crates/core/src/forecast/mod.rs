//! Point spread forecasts
//!
//! A forecast runs in a fixed sequence:
//!
//! 1. current weather from the conditions source, or a brightness-based estimate
//! 2. elevation, or a configured default
//! 3. regional drought and vegetation estimates for the current month
//! 4. classifier and regressor over the single-point feature vector
//! 5. geometric projection into a GeoJSON feature collection
//!
//! Lookup failures never abort a forecast; they are logged and replaced.
//!
//! # Example
//!
//! ```rust,ignore
//! use ignis_core::config::ForecastConfig;
//! use ignis_core::forecast::{PredictionRequest, SpreadForecaster};
//!
//! let forecaster = SpreadForecaster::from_config(&ForecastConfig::default())?;
//! let request = PredictionRequest::from_json(r#"{"lat": 38.5, "lng": -121.5}"#)?;
//! let result = forecaster.predict(&request)?;
//! println!("{}", serde_json::to_string(&result)?);
//! ```

pub mod geojson;
pub mod projection;
pub mod seasonal;
pub mod weather;

pub use geojson::{Feature, FeatureCollection, FeatureProperties, Geometry};
pub use projection::{project, SpreadInputs, SpreadPoint, SpreadProjection};
pub use seasonal::{DroughtVegetation, Region};
pub use weather::{ConditionsSource, CurrentWeather, DataSource, OpenMeteoClient, WeatherSnapshot};

use crate::config::ForecastConfig;
use crate::core_types::{Celsius, Degrees, KilometersPerHour, Meters, Percent};
use crate::error::{IgnisError, IgnisResult};
use crate::features::{PointConditions, MAX_SPREAD_RATIO, MIN_SPREAD_RATIO};
use crate::model::{
    GradientBoostingClassifier, GradientBoostingRegressor, SpreadClassifier, SpreadRegressor,
};
use chrono::{Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Location and optional brightness of a detected fire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
}

impl PredictionRequest {
    /// Parse and validate a JSON request argument
    pub fn from_json(json: &str) -> IgnisResult<Self> {
        let request: Self = serde_json::from_str(json)?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> IgnisResult<()> {
        if !(self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat)) {
            return Err(IgnisError::InvalidInput(format!(
                "latitude must be within [-90, 90], got {}",
                self.lat
            )));
        }
        if !(self.lng.is_finite() && (-180.0..=180.0).contains(&self.lng)) {
            return Err(IgnisError::InvalidInput(format!(
                "longitude must be within [-180, 180], got {}",
                self.lng
            )));
        }
        if let Some(b) = self.brightness {
            if !b.is_finite() || b < 0.0 {
                return Err(IgnisError::InvalidInput(format!(
                    "brightness must be a non-negative number, got {b}"
                )));
            }
        }
        Ok(())
    }
}

/// Inputs gathered for the models, echoed back for transparency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalData {
    pub elevation: Meters,
    pub wind_direction: Degrees,
    pub wind_speed: KilometersPerHour,
    /// Daily maximum temperature
    pub temperature: Celsius,
    pub humidity: Percent,
    pub drought: f64,
    pub vegetation: f64,
    pub brightness: f64,
    pub data_source: DataSource,
}

/// Forecast for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub will_spread: bool,
    pub spread_probability: f64,
    /// Clipped to the plausible range
    pub spread_ratio: f64,
    /// Meteorological wind direction the spread follows
    pub spread_direction: Degrees,
    pub spread_distance_km: f64,
    pub environmental_data: EnvironmentalData,
    pub geojson: FeatureCollection,
}

/// Combines a conditions source with the two spread models
pub struct SpreadForecaster {
    classifier: Box<dyn SpreadClassifier>,
    regressor: Box<dyn SpreadRegressor>,
    source: Box<dyn ConditionsSource>,
    default_brightness: f64,
    fallback_elevation: Meters,
}

impl SpreadForecaster {
    pub fn new(
        classifier: Box<dyn SpreadClassifier>,
        regressor: Box<dyn SpreadRegressor>,
        source: Box<dyn ConditionsSource>,
        config: &ForecastConfig,
    ) -> Self {
        Self {
            classifier,
            regressor,
            source,
            default_brightness: config.default_brightness,
            fallback_elevation: Meters::new(config.fallback_elevation),
        }
    }

    /// Load both models from `config.model_dir` and talk to Open-Meteo
    pub fn from_config(config: &ForecastConfig) -> IgnisResult<Self> {
        let classifier_path = config.classifier_path();
        let regressor_path = config.regressor_path();
        info!("Loading classifier from {}", classifier_path.display());
        let classifier = GradientBoostingClassifier::load(&classifier_path)?;
        info!("Loading regressor from {}", regressor_path.display());
        let regressor = GradientBoostingRegressor::load(&regressor_path)?;
        let source = OpenMeteoClient::new(config)?;
        Ok(Self::new(
            Box::new(classifier),
            Box::new(regressor),
            Box::new(source),
            config,
        ))
    }

    /// Forecast with thread-local randomness and the current UTC month
    pub fn predict(&self, request: &PredictionRequest) -> IgnisResult<PredictionResult> {
        self.predict_with(request, Utc::now().month(), &mut rand::rng())
    }

    /// Forecast with an explicit month (1 = January) and random source
    pub fn predict_with<R: Rng + ?Sized>(
        &self,
        request: &PredictionRequest,
        month: u32,
        rng: &mut R,
    ) -> IgnisResult<PredictionResult> {
        request.validate()?;
        let (lat, lng) = (request.lat, request.lng);
        let brightness = request.brightness.unwrap_or(self.default_brightness);

        let weather = match self.source.current_weather(lat, lng) {
            Ok(current) => WeatherSnapshot::observed(current),
            Err(e) => {
                warn!("Weather API error: {}. Estimating from brightness.", e);
                WeatherSnapshot::estimated(brightness, rng)
            }
        };

        let elevation = self.source.elevation(lat, lng).unwrap_or_else(|e| {
            warn!(
                "Elevation API error: {}. Using {} default.",
                e, self.fallback_elevation
            );
            self.fallback_elevation
        });

        let estimate = seasonal::estimate(lat, lng, month, rng);
        debug!(
            "Region {:?}: drought {:.2}, vegetation {:.2}",
            estimate.region, estimate.drought, estimate.vegetation
        );

        let conditions = PointConditions {
            elevation,
            wind_direction: weather.wind_direction,
            wind_speed: weather.wind_speed,
            temp_min: weather.temp_min,
            temp_max: weather.temp_max,
            humidity: weather.humidity,
            drought: estimate.drought,
            vegetation: estimate.vegetation,
            brightness,
        };
        let features = conditions.feature_vector();

        let will_spread = self.classifier.will_spread(&features)?;
        let spread_probability = self.classifier.spread_probability(&features)?;
        let raw_ratio = self.regressor.spread_ratio(&features)?;
        let spread_ratio = if raw_ratio.is_nan() {
            MIN_SPREAD_RATIO
        } else {
            raw_ratio.clamp(MIN_SPREAD_RATIO, MAX_SPREAD_RATIO)
        };

        let inputs = SpreadInputs {
            lat,
            lng,
            brightness,
            wind_speed: weather.wind_speed,
            wind_direction: weather.wind_direction,
            vegetation: estimate.vegetation,
            spread_ratio,
            spread_probability,
        };
        let projection = project(&inputs);
        let geojson = geojson::spread_collection(&inputs, &projection, will_spread);

        info!(
            "Forecast at ({:.4}, {:.4}): spread={} p={:.3} ratio={:.2} distance={:.2}",
            lat, lng, will_spread, spread_probability, spread_ratio, projection.spread_distance
        );

        Ok(PredictionResult {
            will_spread,
            spread_probability,
            spread_ratio,
            spread_direction: weather.wind_direction,
            spread_distance_km: *projection.spread_distance,
            environmental_data: EnvironmentalData {
                elevation,
                wind_direction: weather.wind_direction,
                wind_speed: weather.wind_speed,
                temperature: weather.temp_max,
                humidity: weather.humidity,
                drought: estimate.drought,
                vegetation: estimate.vegetation,
                brightness,
                data_source: weather.source,
            },
            geojson,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parsing() {
        let req = PredictionRequest::from_json(r#"{"lat": 38.5, "lng": -121.5}"#).unwrap();
        assert_eq!(req.brightness, None);
        let req =
            PredictionRequest::from_json(r#"{"lat": 38.5, "lng": -121.5, "brightness": 412.0}"#)
                .unwrap();
        assert_eq!(req.brightness, Some(412.0));

        assert!(matches!(
            PredictionRequest::from_json("{not json"),
            Err(IgnisError::Serialization(_))
        ));
        assert!(PredictionRequest::from_json(r#"{"lng": 10.0}"#).is_err());
        assert!(matches!(
            PredictionRequest::from_json(r#"{"lat": 120.0, "lng": 10.0}"#),
            Err(IgnisError::InvalidInput(_))
        ));
        let negative = r#"{"lat": 1.0, "lng": 1.0, "brightness": -3}"#;
        assert!(PredictionRequest::from_json(negative).is_err());
    }
}
