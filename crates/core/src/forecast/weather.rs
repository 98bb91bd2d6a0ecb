//! Live conditions lookups and the brightness-based fallback

use crate::config::ForecastConfig;
use crate::core_types::{Celsius, Degrees, KilometersPerHour, Meters, Percent};
use crate::error::{IgnisError, IgnisResult};
use rand::Rng;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Variables requested from the forecast endpoint
const CURRENT_VARIABLES: &str =
    "temperature_2m,relative_humidity_2m,wind_speed_10m,wind_direction_10m";

/// Assumed spread between daily maximum and minimum temperature
const DIURNAL_RANGE: f64 = 10.0;

/// Where the weather half of the environmental data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    WeatherApi,
    Estimated,
}

/// Current surface weather at a point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature: Celsius,
    pub humidity: Percent,
    pub wind_speed: KilometersPerHour,
    pub wind_direction: Degrees,
}

/// Weather as fed to the models
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temp_max: Celsius,
    pub temp_min: Celsius,
    pub humidity: Percent,
    pub wind_speed: KilometersPerHour,
    pub wind_direction: Degrees,
    pub source: DataSource,
}

impl WeatherSnapshot {
    /// Observed weather; the current temperature stands in for the daily maximum
    pub fn observed(current: CurrentWeather) -> Self {
        Self {
            temp_max: current.temperature,
            temp_min: current.temperature.offset(-DIURNAL_RANGE),
            humidity: current.humidity,
            wind_speed: current.wind_speed,
            wind_direction: current.wind_direction,
            source: DataSource::WeatherApi,
        }
    }

    /// Plausible weather derived from fire brightness
    ///
    /// Brighter fires are assumed to burn in hotter, drier air. Draws four
    /// values from `rng`: temperature, humidity, wind speed, wind direction.
    pub fn estimated<R: Rng + ?Sized>(brightness: f64, rng: &mut R) -> Self {
        let temp_factor = (brightness / 400.0).clamp(0.0, 1.0);
        let temp_max = 20.0 + temp_factor * 15.0 + rng.random::<f64>() * 5.0;
        let humidity = (60.0 - temp_factor * 40.0 + rng.random::<f64>() * 10.0).max(10.0);
        let wind_speed = 5.0 + rng.random::<f64>() * 20.0;
        let wind_direction = f64::from(rng.random_range(0u16..360));

        Self {
            temp_max: Celsius::new(temp_max),
            temp_min: Celsius::new(temp_max - DIURNAL_RANGE),
            humidity: Percent::new(humidity),
            wind_speed: KilometersPerHour::new(wind_speed),
            wind_direction: Degrees::new(wind_direction),
            source: DataSource::Estimated,
        }
    }
}

/// Provider of point weather and elevation
///
/// The forecaster falls back to heuristics whenever a call returns `Err`.
pub trait ConditionsSource: Send + Sync {
    fn current_weather(&self, lat: f64, lng: f64) -> IgnisResult<CurrentWeather>;

    fn elevation(&self, lat: f64, lng: f64) -> IgnisResult<Meters>;
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    wind_direction_10m: f64,
}

#[derive(Debug, Deserialize)]
struct ElevationResponse {
    #[serde(default)]
    elevation: Vec<f64>,
}

/// Open-Meteo forecast and elevation client
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    forecast_url: String,
    elevation_url: String,
}

impl OpenMeteoClient {
    pub fn new(config: &ForecastConfig) -> IgnisResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            forecast_url: config.forecast_url.clone(),
            elevation_url: config.elevation_url.clone(),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> IgnisResult<T> {
        debug!("GET {} {:?}", url, query);
        let response = self.client.get(url).query(query).send()?.error_for_status()?;
        Ok(response.json()?)
    }
}

impl ConditionsSource for OpenMeteoClient {
    fn current_weather(&self, lat: f64, lng: f64) -> IgnisResult<CurrentWeather> {
        let body: ForecastResponse = self.get_json(
            &self.forecast_url,
            &[
                ("latitude", lat.to_string()),
                ("longitude", lng.to_string()),
                ("current", CURRENT_VARIABLES.to_string()),
            ],
        )?;
        let current = body.current.ok_or_else(|| IgnisError::UnexpectedResponse {
            endpoint: "forecast",
            message: "missing `current` block".to_string(),
        })?;
        Ok(CurrentWeather {
            temperature: Celsius::new(current.temperature_2m),
            humidity: Percent::new(current.relative_humidity_2m),
            wind_speed: KilometersPerHour::new(current.wind_speed_10m),
            wind_direction: Degrees::new(current.wind_direction_10m),
        })
    }

    fn elevation(&self, lat: f64, lng: f64) -> IgnisResult<Meters> {
        let body: ElevationResponse = self.get_json(
            &self.elevation_url,
            &[("latitude", lat.to_string()), ("longitude", lng.to_string())],
        )?;
        body.elevation
            .first()
            .copied()
            .map(Meters::new)
            .ok_or_else(|| IgnisError::UnexpectedResponse {
                endpoint: "elevation",
                message: "empty `elevation` array".to_string(),
            })
    }
}
