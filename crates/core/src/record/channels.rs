//! Named raster channels of a Next Day Wildfire Spread record
//!
//! Every channel is a flattened 64×64 raster. Channels that are missing (or
//! stored as something other than a non-empty float list) become all-zero
//! arrays; short channels are zero-padded to the layout length. Longer channels
//! are kept intact, which means the square reshape used for the fire shape
//! ratio fails for them and the ratio falls back to its neutral value.

use crate::record::example::Example;
use serde::{Deserialize, Serialize};

/// Raster channels consumed by the feature extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Terrain elevation (m)
    Elevation,
    /// Wind direction (degrees)
    WindDirection,
    /// Wind speed
    WindSpeed,
    /// Minimum temperature
    TempMin,
    /// Maximum temperature
    TempMax,
    /// Specific humidity
    Humidity,
    /// Palmer drought severity index
    Drought,
    /// Normalized difference vegetation index
    Vegetation,
    /// Fire mask on the observation day
    PrevFireMask,
    /// Fire mask on the following day
    FireMask,
}

impl Channel {
    /// All channels, in feature-vector order
    pub const ALL: [Channel; 10] = [
        Channel::Elevation,
        Channel::WindDirection,
        Channel::WindSpeed,
        Channel::TempMin,
        Channel::TempMax,
        Channel::Humidity,
        Channel::Drought,
        Channel::Vegetation,
        Channel::PrevFireMask,
        Channel::FireMask,
    ];

    /// Feature key inside the Example message
    pub const fn key(self) -> &'static str {
        match self {
            Self::Elevation => "elevation",
            Self::WindDirection => "th",
            Self::WindSpeed => "vs",
            Self::TempMin => "tmmn",
            Self::TempMax => "tmmx",
            Self::Humidity => "sph",
            Self::Drought => "pdsi",
            Self::Vegetation => "NDVI",
            Self::PrevFireMask => "PrevFireMask",
            Self::FireMask => "FireMask",
        }
    }
}

/// Expected raster geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelLayout {
    /// Flattened channel length
    pub length: usize,
    /// Side of the square grid used to reshape fire masks
    pub side: usize,
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self {
            length: 4096,
            side: 64,
        }
    }
}

/// One record with every channel materialized as a float array
#[derive(Debug, Clone, PartialEq)]
pub struct FireRecord {
    pub elevation: Vec<f32>,
    pub wind_direction: Vec<f32>,
    pub wind_speed: Vec<f32>,
    pub temp_min: Vec<f32>,
    pub temp_max: Vec<f32>,
    pub humidity: Vec<f32>,
    pub drought: Vec<f32>,
    pub vegetation: Vec<f32>,
    pub prev_fire_mask: Vec<f32>,
    pub fire_mask: Vec<f32>,
}

impl FireRecord {
    /// Materialize all channels from a decoded Example
    pub fn from_example(example: &Example, layout: ChannelLayout) -> Self {
        let channel = |c: Channel| channel_array(example, c.key(), layout.length);
        Self {
            elevation: channel(Channel::Elevation),
            wind_direction: channel(Channel::WindDirection),
            wind_speed: channel(Channel::WindSpeed),
            temp_min: channel(Channel::TempMin),
            temp_max: channel(Channel::TempMax),
            humidity: channel(Channel::Humidity),
            drought: channel(Channel::Drought),
            vegetation: channel(Channel::Vegetation),
            prev_fire_mask: channel(Channel::PrevFireMask),
            fire_mask: channel(Channel::FireMask),
        }
    }

    /// Borrow a channel by name
    pub fn channel(&self, channel: Channel) -> &[f32] {
        match channel {
            Channel::Elevation => &self.elevation,
            Channel::WindDirection => &self.wind_direction,
            Channel::WindSpeed => &self.wind_speed,
            Channel::TempMin => &self.temp_min,
            Channel::TempMax => &self.temp_max,
            Channel::Humidity => &self.humidity,
            Channel::Drought => &self.drought,
            Channel::Vegetation => &self.vegetation,
            Channel::PrevFireMask => &self.prev_fire_mask,
            Channel::FireMask => &self.fire_mask,
        }
    }

    /// Record with every channel zero-filled to `layout.length`
    pub fn zeroed(layout: ChannelLayout) -> Self {
        Self::from_example(&Example::new(), layout)
    }
}

/// Float array for `key`, zero-padded to `default_len`
fn channel_array(example: &Example, key: &str, default_len: usize) -> Vec<f32> {
    match example.floats(key) {
        Some(values) if !values.is_empty() => {
            let mut arr = values.to_vec();
            if arr.len() < default_len {
                arr.resize(default_len, 0.0);
            }
            arr
        }
        _ => vec![0.0; default_len],
    }
}
