//! Turning a predicted spread ratio into map coordinates
//!
//! The fire is assumed to grow mostly downwind. Eight rays leave the origin at
//! 45° steps starting from the downwind bearing; each ray's length is the
//! spread distance scaled by how closely it points downwind and by vegetation
//! density. Kilometer offsets are converted to degrees with a fixed
//! 111.32 km per degree of latitude and a cosine-corrected longitude scale.

use crate::core_types::{unit_from_radians, Degrees, Kilometers, KilometersPerHour};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Kilometers per degree of latitude
pub const KM_PER_DEGREE: f64 = 111.32;

/// Number of rays in the spread polygon
pub const SPREAD_POINTS: usize = 8;

/// Brightness at which the intensity factor reaches 1
pub const REFERENCE_BRIGHTNESS: f64 = 350.0;

/// Wind speed (km/h) at which the wind factor reaches 1
pub const REFERENCE_WIND_SPEED: f64 = 10.0;

/// Cap on both the intensity and the wind factor
const MAX_FACTOR: f64 = 1.5;

/// Floor on `cos(lat)` so longitude offsets stay finite at the poles
const MIN_LATITUDE_COSINE: f64 = 1e-6;

/// Everything the projection depends on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadInputs {
    pub lat: f64,
    pub lng: f64,
    pub brightness: f64,
    pub wind_speed: KilometersPerHour,
    /// Meteorological direction the wind blows from
    pub wind_direction: Degrees,
    pub vegetation: f64,
    /// Already clipped to the plausible range
    pub spread_ratio: f64,
    pub spread_probability: f64,
}

/// One projected polygon vertex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadPoint {
    pub lat: f64,
    pub lng: f64,
    pub probability: f64,
}

impl SpreadPoint {
    /// GeoJSON `[lng, lat]` order
    pub fn position(&self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

/// Result of [`project`]
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadProjection {
    /// Downwind bearing in math convention (radians, 0 = east, counter-clockwise)
    pub wind_angle: f64,
    pub spread_distance: Kilometers,
    pub points: [SpreadPoint; SPREAD_POINTS],
    /// End of the downwind arrow, `[lng, lat]`
    pub arrow_end: [f64; 2],
}

/// Downwind bearing for a meteorological wind direction
///
/// Wind blowing from the west (270°) pushes the fire east, i.e. angle 0.
pub fn downwind_angle(wind_direction: Degrees) -> f64 {
    Degrees::new(270.0 - *wind_direction).normalized().to_radians()
}

/// Base spread distance before the ratio is applied
pub fn base_distance(brightness: f64, wind_speed: KilometersPerHour) -> Kilometers {
    let intensity = (brightness / REFERENCE_BRIGHTNESS).min(MAX_FACTOR);
    let wind = (*wind_speed / REFERENCE_WIND_SPEED).min(MAX_FACTOR);
    Kilometers::new(intensity * wind)
}

/// Degrees of (latitude, longitude) per kilometer at `lat`
fn degrees_per_km(lat: f64) -> (f64, f64) {
    let cos_lat = lat.to_radians().cos().max(MIN_LATITUDE_COSINE);
    (1.0 / KM_PER_DEGREE, 1.0 / (KM_PER_DEGREE * cos_lat))
}

/// Project the spread polygon and arrow
pub fn project(inputs: &SpreadInputs) -> SpreadProjection {
    let wind_angle = downwind_angle(inputs.wind_direction);
    let spread_km = *base_distance(inputs.brightness, inputs.wind_speed) * inputs.spread_ratio;
    let veg_factor = 0.7 + 0.6 * inputs.vegetation;
    let (lat_scale, lng_scale) = degrees_per_km(inputs.lat);

    let points = std::array::from_fn(|i| {
        let angle = wind_angle + i as f64 * TAU / SPREAD_POINTS as f64;
        let direction_factor = 0.5 + 0.5 * (angle - wind_angle).cos();
        let offset = unit_from_radians(angle) * (spread_km * direction_factor * veg_factor);
        SpreadPoint {
            lat: inputs.lat + offset.y * lat_scale,
            lng: inputs.lng + offset.x * lng_scale,
            probability: inputs.spread_probability * direction_factor,
        }
    });

    let arrow = unit_from_radians(wind_angle) * spread_km;
    SpreadProjection {
        wind_angle,
        spread_distance: Kilometers::new(spread_km),
        points,
        arrow_end: [
            inputs.lng + arrow.x * lng_scale,
            inputs.lat + arrow.y * lat_scale,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn inputs() -> SpreadInputs {
        SpreadInputs {
            lat: 0.0,
            lng: 0.0,
            brightness: 350.0,
            wind_speed: KilometersPerHour::new(10.0),
            wind_direction: Degrees::new(270.0),
            vegetation: 0.5,
            spread_ratio: 2.0,
            spread_probability: 0.8,
        }
    }

    #[test]
    fn test_downwind_angle() {
        assert_relative_eq!(downwind_angle(Degrees::new(270.0)), 0.0);
        assert_relative_eq!(downwind_angle(Degrees::new(180.0)), std::f64::consts::FRAC_PI_2);
        // 270 - 300 wraps to 330°
        assert_relative_eq!(downwind_angle(Degrees::new(300.0)), 330f64.to_radians());
    }

    #[test]
    fn test_base_distance_caps() {
        assert_relative_eq!(*base_distance(350.0, KilometersPerHour::new(10.0)), 1.0);
        assert_relative_eq!(*base_distance(2000.0, KilometersPerHour::new(80.0)), 2.25);
        assert_relative_eq!(*base_distance(175.0, KilometersPerHour::new(5.0)), 0.25);
    }

    #[test]
    fn test_west_wind_pushes_east() {
        let projection = project(&inputs());
        assert_relative_eq!(*projection.spread_distance, 2.0);

        // Downwind ray: full distance × vegetation factor 1.0, due east on the equator
        let head = projection.points[0];
        assert_relative_eq!(head.lng, 2.0 / KM_PER_DEGREE, epsilon = 1e-12);
        assert_relative_eq!(head.lat, 0.0, epsilon = 1e-12);
        assert_relative_eq!(head.probability, 0.8);

        // Upwind ray collapses onto the origin
        let tail = projection.points[4];
        assert_relative_eq!(tail.lng, 0.0, epsilon = 1e-12);
        assert_relative_eq!(tail.probability, 0.0, epsilon = 1e-12);

        // Crosswind rays get half the distance and half the probability
        assert_relative_eq!(projection.points[2].lat, 1.0 / KM_PER_DEGREE, epsilon = 1e-12);
        assert_relative_eq!(projection.points[2].probability, 0.4, epsilon = 1e-12);

        assert_relative_eq!(projection.arrow_end[0], 2.0 / KM_PER_DEGREE, epsilon = 1e-12);
        assert_relative_eq!(projection.arrow_end[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_longitude_widens_with_latitude() {
        let projection = project(&SpreadInputs {
            lat: 60.0,
            ..inputs()
        });
        // cos(60°) = 0.5 doubles the longitude offset
        assert_relative_eq!(
            projection.points[0].lng,
            2.0 * 2.0 / KM_PER_DEGREE,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_pole_stays_finite() {
        let projection = project(&SpreadInputs {
            lat: 90.0,
            ..inputs()
        });
        assert!(projection
            .points
            .iter()
            .all(|p| p.lat.is_finite() && p.lng.is_finite()));
        assert!(projection.arrow_end.iter().all(|v| v.is_finite()));
    }
}
