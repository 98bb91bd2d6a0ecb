//! Semantic unit types for observation and forecast quantities
//!
//! Newtype wrappers that keep weather readings, angles and distances from being
//! mixed up as they flow from the conditions lookup into the feature vector and
//! the spread projection.
//!
//! # Design Philosophy
//! - Every quantity is f64: values come from JSON and go back out as JSON
//! - Total ordering via `Ord` (NaN handled as greater than all values)
//! - `Deref` to the raw value so arithmetic stays terse at call sites
//! - Serialize as the bare number, so JSON output carries plain floats
//!
//! # Usage
//! ```
//! use ignis_core::core_types::units::{Degrees, Kilometers};
//!
//! let wind = Degrees::new(-90.0).normalized();
//! assert_eq!(*wind, 270.0);
//!
//! let d = Kilometers::new(1.5);
//! assert_eq!(format!("{d:.1}"), "1.5 km");
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Deref, Mul, Sub};

/// Compare f64 values with total ordering using Rust's built-in `total_cmp`
#[inline]
fn f64_total_cmp(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

/// Shared trait impls for the f64 newtypes below
macro_rules! unit_newtype {
    ($name:ident, $suffix:literal) => {
        impl Eq for $name {}

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                f64_total_cmp(self.0, other.0)
            }
        }

        impl Deref for $name {
            type Target = f64;
            #[inline]
            fn deref(&self) -> &f64 {
                &self.0
            }
        }

        impl $name {
            /// Wrap a raw value
            #[inline]
            #[must_use]
            pub const fn new(value: f64) -> Self {
                $name(value)
            }

            /// Get the raw f64 value
            #[inline]
            #[must_use]
            pub const fn value(self) -> f64 {
                self.0
            }
        }

        impl From<f64> for $name {
            fn from(v: f64) -> Self {
                $name(v)
            }
        }

        impl From<$name> for f64 {
            fn from(v: $name) -> f64 {
                v.0
            }
        }

        impl Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                $name(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                $name(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $name {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self {
                $name(self.0 * rhs)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if let Some(precision) = f.precision() {
                    write!(f, "{:.*}{}", precision, self.0, $suffix)
                } else {
                    write!(f, "{}{}", self.0, $suffix)
                }
            }
        }
    };
}

// ============================================================================
// TEMPERATURE
// ============================================================================

/// Air temperature in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Celsius(f64);

unit_newtype!(Celsius, "°C");

impl Celsius {
    /// Shift by a number of degrees (negative to cool)
    #[inline]
    #[must_use]
    pub fn offset(self, delta: f64) -> Self {
        Celsius(self.0 + delta)
    }
}

// ============================================================================
// RATIOS
// ============================================================================

/// Relative humidity or other percentage (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Percent(f64);

unit_newtype!(Percent, "%");

// ============================================================================
// SPEED
// ============================================================================

/// Wind speed in kilometers per hour (the unit Open-Meteo reports by default)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct KilometersPerHour(f64);

unit_newtype!(KilometersPerHour, " km/h");

// ============================================================================
// ANGLE
// ============================================================================

/// Compass angle in degrees (0 = North, 90 = East)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Degrees(f64);

unit_newtype!(Degrees, "°");

impl Degrees {
    /// Convert to radians
    #[inline]
    #[must_use]
    pub fn to_radians(self) -> f64 {
        self.0.to_radians()
    }

    /// Wrap into `[0, 360)`
    #[inline]
    #[must_use]
    pub fn normalized(self) -> Self {
        Degrees(self.0.rem_euclid(360.0))
    }
}

// ============================================================================
// DISTANCE
// ============================================================================

/// Elevation or short distance in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Meters(f64);

unit_newtype!(Meters, " m");

/// Ground distance in kilometers
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilometers(f64);

unit_newtype!(Kilometers, " km");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrees_normalized_wraps_negative() {
        assert_eq!(*Degrees::new(-90.0).normalized(), 270.0);
        assert_eq!(*Degrees::new(720.0).normalized(), 0.0);
        assert_eq!(*Degrees::new(45.0).normalized(), 45.0);
    }

    #[test]
    fn test_units_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&Celsius::new(31.5)).unwrap();
        assert_eq!(json, "31.5");
        let back: Percent = serde_json::from_str("42.0").unwrap();
        assert_eq!(back, Percent::new(42.0));
    }

    #[test]
    fn test_total_ordering_and_display() {
        let a = KilometersPerHour::new(5.0);
        let b = KilometersPerHour::new(25.0);
        assert_eq!(a.max(b), b);
        assert_eq!(format!("{:.1}", Celsius::new(20.26)), "20.3°C");
    }
}
