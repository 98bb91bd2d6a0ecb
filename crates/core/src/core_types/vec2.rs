//! Vector type alias for planar directions.

use nalgebra::Vector2;

/// 2D vector type for east/north components.
///
/// This is a simple alias for `nalgebra::Vector2<f64>`, used for wind vectors
/// in the feature vector and for unit bearings in the spread projection.
pub type Vec2 = Vector2<f64>;

/// Unit vector for a math-convention angle in radians (0 = east, counter-clockwise).
#[inline]
#[must_use]
pub fn unit_from_radians(angle: f64) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}
