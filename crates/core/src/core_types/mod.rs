//! Core types and utilities

pub mod units;
pub mod vec2;

// Re-export
pub use units::*;
pub use vec2::{unit_from_radians, Vec2};
