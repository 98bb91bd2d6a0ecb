//! Regional drought and vegetation estimates
//!
//! No live source exists for either index, so they are synthesized from a
//! coarse split of the continental US and the calendar month, plus a little
//! jitter so repeated queries are not identical.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound of the drought index
pub const MAX_DROUGHT: f64 = 5.0;

/// Vegetation index clamp
pub const VEGETATION_RANGE: (f64, f64) = (0.1, 0.9);

/// Coarse climate region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    WestCoast,
    Southwest,
    Southeast,
    Northeast,
    Central,
}

impl Region {
    /// First matching rule wins
    pub fn locate(lat: f64, lng: f64) -> Self {
        if lng < -115.0 {
            Self::WestCoast
        } else if lng < -100.0 && lat < 37.0 {
            Self::Southwest
        } else if lng > -90.0 && lat < 36.0 {
            Self::Southeast
        } else if lng > -80.0 && lat > 36.0 {
            Self::Northeast
        } else {
            Self::Central
        }
    }

    /// Drought index before jitter (0 to 5, higher is drier)
    pub fn base_drought(self, month: u32) -> f64 {
        match self {
            // Dry season May through October
            Self::WestCoast if (5..=10).contains(&month) => 4.0,
            Self::WestCoast | Self::Central => 2.0,
            Self::Southwest => 3.5,
            Self::Southeast => 2.5,
            Self::Northeast => 1.5,
        }
    }

    /// Vegetation index before the drought adjustment
    pub fn base_vegetation(self, month: u32) -> f64 {
        let base = match self {
            Self::WestCoast => 0.4,
            Self::Southwest => 0.3,
            Self::Southeast => 0.7,
            Self::Northeast => 0.6,
            Self::Central => 0.5,
        };
        // Growing season
        if (3..=8).contains(&month) {
            base + 0.2
        } else {
            base
        }
    }
}

/// Synthesized drought and vegetation for one location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DroughtVegetation {
    pub region: Region,
    pub drought: f64,
    pub vegetation: f64,
}

/// Estimate both indices for `month` (1 = January)
pub fn estimate<R: Rng + ?Sized>(lat: f64, lng: f64, month: u32, rng: &mut R) -> DroughtVegetation {
    let region = Region::locate(lat, lng);

    let jitter: f64 = rng.random::<f64>() * 2.0 - 1.0;
    let drought = (region.base_drought(month) + jitter).clamp(0.0, MAX_DROUGHT);

    let adjusted = region.base_vegetation(month) * (1.0 - drought / 7.0);
    let jitter: f64 = rng.random::<f64>() * 0.3 - 0.15;
    let vegetation = (adjusted + jitter).clamp(VEGETATION_RANGE.0, VEGETATION_RANGE.1);

    DroughtVegetation {
        region,
        drought,
        vegetation,
    }
}
