//! GeoJSON output for a spread forecast
//!
//! Only the three geometry kinds the forecast emits are modelled. Feature
//! properties are a tagged enum whose `type` field tells map layers how to
//! style each feature.

use crate::forecast::projection::{SpreadInputs, SpreadProjection};
use serde::{Deserialize, Serialize};

/// `[lng, lat]`
pub type Position = [f64; 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum FeatureTag {
    Feature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum CollectionTag {
    FeatureCollection,
}

/// Geometry subset used by the forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
}

/// Per-feature properties, tagged by role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureProperties {
    Origin {
        intensity: f64,
    },
    Spread {
        /// 0 or 1
        will_spread: u8,
        probability: f64,
        spread_ratio: f64,
        spread_distance_km: f64,
        wind_direction: f64,
    },
    Direction {
        direction: f64,
        probability: f64,
    },
    SpreadPoint {
        probability: f64,
        index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    tag: FeatureTag,
    pub properties: FeatureProperties,
    pub geometry: Geometry,
}

impl Feature {
    pub fn new(properties: FeatureProperties, geometry: Geometry) -> Self {
        Self {
            tag: FeatureTag::Feature,
            properties,
            geometry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    tag: CollectionTag,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            tag: CollectionTag::FeatureCollection,
            features,
        }
    }

    /// Features with a given role, in order
    pub fn with_role<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a Feature> + 'a {
        self.features.iter().filter(move |f| f.properties.role() == role)
    }
}

impl FeatureProperties {
    /// Value of the `type` property
    pub fn role(&self) -> &'static str {
        match self {
            Self::Origin { .. } => "origin",
            Self::Spread { .. } => "spread",
            Self::Direction { .. } => "direction",
            Self::SpreadPoint { .. } => "spread_point",
        }
    }
}

/// Origin, spread polygon, downwind arrow, then one marker per vertex
pub fn spread_collection(
    inputs: &SpreadInputs,
    projection: &SpreadProjection,
    will_spread: bool,
) -> FeatureCollection {
    let origin = [inputs.lng, inputs.lat];
    let spread_km = *projection.spread_distance;

    // Closed ring: every vertex, then the first one again
    let mut ring: Vec<Position> = projection.points.iter().map(|p| p.position()).collect();
    ring.push(projection.points[0].position());

    let mut features = Vec::with_capacity(3 + projection.points.len());
    features.push(Feature::new(
        FeatureProperties::Origin {
            intensity: inputs.brightness,
        },
        Geometry::Point(origin),
    ));
    features.push(Feature::new(
        FeatureProperties::Spread {
            will_spread: u8::from(will_spread),
            probability: inputs.spread_probability,
            spread_ratio: inputs.spread_ratio,
            spread_distance_km: spread_km,
            wind_direction: *inputs.wind_direction,
        },
        Geometry::Polygon(vec![ring]),
    ));
    features.push(Feature::new(
        FeatureProperties::Direction {
            direction: *inputs.wind_direction,
            probability: inputs.spread_probability,
        },
        Geometry::LineString(vec![origin, projection.arrow_end]),
    ));
    features.extend(projection.points.iter().enumerate().map(|(index, p)| {
        Feature::new(
            FeatureProperties::SpreadPoint {
                probability: p.probability,
                index,
            },
            Geometry::Point(p.position()),
        )
    }));

    FeatureCollection::new(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{Degrees, KilometersPerHour};
    use crate::forecast::projection::project;

    fn sample() -> FeatureCollection {
        let inputs = SpreadInputs {
            lat: 38.5,
            lng: -121.5,
            brightness: 400.0,
            wind_speed: KilometersPerHour::new(18.0),
            wind_direction: Degrees::new(225.0),
            vegetation: 0.4,
            spread_ratio: 1.7,
            spread_probability: 0.66,
        };
        spread_collection(&inputs, &project(&inputs), true)
    }

    #[test]
    fn test_feature_order_and_roles() {
        let fc = sample();
        assert_eq!(fc.features.len(), 11);
        let roles: Vec<&str> = fc.features.iter().map(|f| f.properties.role()).collect();
        assert_eq!(&roles[..3], &["origin", "spread", "direction"]);
        assert!(roles[3..].iter().all(|&r| r == "spread_point"));
        assert_eq!(fc.with_role("spread_point").count(), 8);
    }

    #[test]
    fn test_polygon_ring_is_closed() {
        let fc = sample();
        let Geometry::Polygon(rings) = &fc.features[1].geometry else {
            panic!("spread feature must be a polygon");
        };
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 9);
        assert_eq!(rings[0][0], rings[0][8]);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        let origin = &json["features"][0];
        assert_eq!(origin["type"], "Feature");
        assert_eq!(origin["properties"]["type"], "origin");
        assert_eq!(origin["properties"]["intensity"], 400.0);
        assert_eq!(origin["geometry"]["type"], "Point");
        assert_eq!(origin["geometry"]["coordinates"][0], -121.5);

        let spread = &json["features"][1]["properties"];
        assert_eq!(spread["will_spread"], 1);
        assert_eq!(spread["wind_direction"], 225.0);

        let marker = &json["features"][10]["properties"];
        assert_eq!(marker["type"], "spread_point");
        assert_eq!(marker["index"], 7);

        let line = &json["features"][2]["geometry"];
        assert_eq!(line["type"], "LineString");
        assert_eq!(line["coordinates"].as_array().unwrap().len(), 2);
    }
}
