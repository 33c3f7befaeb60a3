use serde::{Deserialize, Serialize};

use crate::coord::LatLng;
use crate::math::EARTH_MEAN_RADIUS_M;

/// Axis-aligned geographic rectangle in degrees.
///
/// Wire shape is `{north, south, east, west}`. All four edges travel together;
/// see [`BoundingBox::from_edges`]. Antimeridian crossing is not normalized: a
/// box with `west > east` contains nothing.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// All-or-nothing construction: a missing edge means no box at all.
    pub fn from_edges(
        north: Option<f64>,
        south: Option<f64>,
        east: Option<f64>,
        west: Option<f64>,
    ) -> Option<Self> {
        Some(Self::new(north?, south?, east?, west?))
    }

    /// Inclusive on every edge.
    pub fn contains(&self, p: LatLng) -> bool {
        self.south <= p.lat && p.lat <= self.north && self.west <= p.lng && p.lng <= self.east
    }

    /// True when every edge differs from `other` by less than `epsilon` degrees.
    pub fn approx_eq(&self, other: &BoundingBox, epsilon: f64) -> bool {
        (self.north - other.north).abs() < epsilon
            && (self.south - other.south).abs() < epsilon
            && (self.east - other.east).abs() < epsilon
            && (self.west - other.west).abs() < epsilon
    }

    /// Smallest box enclosing a circle of `radius_m` around `center`,
    /// clamped to valid coordinate ranges.
    pub fn around(center: LatLng, radius_m: f64) -> Self {
        let dlat = (radius_m / EARTH_MEAN_RADIUS_M).to_degrees();
        let cos_lat = center.lat.to_radians().cos();
        // Near the poles every longitude is within reach.
        let dlng = if cos_lat <= 1e-9 {
            180.0
        } else {
            (dlat / cos_lat).min(180.0)
        };

        Self {
            north: (center.lat + dlat).min(90.0),
            south: (center.lat - dlat).max(-90.0),
            east: (center.lng + dlng).min(180.0),
            west: (center.lng - dlng).max(-180.0),
        }
    }

    /// The whole globe.
    pub fn world() -> Self {
        Self::new(90.0, -90.0, 180.0, -180.0)
    }
}
