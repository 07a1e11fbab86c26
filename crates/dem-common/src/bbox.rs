//! Geographic bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in degrees.
///
/// Latitudes grow northward and longitudes grow eastward, so a well-formed
/// box has `north > south` and `east > west`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Create a new bounding box from its four limits.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// The whole globe.
    pub fn global() -> Self {
        Self::new(90.0, -90.0, 180.0, -180.0)
    }

    /// Parse a "west,south,east,north" string (the usual BBOX ordering).
    pub fn from_extent_string(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let parse = |p: &str| {
            p.parse::<f64>()
                .map_err(|_| BboxParseError::InvalidNumber(p.to_string()))
        };

        let bbox = Self {
            west: parse(parts[0])?,
            south: parse(parts[1])?,
            east: parse(parts[2])?,
            north: parse(parts[3])?,
        };

        if !bbox.is_valid() {
            return Err(BboxParseError::Inverted(s.to_string()));
        }

        Ok(bbox)
    }

    /// Latitude span in degrees.
    pub fn latitude_span(&self) -> f64 {
        self.north - self.south
    }

    /// Longitude span in degrees.
    pub fn longitude_span(&self) -> f64 {
        self.east - self.west
    }

    /// Center point as (latitude, longitude).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }

    /// True when both spans are positive and finite.
    pub fn is_valid(&self) -> bool {
        self.latitude_span().is_finite()
            && self.longitude_span().is_finite()
            && self.latitude_span() > 0.0
            && self.longitude_span() > 0.0
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.west < other.east
            && self.east > other.west
            && self.south < other.north
            && self.north > other.south
    }

    /// Compute the intersection of two bounding boxes.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }

        Some(BoundingBox {
            north: self.north.min(other.north),
            south: self.south.max(other.south),
            east: self.east.min(other.east),
            west: self.west.max(other.west),
        })
    }

    /// Check if a point is contained within this bbox (edges inclusive).
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.south
            && latitude <= self.north
            && longitude >= self.west
            && longitude <= self.east
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid extent format: {0}. Expected 'west,south,east,north'")]
    InvalidFormat(String),

    #[error("Invalid number in extent: {0}")]
    InvalidNumber(String),

    #[error("Extent has non-positive span: {0}")]
    Inverted(String),
}
