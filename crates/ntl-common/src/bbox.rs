//! Bounding box types and operations.

use geo::{coord, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// A geographic bounding box in EPSG:4326 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Parse a bbox string: "minx,miny,maxx,maxy" or the list literal
    /// "[minx, miny, maxx, maxy]" used by the scene catalog.
    pub fn parse(s: &str) -> Result<Self, BboxParseError> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .or_else(|| {
                trimmed
                    .strip_prefix('(')
                    .and_then(|rest| rest.strip_suffix(')'))
            })
            .unwrap_or(trimmed);

        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }

        let bbox = Self::new(values[0], values[1], values[2], values[3]);
        if !bbox.is_finite() {
            return Err(BboxParseError::NonFinite(s.to_string()));
        }
        if !bbox.is_valid() {
            return Err(BboxParseError::Inverted(s.to_string()));
        }
        Ok(bbox)
    }

    /// True if every coordinate is finite and min <= max on both axes.
    pub fn is_valid(&self) -> bool {
        self.is_finite() && self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if a point lies strictly inside this bbox (edges excluded).
    pub fn strictly_contains_point(&self, x: f64, y: f64) -> bool {
        self.min_x < x && x < self.max_x && self.min_y < y && y < self.max_y
    }

    /// `[minx, miny, maxx, maxy]`, the STAC bbox ordering.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Footprint polygon of this bbox.
    pub fn to_polygon(&self) -> Polygon<f64> {
        Rect::new(
            coord! { x: self.min_x, y: self.min_y },
            coord! { x: self.max_x, y: self.max_y },
        )
        .to_polygon()
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl std::str::FromStr for BoundingBox {
    type Err = BboxParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid BBOX format: {0}. Expected 'minx,miny,maxx,maxy'")]
    InvalidFormat(String),

    #[error("Invalid number in BBOX: {0}")]
    InvalidNumber(String),

    #[error("BBOX min exceeds max: {0}")]
    Inverted(String),

    #[error("BBOX coordinates must be finite: {0}")]
    NonFinite(String),
}
