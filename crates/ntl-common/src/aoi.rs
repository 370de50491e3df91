//! Area-of-interest queries for spatial catalog search.

use geo::{Geometry, Intersects, MultiPolygon, Point, Polygon};
use geojson::GeoJson;

/// A spatial search query.
///
/// Point queries match footprints containing or touching the point; polygon
/// queries match footprints intersecting the union of all polygons.
#[derive(Debug, Clone, PartialEq)]
pub enum AoiQuery {
    Point(Point<f64>),
    Polygons(MultiPolygon<f64>),
}

impl AoiQuery {
    /// Point query at lon/lat.
    pub fn point(x: f64, y: f64) -> Self {
        Self::Point(Point::new(x, y))
    }

    /// Polygon query over the union of `polygons`.
    pub fn polygons(polygons: Vec<Polygon<f64>>) -> Self {
        Self::Polygons(MultiPolygon::new(polygons))
    }

    /// Build a query from GeoJSON text (geometry, feature or feature
    /// collection). All polygonal members are merged into one query.
    pub fn from_geojson_str(s: &str) -> Result<Self, AoiParseError> {
        let geojson: GeoJson = s
            .parse()
            .map_err(|e: geojson::Error| AoiParseError::InvalidGeoJson(e.to_string()))?;

        let geometries: Vec<geojson::Geometry> = match geojson {
            GeoJson::Geometry(g) => vec![g],
            GeoJson::Feature(f) => f.geometry.into_iter().collect(),
            GeoJson::FeatureCollection(fc) => {
                fc.features.into_iter().filter_map(|f| f.geometry).collect()
            }
        };

        let mut polygons = Vec::new();
        let mut points = Vec::new();
        for g in geometries {
            match to_geo(g)? {
                Geometry::Point(p) => points.push(p),
                Geometry::Polygon(p) => polygons.push(p),
                Geometry::MultiPolygon(mp) => polygons.extend(mp.0),
                other => {
                    return Err(AoiParseError::UnsupportedGeometry(
                        geometry_kind(&other).to_string(),
                    ))
                }
            }
        }

        match (points.len(), polygons.is_empty()) {
            (0, false) => Ok(Self::polygons(polygons)),
            (1, true) => Ok(Self::Point(points[0])),
            (0, true) => Err(AoiParseError::Empty),
            _ => Err(AoiParseError::UnsupportedGeometry(
                "mixed or multiple points".to_string(),
            )),
        }
    }

    /// True if `candidate` intersects this query.
    pub fn intersects(&self, candidate: &Geometry<f64>) -> bool {
        match self {
            Self::Point(p) => candidate.intersects(p),
            Self::Polygons(mp) => candidate.intersects(mp),
        }
    }
}

/// Parse a GeoJSON geometry object. Single-quoted (Python-literal style)
/// input is accepted.
pub fn parse_geometry(s: &str) -> Result<Geometry<f64>, AoiParseError> {
    let normalized = s.replace('\'', "\"");
    let geometry: geojson::Geometry = serde_json::from_str(&normalized)
        .map_err(|e| AoiParseError::InvalidGeoJson(e.to_string()))?;
    to_geo(geometry)
}

fn to_geo(geometry: geojson::Geometry) -> Result<Geometry<f64>, AoiParseError> {
    Geometry::<f64>::try_from(geometry).map_err(|e| AoiParseError::InvalidGeoJson(e.to_string()))
}

fn geometry_kind(g: &Geometry<f64>) -> &'static str {
    match g {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AoiParseError {
    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error("Unsupported AOI geometry: {0}")]
    UnsupportedGeometry(String),

    #[error("AOI contains no geometry")]
    Empty,
}
