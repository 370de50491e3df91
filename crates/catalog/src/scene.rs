//! Scene records and their CSV representation.

use chrono::{DateTime, NaiveDate, Utc};
use geo::Geometry;
use serde::{Deserialize, Serialize};

use ntl_common::aoi::parse_geometry;
use ntl_common::time::{parse_catalog_date, parse_datetime};
use ntl_common::BoundingBox;

use crate::error::{CatalogError, Result};

/// One VIIRS acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Scene identifier (the radiance file name).
    pub id: String,
    /// Monthly collection identifier, e.g. `VIIRS_DNB_rade9_npp_201401`.
    pub collection: String,
    /// Location of the STAC item JSON, if published.
    pub json_href: Option<String>,
    /// Location of the radiance raster.
    pub href: String,
    pub bbox: BoundingBox,
    /// Footprint in EPSG:4326.
    pub geometry: Geometry<f64>,
    /// Acquisition day.
    pub date: NaiveDate,
    /// Acquisition timestamp.
    pub datetime: DateTime<Utc>,
}

impl Scene {
    /// Scene whose footprint is its bounding box, in the monthly collection
    /// of its acquisition time.
    pub fn new(
        id: impl Into<String>,
        href: impl Into<String>,
        bbox: BoundingBox,
        datetime: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            collection: format!("VIIRS_DNB_rade9_npp_{}", datetime.format("%Y%m")),
            json_href: None,
            href: href.into(),
            bbox,
            geometry: Geometry::Polygon(bbox.to_polygon()),
            date: datetime.date_naive(),
            datetime,
        }
    }

    /// Parse a raw CSV record. `line` is only used for error messages.
    pub fn from_record(record: SceneRecord, line: u64) -> Result<Self> {
        let bbox = BoundingBox::parse(&record.bbox)
            .map_err(|e| CatalogError::invalid_record(line, e.to_string()))?;
        let geometry = parse_geometry(&record.geometry)
            .map_err(|e| CatalogError::invalid_record(line, e.to_string()))?;
        let date = parse_catalog_date(&record.date)
            .map_err(|e| CatalogError::invalid_record(line, e.to_string()))?;
        let datetime = parse_datetime(&record.datetime)
            .map_err(|e| CatalogError::invalid_record(line, e.to_string()))?;

        Ok(Self {
            id: record.id,
            collection: record.collection,
            json_href: record.json_href.filter(|s| !s.is_empty()),
            href: record.href,
            bbox,
            geometry,
            date,
            datetime,
        })
    }

    /// Convert back to the CSV representation.
    pub fn to_record(&self) -> SceneRecord {
        let geometry = geojson::Geometry::new(geojson::Value::from(&self.geometry));
        SceneRecord {
            id: self.id.clone(),
            collection: self.collection.clone(),
            json_href: self.json_href.clone(),
            href: self.href.clone(),
            bbox: self.bbox.to_string(),
            geometry: geometry.to_string(),
            date: self.date.format("%Y/%m/%d").to_string(),
            datetime: self.datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Raw CSV row. Columns not listed here are ignored on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRecord {
    pub id: String,
    pub collection: String,
    #[serde(default)]
    pub json_href: Option<String>,
    pub href: String,
    pub bbox: String,
    pub geometry: String,
    pub date: String,
    pub datetime: String,
}
