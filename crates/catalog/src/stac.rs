//! STAC item construction for newly discovered VIIRS scenes.
//!
//! A VIIRS acquisition is published as a handful of sibling files sharing a
//! granule stem. The radiance file starts with `SVDNB` and carries the
//! acquisition day in its third `_`-separated token:
//!
//! ```text
//! SVDNB_npp_d20140101_t0101010_e0102020_b11111_c20140101_noaa_ops.rade9.co.tif
//!           ^^^^^^^^^
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, TimeZone, Utc};
use geo::Geometry;
use serde::{Deserialize, Serialize};

use ntl_common::BoundingBox;

use crate::error::{CatalogError, Result};
use crate::scene::Scene;

/// Base URL of the public NOAA nighttime-lights bucket.
pub const GLOBAL_NIGHTLIGHT_URL: &str = "https://globalnightlight.s3.amazonaws.com";

/// Media type of a cloud-optimized GeoTIFF asset.
pub const COG_MEDIA_TYPE: &str = "image/tiff; application=geotiff; profile=cloud-optimized";

const STAC_VERSION: &str = "1.0.0";
const RADIANCE_PREFIX: &str = "SVDNB";

/// The files of one acquisition, resolved to hrefs.
#[derive(Debug, Clone)]
pub struct SceneFiles {
    /// Radiance file name, used as the item id.
    pub name: String,
    /// `YYYYMM`.
    pub month: String,
    pub collection_id: String,
    pub date: NaiveDate,
    /// Radiance href.
    pub href: String,
    pub bbox: BoundingBox,
    /// Asset key → href, one per input file.
    pub assets: BTreeMap<String, String>,
}

impl SceneFiles {
    /// Group `filenames` found under `prefix` into one acquisition.
    ///
    /// Hrefs are `{base_url}/{prefix}/{file}`; `bounds` is the footprint of
    /// the radiance raster.
    pub fn from_filenames<S: AsRef<str>>(
        filenames: &[S],
        prefix: &str,
        base_url: &str,
        bounds: BoundingBox,
    ) -> Result<Self> {
        let name = filenames
            .iter()
            .map(AsRef::as_ref)
            .find(|f| f.starts_with(RADIANCE_PREFIX))
            .ok_or_else(|| {
                CatalogError::InvalidFileName(format!(
                    "no {} radiance file among {} files",
                    RADIANCE_PREFIX,
                    filenames.len()
                ))
            })?
            .to_string();

        let date = acquisition_date(&name)?;
        let month = date.format("%Y%m").to_string();
        let href = join_href(base_url, prefix, &name);

        let assets = filenames
            .iter()
            .map(AsRef::as_ref)
            .map(|f| {
                let key = f.split('_').next().unwrap_or(f).to_string();
                (key, join_href(base_url, prefix, f))
            })
            .collect();

        Ok(Self {
            collection_id: format!("VIIRS_DNB_rade9_npp_{}", month),
            name,
            month,
            date,
            href,
            bbox: bounds,
            assets,
        })
    }

    /// Href of the item JSON published next to the radiance file.
    pub fn json_href(&self) -> String {
        self.href.replace(".tif", ".json")
    }

    /// Build the STAC item.
    pub fn to_stac_item(&self) -> StacItem {
        let footprint = Geometry::Polygon(self.bbox.to_polygon());
        let datetime = Utc.from_utc_datetime(&self.date.and_time(chrono::NaiveTime::MIN));

        let mut properties = serde_json::Map::new();
        properties.insert(
            "datetime".to_string(),
            serde_json::Value::String(datetime.to_rfc3339()),
        );

        StacItem {
            kind: "Feature".to_string(),
            stac_version: STAC_VERSION.to_string(),
            id: self.name.clone(),
            collection: Some(self.collection_id.clone()),
            geometry: geojson::Geometry::new(geojson::Value::from(&footprint)),
            bbox: self.bbox.to_array(),
            properties,
            links: Vec::new(),
            assets: self
                .assets
                .iter()
                .map(|(key, href)| {
                    (
                        key.clone(),
                        StacAsset {
                            href: href.clone(),
                            media_type: Some(COG_MEDIA_TYPE.to_string()),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Build the catalog row for this acquisition.
    pub fn to_scene(&self) -> Scene {
        Scene {
            id: self.name.clone(),
            collection: self.collection_id.clone(),
            json_href: Some(self.json_href()),
            href: self.href.clone(),
            bbox: self.bbox,
            geometry: Geometry::Polygon(self.bbox.to_polygon()),
            date: self.date,
            datetime: Utc.from_utc_datetime(&self.date.and_time(chrono::NaiveTime::MIN)),
        }
    }
}

/// Parse the acquisition day from a radiance file name.
pub fn acquisition_date(name: &str) -> Result<NaiveDate> {
    let token = name
        .split('_')
        .nth(2)
        .and_then(|t| t.strip_prefix('d'))
        .and_then(|t| t.get(..8))
        .ok_or_else(|| CatalogError::InvalidFileName(name.to_string()))?;

    NaiveDate::parse_from_str(token, "%Y%m%d")
        .map_err(|_| CatalogError::InvalidFileName(name.to_string()))
}

fn join_href(base_url: &str, prefix: &str, file: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}", base, file)
    } else {
        format!("{}/{}/{}", base, prefix, file)
    }
}

/// A STAC 1.0 item (GeoJSON feature).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub stac_version: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub collection: Option<String>,
    pub geometry: geojson::Geometry,
    pub bbox: [f64; 4],
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub links: Vec<serde_json::Value>,
    pub assets: BTreeMap<String, StacAsset>,
}

impl StacItem {
    /// Write the item as pretty-printed JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StacAsset {
    pub href: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub media_type: Option<String>,
}
