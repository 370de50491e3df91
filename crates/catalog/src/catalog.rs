//! Scene catalog loaded from CSV, with search operations.

use std::io::Read;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument};

use ntl_common::time::parse_day;
use ntl_common::AoiQuery;

use crate::error::{CatalogError, Result};
use crate::scene::{Scene, SceneRecord};

/// An ordered, immutable collection of scenes.
///
/// Every search returns a new `Catalog` holding the matching scenes in their
/// original order, or `CatalogError::EmptyInput` when nothing matches.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    scenes: Vec<Scene>,
}

impl Catalog {
    /// Wrap an existing list of scenes.
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    /// Load a catalog CSV from disk.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let catalog = Self::from_reader(file)?;
        info!(scenes = catalog.len(), "Loaded scene catalog");
        Ok(catalog)
    }

    /// Parse a catalog CSV from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let mut scenes = Vec::new();

        for record in rdr.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let raw: SceneRecord = record
                .deserialize(Some(&headers))
                .map_err(|e| CatalogError::invalid_record(line, e.to_string()))?;
            scenes.push(Scene::from_record(raw, line)?);
        }

        Ok(Self { scenes })
    }

    /// Persist the catalog in the CSV layout accepted by [`Catalog::load`].
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path.as_ref())?;
        for scene in &self.scenes {
            wtr.serialize(scene.to_record())?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scene> {
        self.scenes.iter()
    }

    pub fn into_scenes(self) -> Vec<Scene> {
        self.scenes
    }

    /// Scenes acquired on `day` (`YYYY-MM-DD`).
    pub fn search_by_day(&self, day: &str) -> Result<Self> {
        let day = parse_day(day).map_err(|e| CatalogError::InvalidArgument(e.to_string()))?;
        self.filter(&format!("day {}", day), |s| s.date == day)
    }

    /// Scenes acquired in the given calendar month.
    pub fn search_by_year_month(&self, year: i32, month: u32) -> Result<Self> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(CatalogError::InvalidArgument(format!(
                "invalid year/month {}-{}",
                year, month
            )));
        }
        self.filter(&format!("month {:04}-{:02}", year, month), |s| {
            s.date.year() == year && s.date.month() == month
        })
    }

    /// Scenes with `start_day <= date <= end_day`.
    pub fn search_by_period(&self, start_day: &str, end_day: &str) -> Result<Self> {
        let start =
            parse_day(start_day).map_err(|e| CatalogError::InvalidArgument(e.to_string()))?;
        let end = parse_day(end_day).map_err(|e| CatalogError::InvalidArgument(e.to_string()))?;
        self.filter(&format!("period {} to {}", start, end), |s| {
            s.date >= start && s.date <= end
        })
    }

    /// Scenes whose bounding box strictly contains the point.
    pub fn search_by_point(&self, x: f64, y: f64) -> Result<Self> {
        self.filter(&format!("point ({}, {})", x, y), |s| {
            s.bbox.strictly_contains_point(x, y)
        })
    }

    /// Scenes whose footprint intersects the query.
    pub fn search_by_intersect(&self, aoi: &AoiQuery) -> Result<Self> {
        self.filter("area of interest", |s| aoi.intersects(&s.geometry))
    }

    fn filter<F>(&self, what: &str, predicate: F) -> Result<Self>
    where
        F: Fn(&Scene) -> bool,
    {
        let hits: Vec<Scene> = self.scenes.iter().filter(|s| predicate(s)).cloned().collect();
        debug!(query = %what, hits = hits.len(), of = self.scenes.len(), "Catalog search");

        if hits.is_empty() {
            return Err(CatalogError::no_hits(what));
        }
        Ok(Self { scenes: hits })
    }
}

impl std::fmt::Display for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Catalog with {} scenes", self.scenes.len())
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Scene;
    type IntoIter = std::slice::Iter<'a, Scene>;

    fn into_iter(self) -> Self::IntoIter {
        self.scenes.iter()
    }
}
