//! Catalog search flags shared by the subcommands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use catalog::Catalog;
use ntl_common::AoiQuery;

/// Filters applied to the catalog in order: day, month, period, point, AOI.
/// Each given filter narrows the result of the previous one.
#[derive(Args, Debug, Clone, Default)]
pub struct SceneFilters {
    /// Single acquisition day (YYYY-MM-DD)
    #[arg(long)]
    pub day: Option<String>,

    /// Calendar month (YYYY-MM)
    #[arg(long)]
    pub month: Option<String>,

    /// Period start day, inclusive (YYYY-MM-DD); requires --end
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// Period end day, inclusive (YYYY-MM-DD); requires --start
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Point the scene footprint must strictly contain ("x,y")
    #[arg(long, allow_hyphen_values = true)]
    pub point: Option<String>,

    /// GeoJSON file with the area of interest
    #[arg(long)]
    pub aoi: Option<PathBuf>,
}

impl SceneFilters {
    pub fn apply(&self, catalog: Catalog) -> Result<Catalog> {
        let mut result = catalog;

        if let Some(day) = &self.day {
            result = result.search_by_day(day)?;
        }

        if let Some(month) = &self.month {
            let (year, month) = parse_year_month(month)?;
            result = result.search_by_year_month(year, month)?;
        }

        if let (Some(start), Some(end)) = (&self.start, &self.end) {
            result = result.search_by_period(start, end)?;
        }

        if let Some(point) = &self.point {
            let (x, y) = parse_point(point)?;
            result = result.search_by_point(x, y)?;
        }

        if let Some(path) = &self.aoi {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read AOI from {:?}", path))?;
            let aoi = AoiQuery::from_geojson_str(&content)
                .with_context(|| format!("Invalid AOI in {:?}", path))?;
            result = result.search_by_intersect(&aoi)?;
        }

        info!(scenes = result.len(), "Selected scenes");
        Ok(result)
    }
}

fn parse_year_month(s: &str) -> Result<(i32, u32)> {
    let (year, month) = s
        .split_once('-')
        .with_context(|| format!("Invalid month '{}', expected YYYY-MM", s))?;
    let year = year.parse().with_context(|| format!("Invalid year in '{}'", s))?;
    let month: u32 = month.parse().with_context(|| format!("Invalid month in '{}'", s))?;
    anyhow::ensure!((1..=12).contains(&month), "Month out of range in '{}'", s);
    Ok((year, month))
}

fn parse_point(s: &str) -> Result<(f64, f64)> {
    let (x, y) = s
        .split_once(',')
        .with_context(|| format!("Invalid point '{}', expected x,y", s))?;
    Ok((
        x.trim().parse().with_context(|| format!("Invalid x in '{}'", s))?,
        y.trim().parse().with_context(|| format!("Invalid y in '{}'", s))?,
    ))
}
