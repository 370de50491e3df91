//! Rolling time-window composites over retained per-scene arrays.
//!
//! Windows start at the earliest scene timestamp and advance by a fixed
//! stride while keeping a fixed width. A window is produced only while its
//! end lies strictly before the latest timestamp, and selects the scenes
//! strictly inside it.

use chrono::{DateTime, TimeDelta, Utc};
use ndarray::Array2;
use tracing::debug;

use catalog::Scene;
use ntl_common::TimeWindow;

use crate::accumulator::{average, PerSceneArrays};
use crate::error::{CompositeError, Result};

/// One rolling-window output.
#[derive(Debug, Clone)]
pub struct WindowComposite {
    pub window: TimeWindow,
    /// `YYYYMMDD_YYYYMMDD`.
    pub label: String,
    pub radiance_average: Array2<f32>,
    pub valid_count: Array2<u32>,
    /// Scenes selected for this window, chronological.
    pub scene_ids: Vec<String>,
}

/// Lazy iterator of [`WindowComposite`]s.
///
/// Yields an error and stops if a selected scene has no retained arrays or
/// the retained arrays disagree in shape.
#[derive(Debug)]
pub struct RollingComposites<'a> {
    per_scene: &'a PerSceneArrays,
    dates: Vec<(String, DateTime<Utc>)>,
    window: TimeWindow,
    max_date: DateTime<Utc>,
    stride_days: i64,
    shape: (usize, usize),
    finished: bool,
}

/// Build the rolling-window iterator.
///
/// `scene_dates` pairs scene ids with acquisition timestamps; every id that
/// falls inside a window must have retained arrays in `per_scene`.
pub fn rolling_composite<'a, I>(
    per_scene: &'a PerSceneArrays,
    scene_dates: I,
    stride_days: i64,
    width_days: i64,
) -> Result<RollingComposites<'a>>
where
    I: IntoIterator<Item = (String, DateTime<Utc>)>,
{
    if stride_days < 1 {
        return Err(CompositeError::invalid_config("stride_days must be >= 1"));
    }
    if width_days < 1 {
        return Err(CompositeError::invalid_config("width_days must be >= 1"));
    }
    if TimeDelta::try_days(stride_days).is_none() {
        return Err(CompositeError::invalid_config(format!(
            "stride_days {} is out of range",
            stride_days
        )));
    }

    let mut dates: Vec<(String, DateTime<Utc>)> = scene_dates.into_iter().collect();
    dates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    let (min_date, max_date) = match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => (first.1, last.1),
        _ => {
            return Err(CompositeError::EmptyInput(
                "no scene dates for rolling composite".to_string(),
            ))
        }
    };

    let window = TimeWindow::starting_at(min_date, width_days).ok_or_else(|| {
        CompositeError::invalid_config(format!(
            "width_days {} runs past the last representable date",
            width_days
        ))
    })?;

    let shape = match per_scene.values().next() {
        Some(arrays) => arrays.shape(),
        None => return Err(CompositeError::MissingSceneArrays(dates[0].0.clone())),
    };

    Ok(RollingComposites {
        per_scene,
        dates,
        window,
        max_date,
        stride_days,
        shape,
        finished: false,
    })
}

/// [`rolling_composite`] keyed by the catalog scenes' ids and timestamps.
pub fn rolling_composite_for_scenes<'a>(
    per_scene: &'a PerSceneArrays,
    scenes: &[Scene],
    stride_days: i64,
    width_days: i64,
) -> Result<RollingComposites<'a>> {
    rolling_composite(
        per_scene,
        scenes.iter().map(|s| (s.id.clone(), s.datetime)),
        stride_days,
        width_days,
    )
}

impl RollingComposites<'_> {
    fn compose(&self, window: TimeWindow) -> Result<WindowComposite> {
        let mut sum = Array2::<f32>::zeros(self.shape);
        let mut count = Array2::<u32>::zeros(self.shape);
        let mut scene_ids = Vec::new();

        for (id, _) in self.dates.iter().filter(|(_, ts)| window.contains(ts)) {
            let arrays = self
                .per_scene
                .get(id)
                .ok_or_else(|| CompositeError::MissingSceneArrays(id.clone()))?;
            CompositeError::check_shape(self.shape, arrays.shape())?;
            sum += &arrays.masked_radiance;
            count += &arrays.mask;
            scene_ids.push(id.clone());
        }

        debug!(window = %window.label(), scenes = scene_ids.len(), "Composed rolling window");

        Ok(WindowComposite {
            label: window.label(),
            radiance_average: average(&sum, &count),
            valid_count: count,
            window,
            scene_ids,
        })
    }
}

impl Iterator for RollingComposites<'_> {
    type Item = Result<WindowComposite>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.window.end >= self.max_date {
            self.finished = true;
            return None;
        }

        let window = self.window;
        match window.advance(self.stride_days) {
            Some(next) => self.window = next,
            None => self.finished = true,
        }

        let result = self.compose(window);
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}
