//! Quality-masked accumulation of radiance across scenes.
//!
//! Each scene contributes its masked radiance to a running sum and its
//! validity mask to a running count. Scenes are fetched and decoded
//! concurrently, but always reduced in input order so the floating-point
//! sums do not depend on the concurrency setting.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use ndarray::{Array2, Zip};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use catalog::Scene;
use ntl_common::BoundingBox;

use crate::config::{CompositeConfig, SourceFailurePolicy};
use crate::error::{CompositeError, Result};
use crate::locator::{SceneLocator, SceneSources, ViirsLocator};
use crate::quality::QualityFlagSet;
use crate::raster;
use crate::store::RasterStore;
use crate::window::{read_pixel_window, PixelWindow};

/// Running per-pixel radiance sum and valid-observation count.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatedComposite {
    pub radiance_sum: Array2<f32>,
    pub valid_count: Array2<u32>,
}

impl AccumulatedComposite {
    pub fn zeros(shape: (usize, usize)) -> Self {
        Self {
            radiance_sum: Array2::zeros(shape),
            valid_count: Array2::zeros(shape),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.radiance_sum.dim()
    }

    /// Add one scene's masked radiance and mask element-wise.
    pub fn add(&mut self, scene: &SceneArrays) -> Result<()> {
        CompositeError::check_shape(self.shape(), scene.shape())?;
        CompositeError::check_shape(self.shape(), scene.mask.dim())?;
        self.radiance_sum += &scene.masked_radiance;
        self.valid_count += &scene.mask;
        Ok(())
    }

    /// `radiance_sum / valid_count`, NaN where nothing was observed.
    pub fn average(&self) -> Array2<f32> {
        average(&self.radiance_sum, &self.valid_count)
    }
}

/// Element-wise `sum / count` with NaN where `count == 0`.
pub fn average(sum: &Array2<f32>, count: &Array2<u32>) -> Array2<f32> {
    Zip::from(sum)
        .and(count)
        .map_collect(|&s, &c| if c == 0 { f32::NAN } else { s / c as f32 })
}

/// One scene's masked radiance and 0/1 validity mask over the window.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneArrays {
    pub masked_radiance: Array2<f32>,
    pub mask: Array2<u32>,
}

impl SceneArrays {
    /// Apply the quality mask to a radiance/flag pair read over the same
    /// window. Invalid pixels contribute exactly 0.
    pub fn from_bands(
        radiance: &Array2<f32>,
        flags: &Array2<i64>,
        quality: &QualityFlagSet,
    ) -> Result<Self> {
        CompositeError::check_shape(radiance.dim(), flags.dim())?;
        let mask = quality.mask(flags);
        let masked_radiance = Zip::from(radiance)
            .and(&mask)
            .map_collect(|&r, &m| if m == 1 { r } else { 0.0 });
        Ok(Self {
            masked_radiance,
            mask,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.masked_radiance.dim()
    }

    /// Mark pixels outside `covered` invalid, whatever their flag said.
    pub fn restrict_to(&mut self, covered: &Array2<bool>) -> Result<()> {
        CompositeError::check_shape(self.shape(), covered.dim())?;
        Zip::from(&mut self.masked_radiance)
            .and(&mut self.mask)
            .and(covered)
            .for_each(|r, m, &inside| {
                if !inside {
                    *r = 0.0;
                    *m = 0;
                }
            });
        Ok(())
    }
}

/// Retained per-scene arrays keyed by scene id.
pub type PerSceneArrays = BTreeMap<String, SceneArrays>;

/// Result of an accumulation run.
#[derive(Debug, Clone)]
pub struct CompositeOutput {
    pub composite: AccumulatedComposite,
    /// Present when retention was requested.
    pub per_scene: Option<PerSceneArrays>,
    /// Ids of scenes that contributed, in input order.
    pub accumulated: Vec<String>,
    /// Ids of scenes passed over under [`SourceFailurePolicy::Skip`].
    pub skipped: Vec<String>,
}

/// Accumulates quality-masked radiance over a bounding box.
#[derive(Clone)]
pub struct Accumulator {
    store: Arc<dyn RasterStore>,
    locator: Arc<dyn SceneLocator>,
    quality: Arc<QualityFlagSet>,
    concurrency: usize,
    failure_policy: SourceFailurePolicy,
}

impl Accumulator {
    /// Accumulator over VIIRS granules with default settings.
    pub fn new(store: Arc<dyn RasterStore>, quality: Arc<QualityFlagSet>) -> Self {
        Self {
            store,
            locator: Arc::new(ViirsLocator),
            quality,
            concurrency: 1,
            failure_policy: SourceFailurePolicy::Abort,
        }
    }

    pub fn from_config(
        config: &CompositeConfig,
        store: Arc<dyn RasterStore>,
        quality: Arc<QualityFlagSet>,
    ) -> Self {
        Self::new(store, quality)
            .with_concurrency(config.concurrency)
            .with_failure_policy(config.failure_policy)
    }

    pub fn with_locator(mut self, locator: Arc<dyn SceneLocator>) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_failure_policy(mut self, policy: SourceFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Accumulate `scenes` over `bounds`.
    pub async fn accumulate(
        &self,
        scenes: &[Scene],
        bounds: &BoundingBox,
        retain_per_scene: bool,
    ) -> Result<CompositeOutput> {
        self.accumulate_with_cancel(scenes, bounds, retain_per_scene, &CancellationToken::new())
            .await
    }

    /// Accumulate `scenes` over `bounds`, stopping with
    /// [`CompositeError::Cancelled`] once `cancel` fires.
    #[instrument(skip_all, fields(scenes = scenes.len(), bounds = %bounds, concurrency = self.concurrency))]
    pub async fn accumulate_with_cancel(
        &self,
        scenes: &[Scene],
        bounds: &BoundingBox,
        retain_per_scene: bool,
        cancel: &CancellationToken,
    ) -> Result<CompositeOutput> {
        if scenes.is_empty() {
            return Err(CompositeError::EmptyInput("no scenes to accumulate".to_string()));
        }
        if !bounds.is_valid() {
            return Err(CompositeError::invalid_bounds(format!(
                "{} is not a finite min/max box",
                bounds
            )));
        }
        let mut seen = HashSet::with_capacity(scenes.len());
        if let Some(dup) = scenes.iter().find(|s| !seen.insert(s.id.as_str())) {
            return Err(CompositeError::DuplicateScene(dup.id.clone()));
        }

        let total = scenes.len();
        let reads = stream::iter(scenes)
            .map(|scene| async move { (scene, self.read_scene(scene, bounds).await) })
            .buffered(self.concurrency);
        tokio::pin!(reads);

        let mut composite: Option<AccumulatedComposite> = None;
        let mut per_scene = PerSceneArrays::new();
        let mut accumulated = Vec::with_capacity(total);
        let mut skipped = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(done = accumulated.len(), total, "Accumulation cancelled");
                    return Err(CompositeError::Cancelled);
                }
                next = reads.next() => next,
            };

            let Some((scene, result)) = next else {
                break;
            };

            let arrays = match result {
                Ok(arrays) => arrays,
                Err(e) if e.is_source_failure() && self.failure_policy == SourceFailurePolicy::Skip => {
                    warn!(scene = %scene.id, error = %e, "Skipping unreadable scene");
                    skipped.push(scene.id.clone());
                    continue;
                }
                Err(e) => return Err(e),
            };

            composite
                .get_or_insert_with(|| AccumulatedComposite::zeros(arrays.shape()))
                .add(&arrays)?;
            accumulated.push(scene.id.clone());

            info!(
                scene = %scene.id,
                index = accumulated.len() + skipped.len(),
                total,
                "Accumulated scene"
            );

            if retain_per_scene {
                per_scene.insert(scene.id.clone(), arrays);
            }
        }

        let composite = composite.ok_or_else(|| {
            CompositeError::EmptyInput(format!("all {} scenes were skipped", total))
        })?;

        info!(
            accumulated = accumulated.len(),
            skipped = skipped.len(),
            shape = ?composite.shape(),
            "Accumulation complete"
        );

        Ok(CompositeOutput {
            composite,
            per_scene: retain_per_scene.then_some(per_scene),
            accumulated,
            skipped,
        })
    }

    /// Fetch both bands of a scene and apply the quality mask.
    async fn read_scene(&self, scene: &Scene, bounds: &BoundingBox) -> Result<SceneArrays> {
        let sources = self.locator.locate(scene)?;
        debug!(scene = %scene.id, radiance = %sources.radiance_href, flags = %sources.flag_href, "Reading scene");

        let (radiance_bytes, flag_bytes) = futures::try_join!(
            self.store.fetch(&sources.radiance_href),
            self.store.fetch(&sources.flag_href)
        )?;

        let quality = Arc::clone(&self.quality);
        let bounds = *bounds;
        tokio::task::spawn_blocking(move || {
            decode_scene(&sources, &radiance_bytes, &flag_bytes, &bounds, &quality)
        })
        .await
        .map_err(|e| CompositeError::decode(format!("decode task failed: {}", e)))?
    }
}

fn decode_scene(
    sources: &SceneSources,
    radiance_bytes: &[u8],
    flag_bytes: &[u8],
    bounds: &BoundingBox,
    quality: &QualityFlagSet,
) -> Result<SceneArrays> {
    let radiance = raster::decode::<f32>(radiance_bytes)
        .map_err(|e| CompositeError::source_unavailable(&sources.radiance_href, e))?;
    let flags = raster::decode::<i64>(flag_bytes)
        .map_err(|e| CompositeError::source_unavailable(&sources.flag_href, e))?;

    let radiance_window = PixelWindow::from_bounds(bounds, &radiance.transform)?;
    let flag_window = PixelWindow::from_bounds(bounds, &flags.transform)?;

    // Pixels past either band's extent read as fill and are never observations.
    let mut arrays = SceneArrays::from_bands(
        &read_pixel_window(&radiance.data, &radiance_window),
        &read_pixel_window(&flags.data, &flag_window),
        quality,
    )?;
    arrays.restrict_to(&radiance_window.coverage(radiance.rows(), radiance.cols()))?;
    arrays.restrict_to(&flag_window.coverage(flags.rows(), flags.cols()))?;
    Ok(arrays)
}
