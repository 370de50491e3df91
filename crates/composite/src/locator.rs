//! Resolve a scene's companion radiance and quality-flag rasters.

use catalog::Scene;

use crate::error::{CompositeError, Result};

/// Hrefs of the two bands read for one scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSources {
    pub radiance_href: String,
    pub flag_href: String,
}

/// Finds the bands belonging to a scene.
pub trait SceneLocator: Send + Sync {
    fn locate(&self, scene: &Scene) -> Result<SceneSources>;
}

/// Locator for NOAA VIIRS DNB granules.
///
/// The scene href points at the radiance file; the flag file sits in the
/// same directory and shares the granule stem:
///
/// ```text
/// SVDNB_npp_d20140101_t0101010_e0102020_b11111_c20140101..._noaa_ops.rade9.co.tif
///       npp_d20140101_t0101010_e0102020_b11111.vflag.co.tif
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ViirsLocator;

const RADIANCE_PREFIX: &str = "SVDNB_";
const FLAG_SUFFIX: &str = ".vflag.co.tif";

impl ViirsLocator {
    /// Flag href paired with a radiance href.
    pub fn flag_href(radiance_href: &str) -> Result<String> {
        let (dir, name) = match radiance_href.rfind('/') {
            Some(i) => radiance_href.split_at(i + 1),
            None => ("", radiance_href),
        };

        let stem = name.strip_prefix(RADIANCE_PREFIX).ok_or_else(|| {
            CompositeError::source_unavailable(
                radiance_href,
                "not a VIIRS DNB radiance file name",
            )
        })?;

        // npp, dYYYYMMDD, tHHMMSSS, eHHMMSSS, bNNNNN
        let granule: Vec<&str> = stem.split('_').take(5).collect();
        if granule.len() < 5 || !granule[1].starts_with('d') || !granule[4].starts_with('b') {
            return Err(CompositeError::source_unavailable(
                radiance_href,
                "cannot derive granule stem from file name",
            ));
        }

        Ok(format!("{}{}{}", dir, granule.join("_"), FLAG_SUFFIX))
    }
}

impl SceneLocator for ViirsLocator {
    fn locate(&self, scene: &Scene) -> Result<SceneSources> {
        Ok(SceneSources {
            flag_href: Self::flag_href(&scene.href)?,
            radiance_href: scene.href.clone(),
        })
    }
}
