//! Subcommand implementations.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

use catalog::{anonymous_client, search_aws, Catalog, Scene, SceneFiles};
use composite::{
    rolling_composite_for_scenes, write_composite, Accumulator, CancellationToken,
    CompositeConfig, QualityFlagSet, RoutingStore, SourceFailurePolicy,
};
use ntl_common::time::compact_date;
use ntl_common::BoundingBox;

use crate::config::NtlConfig;
use crate::filters::SceneFilters;

// ============================================================================
// search
// ============================================================================

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Scene catalog CSV
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    #[command(flatten)]
    pub filters: SceneFilters,

    /// Write the matches to this CSV instead of printing them
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn search(config: &NtlConfig, args: &SearchArgs) -> Result<()> {
    let catalog = load_catalog(config, args.catalog.as_deref(), &args.filters)?;

    match &args.output {
        Some(path) => {
            catalog.write_csv(path)?;
            info!(path = %path.display(), scenes = catalog.len(), "Wrote search results");
        }
        None => {
            for scene in catalog.iter() {
                println!("{}\t{}\t{}", scene.id, scene.datetime.to_rfc3339(), scene.href);
            }
        }
    }
    Ok(())
}

// ============================================================================
// composite / rolling
// ============================================================================

#[derive(Args, Debug)]
pub struct CompositeArgs {
    /// Scene catalog CSV
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    #[command(flatten)]
    pub filters: SceneFilters,

    /// Area to composite ("minx,miny,maxx,maxy")
    #[arg(long, allow_hyphen_values = true)]
    pub bbox: BoundingBox,

    /// Output file stem (default: composite_<first>_<last>)
    #[arg(long)]
    pub name: Option<String>,

    /// Output directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Quality flag table
    #[arg(long)]
    pub quality_flags: Option<PathBuf>,

    /// Directory relative scene hrefs are resolved against
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// Scenes read concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// What to do when a scene cannot be read (abort, skip)
    #[arg(long)]
    pub failure_policy: Option<SourceFailurePolicy>,
}

impl CompositeArgs {
    /// Layer these flags over the configured composite settings.
    fn composite_config(&self, config: &NtlConfig) -> Result<CompositeConfig> {
        let mut composite = config.composite.clone();
        if let Some(dir) = &self.output_dir {
            composite.output_dir = dir.clone();
        }
        if let Some(path) = &self.quality_flags {
            composite.quality_flags_path = path.clone();
        }
        if let Some(root) = &self.data_root {
            composite.data_root = Some(root.clone());
        }
        if let Some(n) = self.concurrency {
            composite.concurrency = n;
        }
        if let Some(policy) = self.failure_policy {
            composite.failure_policy = policy;
        }
        composite.validate().map_err(anyhow::Error::msg)?;
        Ok(composite)
    }

    fn stem(&self, scenes: &[Scene]) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let first = scenes.iter().map(|s| s.datetime).min();
        let last = scenes.iter().map(|s| s.datetime).max();
        match (first, last) {
            (Some(first), Some(last)) => {
                format!("composite_{}_{}", compact_date(&first), compact_date(&last))
            }
            _ => "composite".to_string(),
        }
    }
}

#[derive(Args, Debug)]
pub struct RollingArgs {
    #[command(flatten)]
    pub composite: CompositeArgs,

    /// Days between window starts
    #[arg(long, default_value = "7")]
    pub stride_days: i64,

    /// Window width in days
    #[arg(long, default_value = "28")]
    pub width_days: i64,
}

/// Everything a composite run needs, resolved from config and flags.
struct CompositeRun {
    catalog: Catalog,
    accumulator: Accumulator,
    config: CompositeConfig,
}

fn prepare(config: &NtlConfig, args: &CompositeArgs) -> Result<CompositeRun> {
    anyhow::ensure!(args.bbox.is_valid(), "Invalid bbox {}", args.bbox);

    let composite = args.composite_config(config)?;
    let catalog = load_catalog(config, args.catalog.as_deref(), &args.filters)?;

    let quality = QualityFlagSet::from_path(&composite.quality_flags_path).with_context(|| {
        format!(
            "Failed to load quality flags from {:?}",
            composite.quality_flags_path
        )
    })?;
    let store = RoutingStore::from_config(&composite)?;
    let accumulator = Accumulator::from_config(&composite, Arc::new(store), Arc::new(quality));

    Ok(CompositeRun {
        catalog,
        accumulator,
        config: composite,
    })
}

#[instrument(skip_all, fields(bbox = %args.bbox))]
pub async fn composite(
    config: &NtlConfig,
    args: &CompositeArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let run = prepare(config, args)?;

    let output = run
        .accumulator
        .accumulate_with_cancel(run.catalog.scenes(), &args.bbox, false, cancel)
        .await?;

    let paths = write_composite(
        &run.config.output_dir,
        &args.stem(run.catalog.scenes()),
        &output.composite.average(),
        &output.composite.valid_count,
        &args.bbox,
    )?;

    info!(
        scenes = output.accumulated.len(),
        skipped = output.skipped.len(),
        radiance = %paths.radiance.display(),
        count = %paths.count.display(),
        "Composite complete"
    );
    Ok(())
}

#[instrument(skip_all, fields(bbox = %args.composite.bbox, stride = args.stride_days, width = args.width_days))]
pub async fn rolling(
    config: &NtlConfig,
    args: &RollingArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let run = prepare(config, &args.composite)?;
    let bbox = args.composite.bbox;

    let output = run
        .accumulator
        .accumulate_with_cancel(run.catalog.scenes(), &bbox, true, cancel)
        .await?;
    let per_scene = output.per_scene.unwrap_or_default();

    // Skipped scenes have no retained arrays.
    let accumulated: HashSet<&str> = output.accumulated.iter().map(String::as_str).collect();
    let scenes: Vec<Scene> = run
        .catalog
        .iter()
        .filter(|s| accumulated.contains(s.id.as_str()))
        .cloned()
        .collect();

    let stem = args.composite.stem(&scenes);
    let mut written = 0usize;
    for window in rolling_composite_for_scenes(&per_scene, &scenes, args.stride_days, args.width_days)? {
        if cancel.is_cancelled() {
            anyhow::bail!("Cancelled after {} windows", written);
        }
        let window = window?;
        if window.scene_ids.is_empty() {
            warn!(window = %window.label, "Window has no scenes");
        }
        write_composite(
            &run.config.output_dir,
            &format!("{}_{}", stem, window.label),
            &window.radiance_average,
            &window.valid_count,
            &bbox,
        )?;
        written += 1;
    }

    info!(windows = written, scenes = scenes.len(), "Rolling composite complete");
    Ok(())
}

// ============================================================================
// list-s3
// ============================================================================

#[derive(Args, Debug)]
pub struct ListS3Args {
    /// Key prefix, e.g. "201401/"
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Key suffix filter, e.g. ".rade9.co.tif"
    #[arg(long, default_value = "")]
    pub suffix: String,

    /// Bucket (default from config)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Region (default from config)
    #[arg(long)]
    pub region: Option<String>,
}

pub async fn list_s3(config: &NtlConfig, args: &ListS3Args) -> Result<()> {
    let bucket = args.bucket.as_deref().unwrap_or(&config.s3.bucket);
    let region = args.region.as_deref().unwrap_or(&config.s3.region);

    let client = anonymous_client(region).await;
    let objects = search_aws(&client, bucket, &args.suffix, &args.prefix).await?;

    for object in &objects {
        println!("{}\t{}", object.key, object.size);
    }
    Ok(())
}

// ============================================================================
// stac
// ============================================================================

#[derive(Args, Debug)]
pub struct StacArgs {
    /// Directory holding the granule files
    pub dir: PathBuf,

    /// Base URL for asset hrefs (default from config)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Directory item JSON is written to (default: next to the files)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Also write the scenes as a catalog CSV
    #[arg(long)]
    pub catalog_out: Option<PathBuf>,
}

#[instrument(skip_all, fields(dir = %args.dir.display()))]
pub fn stac(config: &NtlConfig, args: &StacArgs) -> Result<()> {
    let base_url = args.base_url.as_deref().unwrap_or(&config.stac.base_url);
    let out_dir = args.out_dir.as_deref().unwrap_or(&args.dir);

    let mut scenes = Vec::new();
    for ((prefix, granule), files) in group_granules(&args.dir)? {
        let Some(radiance) = files.iter().find(|f| f.starts_with("SVDNB")) else {
            warn!(granule = %granule, "No radiance file, skipping granule");
            continue;
        };

        let path = args.dir.join(&prefix).join(radiance);
        let bytes =
            std::fs::read(&path).with_context(|| format!("Failed to read {:?}", path))?;
        let bounds = composite::read_bounds(&bytes)
            .with_context(|| format!("Failed to read bounds of {:?}", path))?;

        let scene_files = SceneFiles::from_filenames(&files, &prefix, base_url, bounds)?;

        let item_dir = out_dir.join(&prefix);
        std::fs::create_dir_all(&item_dir)?;
        let item_path = item_dir.join(radiance.replace(".tif", ".json"));
        scene_files.to_stac_item().write_json(&item_path)?;

        info!(item = %item_path.display(), assets = files.len(), "Wrote STAC item");
        scenes.push(scene_files.to_scene());
    }

    if let Some(path) = &args.catalog_out {
        let catalog = Catalog::new(scenes);
        catalog.write_csv(path)?;
        info!(path = %path.display(), scenes = catalog.len(), "Wrote catalog");
    }
    Ok(())
}

/// GeoTIFFs under `root`, grouped by (relative directory, granule stem).
fn group_granules(root: &Path) -> Result<BTreeMap<(String, String), Vec<String>>> {
    let mut groups: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !name.ends_with(".tif") {
            continue;
        }
        let Some(granule) = granule_stem(name) else {
            continue;
        };

        let prefix = entry
            .path()
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default();

        groups
            .entry((prefix, granule))
            .or_default()
            .push(name.to_string());
    }

    Ok(groups)
}

/// `npp_dYYYYMMDD_tHHMMSSS_eHHMMSSS_bNNNNN` from any file of a granule.
fn granule_stem(name: &str) -> Option<String> {
    let base = name.split('.').next()?;
    let base = base.strip_prefix("SVDNB_").unwrap_or(base);
    let tokens: Vec<&str> = base.split('_').take(5).collect();
    if tokens.len() < 5 || tokens[0] != "npp" || !tokens[1].starts_with('d') {
        return None;
    }
    Some(tokens.join("_"))
}

fn load_catalog(
    config: &NtlConfig,
    flag: Option<&Path>,
    filters: &SceneFilters,
) -> Result<Catalog> {
    let path = config.catalog_path(flag)?;
    let catalog = Catalog::load(&path)
        .with_context(|| format!("Failed to load catalog from {:?}", path))?;
    info!(path = %path.display(), scenes = catalog.len(), "Loaded catalog");
    filters.apply(catalog)
}
