//! Quality-masked compositing of VIIRS nighttime-lights rasters.
//!
//! This crate combines per-scene radiance and quality-flag rasters into
//! composite mosaics:
//!
//! - **Quality mask**: keep only pixels whose flag code is in a fixed table
//! - **Windowed reads**: read any bounding box from a georeferenced raster,
//!   filling the parts outside its extent with 0
//! - **Accumulation**: pixel-wise running sum of masked radiance and count
//!   of valid observations, normalized to an average at the end
//! - **Rolling windows**: re-aggregate retained per-scene arrays into
//!   overlapping date windows
//!
//! # Architecture
//!
//! ```text
//! Catalog search (catalog crate)
//!      │
//!      ▼
//! Accumulator::accumulate(scenes, bbox)
//!      │
//!      ├─► SceneLocator: radiance href → flag href
//!      │
//!      ├─► RasterStore::fetch (local / HTTP with retry), `concurrency` in flight
//!      │
//!      ├─► decode + read_window(bbox) for both bands
//!      │
//!      ├─► QualityFlagSet::mask → masked radiance
//!      │
//!      └─► add into AccumulatedComposite, in scene order
//!               │
//!               ├─► average() ──► writer::write_composite (_rad / _cnt)
//!               │
//!               └─► rolling_composite(per-scene arrays) ──► one pair per window
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use composite::{Accumulator, LocalStore, QualityFlagSet};
//!
//! let quality = Arc::new(QualityFlagSet::from_path("config/quality_flags.txt")?);
//! let accumulator = Accumulator::new(Arc::new(LocalStore::default()), quality);
//!
//! let output = accumulator.accumulate(catalog.scenes(), &bbox, false).await?;
//! composite::write_composite(dir, "lagos_201401", &output.composite.average(),
//!     &output.composite.valid_count, &bbox)?;
//! ```

pub mod accumulator;
pub mod config;
pub mod error;
pub mod locator;
pub mod quality;
pub mod raster;
pub mod rolling;
pub mod store;
pub mod window;
pub mod writer;

// Re-export commonly used types at crate root
pub use accumulator::{
    AccumulatedComposite, Accumulator, CompositeOutput, PerSceneArrays, SceneArrays,
};
pub use config::{CompositeConfig, SourceFailurePolicy};
pub use error::{CompositeError, Result};
pub use locator::{SceneLocator, SceneSources, ViirsLocator};
pub use quality::QualityFlagSet;
pub use raster::{read_bounds, GeoRaster, GeoTransform};
pub use rolling::{rolling_composite, rolling_composite_for_scenes, RollingComposites, WindowComposite};
pub use store::{HttpStore, LocalStore, MemoryStore, RasterStore, RetryPolicy, RoutingStore};
pub use window::{read_pixel_window, read_window, PixelWindow, MAX_WINDOW_PIXELS};
pub use writer::{write_composite, CompositePaths};
pub use tokio_util::sync::CancellationToken;
