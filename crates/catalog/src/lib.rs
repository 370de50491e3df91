//! Scene catalog for VIIRS nighttime-lights imagery.
//!
//! Provides:
//! - CSV catalog loading and persistence
//! - Search by day, month, period, point and area of interest
//! - AWS S3 bucket listing for discovering raw scene files
//! - STAC item construction for newly discovered scenes

pub mod catalog;
pub mod error;
pub mod s3;
pub mod scene;
pub mod stac;

pub use catalog::Catalog;
pub use error::{CatalogError, Result};
pub use s3::{anonymous_client, search_aws, ListPage, ObjectLister, S3ObjectInfo};
pub use scene::Scene;
pub use stac::{acquisition_date, SceneFiles, StacAsset, StacItem, GLOBAL_NIGHTLIGHT_URL};
