//! Common test utilities for composite tests
//!
//! Provides helpers for:
//! - Building catalog scenes that follow the VIIRS naming scheme
//! - Loading synthetic radiance/flag bands into a MemoryStore
#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use catalog::Scene;
use chrono::{DateTime, Duration, TimeZone, Utc};
use composite::{Accumulator, MemoryStore, QualityFlagSet, ViirsLocator};
use ntl_common::BoundingBox;
use test_utils::{radiance_name, GeoTiffFixture, GOOD_FLAGS};

/// First acquisition day used by the tests.
pub fn d0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2014, 1, 1, 1, 30, 0).unwrap()
}

/// Scene acquired `days` after [`d0`], with granule number `granule`.
pub fn scene_at(days: i64, granule: u32) -> Scene {
    let datetime = d0() + Duration::days(days);
    let day = datetime.format("%Y%m%d").to_string();
    let href = radiance_name(&day, granule);
    Scene::new(
        href.clone(),
        href,
        BoundingBox::new(0.0, 0.0, 2.0, 2.0),
        datetime,
    )
}

/// Flag href the VIIRS locator derives for `scene`.
pub fn flag_href(scene: &Scene) -> String {
    ViirsLocator::flag_href(&scene.href).unwrap()
}

/// Store both bands of `scene` on `fixture`'s grid.
pub fn put_scene(
    store: &MemoryStore,
    scene: &Scene,
    fixture: &GeoTiffFixture,
    radiance: &[f32],
    flags: &[u32],
) {
    store.insert(scene.href.clone(), Bytes::from(fixture.encode_f32(radiance)));
    store.insert(flag_href(scene), Bytes::from(fixture.encode_u32(flags)));
}

/// Quality table holding the fixture good codes.
pub fn quality() -> Arc<QualityFlagSet> {
    Arc::new(QualityFlagSet::new(GOOD_FLAGS.iter().map(|&c| c as i64)).unwrap())
}

pub fn accumulator(store: Arc<MemoryStore>) -> Accumulator {
    Accumulator::new(store, quality())
}

/// Bounds covering the pixel centers of a 2x2 unit grid exactly.
pub fn unit_2x2_bounds() -> BoundingBox {
    BoundingBox::new(0.5, 0.5, 1.5, 1.5)
}
