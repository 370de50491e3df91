//! Accumulation over synthetic scenes served from memory.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::*;
use composite::{
    read_window, Accumulator, CancellationToken, CompositeError, MemoryStore, QualityFlagSet,
    SceneArrays, SourceFailurePolicy,
};
use ndarray::array;
use ntl_common::BoundingBox;
use test_utils::{
    assert_all_approx_eq, checkerboard_flags, constant_flags, constant_grid,
    create_city_lights_grid, GeoTiffFixture, BAD_FLAG, GOOD_FLAGS,
};

const GOOD: u32 = GOOD_FLAGS[0];

/// Three all-valid 2x2 scenes of radiance 1, 2 and 3.
fn three_scene_store() -> (Arc<MemoryStore>, Vec<catalog::Scene>) {
    let store = Arc::new(MemoryStore::new());
    let fixture = GeoTiffFixture::unit(2, 2);
    let scenes: Vec<_> = (0..3).map(|i| scene_at(i, 100 + i as u32)).collect();
    for (i, scene) in scenes.iter().enumerate() {
        put_scene(
            &store,
            scene,
            &fixture,
            &constant_grid(2, 2, (i + 1) as f32),
            &constant_flags(2, 2, GOOD),
        );
    }
    (store, scenes)
}

// ============================================================================
// Core accumulation
// ============================================================================

#[tokio::test]
async fn test_end_to_end_three_scenes() {
    let (store, scenes) = three_scene_store();

    let output = accumulator(store)
        .accumulate(&scenes, &unit_2x2_bounds(), false)
        .await
        .unwrap();

    assert_eq!(output.composite.radiance_sum, array![[6.0, 6.0], [6.0, 6.0]]);
    assert_eq!(output.composite.valid_count, array![[3, 3], [3, 3]]);
    assert_eq!(output.composite.average(), array![[2.0, 2.0], [2.0, 2.0]]);
    assert_eq!(output.accumulated.len(), 3);
    assert!(output.per_scene.is_none());
}

#[tokio::test]
async fn test_single_scene_equals_its_masked_arrays() {
    let store = Arc::new(MemoryStore::new());
    let fixture = GeoTiffFixture::unit(2, 2);
    let scene = scene_at(0, 1);
    put_scene(
        &store,
        &scene,
        &fixture,
        &[1.5, 2.5, 3.5, 4.5],
        &checkerboard_flags(2, 2, GOOD, BAD_FLAG),
    );

    let output = accumulator(store)
        .accumulate(std::slice::from_ref(&scene), &unit_2x2_bounds(), true)
        .await
        .unwrap();

    let retained = &output.per_scene.unwrap()[&scene.id];
    assert_eq!(output.composite.radiance_sum, retained.masked_radiance);
    assert_eq!(output.composite.valid_count, retained.mask);
    assert_eq!(retained.masked_radiance, array![[1.5, 0.0], [0.0, 4.5]]);
}

#[tokio::test]
async fn test_permutation_invariance() {
    let store = Arc::new(MemoryStore::new());
    let fixture = GeoTiffFixture::unit(2, 2);
    let scenes: Vec<_> = (0..3).map(|i| scene_at(i, 10 + i as u32)).collect();
    let values = [1.5f32, 2.25, 3.0];
    for (i, scene) in scenes.iter().enumerate() {
        let flags = if i == 1 {
            checkerboard_flags(2, 2, BAD_FLAG, GOOD)
        } else {
            constant_flags(2, 2, GOOD)
        };
        put_scene(&store, scene, &fixture, &constant_grid(2, 2, values[i]), &flags);
    }

    let acc = accumulator(store);
    let forward = acc.accumulate(&scenes, &unit_2x2_bounds(), false).await.unwrap();
    let shuffled = vec![scenes[2].clone(), scenes[0].clone(), scenes[1].clone()];
    let permuted = acc.accumulate(&shuffled, &unit_2x2_bounds(), false).await.unwrap();

    assert_eq!(forward.composite, permuted.composite);
    assert_eq!(forward.composite.valid_count, array![[2, 3], [3, 2]]);
}

#[tokio::test]
async fn test_concurrency_does_not_change_sums() {
    let store = Arc::new(MemoryStore::new());
    let fixture = GeoTiffFixture::unit(6, 6);
    let scenes: Vec<_> = (0..8).map(|i| scene_at(i, 200 + i as u32)).collect();
    for (i, scene) in scenes.iter().enumerate() {
        put_scene(
            &store,
            scene,
            &fixture,
            &create_city_lights_grid(6, 6, 10.0 + i as f32 * 0.37),
            &checkerboard_flags(6, 6, GOOD, if i % 3 == 0 { BAD_FLAG } else { GOOD }),
        );
    }
    let bounds = BoundingBox::new(0.5, 0.5, 5.5, 5.5);

    let serial = accumulator(store.clone())
        .with_concurrency(1)
        .accumulate(&scenes, &bounds, false)
        .await
        .unwrap();
    let parallel = accumulator(store)
        .with_concurrency(8)
        .accumulate(&scenes, &bounds, false)
        .await
        .unwrap();

    assert_eq!(serial.composite, parallel.composite);
    assert_eq!(serial.accumulated, parallel.accumulated);
}

#[tokio::test]
async fn test_never_valid_pixel_averages_to_nan() {
    let store = Arc::new(MemoryStore::new());
    let fixture = GeoTiffFixture::unit(2, 2);
    let scenes: Vec<_> = (0..2).map(|i| scene_at(i, 300 + i as u32)).collect();
    for scene in &scenes {
        put_scene(
            &store,
            scene,
            &fixture,
            &constant_grid(2, 2, 5.0),
            &[BAD_FLAG, GOOD, GOOD, GOOD],
        );
    }

    let output = accumulator(store)
        .accumulate(&scenes, &unit_2x2_bounds(), false)
        .await
        .unwrap();
    let avg = output.composite.average();

    assert_eq!(output.composite.valid_count[[0, 0]], 0);
    assert!(avg[[0, 0]].is_nan());
    assert_eq!(avg[[0, 1]], 5.0);
}

/// The quality table shipped in `config/`, which accepts flag code 0.
fn shipped_quality() -> Arc<QualityFlagSet> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/quality_flags.txt");
    Arc::new(QualityFlagSet::from_path(path).unwrap())
}

#[tokio::test]
async fn test_bounds_past_extent_are_not_observations() {
    let store = Arc::new(MemoryStore::new());
    let fixture = GeoTiffFixture::unit(2, 2);
    let scenes: Vec<_> = (0..2).map(|i| scene_at(i, 400 + i as u32)).collect();
    for scene in &scenes {
        put_scene(&store, scene, &fixture, &constant_grid(2, 2, 3.0), &constant_flags(2, 2, 2));
    }
    let quality = shipped_quality();
    assert!(quality.is_valid(0));
    let bounds = BoundingBox::new(0.5, 0.5, 2.5, 1.5);

    let output = Accumulator::new(store, quality)
        .accumulate(&scenes, &bounds, true)
        .await
        .unwrap();

    assert_eq!(output.composite.shape(), (2, 3));
    assert_eq!(output.composite.valid_count, array![[2, 2, 0], [2, 2, 0]]);
    assert_eq!(output.composite.radiance_sum.column(2).sum(), 0.0);
    let avg = output.composite.average();
    assert!(avg.column(2).iter().all(|v| v.is_nan()));
    assert_all_approx_eq!(avg.column(0), 3.0, 1e-6);

    for arrays in output.per_scene.unwrap().values() {
        assert_eq!(arrays.mask, array![[1, 1, 0], [1, 1, 0]]);
    }
}

#[tokio::test]
async fn test_bounds_outside_every_scene_are_nodata() {
    let (store, scenes) = three_scene_store();
    let bounds = BoundingBox::new(10.5, 10.5, 11.5, 11.5);

    let output = Accumulator::new(store, shipped_quality())
        .accumulate(&scenes, &bounds, false)
        .await
        .unwrap();

    assert!(output.composite.valid_count.iter().all(|&c| c == 0));
    assert!(output.composite.average().iter().all(|v| v.is_nan()));
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_empty_input() {
    let store = Arc::new(MemoryStore::new());
    let err = accumulator(store)
        .accumulate(&[], &unit_2x2_bounds(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, CompositeError::EmptyInput(_)));
}

#[tokio::test]
async fn test_missing_flag_file_aborts_by_default() {
    let (store, scenes) = three_scene_store();
    store.remove(&flag_href(&scenes[1]));

    let err = accumulator(store)
        .accumulate(&scenes, &unit_2x2_bounds(), false)
        .await
        .unwrap_err();
    match err {
        CompositeError::SourceUnavailable { href, .. } => assert_eq!(href, flag_href(&scenes[1])),
        other => panic!("expected SourceUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_skip_policy_continues() {
    let (store, scenes) = three_scene_store();
    store.remove(&scenes[1].href);

    let output = accumulator(store)
        .with_failure_policy(SourceFailurePolicy::Skip)
        .accumulate(&scenes, &unit_2x2_bounds(), true)
        .await
        .unwrap();

    assert_eq!(output.skipped, vec![scenes[1].id.clone()]);
    assert_eq!(output.accumulated, vec![scenes[0].id.clone(), scenes[2].id.clone()]);
    assert_eq!(output.composite.radiance_sum, array![[4.0, 4.0], [4.0, 4.0]]);
    assert_eq!(output.per_scene.unwrap().len(), 2);
}

#[tokio::test]
async fn test_skip_policy_all_skipped_is_empty_input() {
    let store = Arc::new(MemoryStore::new());
    let scenes = vec![scene_at(0, 1), scene_at(1, 2)];

    let err = accumulator(store)
        .with_failure_policy(SourceFailurePolicy::Skip)
        .accumulate(&scenes, &unit_2x2_bounds(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, CompositeError::EmptyInput(_)));
}

#[tokio::test]
async fn test_undecodable_raster_is_source_unavailable() {
    let (store, scenes) = three_scene_store();
    store.insert(scenes[0].href.clone(), bytes::Bytes::from_static(b"not a tiff"));

    let err = accumulator(store)
        .accumulate(&scenes, &unit_2x2_bounds(), false)
        .await
        .unwrap_err();
    assert!(err.is_source_failure());
}

#[tokio::test]
async fn test_different_grids_are_shape_mismatch() {
    let store = Arc::new(MemoryStore::new());
    let a = scene_at(0, 1);
    let b = scene_at(1, 2);
    put_scene(&store, &a, &GeoTiffFixture::unit(2, 2), &[1.0; 4], &[GOOD; 4]);
    let fine = GeoTiffFixture::new(4, 4, 0.0, 2.0, 0.5);
    put_scene(&store, &b, &fine, &[1.0; 16], &[GOOD; 16]);

    // Shape errors are not source failures, so Skip does not hide them.
    let err = accumulator(store)
        .with_failure_policy(SourceFailurePolicy::Skip)
        .accumulate(&[a, b], &unit_2x2_bounds(), false)
        .await
        .unwrap_err();
    match err {
        CompositeError::ShapeMismatch { expected, found } => {
            assert_eq!(expected, (2, 2));
            assert_eq!(found, (3, 3));
        }
        other => panic!("expected ShapeMismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_duplicate_scene_ids_rejected() {
    let (store, mut scenes) = three_scene_store();
    scenes.push(scenes[1].clone());

    let err = accumulator(store)
        .accumulate(&scenes, &unit_2x2_bounds(), true)
        .await
        .unwrap_err();
    match err {
        CompositeError::DuplicateScene(id) => assert_eq!(id, scenes[1].id),
        other => panic!("expected DuplicateScene, got {:?}", other),
    }
}

#[tokio::test]
async fn test_infinite_bounds_rejected_before_reading() {
    let (store, scenes) = three_scene_store();
    let bounds = BoundingBox::new(
        f64::NEG_INFINITY,
        f64::NEG_INFINITY,
        f64::INFINITY,
        f64::INFINITY,
    );

    let err = accumulator(store)
        .accumulate(&scenes, &bounds, false)
        .await
        .unwrap_err();
    assert!(matches!(err, CompositeError::InvalidBounds(_)));
}

#[test]
fn test_oversized_window_is_an_error() {
    let fixture = GeoTiffFixture::new(2, 2, 0.0, 0.0, 1e-9);
    let radiance = composite::raster::decode::<f32>(&fixture.encode_f32(&[1.0; 4])).unwrap();
    let bounds = BoundingBox::new(-1.0e300, -1.0e300, 1.0e300, 1.0e300);

    let err = read_window(&radiance, &bounds).unwrap_err();
    assert!(matches!(err, CompositeError::InvalidBounds(_)));
}

#[tokio::test]
async fn test_cancelled_token_stops_accumulation() {
    let (store, scenes) = three_scene_store();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = accumulator(store)
        .accumulate_with_cancel(&scenes, &unit_2x2_bounds(), false, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, CompositeError::Cancelled));
}

// ============================================================================
// Window shape
// ============================================================================

#[test]
fn test_bands_on_same_grid_share_window_shape() {
    let fixture = GeoTiffFixture::new(5, 4, 10.0, 20.0, 0.25);
    let radiance = composite::raster::decode::<f32>(&fixture.encode_f32(&[1.0; 20])).unwrap();
    let flags = composite::raster::decode::<i64>(&fixture.encode_u32(&[GOOD; 20])).unwrap();

    for bounds in [
        BoundingBox::new(10.1, 19.1, 10.9, 19.9),
        BoundingBox::new(9.0, 18.0, 12.0, 21.0),
        BoundingBox::new(30.0, 30.0, 31.0, 31.0),
    ] {
        let r = read_window(&radiance, &bounds).unwrap();
        let f = read_window(&flags, &bounds).unwrap();
        assert_eq!(r.dim(), f.dim());

        let quality = quality();
        let arrays = SceneArrays::from_bands(&r, &f, &quality).unwrap();
        assert_eq!(arrays.shape(), r.dim());
    }
}
