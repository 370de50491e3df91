//! Rolling windows and the full read → accumulate → write pipeline.

mod common;

use std::sync::Arc;

use common::*;
use composite::{
    raster, read_bounds, rolling_composite_for_scenes, write_composite, Accumulator,
    CompositeError, LocalStore, MemoryStore,
};
use ndarray::array;
use test_utils::{constant_flags, constant_grid, write_fixture, GeoTiffFixture, GOOD_FLAGS};

const GOOD: u32 = GOOD_FLAGS[0];

/// All-valid 2x2 scenes at the given day offsets, scene `i` with radiance `i + 1`.
fn scenes_at(store: &MemoryStore, days: &[i64]) -> Vec<catalog::Scene> {
    let fixture = GeoTiffFixture::unit(2, 2);
    days.iter()
        .enumerate()
        .map(|(i, &day)| {
            let scene = scene_at(day, 500 + i as u32);
            put_scene(
                store,
                &scene,
                &fixture,
                &constant_grid(2, 2, (i + 1) as f32),
                &constant_flags(2, 2, GOOD),
            );
            scene
        })
        .collect()
}

// ============================================================================
// Rolling windows
// ============================================================================

#[tokio::test]
async fn test_four_week_window_over_thirty_days() {
    let store = Arc::new(MemoryStore::new());
    let scenes = scenes_at(&store, &[0, 10, 20, 30]);

    let output = accumulator(store)
        .accumulate(&scenes, &unit_2x2_bounds(), true)
        .await
        .unwrap();
    let per_scene = output.per_scene.unwrap();

    let windows: Vec<_> = rolling_composite_for_scenes(&per_scene, &scenes, 7, 28)
        .unwrap()
        .collect::<composite::Result<_>>()
        .unwrap();

    // Only [D0, D0+28] ends before D0+30; D0 itself is on the open start edge.
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].label, "20140101_20140129");
    assert_eq!(windows[0].scene_ids, vec![scenes[1].id.clone(), scenes[2].id.clone()]);
    assert_eq!(windows[0].valid_count, array![[2, 2], [2, 2]]);
    assert_eq!(windows[0].radiance_average, array![[2.5, 2.5], [2.5, 2.5]]);
}

#[tokio::test]
async fn test_empty_windows_are_emitted_as_no_data() {
    let store = Arc::new(MemoryStore::new());
    let scenes = scenes_at(&store, &[0, 1, 40]);

    let output = accumulator(store)
        .accumulate(&scenes, &unit_2x2_bounds(), true)
        .await
        .unwrap();
    let per_scene = output.per_scene.unwrap();

    let windows: Vec<_> = rolling_composite_for_scenes(&per_scene, &scenes, 10, 10)
        .unwrap()
        .collect::<composite::Result<_>>()
        .unwrap();

    assert_eq!(windows.len(), 3);
    assert_eq!(windows[0].scene_ids, vec![scenes[1].id.clone()]);
    assert_eq!(windows[0].radiance_average, array![[2.0, 2.0], [2.0, 2.0]]);
    for window in &windows[1..] {
        assert!(window.scene_ids.is_empty());
        assert_eq!(window.valid_count.sum(), 0);
        assert!(window.radiance_average.iter().all(|v| v.is_nan()));
    }
}

#[tokio::test]
async fn test_rolling_is_restartable() {
    let store = Arc::new(MemoryStore::new());
    let scenes = scenes_at(&store, &[0, 3, 6, 9, 12, 15, 18]);

    let output = accumulator(store)
        .accumulate(&scenes, &unit_2x2_bounds(), true)
        .await
        .unwrap();
    let per_scene = output.per_scene.unwrap();

    let labels = || -> Vec<String> {
        rolling_composite_for_scenes(&per_scene, &scenes, 2, 6)
            .unwrap()
            .map(|w| w.unwrap().label)
            .collect()
    };

    let first = labels();
    assert_eq!(first, labels());
    assert!(first.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_unrepresentable_width_is_invalid_config() {
    let store = Arc::new(MemoryStore::new());
    let scenes = scenes_at(&store, &[0, 10]);

    let output = accumulator(store)
        .accumulate(&scenes, &unit_2x2_bounds(), true)
        .await
        .unwrap();
    let per_scene = output.per_scene.unwrap();

    match rolling_composite_for_scenes(&per_scene, &scenes, 7, 100_000_000) {
        Err(CompositeError::InvalidConfig(_)) => {}
        other => panic!("expected InvalidConfig, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_rolling_without_retained_arrays_fails() {
    let store = Arc::new(MemoryStore::new());
    let scenes = scenes_at(&store, &[0, 10, 20]);

    let output = accumulator(store)
        .accumulate(&scenes, &unit_2x2_bounds(), false)
        .await
        .unwrap();
    let per_scene = output.per_scene.unwrap_or_default();

    let err = rolling_composite_for_scenes(&per_scene, &scenes, 1, 5).unwrap_err();
    assert!(matches!(err, CompositeError::MissingSceneArrays(_)));
}

// ============================================================================
// End-to-end
// ============================================================================

#[tokio::test]
async fn test_pipeline_from_local_files_to_geotiff() {
    let data_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let fixture = GeoTiffFixture::unit(2, 2);

    let scenes: Vec<_> = (0..3).map(|i| scene_at(i, 600 + i as u32)).collect();
    for (i, scene) in scenes.iter().enumerate() {
        write_fixture(
            data_dir.path(),
            &scene.href,
            fixture.encode_f32(&constant_grid(2, 2, (i + 1) as f32)),
        );
        write_fixture(
            data_dir.path(),
            &flag_href(scene),
            fixture.encode_u32(&constant_flags(2, 2, GOOD)),
        );
    }

    let store = Arc::new(LocalStore::new(Some(data_dir.path().to_path_buf())));
    let output = Accumulator::new(store, quality())
        .with_concurrency(2)
        .accumulate(&scenes, &unit_2x2_bounds(), false)
        .await
        .unwrap();

    let bounds = unit_2x2_bounds();
    let paths = write_composite(
        out_dir.path(),
        "test_201401",
        &output.composite.average(),
        &output.composite.valid_count,
        &bounds,
    )
    .unwrap();

    assert!(paths.radiance.ends_with("test_201401_rad.tif"));
    assert!(paths.count.ends_with("test_201401_cnt.tif"));

    let rad_bytes = std::fs::read(&paths.radiance).unwrap();
    let cnt_bytes = std::fs::read(&paths.count).unwrap();

    let radiance = raster::decode::<f32>(&rad_bytes).unwrap();
    let count = raster::decode::<u32>(&cnt_bytes).unwrap();
    assert_eq!(radiance.data, array![[2.0, 2.0], [2.0, 2.0]]);
    assert_eq!(count.data, array![[3, 3], [3, 3]]);
    assert_eq!(read_bounds(&rad_bytes).unwrap(), bounds);
    assert_eq!(read_bounds(&cnt_bytes).unwrap(), bounds);
}
