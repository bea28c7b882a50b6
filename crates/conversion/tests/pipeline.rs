//! End-to-end packing, unpacking and tiling over synthetic GeoTIFF scenes.

use std::path::Path;

use array_store::StoreReader;
use conversion::{
    convert_img_to_store, convert_store_to_img, tile_store, ConversionError, IndexSelection,
    PackOptions, TileOptions,
};
use geotiff_io::{read_mask, read_raster};
use raster_common::Affine;
use test_utils::{
    assert_affine_approx_eq, assert_approx_eq, constant_raster, create_block_mask,
    create_label_mask, pattern_raster, reference_affine, write_geotiff, write_scene, LABEL_GLOB,
};

fn pack_with_labels(root: &Path, dst: &Path) -> conversion::PackSummary {
    convert_img_to_store(root, dst, &PackOptions::new("*.tif").label_glob(LABEL_GLOB))
        .expect("Failed to pack store")
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .expect("Failed to list directory")
        .count()
}

#[test]
fn test_pack_unpack_roundtrip() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    let image = pattern_raster(3, 20, 30);
    let mask = create_block_mask(20, 30, 5, 5, 4, 6);
    write_scene(&root, "alpha", &image, Some(mask.clone()));

    let store = dir.path().join("alpha.zarr");
    let summary = pack_with_labels(&root, &store);
    assert_eq!(summary.records, 1);
    assert!(summary.has_labels);

    let out = dir.path().join("out");
    let unpacked = convert_store_to_img(&store, &out, &IndexSelection::Single(0))
        .expect("Failed to unpack store");
    assert_eq!(unpacked.written.len(), 2);

    let restored = read_raster(out.join("alpha.tif"), &[]).expect("Failed to read unpacked image");
    assert_eq!(restored.data(), image.data());
    assert_eq!(restored.affine, image.affine);
    assert_eq!(restored.epsg, image.epsg);

    let (shape, restored_mask) =
        read_mask(out.join("alpha_label.tif")).expect("Failed to read unpacked label");
    assert_eq!((shape.rows, shape.cols), (20, 30));
    assert_eq!(restored_mask, mask);
}

#[test]
fn test_padding_to_largest_extent() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    let wide = pattern_raster(2, 10, 12);
    let mut tall = pattern_raster(2, 16, 8);
    tall.affine = Affine::north_up(5000.0, 9000.0, 10.0, 10.0);
    write_scene(&root, "a_wide", &wide, Some(vec![1; 120]));
    write_scene(&root, "b_tall", &tall, Some(vec![1; 128]));

    let store = dir.path().join("padded.zarr");
    let summary = pack_with_labels(&root, &store);
    assert_eq!((summary.shape.rows, summary.shape.cols), (16, 12));

    let reader = StoreReader::open_dir(&store).expect("Failed to open store");
    for (index, original) in [&wide, &tall].into_iter().enumerate() {
        let record = reader.read_record(index).expect("Failed to read record");
        assert_eq!(record.image.affine, original.affine);
        let label = record.label.expect("Store should carry labels");

        for band in 0..2 {
            let plane = record.image.band(band).expect("Failed to read band");
            let source = original.band(band).expect("Failed to read band");
            for row in 0..16 {
                for col in 0..12 {
                    let value = plane[row * 12 + col];
                    if row < original.rows() && col < original.cols() {
                        assert_eq!(value, source[row * original.cols() + col]);
                    } else {
                        assert_eq!(value, 0, "padding at band {band} ({row}, {col})");
                    }
                }
            }
        }
        let positives = label.iter().filter(|&&v| v > 0).count();
        assert_eq!(positives, original.rows() * original.cols());
    }
    assert_eq!(reader.read_name(0).expect("Failed to read name"), "a_wide");
    assert_eq!(reader.read_name(1).expect("Failed to read name"), "b_tall");
}

#[test]
fn test_statistics_exclude_padding() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    write_scene(&root, "small", &constant_raster(&[7, 100], 10, 10), None);
    write_scene(&root, "large", &constant_raster(&[7, 100], 20, 5), None);

    let store = dir.path().join("stats.zarr");
    let summary = convert_img_to_store(&root, &store, &PackOptions::new("*.tif"))
        .expect("Failed to pack store");
    assert_eq!(summary.means, vec![7.0, 100.0]);
    assert_eq!(summary.stds, vec![0.0, 0.0]);

    let reader = StoreReader::open_dir(&store).expect("Failed to open store");
    let (means, stds) = reader.statistics().expect("Failed to read statistics");
    assert_eq!(means, summary.means);
    assert_eq!(stds, summary.stds);
    assert!(!reader.has_labels());
}

#[test]
fn test_statistics_mixed_values() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    // 100 pixels of 2 and 100 of 4: mean 3, std 1
    write_scene(&root, "low", &constant_raster(&[2], 10, 10), None);
    write_scene(&root, "high", &constant_raster(&[4], 5, 20), None);

    let summary = convert_img_to_store(&root, &dir.path().join("s.zarr"), &PackOptions::new("*.tif"))
        .expect("Failed to pack store");
    assert_approx_eq!(summary.means[0], 3.0, 1e-12);
    assert_approx_eq!(summary.stds[0], 1.0, 1e-12);
}

#[test]
fn test_band_subset_order() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    let image = pattern_raster(3, 6, 6);
    write_scene(&root, "scene", &image, None);

    let store = dir.path().join("subset.zarr");
    let summary = convert_img_to_store(&root, &store, &PackOptions::new("*.tif").image_bands(vec![3, 1]))
        .expect("Failed to pack store");
    assert_eq!(summary.shape.bands, 2);

    let reader = StoreReader::open_dir(&store).expect("Failed to open store");
    assert_eq!(reader.attributes().bands, vec![3, 1]);
    let record = reader.read_image(0).expect("Failed to read image");
    assert_eq!(record.band(0).expect("band"), image.band(2).expect("band"));
    assert_eq!(record.band(1).expect("band"), image.band(0).expect("band"));
}

#[test]
fn test_band_selection_out_of_range() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    write_scene(&root, "scene", &pattern_raster(3, 6, 6), None);

    let store = dir.path().join("bad.zarr");
    let result = convert_img_to_store(&root, &store, &PackOptions::new("*.tif").image_bands(vec![4]));
    assert!(matches!(
        result,
        Err(ConversionError::BandSelection { band: 4, bands: 3, .. })
    ));
    assert!(!store.exists());
}

#[test]
fn test_band_count_mismatch_without_subset() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    write_scene(&root, "a", &pattern_raster(3, 6, 6), None);
    write_scene(&root, "b", &pattern_raster(2, 6, 6), None);

    let store = dir.path().join("mixed.zarr");
    let result = convert_img_to_store(&root, &store, &PackOptions::new("*.tif"));
    assert!(matches!(result, Err(ConversionError::ShapeMismatch(_))));
    assert!(!store.exists());

    // A subset valid for both makes the set packable
    let summary = convert_img_to_store(&root, &store, &PackOptions::new("*.tif").image_bands(vec![1, 2]))
        .expect("Failed to pack with band subset");
    assert_eq!(summary.shape.bands, 2);
}

#[test]
fn test_missing_label() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    write_scene(&root, "labelled", &pattern_raster(1, 4, 4), Some(vec![0; 16]));
    write_scene(&root, "unlabelled", &pattern_raster(1, 4, 4), None);

    let store = dir.path().join("labels.zarr");
    let result = convert_img_to_store(&root, &store, &PackOptions::new("*.tif").label_glob(LABEL_GLOB));
    assert!(matches!(result, Err(ConversionError::MissingLabel { .. })));
    assert!(!store.exists());
}

#[test]
fn test_label_extent_mismatch() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    let paths = write_scene(&root, "scene", &pattern_raster(1, 8, 8), None);
    let label = test_utils::mask_raster_with(6, 8, vec![0; 48], reference_affine(), 32633);
    write_geotiff(&root.join("scene").join("scene_label.tif"), &label);
    assert!(paths.image.exists());

    let result = convert_img_to_store(
        &root,
        &dir.path().join("x.zarr"),
        &PackOptions::new("*.tif").label_glob(LABEL_GLOB),
    );
    assert!(matches!(result, Err(ConversionError::ShapeMismatch(_))));
}

#[test]
fn test_pack_refuses_existing_store() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    write_scene(&root, "scene", &pattern_raster(1, 4, 4), None);

    let store = dir.path().join("once.zarr");
    convert_img_to_store(&root, &store, &PackOptions::new("*.tif")).expect("Failed to pack store");
    let again = convert_img_to_store(&root, &store, &PackOptions::new("*.tif"));
    assert!(matches!(again, Err(ConversionError::StoreExists(_))));
}

#[test]
fn test_unpack_index_out_of_range_writes_nothing() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    write_scene(&root, "a", &pattern_raster(1, 4, 4), None);
    write_scene(&root, "b", &pattern_raster(1, 4, 4), None);
    let store = dir.path().join("two.zarr");
    convert_img_to_store(&root, &store, &PackOptions::new("*.tif")).expect("Failed to pack store");

    let out = dir.path().join("out");
    let result = convert_store_to_img(&store, &out, &IndexSelection::Single(2));
    assert!(matches!(
        result,
        Err(ConversionError::IndexOutOfRange { index: 2, len: 2 })
    ));
    assert_eq!(file_count(&out), 0);

    let result = convert_store_to_img(&store, &out, &IndexSelection::Single(-3));
    assert!(matches!(result, Err(ConversionError::IndexOutOfRange { .. })));
    assert_eq!(file_count(&out), 0);
}

#[test]
fn test_unpack_negative_and_list_selection() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    for name in ["a", "b", "c"] {
        write_scene(&root, name, &pattern_raster(1, 4, 4), None);
    }
    let store = dir.path().join("three.zarr");
    convert_img_to_store(&root, &store, &PackOptions::new("*.tif")).expect("Failed to pack store");

    let last = dir.path().join("last");
    convert_store_to_img(&store, &last, &IndexSelection::Single(-1)).expect("Failed to unpack");
    assert!(last.join("c.tif").exists());
    assert_eq!(file_count(&last), 1);

    let some = dir.path().join("some");
    let summary = convert_store_to_img(&store, &some, &IndexSelection::List(vec![2, 0]))
        .expect("Failed to unpack");
    assert_eq!(summary.written, vec![some.join("c.tif"), some.join("a.tif")]);

    let range = dir.path().join("range");
    convert_store_to_img(&store, &range, &IndexSelection::Range { start: 1, end: None })
        .expect("Failed to unpack");
    assert!(range.join("b.tif").exists());
    assert!(range.join("c.tif").exists());
    assert!(!range.join("a.tif").exists());
}

#[test]
fn test_unpack_refuses_overwrite() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    write_scene(&root, "scene", &pattern_raster(1, 4, 4), None);
    let store = dir.path().join("one.zarr");
    convert_img_to_store(&root, &store, &PackOptions::new("*.tif")).expect("Failed to pack store");

    let out = dir.path().join("out");
    convert_store_to_img(&store, &out, &IndexSelection::All).expect("Failed to unpack");
    let again = convert_store_to_img(&store, &out, &IndexSelection::All);
    assert!(matches!(again, Err(ConversionError::FileExists(_))));
}

#[test]
fn test_tiling_coverage() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    write_scene(&root, "scene", &pattern_raster(1, 300, 300), None);
    let store = dir.path().join("full.zarr");
    convert_img_to_store(&root, &store, &PackOptions::new("*.tif")).expect("Failed to pack store");

    let tiled = dir.path().join("tiles.zarr");
    let summary = tile_store(&store, &tiled, &TileOptions::new(128, 0)).expect("Failed to tile store");
    assert_eq!(summary.tiles_per_parent, 9);
    assert_eq!(summary.records, 9);
    assert_eq!(summary.dropped, 0);

    let reader = StoreReader::open_dir(&tiled).expect("Failed to open tiled store");
    let layout = reader.layout();
    assert_eq!((layout.records, layout.rows, layout.cols), (9, 128, 128));
    let tiling = reader.attributes().tiling.clone().expect("Tiling attributes");
    assert_eq!((tiling.tile_size, tiling.overlap, tiling.parents), (128, 0, 1));

    // Last tile starts at (172, 172)
    let last = reader.read_image(8).expect("Failed to read tile");
    assert_eq!(last.affine.origin(), (1172.0, 1828.0));
    assert_eq!(reader.read_name(8).expect("Failed to read name"), "scene_8");
}

#[test]
fn test_tile_affine_and_pixels_match_parent_window() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    let parent = pattern_raster(2, 300, 300);
    write_scene(&root, "scene", &parent, None);
    let store = dir.path().join("full.zarr");
    convert_img_to_store(&root, &store, &PackOptions::new("*.tif")).expect("Failed to pack store");

    // Stride 64 gives offsets {0, 64, 128, 172} on each axis
    let tiled = dir.path().join("tiles.zarr");
    let summary = tile_store(&store, &tiled, &TileOptions::new(128, 64)).expect("Failed to tile store");
    assert_eq!(summary.tiles_per_parent, 16);

    let reader = StoreReader::open_dir(&tiled).expect("Failed to open tiled store");
    let index = 2 * 4 + 1;
    let tile = reader.read_image(index).expect("Failed to read tile");
    assert_eq!(reader.read_name(index).expect("Failed to read name"), "scene_09");
    assert_affine_approx_eq!(tile.affine, Affine::north_up(1064.0, 1872.0, 1.0, 1.0), 1e-9);

    let expected = parent.window(128, 64, 128, 128).expect("Failed to window parent");
    assert_eq!(tile.data(), expected.data());
    for (row, col) in [(0usize, 0usize), (17, 99), (127, 127)] {
        let (x, y) = tile.affine.apply(col as f64, row as f64);
        let (px, py) = parent.affine.apply((col + 64) as f64, (row + 128) as f64);
        assert_approx_eq!(x, px, 1e-9);
        assert_approx_eq!(y, py, 1e-9);
    }
}

#[test]
fn test_target_size_boundary_is_inclusive() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    // Two 128x128 tiles stacked vertically: 49 positives in the top, 50 in the bottom
    let mut mask = create_label_mask(256, 128, 49);
    let bottom = create_block_mask(256, 128, 128, 0, 1, 50);
    for (m, b) in mask.iter_mut().zip(bottom) {
        *m |= b;
    }
    write_scene(&root, "scene", &pattern_raster(1, 256, 128), Some(mask));
    let store = dir.path().join("full.zarr");
    pack_with_labels(&root, &store);

    let tiled = dir.path().join("tiles.zarr");
    let summary = tile_store(&store, &tiled, &TileOptions::new(128, 0).target_size(50))
        .expect("Failed to tile store");
    assert_eq!(summary.records, 1);
    assert_eq!(summary.dropped, 1);

    let reader = StoreReader::open_dir(&tiled).expect("Failed to open tiled store");
    assert_eq!(reader.read_name(0).expect("Failed to read name"), "scene_1");
    let label = reader
        .read_label(0)
        .expect("Failed to read label")
        .expect("Tiled store should carry labels");
    assert_eq!(label.iter().filter(|&&v| v > 0).count(), 50);

    let none = dir.path().join("none.zarr");
    let result = tile_store(&store, &none, &TileOptions::new(128, 0).target_size(51));
    assert!(matches!(
        result,
        Err(ConversionError::EmptyTileSet { tiles: 2, target_size: 51 })
    ));
    assert!(!none.exists());
}

#[test]
fn test_tile_larger_than_image() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    write_scene(&root, "scene", &pattern_raster(1, 32, 32), None);
    let store = dir.path().join("small.zarr");
    convert_img_to_store(&root, &store, &PackOptions::new("*.tif")).expect("Failed to pack store");

    let result = tile_store(&store, &dir.path().join("t.zarr"), &TileOptions::new(64, 0));
    assert!(matches!(
        result,
        Err(ConversionError::TileLargerThanImage { tile_size: 64, .. })
    ));

    let result = tile_store(&store, &dir.path().join("t.zarr"), &TileOptions::new(16, 16));
    assert!(matches!(result, Err(ConversionError::InvalidTiling(_))));
}

#[test]
fn test_duplicate_stems_are_rejected() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    write_geotiff(&root.join("s1").join("image.tif"), &pattern_raster(1, 4, 4));
    write_geotiff(&root.join("s2").join("image.tif"), &pattern_raster(1, 4, 4));

    let store = dir.path().join("dup.zarr");
    let result = convert_img_to_store(&root, &store, &PackOptions::new("*.tif"));
    match result {
        Err(ConversionError::DuplicateName {
            name,
            first,
            second,
        }) => {
            assert_eq!(name, "image");
            assert_eq!(first, root.join("s1").join("image.tif"));
            assert_eq!(second, root.join("s2").join("image.tif"));
        }
        other => panic!("expected DuplicateName, got {:?}", other),
    }
    assert!(!store.exists());
}

#[test]
fn test_tiled_statistics_are_recomputed_over_tiles() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("scenes");
    write_scene(&root, "a_full", &constant_raster(&[10], 64, 64), None);
    write_scene(&root, "b_half", &constant_raster(&[10], 32, 64), None);

    let store = dir.path().join("parents.zarr");
    let packed = convert_img_to_store(&root, &store, &PackOptions::new("*.tif"))
        .expect("Failed to pack store");
    assert_eq!(packed.means, vec![10.0]);
    assert_eq!(packed.stds, vec![0.0]);

    // The bottom two tiles of the second parent lie entirely in its padding
    let tiled = dir.path().join("tiles.zarr");
    let summary = tile_store(&store, &tiled, &TileOptions::new(32, 0)).expect("Failed to tile store");
    assert_eq!(summary.records, 8);
    assert_approx_eq!(summary.means[0], 7.5, 1e-12);
    // Six tiles of 10 and two of 0: population std is sqrt(18.75)
    assert_approx_eq!(summary.stds[0], 18.75f64.sqrt(), 1e-12);

    let reader = StoreReader::open_dir(&tiled).expect("Failed to open tiled store");
    let (means, stds) = reader.statistics().expect("Failed to read statistics");
    assert_eq!(means, summary.means);
    assert_eq!(stds, summary.stds);
    assert_ne!(means, packed.means);

    let source = StoreReader::open_dir(&store).expect("Failed to open source store");
    let (source_means, _) = source.statistics().expect("Failed to read statistics");
    assert_eq!(source_means, vec![10.0]);
}
