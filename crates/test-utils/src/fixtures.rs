//! Common test fixtures: reference transforms and GeoTIFF scene layouts.

use std::path::{Path, PathBuf};

use geotiff_io::GeoTiffWriter;
use raster_common::{Affine, EpsgCode, GeoRaster, RasterShape};

use crate::generators::{create_constant_data, create_pattern_data};

/// Reference coordinate systems used by fixtures.
pub mod crs {
    use raster_common::EpsgCode;

    /// WGS 84 / UTM zone 33N.
    pub const UTM_33N: EpsgCode = 32633;

    /// WGS 84 geographic.
    pub const WGS84: EpsgCode = 4326;
}

/// North-up transform with the upper-left corner at (1000, 2000) and 1 unit
/// pixels.
///
/// A window at row 128, column 64 of this transform starts at (1064, 1872).
pub fn reference_affine() -> Affine {
    Affine::north_up(1000.0, 2000.0, 1.0, 1.0)
}

/// Pattern raster on [`reference_affine`] in UTM 33N.
pub fn pattern_raster(bands: usize, rows: usize, cols: usize) -> GeoRaster {
    GeoRaster::new(
        RasterShape::new(bands, rows, cols),
        create_pattern_data(bands, rows, cols),
        reference_affine(),
        crs::UTM_33N,
    )
    .expect("Failed to build pattern raster")
}

/// Raster where band `b` is the constant `values[b]`.
pub fn constant_raster(values: &[u16], rows: usize, cols: usize) -> GeoRaster {
    GeoRaster::new(
        RasterShape::new(values.len(), rows, cols),
        create_constant_data(values, rows, cols),
        reference_affine(),
        crs::UTM_33N,
    )
    .expect("Failed to build constant raster")
}

/// Single-band raster carrying `mask` with the georeference of `like`.
pub fn mask_raster(like: &GeoRaster, mask: Vec<u16>) -> GeoRaster {
    mask_raster_with(like.rows(), like.cols(), mask, like.affine, like.epsg)
}

pub fn mask_raster_with(
    rows: usize,
    cols: usize,
    mask: Vec<u16>,
    affine: Affine,
    epsg: EpsgCode,
) -> GeoRaster {
    GeoRaster::new(RasterShape::new(1, rows, cols), mask, affine, epsg)
        .expect("Failed to build mask raster")
}

/// Write `raster` to `path`, creating parent directories.
pub fn write_geotiff(path: &Path, raster: &GeoRaster) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create fixture directory");
    }
    GeoTiffWriter::new(raster)
        .write(path)
        .expect("Failed to write fixture GeoTIFF");
    path.to_path_buf()
}

/// Files written by [`write_scene`].
#[derive(Debug, Clone)]
pub struct ScenePaths {
    pub image: PathBuf,
    pub label: Option<PathBuf>,
}

/// Lay out one scene as `<root>/<name>/<name>.tif` plus, when a mask is
/// given, `<root>/<name>/<name>_label.tif` sharing the image georeference.
///
/// Pair with the globs `*.tif` and [`LABEL_GLOB`].
pub fn write_scene(root: &Path, name: &str, image: &GeoRaster, mask: Option<Vec<u16>>) -> ScenePaths {
    let dir = root.join(name);
    let image_path = write_geotiff(&dir.join(format!("{}.tif", name)), image);
    let label = mask.map(|mask| {
        write_geotiff(
            &dir.join(format!("{}_label.tif", name)),
            &mask_raster(image, mask),
        )
    });
    ScenePaths {
        image: image_path,
        label,
    }
}

/// Label glob matching the files written by [`write_scene`].
pub const LABEL_GLOB: &str = "*_label.tif";
