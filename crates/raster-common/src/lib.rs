//! Common raster types shared across the sat2store workspace.
//!
//! Everything that moves between the GeoTIFF codec, the array store and the
//! conversion pipeline is expressed with these types:
//!
//! - [`Affine`]: pixel (col, row) to world (x, y) transform, GDAL ordering on the wire
//! - [`GeoRaster`]: band-major `u16` pixels with their transform and EPSG code
//! - [`RasterRecord`]: one row of a packed store (image, optional label, source name)

pub mod affine;
pub mod crs;
pub mod error;
pub mod raster;

pub use affine::Affine;
pub use crs::{is_geographic, EpsgCode};
pub use error::{RasterError, RasterResult};
pub use raster::{pad_plane, window_plane, GeoRaster, RasterRecord, RasterShape};
