//! GeoTIFF reading and writing without a GDAL dependency.
//!
//! Rasters are exchanged as band-major [`GeoRaster`](raster_common::GeoRaster)
//! buffers of `u16` samples. The reader accepts 8- and 16-bit unsigned
//! integer images in any layout the `tiff` decoder understands (strips or
//! tiles, LZW/Deflate/PackBits); the writer emits uncompressed, pixel
//! interleaved strips with any number of bands.
//!
//! Georeferencing is carried by the standard GeoTIFF tags:
//!
//! - `ModelPixelScale` + `ModelTiepoint` for north-up rasters
//! - `ModelTransformation` for rotated or sheared rasters
//! - `GeoKeyDirectory` with `ProjectedCSTypeGeoKey` / `GeographicTypeGeoKey`
//!
//! # Example
//!
//! ```ignore
//! use geotiff_io::{read_raster, GeoTiffWriter};
//!
//! let raster = read_raster("scene.tif", &[3, 2, 1])?;
//! GeoTiffWriter::new(&raster).nodata(0).write("scene_rgb.tif")?;
//! ```

pub mod error;
pub mod geokeys;
pub mod reader;
pub mod writer;

pub use error::{GeoTiffError, Result};
pub use reader::{read_mask, read_raster, read_raster_info, RasterInfo};
pub use writer::GeoTiffWriter;
