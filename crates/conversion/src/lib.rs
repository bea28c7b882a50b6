//! Conversion between sets of georeferenced rasters and packed stores.
//!
//! Three passes are provided:
//!
//! - [`convert_img_to_store`]: pack a directory of GeoTIFFs (optionally with
//!   paired label masks) into one store, zero-padding every image to the
//!   largest extent and computing per-band statistics over the unpadded
//!   pixels.
//! - [`convert_store_to_img`]: write selected records back out as GeoTIFFs.
//! - [`tile_store`]: cut every record of a store into square, optionally
//!   overlapping tiles with their own transforms, filtered by label content.
//!
//! Packing and tiling are all-or-nothing: output is staged next to the
//! destination and moved into place once complete.

pub mod discovery;
pub mod error;
pub mod pack;
pub mod stats;
pub mod tiling;
pub mod unpack;

pub use discovery::{discover_inputs, InputPair};
pub use error::{ConversionError, Result};
pub use pack::{convert_img_to_store, PackOptions, PackSummary};
pub use stats::BandStatistics;
pub use tiling::{tile_offsets, tile_store, TileGrid, TileOptions, TileSummary, TileWindow};
pub use unpack::{convert_store_to_img, normalize_index, IndexSelection, UnpackSummary};
