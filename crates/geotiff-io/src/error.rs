//! Error types for GeoTIFF I/O.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing GeoTIFF files.
#[derive(Error, Debug)]
pub enum GeoTiffError {
    /// The file could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Refusing to replace an existing file.
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    /// Other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding or encoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Image layout or sample type this codec does not handle.
    #[error("unsupported raster layout: {0}")]
    Unsupported(String),

    /// A requested band does not exist (bands are 1-based).
    #[error("band {band} requested but raster has {bands} bands")]
    BandOutOfRange { band: usize, bands: usize },

    /// Transform or CRS tags are missing or unreadable.
    #[error("missing georeference: {0}")]
    MissingGeoreference(String),

    /// EPSG code does not fit a GeoKey short.
    #[error("EPSG code {0} cannot be encoded as a GeoKey")]
    EpsgOutOfRange(u32),

    /// Pixel buffer inconsistent with the declared shape.
    #[error(transparent)]
    Raster(#[from] raster_common::RasterError),

    /// Nothing to write.
    #[error("invalid raster data: {0}")]
    InvalidData(String),
}

/// Result type for GeoTIFF operations.
pub type Result<T> = std::result::Result<T, GeoTiffError>;
