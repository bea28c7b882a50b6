//! Error types for the conversion crate.

use std::path::{Path, PathBuf};

use array_store::StoreError;
use geotiff_io::GeoTiffError;
use thiserror::Error;

/// Errors that can occur while packing, unpacking or tiling.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Input discovery failed: {0}")]
    InputDiscovery(String),

    #[error("No files matching '{pattern}' found below {}", .root.display())]
    EmptyDataset { root: PathBuf, pattern: String },

    #[error("No label matching '{pattern}' next to {}", .image.display())]
    MissingLabel { image: PathBuf, pattern: String },

    #[error(
        "Record name '{name}' is shared by {} and {}",
        .first.display(),
        .second.display()
    )]
    DuplicateName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Band {band} requested but {} has {bands} bands", .path.display())]
    BandSelection {
        path: PathBuf,
        band: usize,
        bands: usize,
    },

    #[error("Tile size {tile_size} exceeds image extent {rows}x{cols}")]
    TileLargerThanImage {
        tile_size: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Invalid tiling: {0}")]
    InvalidTiling(String),

    #[error("Index {index} out of range for store with {len} records")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("All {tiles} tiles were dropped by target size {target_size}")]
    EmptyTileSet { tiles: usize, target_size: u64 },

    #[error("Refusing to overwrite existing file {}", .0.display())]
    FileExists(PathBuf),

    #[error("Destination store already exists: {}", .0.display())]
    StoreExists(PathBuf),

    #[error("Missing georeference in {}: {reason}", .path.display())]
    MissingGeoreference { path: PathBuf, reason: String },

    #[error("Raster error in {}: {source}", .path.display())]
    Raster {
        path: PathBuf,
        #[source]
        source: GeoTiffError,
    },

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    /// Attach a path to a codec failure, lifting the cases with their own variant.
    pub fn raster(path: &Path, source: GeoTiffError) -> Self {
        match source {
            GeoTiffError::BandOutOfRange { band, bands } => Self::BandSelection {
                path: path.to_path_buf(),
                band,
                bands,
            },
            GeoTiffError::MissingGeoreference(reason) => Self::MissingGeoreference {
                path: path.to_path_buf(),
                reason,
            },
            GeoTiffError::AlreadyExists(existing) => Self::FileExists(existing),
            source => Self::Raster {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

impl From<StoreError> for ConversionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(path) => Self::StoreExists(path),
            other => Self::Store(other),
        }
    }
}

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConversionError>;
