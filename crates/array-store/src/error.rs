//! Error types for the array store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while creating, writing or reading a store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The destination store already exists.
    #[error("store already exists: {0}")]
    AlreadyExists(PathBuf),

    /// No store at the given location.
    #[error("store not found: {0}")]
    NotFound(PathBuf),

    /// Zarr format or storage error.
    #[error("Zarr error: {0}")]
    Zarr(String),

    /// Dataset shapes or contents disagree with the expected layout.
    #[error("invalid store layout: {0}")]
    Layout(String),

    /// Record index past the end of the store.
    #[error("record {index} out of range for store with {len} records")]
    IndexOutOfRange { index: usize, len: usize },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Group attributes could not be (de)serialized.
    #[error("invalid store attributes: {0}")]
    Attributes(#[from] serde_json::Error),

    /// Raster buffer error.
    #[error(transparent)]
    Raster(#[from] raster_common::RasterError),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create a Zarr error from any zarrs failure.
    pub fn zarr(err: impl std::fmt::Display) -> Self {
        Self::Zarr(err.to_string())
    }

    /// Create a Layout error.
    pub fn layout(msg: impl Into<String>) -> Self {
        Self::Layout(msg.into())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
