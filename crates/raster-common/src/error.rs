//! Error types for raster buffer operations.

use thiserror::Error;

/// Result type alias using RasterError.
pub type RasterResult<T> = Result<T, RasterError>;

/// Errors raised when a pixel buffer does not agree with its declared shape.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("pixel buffer holds {actual} values but shape {shape} needs {expected}")]
    DataLength {
        shape: String,
        expected: usize,
        actual: usize,
    },

    #[error("cannot pad {rows}x{cols} plane down to {target_rows}x{target_cols}")]
    PadShrinks {
        rows: usize,
        cols: usize,
        target_rows: usize,
        target_cols: usize,
    },

    #[error("window {height}x{width} at (row {row0}, col {col0}) exceeds {rows}x{cols} plane")]
    WindowOutOfBounds {
        row0: usize,
        col0: usize,
        height: usize,
        width: usize,
        rows: usize,
        cols: usize,
    },

    #[error("band {band} out of range for raster with {bands} bands")]
    BandOutOfRange { band: usize, bands: usize },
}
