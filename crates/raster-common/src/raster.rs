//! Band-major pixel buffers with georeferencing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::affine::Affine;
use crate::crs::EpsgCode;
use crate::error::{RasterError, RasterResult};

/// Shape of a band-major raster: `[bands, rows, cols]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RasterShape {
    pub bands: usize,
    pub rows: usize,
    pub cols: usize,
}

impl RasterShape {
    pub fn new(bands: usize, rows: usize, cols: usize) -> Self {
        Self { bands, rows, cols }
    }

    /// Number of pixels in one band.
    pub fn plane_len(&self) -> usize {
        self.rows * self.cols
    }

    /// Total number of samples across all bands.
    pub fn len(&self) -> usize {
        self.bands * self.plane_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for RasterShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.bands, self.rows, self.cols)
    }
}

/// A georeferenced raster held in memory.
///
/// Pixels are stored band-major: band 0 rows top to bottom, then band 1, ...
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRaster {
    shape: RasterShape,
    data: Vec<u16>,
    pub affine: Affine,
    pub epsg: EpsgCode,
}

impl GeoRaster {
    /// Wrap a pixel buffer, checking that its length agrees with `shape`.
    pub fn new(
        shape: RasterShape,
        data: Vec<u16>,
        affine: Affine,
        epsg: EpsgCode,
    ) -> RasterResult<Self> {
        if data.len() != shape.len() {
            return Err(RasterError::DataLength {
                shape: shape.to_string(),
                expected: shape.len(),
                actual: data.len(),
            });
        }
        Ok(Self {
            shape,
            data,
            affine,
            epsg,
        })
    }

    pub fn shape(&self) -> RasterShape {
        self.shape
    }

    pub fn bands(&self) -> usize {
        self.shape.bands
    }

    pub fn rows(&self) -> usize {
        self.shape.rows
    }

    pub fn cols(&self) -> usize {
        self.shape.cols
    }

    pub fn data(&self) -> &[u16] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u16> {
        self.data
    }

    /// Pixels of one band (0-based).
    pub fn band(&self, band: usize) -> RasterResult<&[u16]> {
        if band >= self.shape.bands {
            return Err(RasterError::BandOutOfRange {
                band,
                bands: self.shape.bands,
            });
        }
        let plane = self.shape.plane_len();
        Ok(&self.data[band * plane..(band + 1) * plane])
    }

    /// Keep only the given bands (0-based), in the given order.
    pub fn select_bands(&self, bands: &[usize]) -> RasterResult<GeoRaster> {
        let mut data = Vec::with_capacity(bands.len() * self.shape.plane_len());
        for &band in bands {
            data.extend_from_slice(self.band(band)?);
        }
        GeoRaster::new(
            RasterShape::new(bands.len(), self.shape.rows, self.shape.cols),
            data,
            self.affine,
            self.epsg,
        )
    }

    /// Zero-pad every band at the bottom and right edge to `rows` x `cols`.
    ///
    /// The upper-left pixel stays put, so the transform is unchanged.
    pub fn padded(&self, rows: usize, cols: usize) -> RasterResult<GeoRaster> {
        if rows == self.shape.rows && cols == self.shape.cols {
            return Ok(self.clone());
        }
        let mut data = Vec::with_capacity(self.shape.bands * rows * cols);
        for band in 0..self.shape.bands {
            data.extend(pad_plane(
                self.band(band)?,
                self.shape.rows,
                self.shape.cols,
                rows,
                cols,
            )?);
        }
        GeoRaster::new(
            RasterShape::new(self.shape.bands, rows, cols),
            data,
            self.affine,
            self.epsg,
        )
    }

    /// Cut out a `height` x `width` window with its own transform.
    pub fn window(
        &self,
        row0: usize,
        col0: usize,
        height: usize,
        width: usize,
    ) -> RasterResult<GeoRaster> {
        let mut data = Vec::with_capacity(self.shape.bands * height * width);
        for band in 0..self.shape.bands {
            data.extend(window_plane(
                self.band(band)?,
                self.shape.rows,
                self.shape.cols,
                row0,
                col0,
                height,
                width,
            )?);
        }
        GeoRaster::new(
            RasterShape::new(self.shape.bands, height, width),
            data,
            self.affine.window(row0, col0),
            self.epsg,
        )
    }
}

/// Zero-pad a single `rows` x `cols` plane to `target_rows` x `target_cols`.
///
/// Padding is only ever added after the last row and column.
pub fn pad_plane(
    data: &[u16],
    rows: usize,
    cols: usize,
    target_rows: usize,
    target_cols: usize,
) -> RasterResult<Vec<u16>> {
    if data.len() != rows * cols {
        return Err(RasterError::DataLength {
            shape: format!("[{}, {}]", rows, cols),
            expected: rows * cols,
            actual: data.len(),
        });
    }
    if target_rows < rows || target_cols < cols {
        return Err(RasterError::PadShrinks {
            rows,
            cols,
            target_rows,
            target_cols,
        });
    }

    let mut out = vec![0u16; target_rows * target_cols];
    for (row, src) in data.chunks_exact(cols.max(1)).enumerate().take(rows) {
        let start = row * target_cols;
        out[start..start + cols].copy_from_slice(src);
    }
    Ok(out)
}

/// Copy a `height` x `width` window starting at (`row0`, `col0`) out of a plane.
pub fn window_plane(
    data: &[u16],
    rows: usize,
    cols: usize,
    row0: usize,
    col0: usize,
    height: usize,
    width: usize,
) -> RasterResult<Vec<u16>> {
    if row0 + height > rows || col0 + width > cols {
        return Err(RasterError::WindowOutOfBounds {
            row0,
            col0,
            height,
            width,
            rows,
            cols,
        });
    }
    if data.len() != rows * cols {
        return Err(RasterError::DataLength {
            shape: format!("[{}, {}]", rows, cols),
            expected: rows * cols,
            actual: data.len(),
        });
    }

    let mut out = Vec::with_capacity(height * width);
    for row in row0..row0 + height {
        let start = row * cols + col0;
        out.extend_from_slice(&data[start..start + width]);
    }
    Ok(out)
}

/// One row of a packed store.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterRecord {
    /// Pixels, transform and CRS.
    pub image: GeoRaster,
    /// Label mask with the image's rows x cols, if the store carries labels.
    pub label: Option<Vec<u16>>,
    /// Source name (file stem, or `<parent>_<k>` for tiles).
    pub name: String,
}

impl RasterRecord {
    pub fn new(image: GeoRaster, label: Option<Vec<u16>>, name: impl Into<String>) -> RasterResult<Self> {
        if let Some(label) = &label {
            let plane = image.shape().plane_len();
            if label.len() != plane {
                return Err(RasterError::DataLength {
                    shape: format!("[{}, {}]", image.rows(), image.cols()),
                    expected: plane,
                    actual: label.len(),
                });
            }
        }
        Ok(Self {
            image,
            label,
            name: name.into(),
        })
    }
}
