//! Affine pixel-to-world transforms.
//!
//! An [`Affine`] maps a pixel position (col, row) to world coordinates:
//!
//! ```text
//! x = a * col + b * row + c
//! y = d * col + e * row + f
//! ```
//!
//! On disk (store `affine` dataset, GeoTIFF geotransform) the coefficients use
//! the GDAL ordering `[c, a, b, f, d, e]`.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// A general 2D affine transform (rotation and shear allowed).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    /// Create a transform from its six coefficients.
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// Pure translation by (`dx`, `dy`).
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self::new(1.0, 0.0, dx, 0.0, 1.0, dy)
    }

    /// North-up transform with the upper-left corner at (`origin_x`, `origin_y`).
    ///
    /// `pixel_height` is the (positive) ground size of a row; world y decreases
    /// as the row index grows.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self::new(pixel_width, 0.0, origin_x, 0.0, -pixel_height, origin_y)
    }

    /// Build from a GDAL geotransform `[c, a, b, f, d, e]`.
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self::new(gt[1], gt[2], gt[0], gt[4], gt[5], gt[3])
    }

    /// GDAL geotransform ordering `[c, a, b, f, d, e]`.
    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    /// Homogeneous 3x3 form.
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.a, self.b, self.c, //
            self.d, self.e, self.f, //
            0.0, 0.0, 1.0,
        )
    }

    /// Take the affine part of a homogeneous matrix (the last row is ignored).
    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        Self::new(m[(0, 0)], m[(0, 1)], m[(0, 2)], m[(1, 0)], m[(1, 1)], m[(1, 2)])
    }

    /// `self ∘ inner`: apply `inner` first, then `self`.
    pub fn compose(&self, inner: &Affine) -> Affine {
        Affine::from_matrix(&(self.to_matrix() * inner.to_matrix()))
    }

    /// Transform of a sub-window whose upper-left pixel is (`row0`, `col0`).
    ///
    /// The pixel offset is applied in pixel space before this transform, so
    /// pixel (0, 0) of the window lands on pixel (col0, row0) of the parent.
    pub fn window(&self, row0: usize, col0: usize) -> Affine {
        self.compose(&Affine::translation(col0 as f64, row0 as f64))
    }

    /// World coordinates of the pixel corner (`col`, `row`).
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// World coordinates of the upper-left corner.
    pub fn origin(&self) -> (f64, f64) {
        (self.c, self.f)
    }

    /// True when there is no rotation or shear.
    pub fn is_rectilinear(&self) -> bool {
        self.b == 0.0 && self.d == 0.0
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}
