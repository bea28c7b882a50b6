//! Shared test utilities for the sat2store workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Raster and label mask generators
//! - Fixtures that lay out GeoTIFF scene directories on disk
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{pattern_raster, write_scene, LABEL_GLOB};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Approximate equality of two affine transforms, coefficient by coefficient.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_affine_approx_eq;
///
/// assert_affine_approx_eq!(tile.affine, expected, 1e-9);
/// ```
#[macro_export]
macro_rules! assert_affine_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left = $left.to_gdal();
        let right = $right.to_gdal();
        for (l, r) in left.iter().zip(right.iter()) {
            $crate::assert_approx_eq!(*l, *r, $epsilon);
        }
    }};
}
