//! Exact per-band mean and standard deviation.
//!
//! Sums are accumulated in integers, so the result does not depend on the
//! order in which rasters are visited. Finalization converts to `f64` once.

use raster_common::GeoRaster;

use crate::error::{ConversionError, Result};

/// Running per-band pixel count, sum and sum of squares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandStatistics {
    counts: Vec<u64>,
    sums: Vec<u64>,
    sums_sq: Vec<u128>,
}

impl BandStatistics {
    pub fn new(bands: usize) -> Self {
        Self {
            counts: vec![0; bands],
            sums: vec![0; bands],
            sums_sq: vec![0; bands],
        }
    }

    pub fn bands(&self) -> usize {
        self.counts.len()
    }

    /// Add the pixels of one band.
    pub fn accumulate_band(&mut self, band: usize, pixels: &[u16]) {
        let (sum, sum_sq) = pixels.iter().fold((0u64, 0u128), |(s, sq), &v| {
            let v = u64::from(v);
            (s + v, sq + u128::from(v * v))
        });
        self.counts[band] += pixels.len() as u64;
        self.sums[band] += sum;
        self.sums_sq[band] += sum_sq;
    }

    /// Add every band of a raster.
    pub fn accumulate(&mut self, raster: &GeoRaster) -> Result<()> {
        if raster.bands() != self.bands() {
            return Err(ConversionError::ShapeMismatch(format!(
                "raster has {} bands, statistics track {}",
                raster.bands(),
                self.bands()
            )));
        }
        for band in 0..self.bands() {
            let pixels = raster
                .band(band)
                .map_err(|e| ConversionError::ShapeMismatch(e.to_string()))?;
            self.accumulate_band(band, pixels);
        }
        Ok(())
    }

    /// Per-band means and population standard deviations.
    ///
    /// Bands without pixels report 0 for both.
    pub fn finalize(&self) -> (Vec<f64>, Vec<f64>) {
        let mut means = Vec::with_capacity(self.bands());
        let mut stds = Vec::with_capacity(self.bands());
        for band in 0..self.bands() {
            let n = self.counts[band];
            if n == 0 {
                means.push(0.0);
                stds.push(0.0);
                continue;
            }
            let sum = u128::from(self.sums[band]);
            // n^2 * variance, exact
            let scaled_var = u128::from(n) * self.sums_sq[band] - sum * sum;
            means.push(sum as f64 / n as f64);
            stds.push((scaled_var as f64).sqrt() / n as f64);
        }
        (means, stds)
    }
}
