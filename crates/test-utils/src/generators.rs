//! Test data generators for synthetic band-major rasters and label masks.
//!
//! These generators create predictable, verifiable pixel patterns that can
//! be used across the test suite. All buffers are band-major: band 0 rows
//! first, then band 1, and so on.

/// Value of the pattern raster at `(band, row, col)`.
///
/// Never zero, so zero padding is always distinguishable from real pixels.
///
/// # Example
///
/// ```
/// use test_utils::pattern_value;
///
/// assert_eq!(pattern_value(0, 0, 0), 1);
/// assert_eq!(pattern_value(0, 2, 3), 204);
/// assert_eq!(pattern_value(1, 0, 0), 10_001);
/// ```
pub fn pattern_value(band: usize, row: usize, col: usize) -> u16 {
    (1 + (band * 10_000 + row * 100 + col) % 65_535) as u16
}

/// Creates a band-major buffer filled with [`pattern_value`].
///
/// # Example
///
/// ```
/// use test_utils::{create_pattern_data, pattern_value};
///
/// let data = create_pattern_data(2, 3, 4);
/// assert_eq!(data.len(), 24);
/// assert_eq!(data[4 + 1], pattern_value(0, 1, 1));
/// assert_eq!(data[12], pattern_value(1, 0, 0));
/// ```
pub fn create_pattern_data(bands: usize, rows: usize, cols: usize) -> Vec<u16> {
    let mut data = Vec::with_capacity(bands * rows * cols);
    for band in 0..bands {
        for row in 0..rows {
            for col in 0..cols {
                data.push(pattern_value(band, row, col));
            }
        }
    }
    data
}

/// Creates a band-major buffer where band `b` holds `values[b]` everywhere.
pub fn create_constant_data(values: &[u16], rows: usize, cols: usize) -> Vec<u16> {
    values
        .iter()
        .flat_map(|&v| std::iter::repeat(v).take(rows * cols))
        .collect()
}

/// Creates a single-band mask with the first `positives` pixels (row-major)
/// set to 1 and the rest 0.
///
/// # Panics
///
/// Panics if `positives` exceeds `rows * cols`.
pub fn create_label_mask(rows: usize, cols: usize, positives: usize) -> Vec<u16> {
    assert!(
        positives <= rows * cols,
        "{} positives do not fit a {}x{} mask",
        positives,
        rows,
        cols
    );
    let mut mask = vec![0u16; rows * cols];
    mask[..positives].fill(1);
    mask
}

/// Creates a single-band mask with a `height` x `width` block of ones whose
/// upper-left pixel is `(row0, col0)`.
pub fn create_block_mask(
    rows: usize,
    cols: usize,
    row0: usize,
    col0: usize,
    height: usize,
    width: usize,
) -> Vec<u16> {
    let mut mask = vec![0u16; rows * cols];
    for row in row0..(row0 + height).min(rows) {
        for col in col0..(col0 + width).min(cols) {
            mask[row * cols + col] = 1;
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_data_layout() {
        let data = create_pattern_data(3, 5, 7);
        assert_eq!(data.len(), 105);
        for band in 0..3 {
            for row in 0..5 {
                for col in 0..7 {
                    assert_eq!(data[band * 35 + row * 7 + col], pattern_value(band, row, col));
                }
            }
        }
    }

    #[test]
    fn test_pattern_is_never_zero() {
        let data = create_pattern_data(4, 64, 64);
        assert!(data.iter().all(|&v| v != 0));
    }

    #[test]
    fn test_constant_data() {
        let data = create_constant_data(&[5, 9], 2, 3);
        assert_eq!(data, vec![5, 5, 5, 5, 5, 5, 9, 9, 9, 9, 9, 9]);
    }

    #[test]
    fn test_label_mask_count() {
        let mask = create_label_mask(10, 10, 49);
        assert_eq!(mask.iter().filter(|&&v| v > 0).count(), 49);
        assert_eq!(mask[48], 1);
        assert_eq!(mask[49], 0);
    }

    #[test]
    fn test_block_mask_is_clipped() {
        let mask = create_block_mask(4, 4, 2, 2, 5, 5);
        assert_eq!(mask.iter().filter(|&&v| v > 0).count(), 4);
        assert_eq!(mask[2 * 4 + 2], 1);
        assert_eq!(mask[0], 0);
    }
}
