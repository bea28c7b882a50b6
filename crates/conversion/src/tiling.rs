//! Re-tiling a packed store into fixed-size, possibly overlapping patches.
//!
//! Every record of the source store shares one padded extent, so one tile
//! grid applies to all of them. A tile at pixel offset `(row0, col0)` gets
//! the transform `parent ∘ translate(col0, row0)`.

use std::path::{Path, PathBuf};

use array_store::{
    layout, StagedStore, StoreAttributes, StoreConfig, StoreLayout, StoreReader, StoreWriter,
    TilingAttributes,
};
use raster_common::{window_plane, RasterRecord};
use tracing::{debug, info, warn};

use crate::error::{ConversionError, Result};
use crate::stats::BandStatistics;

/// Options for [`tile_store`].
#[derive(Debug, Clone)]
pub struct TileOptions {
    /// Side length of the square tiles, in pixels.
    pub tile_size: usize,
    /// Pixels shared by neighbouring tiles; the stride is `tile_size - overlap`.
    pub overlap: usize,
    /// Minimum number of positive label pixels a tile needs to be kept.
    pub target_size: Option<u64>,
    /// Chunking and compression of the written store.
    pub config: StoreConfig,
}

impl TileOptions {
    pub fn new(tile_size: usize, overlap: usize) -> Self {
        Self {
            tile_size,
            overlap,
            target_size: None,
            config: StoreConfig::default(),
        }
    }

    pub fn target_size(mut self, target_size: u64) -> Self {
        self.target_size = Some(target_size);
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Distance between the origins of neighbouring tiles.
    pub fn stride(&self) -> usize {
        self.tile_size.saturating_sub(self.overlap)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(ConversionError::InvalidTiling(
                "tile_size must be > 0".to_string(),
            ));
        }
        if self.overlap >= self.tile_size {
            return Err(ConversionError::InvalidTiling(format!(
                "overlap {} must be smaller than tile_size {}",
                self.overlap, self.tile_size
            )));
        }
        Ok(())
    }
}

/// Tile origins along one axis.
///
/// Offsets step by `stride` while a whole tile fits. When the last regular
/// tile stops short of `extent`, one more tile flush with the far edge is
/// added, so the union of tiles always covers the axis.
pub fn tile_offsets(extent: usize, tile_size: usize, stride: usize) -> Vec<usize> {
    let mut offsets = Vec::new();
    if tile_size == 0 || stride == 0 || tile_size > extent {
        return offsets;
    }
    let mut pos = 0;
    while pos + tile_size <= extent {
        offsets.push(pos);
        pos += stride;
    }
    if let Some(&last) = offsets.last() {
        if last + tile_size < extent {
            offsets.push(extent - tile_size);
        }
    }
    offsets
}

/// One tile window inside a parent image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileWindow {
    /// Row-major position in the grid.
    pub index: usize,
    pub row0: usize,
    pub col0: usize,
}

/// The grid of tile windows for one image extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    pub tile_size: usize,
    pub row_offsets: Vec<usize>,
    pub col_offsets: Vec<usize>,
}

impl TileGrid {
    /// Plan the grid for a `rows` x `cols` extent.
    pub fn new(rows: usize, cols: usize, options: &TileOptions) -> Result<Self> {
        options.validate()?;
        if options.tile_size > rows || options.tile_size > cols {
            return Err(ConversionError::TileLargerThanImage {
                tile_size: options.tile_size,
                rows,
                cols,
            });
        }
        Ok(Self {
            tile_size: options.tile_size,
            row_offsets: tile_offsets(rows, options.tile_size, options.stride()),
            col_offsets: tile_offsets(cols, options.tile_size, options.stride()),
        })
    }

    pub fn len(&self) -> usize {
        self.row_offsets.len() * self.col_offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Windows in row-major order.
    pub fn windows(&self) -> impl Iterator<Item = TileWindow> + '_ {
        self.row_offsets.iter().flat_map(move |&row0| {
            self.col_offsets.iter().map(move |&col0| (row0, col0))
        })
        .enumerate()
        .map(|(index, (row0, col0))| TileWindow { index, row0, col0 })
    }

    /// Tile name `<parent>_<index>`, zero-padded to the digits of the grid size.
    pub fn tile_name(&self, parent: &str, index: usize) -> String {
        let width = self.len().to_string().len();
        format!("{}_{:0width$}", parent, index, width = width)
    }
}

/// Outcome of a tiling pass.
#[derive(Debug, Clone)]
pub struct TileSummary {
    pub destination: PathBuf,
    /// Records in the source store.
    pub parents: usize,
    /// Tiles per parent before filtering.
    pub tiles_per_parent: usize,
    /// Tiles written.
    pub records: usize,
    /// Tiles removed by the target-size filter.
    pub dropped: usize,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

/// A tile that survived filtering.
struct PlannedTile {
    window: TileWindow,
    name: String,
}

/// Count of positive pixels in a label window.
fn positive_pixels(label: &[u16], cols: usize, window: TileWindow, tile_size: usize) -> u64 {
    (window.row0..window.row0 + tile_size)
        .map(|row| {
            let start = row * cols + window.col0;
            label[start..start + tile_size]
                .iter()
                .filter(|&&v| v > 0)
                .count() as u64
        })
        .sum()
}

/// Tile every record of `src_file` into a new store at `dst_file`.
///
/// With a target size, tiles whose label holds fewer positive pixels are
/// dropped (a tile with exactly `target_size` positives is kept). Band
/// statistics are recomputed over the written tiles.
pub fn tile_store(src_file: &Path, dst_file: &Path, options: &TileOptions) -> Result<TileSummary> {
    options.validate()?;
    options.config.validate()?;
    if dst_file.exists() {
        return Err(ConversionError::StoreExists(dst_file.to_path_buf()));
    }

    let reader = StoreReader::open_dir(src_file)?;
    let src_layout = reader.layout();
    let grid = TileGrid::new(src_layout.rows, src_layout.cols, options)?;
    info!(
        store = %src_file.display(),
        parents = reader.len(),
        tile_size = options.tile_size,
        overlap = options.overlap,
        tiles_per_parent = grid.len(),
        "Tiling store"
    );

    if options.target_size.is_some() && !reader.has_labels() {
        warn!(
            store = %src_file.display(),
            "Target size set but the store has no labels; every tile counts zero positives"
        );
    }

    // Label pass: decide which tiles survive before anything is written
    let mut planned: Vec<Vec<PlannedTile>> = Vec::with_capacity(reader.len());
    for parent in 0..reader.len() {
        let parent_name = reader.read_name(parent)?;
        let label = match options.target_size {
            Some(_) => reader.read_label(parent)?,
            None => None,
        };

        let mut kept = Vec::new();
        for window in grid.windows() {
            if let Some(target) = options.target_size {
                let positives = label
                    .as_deref()
                    .map(|l| positive_pixels(l, src_layout.cols, window, grid.tile_size))
                    .unwrap_or(0);
                if positives < target {
                    continue;
                }
            }
            kept.push(PlannedTile {
                window,
                name: grid.tile_name(&parent_name, window.index),
            });
        }
        debug!(
            parent,
            name = %parent_name,
            kept = kept.len(),
            total = grid.len(),
            "Planned tiles"
        );
        planned.push(kept);
    }

    let total = reader.len() * grid.len();
    let records: usize = planned.iter().map(Vec::len).sum();
    if records == 0 {
        return Err(ConversionError::EmptyTileSet {
            tiles: total,
            target_size: options.target_size.unwrap_or(0),
        });
    }

    let tile = grid.tile_size;
    let dst_layout = StoreLayout::new(
        records,
        src_layout.bands,
        tile,
        tile,
        layout::name_len(planned.iter().flatten().map(|p| p.name.as_str())),
    );
    let attributes = StoreAttributes {
        has_labels: reader.has_labels(),
        bands: reader.attributes().bands.clone(),
        tiling: Some(TilingAttributes {
            tile_size: tile,
            overlap: options.overlap,
            target_size: options.target_size,
            parents: reader.len(),
        }),
    };

    // Image pass: each parent with surviving tiles is read once
    let staged = StagedStore::new(dst_file)?;
    let mut writer = StoreWriter::create(staged.storage()?, dst_layout, &attributes, &options.config)?;
    let mut stats = BandStatistics::new(src_layout.bands);
    let mut index = 0;

    for (parent_index, tiles) in planned.iter().enumerate() {
        if tiles.is_empty() {
            continue;
        }
        let parent = reader.read_record(parent_index)?;

        for tile_plan in tiles {
            let TileWindow { row0, col0, .. } = tile_plan.window;
            let image = parent
                .image
                .window(row0, col0, tile, tile)
                .map_err(|e| ConversionError::ShapeMismatch(e.to_string()))?;
            let label = parent
                .label
                .as_deref()
                .map(|l| window_plane(l, src_layout.rows, src_layout.cols, row0, col0, tile, tile))
                .transpose()
                .map_err(|e| ConversionError::ShapeMismatch(e.to_string()))?;

            stats.accumulate(&image)?;
            let record = RasterRecord::new(image, label, tile_plan.name.clone())
                .map_err(|e| ConversionError::ShapeMismatch(e.to_string()))?;
            writer.write_record(index, &record)?;
            index += 1;
        }
    }

    let (means, stds) = stats.finalize();
    writer.write_statistics(&means, &stds)?;
    writer.finish()?;
    let destination = staged.commit()?;

    info!(
        path = %destination.display(),
        records,
        dropped = total - records,
        "Tiled store"
    );

    Ok(TileSummary {
        destination,
        parents: reader.len(),
        tiles_per_parent: grid.len(),
        records,
        dropped: total - records,
        means,
        stds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_with_trailing_tile() {
        assert_eq!(tile_offsets(300, 128, 128), vec![0, 128, 172]);
    }

    #[test]
    fn test_offsets_exact_fit() {
        assert_eq!(tile_offsets(256, 128, 128), vec![0, 128]);
        assert_eq!(tile_offsets(128, 128, 128), vec![0]);
    }

    #[test]
    fn test_offsets_with_overlap() {
        // stride 64: 0, 64, 128 fit in 200; 192 would not, so 72 is appended
        assert_eq!(tile_offsets(200, 128, 64), vec![0, 64, 72]);
        assert_eq!(tile_offsets(256, 128, 64), vec![0, 64, 128]);
    }

    #[test]
    fn test_offsets_tile_too_large() {
        assert!(tile_offsets(100, 128, 128).is_empty());
    }

    #[test]
    fn test_grid_covers_300_by_300_with_nine_tiles() {
        let grid = TileGrid::new(300, 300, &TileOptions::new(128, 0)).unwrap();
        assert_eq!(grid.len(), 9);
        let windows: Vec<_> = grid.windows().collect();
        assert_eq!(windows[0], TileWindow { index: 0, row0: 0, col0: 0 });
        assert_eq!(windows[5], TileWindow { index: 5, row0: 128, col0: 172 });
        assert_eq!(windows[8], TileWindow { index: 8, row0: 172, col0: 172 });
    }

    #[test]
    fn test_grid_errors() {
        assert!(matches!(
            TileGrid::new(100, 300, &TileOptions::new(128, 0)),
            Err(ConversionError::TileLargerThanImage { tile_size: 128, rows: 100, cols: 300 })
        ));
        assert!(matches!(
            TileGrid::new(300, 300, &TileOptions::new(128, 128)),
            Err(ConversionError::InvalidTiling(_))
        ));
        assert!(matches!(
            TileGrid::new(300, 300, &TileOptions::new(0, 0)),
            Err(ConversionError::InvalidTiling(_))
        ));
    }

    #[test]
    fn test_tile_names_are_zero_padded() {
        let grid = TileGrid::new(300, 300, &TileOptions::new(32, 0)).unwrap();
        // 10 x 10 grid (9 regular + 1 trailing per axis) = 100 tiles, 3 digits
        assert_eq!(grid.len(), 100);
        assert_eq!(grid.tile_name("scene", 7), "scene_007");

        let small = TileGrid::new(300, 300, &TileOptions::new(128, 0)).unwrap();
        assert_eq!(small.tile_name("scene", 7), "scene_7");
    }

    #[test]
    fn test_positive_pixel_count() {
        // 4x4 label, positives in the top-left 2x2 block plus one stray pixel
        let label = vec![
            1, 1, 0, 0, //
            1, 1, 0, 0, //
            0, 0, 0, 3, //
            0, 0, 0, 0,
        ];
        let top_left = TileWindow { index: 0, row0: 0, col0: 0 };
        let bottom_right = TileWindow { index: 3, row0: 2, col0: 2 };
        assert_eq!(positive_pixels(&label, 4, top_left, 2), 4);
        assert_eq!(positive_pixels(&label, 4, bottom_right, 2), 1);
    }
}
