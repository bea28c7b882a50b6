//! Zarr V3 writer for packed raster stores.
//!
//! Stores are written once: [`StoreWriter::create`] lays out every dataset,
//! records are filled by index, and [`StoreWriter::finish`] checks that
//! nothing was left unwritten. [`StagedStore`] provides the staging
//! directory that makes a whole pass atomic.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use raster_common::RasterRecord;
use tempfile::TempDir;
use tracing::{debug, info};
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::codec::BytesToBytesCodecTraits;
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs::storage::{ReadableStorageTraits, WritableStorageTraits};
use zarrs_filesystem::FilesystemStore;

use crate::config::{StoreCompression, StoreConfig};
use crate::error::{Result, StoreError};
use crate::layout::{
    encode_name, node_path, StoreAttributes, StoreLayout, AFFINE, EPSG, IMG, IMG_MEANS, IMG_STDS,
    LBL, PATH,
};

/// Writer for a single packed store.
pub struct StoreWriter<S: ReadableStorageTraits + WritableStorageTraits + 'static> {
    layout: StoreLayout,
    has_labels: bool,
    img: Array<S>,
    lbl: Array<S>,
    affine: Array<S>,
    epsg: Array<S>,
    path: Array<S>,
    means: Array<S>,
    stds: Array<S>,
    written: Vec<bool>,
    statistics_written: bool,
}

impl<S: ReadableStorageTraits + WritableStorageTraits + 'static> StoreWriter<S> {
    /// Create the root group and every dataset, with metadata only.
    pub fn create(
        storage: S,
        layout: StoreLayout,
        attributes: &StoreAttributes,
        config: &StoreConfig,
    ) -> Result<Self> {
        layout.validate()?;
        config.validate()?;
        let store = Arc::new(storage);

        let group = GroupBuilder::new()
            .attributes(attributes.to_map()?)
            .build(store.clone(), "/")
            .map_err(StoreError::zarr)?;
        group.store_metadata().map_err(StoreError::zarr)?;

        let chunk = config.chunk_size.min(layout.records) as u64;
        let pixel_codecs = match config.compression {
            StoreCompression::None => Vec::new(),
            _ => vec![create_compression_codec(config)?],
        };

        let img = build_array(
            &store,
            IMG,
            layout.img_shape(),
            vec![chunk, layout.bands as u64, layout.rows as u64, layout.cols as u64],
            DataType::UInt16,
            FillValue::from(0u16),
            pixel_codecs.clone(),
        )?;
        let lbl = build_array(
            &store,
            LBL,
            layout.lbl_shape(),
            vec![chunk, layout.rows as u64, layout.cols as u64],
            DataType::UInt16,
            FillValue::from(0u16),
            pixel_codecs,
        )?;
        let affine = build_array(
            &store,
            AFFINE,
            layout.affine_shape(),
            layout.affine_shape(),
            DataType::Float64,
            FillValue::from(0f64),
            Vec::new(),
        )?;
        let epsg = build_array(
            &store,
            EPSG,
            layout.epsg_shape(),
            layout.epsg_shape(),
            DataType::UInt32,
            FillValue::from(0u32),
            Vec::new(),
        )?;
        let path = build_array(
            &store,
            PATH,
            layout.path_shape(),
            layout.path_shape(),
            DataType::UInt8,
            FillValue::from(0u8),
            Vec::new(),
        )?;
        let means = build_array(
            &store,
            IMG_MEANS,
            layout.stats_shape(),
            layout.stats_shape(),
            DataType::Float64,
            FillValue::from(0f64),
            Vec::new(),
        )?;
        let stds = build_array(
            &store,
            IMG_STDS,
            layout.stats_shape(),
            layout.stats_shape(),
            DataType::Float64,
            FillValue::from(0f64),
            Vec::new(),
        )?;

        debug!(
            records = layout.records,
            bands = layout.bands,
            rows = layout.rows,
            cols = layout.cols,
            chunk,
            compression = %config.compression,
            "Created store datasets"
        );

        Ok(Self {
            layout,
            has_labels: attributes.has_labels,
            img,
            lbl,
            affine,
            epsg,
            path,
            means,
            stds,
            written: vec![false; layout.records],
            statistics_written: false,
        })
    }

    pub fn layout(&self) -> StoreLayout {
        self.layout
    }

    /// Write record `index` into every per-record dataset.
    ///
    /// The image must already have the store's padded shape. Stores created
    /// without labels reject records carrying one and vice versa.
    pub fn write_record(&mut self, index: usize, record: &RasterRecord) -> Result<()> {
        let layout = self.layout;
        if index >= layout.records {
            return Err(StoreError::IndexOutOfRange {
                index,
                len: layout.records,
            });
        }

        let shape = record.image.shape();
        if (shape.bands, shape.rows, shape.cols) != (layout.bands, layout.rows, layout.cols) {
            return Err(StoreError::layout(format!(
                "record '{}' has shape {}, store expects [{}, {}, {}]",
                record.name, shape, layout.bands, layout.rows, layout.cols
            )));
        }

        let i = index as u64;
        let img_subset = subset(
            vec![i, 0, 0, 0],
            vec![1, layout.bands as u64, layout.rows as u64, layout.cols as u64],
        )?;
        self.img
            .store_array_subset_elements(&img_subset, record.image.data())
            .map_err(StoreError::zarr)?;

        match (&record.label, self.has_labels) {
            (Some(label), true) => {
                let lbl_subset =
                    subset(vec![i, 0, 0], vec![1, layout.rows as u64, layout.cols as u64])?;
                self.lbl
                    .store_array_subset_elements(&lbl_subset, label)
                    .map_err(StoreError::zarr)?;
            }
            (None, false) => {}
            (Some(_), false) => {
                return Err(StoreError::layout(format!(
                    "record '{}' has a label but the store was created without labels",
                    record.name
                )))
            }
            (None, true) => {
                return Err(StoreError::layout(format!(
                    "record '{}' has no label but the store requires one",
                    record.name
                )))
            }
        }

        let affine_subset = subset(vec![i, 0], vec![1, 6])?;
        self.affine
            .store_array_subset_elements(&affine_subset, &record.image.affine.to_gdal())
            .map_err(StoreError::zarr)?;

        let epsg_subset = subset(vec![i], vec![1])?;
        self.epsg
            .store_array_subset_elements(&epsg_subset, &[record.image.epsg])
            .map_err(StoreError::zarr)?;

        let name = encode_name(&record.name, layout.name_len)?;
        let path_subset = subset(vec![i, 0], vec![1, layout.name_len as u64])?;
        self.path
            .store_array_subset_elements(&path_subset, &name)
            .map_err(StoreError::zarr)?;

        self.written[index] = true;
        debug!(index, name = %record.name, "Wrote record");
        Ok(())
    }

    /// Write the per-band normalization statistics.
    pub fn write_statistics(&mut self, means: &[f64], stds: &[f64]) -> Result<()> {
        let bands = self.layout.bands;
        if means.len() != bands || stds.len() != bands {
            return Err(StoreError::layout(format!(
                "statistics for {} / {} bands, store has {}",
                means.len(),
                stds.len(),
                bands
            )));
        }
        let stats_subset = subset(vec![0], vec![bands as u64])?;
        self.means
            .store_array_subset_elements(&stats_subset, means)
            .map_err(StoreError::zarr)?;
        self.stds
            .store_array_subset_elements(&stats_subset, stds)
            .map_err(StoreError::zarr)?;
        self.statistics_written = true;
        Ok(())
    }

    /// Check that every record and the statistics were written.
    pub fn finish(self) -> Result<StoreLayout> {
        if let Some(missing) = self.written.iter().position(|w| !w) {
            return Err(StoreError::layout(format!(
                "record {} of {} was never written",
                missing, self.layout.records
            )));
        }
        if !self.statistics_written {
            return Err(StoreError::layout("band statistics were never written"));
        }
        Ok(self.layout)
    }
}

fn subset(start: Vec<u64>, shape: Vec<u64>) -> Result<ArraySubset> {
    ArraySubset::new_with_start_shape(start, shape).map_err(StoreError::zarr)
}

fn build_array<S: ReadableStorageTraits + WritableStorageTraits + 'static>(
    store: &Arc<S>,
    name: &str,
    shape: Vec<u64>,
    chunk_shape: Vec<u64>,
    data_type: DataType,
    fill_value: FillValue,
    codecs: Vec<Arc<dyn BytesToBytesCodecTraits>>,
) -> Result<Array<S>> {
    let chunk_grid: zarrs::array::ChunkGrid = chunk_shape
        .try_into()
        .map_err(|e| StoreError::Config(format!("{:?}", e)))?;

    let mut builder = ArrayBuilder::new(shape, data_type, chunk_grid, fill_value);
    if !codecs.is_empty() {
        builder.bytes_to_bytes_codecs(codecs);
    }

    let array = builder
        .build(store.clone(), &node_path(name))
        .map_err(StoreError::zarr)?;
    array.store_metadata().map_err(StoreError::zarr)?;
    Ok(array)
}

/// Create the Blosc codec for the u16 pixel datasets.
fn create_compression_codec(config: &StoreConfig) -> Result<Arc<dyn BytesToBytesCodecTraits>> {
    let level = BloscCompressionLevel::try_from(config.compression_level)
        .map_err(|_| StoreError::Config("Invalid compression level".to_string()))?;

    let shuffle = if config.shuffle {
        BloscShuffleMode::Shuffle
    } else {
        BloscShuffleMode::NoShuffle
    };

    // typesize is required when shuffle is enabled
    let typesize = if config.shuffle {
        Some(std::mem::size_of::<u16>())
    } else {
        None
    };

    let compressor = match config.compression {
        StoreCompression::None => {
            return Err(StoreError::Config(
                "No compression configured".to_string(),
            ))
        }
        StoreCompression::BloscLz4 => BloscCompressor::LZ4,
        StoreCompression::BloscZstd => BloscCompressor::Zstd,
    };

    let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
        .map_err(|e| StoreError::Config(e.to_string()))?;

    Ok(Arc::new(codec))
}

/// A store being written into a hidden sibling directory of its destination.
///
/// Dropping an uncommitted `StagedStore` removes the staging directory, so a
/// failed pass leaves nothing behind.
pub struct StagedStore {
    destination: PathBuf,
    staging: TempDir,
}

impl StagedStore {
    /// Reserve a staging directory next to `destination`.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if the destination is taken.
    pub fn new(destination: impl AsRef<Path>) -> Result<Self> {
        let destination = destination.as_ref().to_path_buf();
        if destination.exists() {
            return Err(StoreError::AlreadyExists(destination));
        }

        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let stem = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}.staging-", stem))
            .tempdir_in(&parent)?;

        debug!(
            destination = %destination.display(),
            staging = %staging.path().display(),
            "Staging store"
        );
        Ok(Self {
            destination,
            staging,
        })
    }

    /// Directory the store is being written into.
    pub fn path(&self) -> &Path {
        self.staging.path()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Filesystem storage rooted at the staging directory.
    pub fn storage(&self) -> Result<FilesystemStore> {
        FilesystemStore::new(self.staging.path()).map_err(StoreError::zarr)
    }

    /// Move the finished store to its destination.
    pub fn commit(self) -> Result<PathBuf> {
        if self.destination.exists() {
            return Err(StoreError::AlreadyExists(self.destination));
        }
        // Take the directory out of TempDir's cleanup before it moves
        #[allow(deprecated)]
        let staging = self.staging.into_path();
        if let Err(e) = std::fs::rename(&staging, &self.destination) {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e.into());
        }

        info!(path = %self.destination.display(), "Committed store");
        Ok(self.destination)
    }
}
