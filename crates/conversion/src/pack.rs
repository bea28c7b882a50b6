//! Packing a directory of rasters into one store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use array_store::{layout, StagedStore, StoreAttributes, StoreConfig, StoreLayout, StoreWriter};
use geotiff_io::{read_mask, read_raster, read_raster_info, RasterInfo};
use raster_common::{pad_plane, RasterRecord, RasterShape};
use tracing::{debug, info, warn};

use crate::discovery::{discover_inputs, InputPair};
use crate::error::{ConversionError, Result};
use crate::stats::BandStatistics;

/// Below this smallest/largest side ratio every small image is mostly padding.
const SIDE_RATIO_WARNING: f64 = 0.5;

/// Options for [`convert_img_to_store`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Glob matched against file names below the source root.
    pub file_glob: String,
    /// Glob identifying label files in each image's directory.
    pub label_glob: Option<String>,
    /// 1-based bands to keep, in order; empty keeps all.
    pub image_bands: Vec<usize>,
    /// Chunking and compression of the written store.
    pub config: StoreConfig,
}

impl PackOptions {
    pub fn new(file_glob: impl Into<String>) -> Self {
        Self {
            file_glob: file_glob.into(),
            label_glob: None,
            image_bands: Vec::new(),
            config: StoreConfig::default(),
        }
    }

    pub fn label_glob(mut self, glob: impl Into<String>) -> Self {
        self.label_glob = Some(glob.into());
        self
    }

    pub fn image_bands(mut self, bands: Vec<usize>) -> Self {
        self.image_bands = bands;
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }
}

/// Outcome of a packing pass.
#[derive(Debug, Clone)]
pub struct PackSummary {
    pub destination: PathBuf,
    pub records: usize,
    /// Padded shape shared by every record.
    pub shape: RasterShape,
    pub has_labels: bool,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

/// Validated metadata of one input, gathered before anything is written.
struct PlannedInput {
    pair: InputPair,
    info: RasterInfo,
}

/// Pack every raster below `src_path` matching the options into `dst_file`.
///
/// All inputs are validated before the store is created; the store is
/// written to a staging directory and only appears at `dst_file` on success.
pub fn convert_img_to_store(
    src_path: &Path,
    dst_file: &Path,
    options: &PackOptions,
) -> Result<PackSummary> {
    if dst_file.exists() {
        return Err(ConversionError::StoreExists(dst_file.to_path_buf()));
    }
    options.config.validate()?;

    let pairs = discover_inputs(src_path, &options.file_glob, options.label_glob.as_deref())?;
    if pairs.is_empty() {
        return Err(ConversionError::EmptyDataset {
            root: src_path.to_path_buf(),
            pattern: options.file_glob.clone(),
        });
    }
    info!(
        root = %src_path.display(),
        files = pairs.len(),
        labels = options.label_glob.is_some(),
        "Discovered inputs"
    );

    let planned = validate_inputs(pairs, &options.image_bands)?;
    let bands = match options.image_bands.len() {
        0 => planned[0].info.shape.bands,
        n => n,
    };
    let rows = planned.iter().map(|p| p.info.shape.rows).max().unwrap_or(0);
    let cols = planned.iter().map(|p| p.info.shape.cols).max().unwrap_or(0);
    warn_on_size_disparity(&planned, rows, cols);

    let names: Vec<String> = planned.iter().map(|p| p.pair.name()).collect();
    let store_layout = StoreLayout::new(
        planned.len(),
        bands,
        rows,
        cols,
        layout::name_len(names.iter().map(String::as_str)),
    );
    let has_labels = options.label_glob.is_some();
    let attributes = StoreAttributes {
        has_labels,
        bands: options.image_bands.clone(),
        tiling: None,
    };

    let staged = StagedStore::new(dst_file)?;
    let mut writer = StoreWriter::create(staged.storage()?, store_layout, &attributes, &options.config)?;
    let mut stats = BandStatistics::new(bands);

    for (index, (input, name)) in planned.iter().zip(names).enumerate() {
        let image_path = &input.pair.image;
        let image = read_raster(image_path, &options.image_bands)
            .map_err(|e| ConversionError::raster(image_path, e))?;
        stats.accumulate(&image)?;

        let label = match &input.pair.label {
            Some(label_path) => {
                let (shape, mask) =
                    read_mask(label_path).map_err(|e| ConversionError::raster(label_path, e))?;
                Some(
                    pad_plane(&mask, shape.rows, shape.cols, rows, cols)
                        .map_err(|e| ConversionError::ShapeMismatch(e.to_string()))?,
                )
            }
            None => None,
        };

        let padded = image
            .padded(rows, cols)
            .map_err(|e| ConversionError::ShapeMismatch(e.to_string()))?;
        let record = RasterRecord::new(padded, label, name)
            .map_err(|e| ConversionError::ShapeMismatch(e.to_string()))?;
        writer.write_record(index, &record)?;

        debug!(
            index,
            path = %image_path.display(),
            shape = %image.shape(),
            "Packed image"
        );
    }

    let (means, stds) = stats.finalize();
    writer.write_statistics(&means, &stds)?;
    writer.finish()?;
    let destination = staged.commit()?;

    info!(
        path = %destination.display(),
        records = store_layout.records,
        bands,
        rows,
        cols,
        "Packed store"
    );

    Ok(PackSummary {
        destination,
        records: store_layout.records,
        shape: RasterShape::new(bands, rows, cols),
        has_labels,
        means,
        stds,
    })
}

/// Metadata pass: unique names, georeference, band selection and label extents.
fn validate_inputs(pairs: Vec<InputPair>, image_bands: &[usize]) -> Result<Vec<PlannedInput>> {
    let mut planned: Vec<PlannedInput> = Vec::with_capacity(pairs.len());
    // Names become unpacked file names, so two records may not share one
    let mut seen: HashMap<String, PathBuf> = HashMap::with_capacity(pairs.len());

    for pair in pairs {
        if let Some(first) = seen.insert(pair.name(), pair.image.clone()) {
            return Err(ConversionError::DuplicateName {
                name: pair.name(),
                first,
                second: pair.image.clone(),
            });
        }

        let info = read_raster_info(&pair.image)
            .map_err(|e| ConversionError::raster(&pair.image, e))?;

        if info.affine.is_none() {
            return Err(ConversionError::MissingGeoreference {
                path: pair.image.clone(),
                reason: "no geotransform".to_string(),
            });
        }
        if info.epsg.is_none() {
            return Err(ConversionError::MissingGeoreference {
                path: pair.image.clone(),
                reason: "no EPSG code".to_string(),
            });
        }

        let bands = info.shape.bands;
        if let Some(&band) = image_bands.iter().find(|&&b| b == 0 || b > bands) {
            return Err(ConversionError::BandSelection {
                path: pair.image.clone(),
                band,
                bands,
            });
        }
        if image_bands.is_empty() {
            if let Some(first) = planned.first() {
                if first.info.shape.bands != bands {
                    return Err(ConversionError::ShapeMismatch(format!(
                        "{} has {} bands but {} has {}",
                        pair.image.display(),
                        bands,
                        first.pair.image.display(),
                        first.info.shape.bands
                    )));
                }
            }
        }

        if let Some(label) = &pair.label {
            let label_info =
                read_raster_info(label).map_err(|e| ConversionError::raster(label, e))?;
            if (label_info.shape.rows, label_info.shape.cols) != (info.shape.rows, info.shape.cols)
            {
                return Err(ConversionError::ShapeMismatch(format!(
                    "label {} is {}x{} but image {} is {}x{}",
                    label.display(),
                    label_info.shape.rows,
                    label_info.shape.cols,
                    pair.image.display(),
                    info.shape.rows,
                    info.shape.cols
                )));
            }
        }

        debug!(path = %pair.image.display(), shape = %info.shape, "Validated input");
        planned.push(PlannedInput { pair, info });
    }

    Ok(planned)
}

fn warn_on_size_disparity(planned: &[PlannedInput], rows: usize, cols: usize) {
    let min_rows = planned.iter().map(|p| p.info.shape.rows).min().unwrap_or(rows);
    let min_cols = planned.iter().map(|p| p.info.shape.cols).min().unwrap_or(cols);
    let row_ratio = min_rows as f64 / rows.max(1) as f64;
    let col_ratio = min_cols as f64 / cols.max(1) as f64;
    if row_ratio < SIDE_RATIO_WARNING || col_ratio < SIDE_RATIO_WARNING {
        warn!(
            min_rows,
            min_cols,
            max_rows = rows,
            max_cols = cols,
            "Some images are much smaller than others; all are padded to the largest extent"
        );
    }
}
