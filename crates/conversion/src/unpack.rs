//! Writing store records back out as GeoTIFF files.

use std::path::{Path, PathBuf};

use array_store::StoreReader;
use geotiff_io::GeoTiffWriter;
use raster_common::{GeoRaster, RasterRecord, RasterShape};
use tracing::{debug, info};

use crate::error::{ConversionError, Result};

/// Nodata value written to unpacked rasters.
const NODATA: f64 = 0.0;

/// Which records to unpack.
///
/// Indices may be negative and then count from the end, so `-1` is the last
/// record. Valid indices lie in `-N..N`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IndexSelection {
    #[default]
    All,
    Single(i64),
    List(Vec<i64>),
    /// Half-open `start..end`; a missing end runs to the last record.
    ///
    /// Negative bounds count from the end. Each index is still checked
    /// individually, so an end past N fails when it is reached.
    Range { start: i64, end: Option<i64> },
}

impl IndexSelection {
    /// Requested indices in processing order, before range checks.
    pub fn indices(&self, len: usize) -> Vec<i64> {
        match self {
            IndexSelection::All => (0..len as i64).collect(),
            IndexSelection::Single(i) => vec![*i],
            IndexSelection::List(list) => list.clone(),
            IndexSelection::Range { start, end } => {
                let n = len as i64;
                let from_end = |i: i64| if i < 0 { i + n } else { i };
                (from_end(*start)..end.map_or(n, from_end)).collect()
            }
        }
    }

    /// Parse `start:end`; either side may be omitted.
    pub fn parse_range(s: &str) -> Option<Self> {
        let (start, end) = s.split_once(':')?;
        let start = match start.trim() {
            "" => 0,
            part => part.parse().ok()?,
        };
        let end = match end.trim() {
            "" => None,
            part => Some(part.parse().ok()?),
        };
        Some(IndexSelection::Range { start, end })
    }
}

/// Map a possibly negative index onto `0..len`.
pub fn normalize_index(index: i64, len: usize) -> Result<usize> {
    let n = len as i64;
    if index >= n || index < -n {
        return Err(ConversionError::IndexOutOfRange { index, len });
    }
    Ok(if index < 0 { (n + index) as usize } else { index as usize })
}

/// Files written by an unpacking pass.
#[derive(Debug, Clone, Default)]
pub struct UnpackSummary {
    pub written: Vec<PathBuf>,
}

/// Unpack the selected records of `src_file` into `dst_folder`.
///
/// Each record `i` becomes `<name>.tif` and, for stores with labels,
/// `<name>_label.tif`. Records are processed in selection order and the pass
/// stops at the first failure; files from earlier records stay in place.
pub fn convert_store_to_img(
    src_file: &Path,
    dst_folder: &Path,
    index: &IndexSelection,
) -> Result<UnpackSummary> {
    let reader = StoreReader::open_dir(src_file)?;
    std::fs::create_dir_all(dst_folder)?;

    let indices = index.indices(reader.len());
    info!(
        store = %src_file.display(),
        destination = %dst_folder.display(),
        requested = indices.len(),
        "Unpacking store"
    );

    let mut summary = UnpackSummary::default();
    for raw in indices {
        let i = normalize_index(raw, reader.len())?;
        let record = reader.read_record(i)?;
        let files = write_record_files(record, dst_folder)?;
        debug!(index = i, files = files.len(), "Unpacked record");
        summary.written.extend(files);
    }

    info!(files = summary.written.len(), "Unpacked store");
    Ok(summary)
}

/// Write one record's image and label files, refusing to replace either.
fn write_record_files(record: RasterRecord, dst_folder: &Path) -> Result<Vec<PathBuf>> {
    let image_path = dst_folder.join(format!("{}.tif", record.name));
    let label_path = record
        .label
        .as_ref()
        .map(|_| dst_folder.join(format!("{}_label.tif", record.name)));

    for path in std::iter::once(&image_path).chain(label_path.as_ref()) {
        if path.exists() {
            return Err(ConversionError::FileExists(path.clone()));
        }
    }

    GeoTiffWriter::new(&record.image)
        .nodata(NODATA)
        .write(&image_path)
        .map_err(|e| ConversionError::raster(&image_path, e))?;
    let mut written = vec![image_path];

    if let (Some(label), Some(label_path)) = (record.label, label_path) {
        let image = &record.image;
        let mask = GeoRaster::new(
            RasterShape::new(1, image.rows(), image.cols()),
            label,
            image.affine,
            image.epsg,
        )
        .map_err(|e| ConversionError::ShapeMismatch(e.to_string()))?;
        GeoTiffWriter::new(&mask)
            .nodata(NODATA)
            .write(&label_path)
            .map_err(|e| ConversionError::raster(&label_path, e))?;
        written.push(label_path);
    }

    Ok(written)
}
