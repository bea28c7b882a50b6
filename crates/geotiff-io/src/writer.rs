//! GeoTIFF encoding for band-major rasters.

use std::fs::OpenOptions;
use std::io::{BufWriter, ErrorKind, Seek, Write};
use std::path::Path;

use raster_common::GeoRaster;
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::debug;

use crate::error::{GeoTiffError, Result};
use crate::geokeys::{
    encode_geokeys, geo_tag, TransformTags, GDAL_NODATA, GEO_KEY_DIRECTORY, MODEL_PIXEL_SCALE,
    MODEL_TIEPOINT, MODEL_TRANSFORMATION,
};

/// Target uncompressed size of one strip.
const STRIP_BYTES: usize = 1 << 20;

/// Builder that writes a [`GeoRaster`] as an uncompressed 16-bit GeoTIFF.
///
/// Samples are pixel-interleaved; band `i` of the raster becomes sample `i`.
pub struct GeoTiffWriter<'a> {
    raster: &'a GeoRaster,
    nodata: Option<f64>,
    rows_per_strip: Option<usize>,
}

impl<'a> GeoTiffWriter<'a> {
    pub fn new(raster: &'a GeoRaster) -> Self {
        Self {
            raster,
            nodata: None,
            rows_per_strip: None,
        }
    }

    /// Record a nodata value in the `GDAL_NODATA` tag.
    pub fn nodata(mut self, value: f64) -> Self {
        self.nodata = Some(value);
        self
    }

    /// Override the number of rows per strip (defaults to ~1 MiB strips).
    pub fn rows_per_strip(mut self, rows: usize) -> Self {
        self.rows_per_strip = Some(rows.max(1));
        self
    }

    /// Write to a new file. Existing files are never replaced.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => GeoTiffError::AlreadyExists(path.to_path_buf()),
                _ => GeoTiffError::Open {
                    path: path.to_path_buf(),
                    source: e,
                },
            })?;

        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;

        debug!(
            path = %path.display(),
            shape = %self.raster.shape(),
            epsg = self.raster.epsg,
            "Wrote GeoTIFF"
        );
        Ok(())
    }

    /// Encode into any seekable sink.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let shape = self.raster.shape();
        if shape.is_empty() {
            return Err(GeoTiffError::InvalidData(format!(
                "cannot write raster with shape {}",
                shape
            )));
        }
        let width = u32::try_from(shape.cols)
            .map_err(|_| GeoTiffError::Unsupported(format!("width {}", shape.cols)))?;
        let height = u32::try_from(shape.rows)
            .map_err(|_| GeoTiffError::Unsupported(format!("height {}", shape.rows)))?;
        let bands = u16::try_from(shape.bands)
            .map_err(|_| GeoTiffError::Unsupported(format!("{} bands", shape.bands)))?;

        let row_bytes = shape.cols * shape.bands * 2;
        let rows_per_strip = self
            .rows_per_strip
            .unwrap_or_else(|| (STRIP_BYTES / row_bytes).max(1))
            .min(shape.rows);

        let mut encoder = TiffEncoder::new(writer)?;
        let mut dir = encoder.image_directory()?;

        dir.write_tag(Tag::ImageWidth, width)?;
        dir.write_tag(Tag::ImageLength, height)?;
        dir.write_tag(Tag::BitsPerSample, vec![16u16; shape.bands].as_slice())?;
        dir.write_tag(Tag::Compression, 1u16)?;
        // BlackIsZero
        dir.write_tag(Tag::PhotometricInterpretation, 1u16)?;
        dir.write_tag(Tag::SamplesPerPixel, bands)?;
        // Unsigned integer
        dir.write_tag(Tag::SampleFormat, vec![1u16; shape.bands].as_slice())?;
        dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
        dir.write_tag(Tag::RowsPerStrip, rows_per_strip as u32)?;
        if shape.bands > 1 {
            dir.write_tag(Tag::ExtraSamples, vec![0u16; shape.bands - 1].as_slice())?;
        }

        self.write_geo_tags(&mut dir)?;

        let interleaved = self.interleaved_le_bytes();
        let strip_len = rows_per_strip * row_bytes;
        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        for strip in interleaved.chunks(strip_len) {
            let offset = dir.write_data(strip)?;
            offsets.push(u32::try_from(offset).map_err(|_| {
                GeoTiffError::Unsupported("file larger than 4 GiB (BigTIFF)".to_string())
            })?);
            counts.push(strip.len() as u32);
        }
        dir.write_tag(Tag::StripOffsets, offsets.as_slice())?;
        dir.write_tag(Tag::StripByteCounts, counts.as_slice())?;

        dir.finish()?;
        Ok(())
    }

    fn write_geo_tags<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut DirectoryEncoder<W, K>,
    ) -> Result<()> {
        match TransformTags::from_affine(&self.raster.affine) {
            TransformTags::TiepointScale { tiepoint, scale } => {
                dir.write_tag(geo_tag(MODEL_PIXEL_SCALE), scale.as_slice())?;
                dir.write_tag(geo_tag(MODEL_TIEPOINT), tiepoint.as_slice())?;
            }
            TransformTags::Transformation(matrix) => {
                dir.write_tag(geo_tag(MODEL_TRANSFORMATION), matrix.as_slice())?;
            }
        }

        let geokeys = encode_geokeys(self.raster.epsg)?;
        dir.write_tag(geo_tag(GEO_KEY_DIRECTORY), geokeys.as_slice())?;

        if let Some(nodata) = self.nodata {
            dir.write_tag(geo_tag(GDAL_NODATA), format!("{}", nodata).as_str())?;
        }
        Ok(())
    }

    /// Band-major samples as pixel-interleaved little-endian bytes.
    fn interleaved_le_bytes(&self) -> Vec<u8> {
        let shape = self.raster.shape();
        let plane = shape.plane_len();
        let data = self.raster.data();
        let mut bytes = Vec::with_capacity(shape.len() * 2);
        for pixel in 0..plane {
            for band in 0..shape.bands {
                bytes.extend_from_slice(&data[band * plane + pixel].to_le_bytes());
            }
        }
        bytes
    }
}
