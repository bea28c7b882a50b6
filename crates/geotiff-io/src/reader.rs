//! GeoTIFF decoding into band-major rasters.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use raster_common::{Affine, EpsgCode, GeoRaster, RasterShape};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

use crate::error::{GeoTiffError, Result};
use crate::geokeys::{
    affine_from_tags, decode_epsg, geo_tag, GDAL_NODATA, GEO_KEY_DIRECTORY, MODEL_PIXEL_SCALE,
    MODEL_TIEPOINT, MODEL_TRANSFORMATION,
};

/// Header-level description of a raster, read without decoding pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub shape: RasterShape,
    pub affine: Option<Affine>,
    pub epsg: Option<EpsgCode>,
    pub nodata: Option<f64>,
}

impl RasterInfo {
    /// True when both the transform and the CRS are known.
    pub fn is_georeferenced(&self) -> bool {
        self.affine.is_some() && self.epsg.is_some()
    }
}

fn open(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path).map_err(|source| GeoTiffError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());
    Ok(decoder)
}

/// Number of samples per pixel for the integer layouts we accept.
fn samples_per_pixel(color: ColorType) -> Result<usize> {
    let (bits, samples) = match color {
        ColorType::Gray(bits) => (bits, 1),
        ColorType::GrayA(bits) => (bits, 2),
        ColorType::RGB(bits) => (bits, 3),
        ColorType::RGBA(bits) => (bits, 4),
        ColorType::Multiband {
            bit_depth,
            num_samples,
        } => (bit_depth, num_samples as usize),
        other => {
            return Err(GeoTiffError::Unsupported(format!(
                "color type {:?}",
                other
            )))
        }
    };
    if bits != 8 && bits != 16 {
        return Err(GeoTiffError::Unsupported(format!(
            "{}-bit samples (only 8 and 16 bit are supported)",
            bits
        )));
    }
    Ok(samples)
}

fn read_info<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<RasterInfo> {
    let (width, height) = decoder.dimensions()?;
    let bands = samples_per_pixel(decoder.colortype()?)?;

    let transformation = decoder
        .find_tag(geo_tag(MODEL_TRANSFORMATION))?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let tiepoint = decoder
        .find_tag(geo_tag(MODEL_TIEPOINT))?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let scale = decoder
        .find_tag(geo_tag(MODEL_PIXEL_SCALE))?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let affine = affine_from_tags(
        transformation.as_deref(),
        tiepoint.as_deref(),
        scale.as_deref(),
    );

    let epsg = decoder
        .find_tag(geo_tag(GEO_KEY_DIRECTORY))?
        .map(|v| v.into_u16_vec())
        .transpose()?
        .and_then(|keys| decode_epsg(&keys));

    // GDAL writes nodata as ASCII; anything unparsable is treated as absent
    let nodata = decoder
        .find_tag(geo_tag(GDAL_NODATA))?
        .and_then(|v| v.into_string().ok())
        .and_then(|s| s.trim_end_matches('\0').trim().parse().ok());

    Ok(RasterInfo {
        shape: RasterShape::new(bands, height as usize, width as usize),
        affine,
        epsg,
        nodata,
    })
}

/// Read the shape and georeferencing of a GeoTIFF without decoding pixels.
pub fn read_raster_info(path: impl AsRef<Path>) -> Result<RasterInfo> {
    let path = path.as_ref();
    let mut decoder = open(path)?;
    read_info(&mut decoder)
}

/// Decode all samples as band-major `u16`.
///
/// Only pixel-interleaved files are accepted. Band-separate layouts
/// (PlanarConfiguration 2, GDAL's `INTERLEAVE=BAND`) fail with
/// [`GeoTiffError::Unsupported`].
fn read_band_major<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    shape: RasterShape,
) -> Result<Vec<u16>> {
    if let Some(planar) = decoder.find_tag(Tag::PlanarConfiguration)? {
        if planar.into_u16()? != 1 {
            return Err(GeoTiffError::Unsupported(
                "planar (band-separate) sample layout".to_string(),
            ));
        }
    }

    let interleaved: Vec<u16> = match decoder.read_image()? {
        DecodingResult::U16(data) => data,
        DecodingResult::U8(data) => data.into_iter().map(u16::from).collect(),
        _ => {
            return Err(GeoTiffError::Unsupported(
                "sample format other than unsigned integer".to_string(),
            ))
        }
    };
    if interleaved.len() != shape.len() {
        return Err(GeoTiffError::InvalidData(format!(
            "decoded {} samples, expected {} for shape {}",
            interleaved.len(),
            shape.len(),
            shape
        )));
    }

    if shape.bands == 1 {
        return Ok(interleaved);
    }

    let plane = shape.plane_len();
    let mut data = vec![0u16; shape.len()];
    for (pixel, samples) in interleaved.chunks_exact(shape.bands).enumerate() {
        for (band, &value) in samples.iter().enumerate() {
            data[band * plane + pixel] = value;
        }
    }
    Ok(data)
}

/// Map 1-based band numbers to 0-based indices; empty selects every band.
fn resolve_bands(bands: &[usize], available: usize) -> Result<Vec<usize>> {
    if bands.is_empty() {
        return Ok((0..available).collect());
    }
    bands
        .iter()
        .map(|&band| {
            if band == 0 || band > available {
                Err(GeoTiffError::BandOutOfRange {
                    band,
                    bands: available,
                })
            } else {
                Ok(band - 1)
            }
        })
        .collect()
}

/// Read a georeferenced raster, keeping only `bands` (1-based, in order).
///
/// An empty band list keeps every band. Files without a transform or an EPSG
/// code are rejected with [`GeoTiffError::MissingGeoreference`].
pub fn read_raster(path: impl AsRef<Path>, bands: &[usize]) -> Result<GeoRaster> {
    let path = path.as_ref();
    let mut decoder = open(path)?;
    let info = read_info(&mut decoder)?;

    let affine = info.affine.ok_or_else(|| {
        GeoTiffError::MissingGeoreference(format!("{} has no geotransform", path.display()))
    })?;
    let epsg = info.epsg.ok_or_else(|| {
        GeoTiffError::MissingGeoreference(format!("{} has no EPSG code", path.display()))
    })?;

    let selected = resolve_bands(bands, info.shape.bands)?;
    let data = read_band_major(&mut decoder, info.shape)?;
    let raster = GeoRaster::new(info.shape, data, affine, epsg)?;

    debug!(
        path = %path.display(),
        shape = %info.shape,
        epsg,
        bands = selected.len(),
        "Read raster"
    );

    if selected.len() == info.shape.bands && selected.iter().enumerate().all(|(i, &b)| i == b) {
        Ok(raster)
    } else {
        Ok(raster.select_bands(&selected)?)
    }
}

/// Read the first band of a label raster as a `[1, rows, cols]` mask.
///
/// Labels need not be georeferenced; extra bands are ignored.
pub fn read_mask(path: impl AsRef<Path>) -> Result<(RasterShape, Vec<u16>)> {
    let path = path.as_ref();
    let mut decoder = open(path)?;
    let info = read_info(&mut decoder)?;
    let mut data = read_band_major(&mut decoder, info.shape)?;
    data.truncate(info.shape.plane_len());

    debug!(path = %path.display(), shape = %info.shape, "Read mask");
    Ok((RasterShape::new(1, info.shape.rows, info.shape.cols), data))
}
