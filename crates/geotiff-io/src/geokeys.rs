//! GeoTIFF tag and GeoKey encoding.

use raster_common::{is_geographic, Affine, EpsgCode};
use tiff::tags::Tag;

use crate::error::{GeoTiffError, Result};

// GeoTIFF tag IDs
pub const MODEL_PIXEL_SCALE: u16 = 33550;
pub const MODEL_TIEPOINT: u16 = 33922;
pub const MODEL_TRANSFORMATION: u16 = 34264;
pub const GEO_KEY_DIRECTORY: u16 = 34735;
pub const GDAL_NODATA: u16 = 42113;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

/// Map a numeric tag ID to the decoder's tag type.
///
/// Known IDs resolve to their named variant so lookups in a decoded IFD hit.
pub fn geo_tag(id: u16) -> Tag {
    Tag::from_u16_exhaustive(id)
}

/// Build a GeoKeyDirectory declaring `epsg` as the raster's CRS.
///
/// Layout: `[version, revision, minor, count, (key, location, count, value)*]`
pub fn encode_geokeys(epsg: EpsgCode) -> Result<Vec<u16>> {
    let code = u16::try_from(epsg)
        .ok()
        .filter(|&c| c != 0 && c != USER_DEFINED)
        .ok_or(GeoTiffError::EpsgOutOfRange(epsg))?;

    let (model_type, crs_key) = if is_geographic(epsg) {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_GEO_KEY)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_GEO_KEY)
    };

    let mut keys = vec![1, 1, 0, 3];
    keys.extend_from_slice(&[GT_MODEL_TYPE_GEO_KEY, 0, 1, model_type]);
    keys.extend_from_slice(&[GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);
    keys.extend_from_slice(&[crs_key, 0, 1, code]);
    Ok(keys)
}

/// Extract the EPSG code from a GeoKeyDirectory.
///
/// Projected CRS keys win over geographic ones. User-defined (32767) and
/// out-of-line values yield `None`.
pub fn decode_epsg(directory: &[u16]) -> Option<EpsgCode> {
    if directory.len() < 4 {
        return None;
    }
    let count = directory[3] as usize;
    let entries: Vec<&[u16]> = directory[4..]
        .chunks_exact(4)
        .take(count)
        .collect();

    let inline_value = |key: u16| {
        entries
            .iter()
            .find(|entry| entry[0] == key && entry[1] == 0)
            .map(|entry| entry[3])
            .filter(|&v| v != 0 && v != USER_DEFINED)
    };

    inline_value(PROJECTED_CS_TYPE_GEO_KEY)
        .or_else(|| inline_value(GEOGRAPHIC_TYPE_GEO_KEY))
        .map(EpsgCode::from)
}

/// The transform tags written for a raster.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformTags {
    /// North-up raster: `ModelTiepoint` and `ModelPixelScale`.
    TiepointScale { tiepoint: [f64; 6], scale: [f64; 3] },
    /// Anything else: 4x4 row-major `ModelTransformation`.
    Transformation([f64; 16]),
}

impl TransformTags {
    pub fn from_affine(affine: &Affine) -> Self {
        if affine.is_rectilinear() && affine.a > 0.0 && affine.e < 0.0 {
            TransformTags::TiepointScale {
                tiepoint: [0.0, 0.0, 0.0, affine.c, affine.f, 0.0],
                scale: [affine.a, -affine.e, 0.0],
            }
        } else {
            TransformTags::Transformation([
                affine.a, affine.b, 0.0, affine.c, //
                affine.d, affine.e, 0.0, affine.f, //
                0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ])
        }
    }
}

/// Recover the pixel-to-world transform from whichever tags are present.
///
/// `ModelTransformation` takes precedence; otherwise the first tiepoint and
/// the pixel scale are combined into a north-up transform.
pub fn affine_from_tags(
    transformation: Option<&[f64]>,
    tiepoint: Option<&[f64]>,
    scale: Option<&[f64]>,
) -> Option<Affine> {
    if let Some(m) = transformation.filter(|m| m.len() >= 16) {
        return Some(Affine::new(m[0], m[1], m[3], m[4], m[5], m[7]));
    }

    match (tiepoint, scale) {
        (Some(tp), Some(sc)) if tp.len() >= 6 && sc.len() >= 2 => {
            let (i, j, x, y) = (tp[0], tp[1], tp[3], tp[4]);
            let (sx, sy) = (sc[0], sc[1]);
            Some(Affine::new(sx, 0.0, x - i * sx, 0.0, -sy, y + j * sy))
        }
        _ => None,
    }
}
