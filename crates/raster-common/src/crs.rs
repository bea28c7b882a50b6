//! Coordinate Reference System helpers.
//!
//! Rasters carry their CRS as a bare EPSG integer; no datum or projection
//! math happens in this workspace.

/// EPSG code of a coordinate reference system.
pub type EpsgCode = u32;

/// Range of EPSG codes used for geographic 2D/3D systems (WGS84 = 4326, NAD83 = 4269, ...).
const GEOGRAPHIC_CODES: std::ops::RangeInclusive<EpsgCode> = 4000..=4999;

/// Check if an EPSG code denotes a geographic (lat/lon) CRS.
///
/// Heuristic: codes in 4000..=4999 are geographic, everything else is treated
/// as projected. Good enough for GeoTIFF key selection.
pub fn is_geographic(epsg: EpsgCode) -> bool {
    GEOGRAPHIC_CODES.contains(&epsg)
}
