//! Dataset names, shapes and group attributes of a packed store.
//!
//! A store is a Zarr V3 hierarchy with one root group and seven arrays:
//!
//! | array       | shape                  | type |
//! |-------------|------------------------|------|
//! | `img`       | `[N, bands, rows, cols]` | u16  |
//! | `lbl`       | `[N, rows, cols]`        | u16  |
//! | `affine`    | `[N, 6]` (GDAL order)    | f64  |
//! | `epsg`      | `[N]`                    | u32  |
//! | `path`      | `[N, L]` zero-padded UTF-8 | u8 |
//! | `img_means` | `[bands]`                | f64  |
//! | `img_stds`  | `[bands]`                | f64  |

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

pub const IMG: &str = "img";
pub const LBL: &str = "lbl";
pub const AFFINE: &str = "affine";
pub const EPSG: &str = "epsg";
pub const PATH: &str = "path";
pub const IMG_MEANS: &str = "img_means";
pub const IMG_STDS: &str = "img_stds";

/// Zarr node path of a dataset below the root group.
pub fn node_path(name: &str) -> String {
    format!("/{}", name)
}

/// Fixed dimensions shared by every dataset in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLayout {
    /// Number of records (N).
    pub records: usize,
    pub bands: usize,
    pub rows: usize,
    pub cols: usize,
    /// Byte width of one `path` entry.
    pub name_len: usize,
}

impl StoreLayout {
    pub fn new(records: usize, bands: usize, rows: usize, cols: usize, name_len: usize) -> Self {
        Self {
            records,
            bands,
            rows,
            cols,
            name_len,
        }
    }

    /// Reject layouts with an empty axis.
    pub fn validate(&self) -> Result<()> {
        if self.records == 0 || self.bands == 0 || self.rows == 0 || self.cols == 0 {
            return Err(StoreError::layout(format!(
                "every axis must be non-empty, got {} records of [{}, {}, {}]",
                self.records, self.bands, self.rows, self.cols
            )));
        }
        if self.name_len == 0 {
            return Err(StoreError::layout("name length must be > 0"));
        }
        Ok(())
    }

    pub fn img_shape(&self) -> Vec<u64> {
        to_u64(&[self.records, self.bands, self.rows, self.cols])
    }

    pub fn lbl_shape(&self) -> Vec<u64> {
        to_u64(&[self.records, self.rows, self.cols])
    }

    pub fn affine_shape(&self) -> Vec<u64> {
        to_u64(&[self.records, 6])
    }

    pub fn epsg_shape(&self) -> Vec<u64> {
        to_u64(&[self.records])
    }

    pub fn path_shape(&self) -> Vec<u64> {
        to_u64(&[self.records, self.name_len])
    }

    pub fn stats_shape(&self) -> Vec<u64> {
        to_u64(&[self.bands])
    }

    /// Samples in one image record.
    pub fn image_len(&self) -> usize {
        self.bands * self.plane_len()
    }

    /// Pixels in one band or label plane.
    pub fn plane_len(&self) -> usize {
        self.rows * self.cols
    }

    /// Recover the layout from the `img` and `path` array shapes.
    pub fn from_shapes(img: &[u64], path: &[u64]) -> Result<Self> {
        match (img, path) {
            ([n, b, r, c], [n2, l]) if n == n2 => Ok(Self::new(
                *n as usize,
                *b as usize,
                *r as usize,
                *c as usize,
                *l as usize,
            )),
            _ => Err(StoreError::layout(format!(
                "unexpected dataset shapes: {} {:?}, {} {:?}",
                IMG, img, PATH, path
            ))),
        }
    }
}

fn to_u64(dims: &[usize]) -> Vec<u64> {
    dims.iter().map(|&d| d as u64).collect()
}

/// Provenance recorded in the root group's attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreAttributes {
    /// Whether `lbl` holds real labels (otherwise it is all zero).
    pub has_labels: bool,
    /// 1-based band numbers selected from the sources; empty means all.
    #[serde(default)]
    pub bands: Vec<usize>,
    /// Present when the store was produced by re-tiling another store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiling: Option<TilingAttributes>,
}

/// Parameters a tiled store was produced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilingAttributes {
    pub tile_size: usize,
    pub overlap: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_size: Option<u64>,
    /// Number of records in the source store.
    pub parents: usize,
}

impl StoreAttributes {
    /// Serialize into a Zarr attribute map.
    pub fn to_map(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(StoreError::layout(format!(
                "attributes serialized to non-object {}",
                other
            ))),
        }
    }

    /// Parse from a Zarr attribute map.
    pub fn from_map(map: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(
            map.clone(),
        ))?)
    }
}

/// Encode a record name as `len` zero-padded UTF-8 bytes.
pub fn encode_name(name: &str, len: usize) -> Result<Vec<u8>> {
    let bytes = name.as_bytes();
    if bytes.len() > len {
        return Err(StoreError::layout(format!(
            "name '{}' is {} bytes, store holds at most {}",
            name,
            bytes.len(),
            len
        )));
    }
    if bytes.contains(&0) {
        return Err(StoreError::layout(format!(
            "name '{}' contains a NUL byte",
            name.escape_debug()
        )));
    }
    let mut out = vec![0u8; len];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

/// Decode a zero-padded name entry.
pub fn decode_name(bytes: &[u8]) -> Result<String> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8(bytes[..end].to_vec())
        .map_err(|e| StoreError::layout(format!("name is not UTF-8: {}", e)))
}

/// Byte width needed to hold every name (at least 1).
pub fn name_len<'a>(names: impl IntoIterator<Item = &'a str>) -> usize {
    names
        .into_iter()
        .map(str::len)
        .max()
        .unwrap_or(0)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_shapes() {
        let layout = StoreLayout::new(3, 4, 10, 12, 16);
        assert_eq!(layout.img_shape(), vec![3, 4, 10, 12]);
        assert_eq!(layout.lbl_shape(), vec![3, 10, 12]);
        assert_eq!(layout.affine_shape(), vec![3, 6]);
        assert_eq!(layout.path_shape(), vec![3, 16]);
        assert_eq!(layout.image_len(), 480);
        assert_eq!(
            StoreLayout::from_shapes(&layout.img_shape(), &layout.path_shape()).unwrap(),
            layout
        );
    }

    #[test]
    fn test_layout_rejects_empty_axis() {
        assert!(StoreLayout::new(0, 1, 1, 1, 1).validate().is_err());
        assert!(StoreLayout::new(1, 1, 0, 1, 1).validate().is_err());
        assert!(StoreLayout::new(1, 1, 1, 1, 1).validate().is_ok());
    }

    #[test]
    fn test_name_encoding() {
        let encoded = encode_name("scene_01", 10).unwrap();
        assert_eq!(encoded.len(), 10);
        assert_eq!(&encoded[8..], &[0, 0]);
        assert_eq!(decode_name(&encoded).unwrap(), "scene_01");
        assert!(encode_name("too_long_name", 4).is_err());
    }

    #[test]
    fn test_name_len() {
        assert_eq!(name_len(["a", "abcd", "ab"]), 4);
        assert_eq!(name_len(Vec::<&str>::new()), 1);
    }

    #[test]
    fn test_attributes_map() {
        let attrs = StoreAttributes {
            has_labels: true,
            bands: vec![3, 2, 1],
            tiling: Some(TilingAttributes {
                tile_size: 128,
                overlap: 16,
                target_size: None,
                parents: 4,
            }),
        };
        let map = attrs.to_map().unwrap();
        assert_eq!(map["has_labels"], serde_json::json!(true));
        assert_eq!(map["tiling"]["tile_size"], serde_json::json!(128));
        assert_eq!(StoreAttributes::from_map(&map).unwrap(), attrs);
    }
}
