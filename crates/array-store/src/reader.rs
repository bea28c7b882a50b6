//! Random access to the records of a packed store.

use std::path::Path;
use std::sync::Arc;

use raster_common::{Affine, GeoRaster, RasterRecord, RasterShape};
use tracing::debug;
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs::group::Group;
use zarrs::storage::ReadableStorageTraits;
use zarrs_filesystem::FilesystemStore;

use crate::error::{Result, StoreError};
use crate::layout::{
    decode_name, node_path, StoreAttributes, StoreLayout, AFFINE, EPSG, IMG, IMG_MEANS, IMG_STDS,
    LBL, PATH,
};

/// Reader over an existing store.
pub struct StoreReader<S: ReadableStorageTraits + 'static> {
    layout: StoreLayout,
    attributes: StoreAttributes,
    img: Array<S>,
    lbl: Array<S>,
    affine: Array<S>,
    epsg: Array<S>,
    path: Array<S>,
    means: Array<S>,
    stds: Array<S>,
}

impl StoreReader<FilesystemStore> {
    /// Open a store directory on the local filesystem.
    pub fn open_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        let storage = FilesystemStore::new(path).map_err(StoreError::zarr)?;
        Self::open(storage)
    }
}

impl<S: ReadableStorageTraits + 'static> StoreReader<S> {
    /// Open the root group and every dataset, checking their shapes agree.
    pub fn open(storage: S) -> Result<Self> {
        let store = Arc::new(storage);

        let group = Group::open(store.clone(), "/").map_err(StoreError::zarr)?;
        let attributes = StoreAttributes::from_map(group.attributes())?;

        let open = |name: &str| Array::open(store.clone(), &node_path(name)).map_err(StoreError::zarr);
        let img = open(IMG)?;
        let lbl = open(LBL)?;
        let affine = open(AFFINE)?;
        let epsg = open(EPSG)?;
        let path = open(PATH)?;
        let means = open(IMG_MEANS)?;
        let stds = open(IMG_STDS)?;

        let layout = StoreLayout::from_shapes(img.shape(), path.shape())?;
        let expected = [
            (LBL, lbl.shape(), layout.lbl_shape()),
            (AFFINE, affine.shape(), layout.affine_shape()),
            (EPSG, epsg.shape(), layout.epsg_shape()),
            (IMG_MEANS, means.shape(), layout.stats_shape()),
            (IMG_STDS, stds.shape(), layout.stats_shape()),
        ];
        for (name, actual, wanted) in expected {
            if actual != wanted.as_slice() {
                return Err(StoreError::layout(format!(
                    "dataset {} has shape {:?}, expected {:?}",
                    name, actual, wanted
                )));
            }
        }

        debug!(
            records = layout.records,
            bands = layout.bands,
            rows = layout.rows,
            cols = layout.cols,
            has_labels = attributes.has_labels,
            "Opened store"
        );

        Ok(Self {
            layout,
            attributes,
            img,
            lbl,
            affine,
            epsg,
            path,
            means,
            stds,
        })
    }

    pub fn layout(&self) -> StoreLayout {
        self.layout
    }

    pub fn attributes(&self) -> &StoreAttributes {
        &self.attributes
    }

    pub fn has_labels(&self) -> bool {
        self.attributes.has_labels
    }

    /// Number of records (N).
    pub fn len(&self) -> usize {
        self.layout.records
    }

    pub fn is_empty(&self) -> bool {
        self.layout.records == 0
    }

    fn check_index(&self, index: usize) -> Result<u64> {
        if index >= self.layout.records {
            return Err(StoreError::IndexOutOfRange {
                index,
                len: self.layout.records,
            });
        }
        Ok(index as u64)
    }

    /// Pixels, transform and CRS of record `index`.
    pub fn read_image(&self, index: usize) -> Result<GeoRaster> {
        let i = self.check_index(index)?;
        let layout = self.layout;

        let img_subset = subset(
            vec![i, 0, 0, 0],
            vec![1, layout.bands as u64, layout.rows as u64, layout.cols as u64],
        )?;
        let data = self
            .img
            .retrieve_array_subset_elements::<u16>(&img_subset)
            .map_err(StoreError::zarr)?;

        let gt = self
            .affine
            .retrieve_array_subset_elements::<f64>(&subset(vec![i, 0], vec![1, 6])?)
            .map_err(StoreError::zarr)?;
        let gt: [f64; 6] = gt
            .try_into()
            .map_err(|_| StoreError::layout("affine row does not hold 6 coefficients"))?;

        let epsg = self
            .epsg
            .retrieve_array_subset_elements::<u32>(&subset(vec![i], vec![1])?)
            .map_err(StoreError::zarr)?;
        let epsg = epsg
            .first()
            .copied()
            .ok_or_else(|| StoreError::layout("empty epsg entry"))?;

        Ok(GeoRaster::new(
            RasterShape::new(layout.bands, layout.rows, layout.cols),
            data,
            Affine::from_gdal(gt),
            epsg,
        )?)
    }

    /// Label plane of record `index`, or `None` for stores packed without labels.
    pub fn read_label(&self, index: usize) -> Result<Option<Vec<u16>>> {
        let i = self.check_index(index)?;
        if !self.attributes.has_labels {
            return Ok(None);
        }
        let layout = self.layout;
        let lbl_subset = subset(vec![i, 0, 0], vec![1, layout.rows as u64, layout.cols as u64])?;
        let data = self
            .lbl
            .retrieve_array_subset_elements::<u16>(&lbl_subset)
            .map_err(StoreError::zarr)?;
        Ok(Some(data))
    }

    /// Stored source name of record `index`.
    pub fn read_name(&self, index: usize) -> Result<String> {
        let i = self.check_index(index)?;
        let bytes = self
            .path
            .retrieve_array_subset_elements::<u8>(&subset(
                vec![i, 0],
                vec![1, self.layout.name_len as u64],
            )?)
            .map_err(StoreError::zarr)?;
        decode_name(&bytes)
    }

    /// Everything stored for record `index`.
    pub fn read_record(&self, index: usize) -> Result<RasterRecord> {
        let image = self.read_image(index)?;
        let label = self.read_label(index)?;
        let name = self.read_name(index)?;
        Ok(RasterRecord::new(image, label, name)?)
    }

    /// Per-band means and population standard deviations.
    pub fn statistics(&self) -> Result<(Vec<f64>, Vec<f64>)> {
        let stats_subset = subset(vec![0], vec![self.layout.bands as u64])?;
        let means = self
            .means
            .retrieve_array_subset_elements::<f64>(&stats_subset)
            .map_err(StoreError::zarr)?;
        let stds = self
            .stds
            .retrieve_array_subset_elements::<f64>(&stats_subset)
            .map_err(StoreError::zarr)?;
        Ok((means, stds))
    }
}

fn subset(start: Vec<u64>, shape: Vec<u64>) -> Result<ArraySubset> {
    ArraySubset::new_with_start_shape(start, shape).map_err(StoreError::zarr)
}
