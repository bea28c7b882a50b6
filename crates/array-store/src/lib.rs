//! Packed raster stores on Zarr V3.
//!
//! A store holds N equally-shaped raster records (pixels, label plane,
//! transform, EPSG code, source name) plus per-band normalization
//! statistics. See [`layout`] for the dataset table.
//!
//! # Example
//!
//! ```ignore
//! use array_store::{StagedStore, StoreConfig, StoreLayout, StoreWriter};
//!
//! let staged = StagedStore::new("scenes.zarr")?;
//! let mut writer = StoreWriter::create(staged.storage()?, layout, &attrs, &StoreConfig::from_env())?;
//! writer.write_record(0, &record)?;
//! writer.write_statistics(&means, &stds)?;
//! writer.finish()?;
//! staged.commit()?;
//! ```

pub mod config;
pub mod error;
pub mod layout;
pub mod reader;
pub mod writer;

pub use config::{StoreCompression, StoreConfig};
pub use error::{Result, StoreError};
pub use layout::{StoreAttributes, StoreLayout, TilingAttributes};
pub use reader::StoreReader;
pub use writer::{StagedStore, StoreWriter};
