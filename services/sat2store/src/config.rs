//! Store configuration: environment first, then command-line overrides.

use anyhow::Result;
use array_store::{StoreCompression, StoreConfig};
use clap::Args;

/// Store options shared by the commands that write a store.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct StoreArgs {
    /// Records per chunk along the first axis of the pixel datasets
    #[arg(short = 'c', long, global = true)]
    pub chunk_size: Option<usize>,

    /// Compression codec: none, blosc_lz4 or blosc_zstd
    #[arg(long, global = true)]
    pub compression: Option<StoreCompression>,

    /// Compression level (1-9)
    #[arg(long, global = true)]
    pub compression_level: Option<u8>,
}

impl StoreArgs {
    /// Resolve the effective configuration from `STORE_*` variables and
    /// these overrides.
    pub fn load(&self) -> Result<StoreConfig> {
        let config = self.apply(StoreConfig::from_env());
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, mut config: StoreConfig) -> StoreConfig {
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(compression) = self.compression {
            config.compression = compression;
        }
        if let Some(level) = self.compression_level {
            config.compression_level = level;
        }
        config
    }
}
