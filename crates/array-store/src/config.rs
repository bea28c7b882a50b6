//! Configuration for store writing.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Configuration for the chunking and compression of packed stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Number of records per chunk along the first axis of `img` and `lbl`.
    pub chunk_size: usize,

    /// Compression codec for the pixel datasets.
    pub compression: StoreCompression,

    /// Compression level (1-9).
    pub compression_level: u8,

    /// Enable byte shuffle filter for better compression.
    pub shuffle: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1,
            compression: StoreCompression::BloscZstd,
            compression_level: 5,
            shuffle: true,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("STORE_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("STORE_COMPRESSION") {
            if let Some(compression) = StoreCompression::parse(&val) {
                config.compression = compression;
            }
        }

        if let Ok(val) = std::env::var("STORE_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.compression_level = level;
            }
        }

        if let Ok(val) = std::env::var("STORE_SHUFFLE") {
            config.shuffle = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(StoreError::Config("chunk_size must be > 0".to_string()));
        }

        if self.compression_level == 0 || self.compression_level > 9 {
            return Err(StoreError::Config(
                "compression_level must be 1-9".to_string(),
            ));
        }

        Ok(())
    }
}

/// Lossless compression codec for the pixel datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreCompression {
    /// No compression.
    None,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd.
    #[default]
    BloscZstd,
}

impl StoreCompression {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Some(Self::None),
            "blosc_lz4" | "lz4" => Some(Self::BloscLz4),
            "blosc_zstd" | "zstd" => Some(Self::BloscZstd),
            _ => None,
        }
    }

    /// Get the codec name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::str::FromStr for StoreCompression {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| {
            StoreError::Config(format!(
                "unknown compression '{}' (expected none, blosc_lz4 or blosc_zstd)",
                s
            ))
        })
    }
}

impl std::fmt::Display for StoreCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = StoreConfig::default();
        assert_eq!(config.chunk_size, 1);
        assert_eq!(config.compression, StoreCompression::BloscZstd);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let config = StoreConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_level() {
        let config = StoreConfig {
            compression_level: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_compression_parse() {
        assert_eq!(StoreCompression::parse("NONE"), Some(StoreCompression::None));
        assert_eq!(
            "blosc_lz4".parse::<StoreCompression>().unwrap(),
            StoreCompression::BloscLz4
        );
        assert!("gzip".parse::<StoreCompression>().is_err());
        assert_eq!(StoreCompression::BloscZstd.to_string(), "blosc_zstd");
    }

    #[test]
    fn test_config_serde() {
        let config = StoreConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"blosc_zstd\""));
        let back: StoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
