//! Service configuration.
//!
//! The dataset locator comes either from a JSON config file or from the
//! environment:
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RASTELEV_CONFIG_PATH` | Directory holding `<name>Config.json` | None |
//! | `RASTELEV_SERVICE_NAME` | Config file prefix | `elevation` |
//! | `RASTELEV_DATASET` | Dataset path or URL, when no config path is set | Required |
//! | `RASTELEV_DATASET_CRS` | CRS override for the dataset | GeoKeys |
//! | `RASTELEV_CHUNK_CACHE` | Decoded chunks to cache | 256 |
//! | `RASTELEV_TRANSFORM_CACHE` | CRS transforms to cache | 64 |
//!
//! The last three override values from the config file.
//!
//! The config file has the shape
//!
//! ```json
//! {
//!   "service": "elevation",
//!   "config": {
//!     "elevation_dataset": "/data/dtm_2056.tif"
//!   }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::coverage::DEFAULT_CHUNK_CACHE_SIZE;
use crate::crs::CrsCode;
use crate::error::{ElevationError, Result};

/// Default number of cached CRS transforms.
pub const DEFAULT_TRANSFORM_CACHE_SIZE: u64 = 64;

/// Default config file prefix.
pub const DEFAULT_SERVICE_NAME: &str = "elevation";

/// Elevation service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Dataset path or URL.
    pub elevation_dataset: String,
    /// CRS to assume for the dataset instead of its GeoKeys.
    #[serde(default)]
    pub dataset_crs: Option<String>,
    #[serde(default = "default_chunk_cache_size")]
    pub chunk_cache_size: u64,
    #[serde(default = "default_transform_cache_size")]
    pub transform_cache_size: u64,
}

fn default_chunk_cache_size() -> u64 {
    DEFAULT_CHUNK_CACHE_SIZE
}

fn default_transform_cache_size() -> u64 {
    DEFAULT_TRANSFORM_CACHE_SIZE
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigDocument {
    Wrapped { config: Config },
    Flat(Config),
}

impl Config {
    pub fn new(elevation_dataset: impl Into<String>) -> Self {
        Self {
            elevation_dataset: elevation_dataset.into(),
            dataset_crs: None,
            chunk_cache_size: DEFAULT_CHUNK_CACHE_SIZE,
            transform_cache_size: DEFAULT_TRANSFORM_CACHE_SIZE,
        }
    }

    /// Read a JSON config file. Settings may sit under a top-level `config`
    /// object or at the top level.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::Config`] if the file cannot be read or
    /// parsed, or names an empty dataset.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ElevationError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let document: ConfigDocument = serde_json::from_str(&text).map_err(|e| {
            ElevationError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;

        let config = match document {
            ConfigDocument::Wrapped { config } | ConfigDocument::Flat(config) => config,
        };
        if config.elevation_dataset.trim().is_empty() {
            return Err(ElevationError::Config(format!(
                "{}: elevation_dataset is empty",
                path.display()
            )));
        }

        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Build the configuration from environment variables (see the module
    /// docs).
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::Config`] if neither `RASTELEV_CONFIG_PATH`
    /// nor `RASTELEV_DATASET` is set, or the config file is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup("RASTELEV_CONFIG_PATH") {
            Some(dir) => {
                let name = lookup("RASTELEV_SERVICE_NAME")
                    .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());
                Self::from_file(config_file_path(&dir, &name))?
            }
            None => {
                let dataset = lookup("RASTELEV_DATASET")
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| {
                        ElevationError::Config(
                            "set RASTELEV_DATASET or RASTELEV_CONFIG_PATH".to_string(),
                        )
                    })?;
                Self::new(dataset)
            }
        };

        if let Some(crs) = lookup("RASTELEV_DATASET_CRS") {
            config.dataset_crs = Some(crs);
        }
        if let Some(size) = parse_size(&lookup, "RASTELEV_CHUNK_CACHE") {
            config.chunk_cache_size = size;
        }
        if let Some(size) = parse_size(&lookup, "RASTELEV_TRANSFORM_CACHE") {
            config.transform_cache_size = size;
        }

        Ok(config)
    }

    /// The configured dataset CRS override, parsed.
    pub fn native_crs(&self) -> Result<Option<CrsCode>> {
        self.dataset_crs.as_deref().map(CrsCode::parse).transpose()
    }
}

/// `<dir>/<service_name>Config.json`
pub fn config_file_path(dir: &str, service_name: &str) -> PathBuf {
    Path::new(dir).join(format!("{}Config.json", service_name))
}

fn parse_size(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(size) => Some(size),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "Ignoring invalid cache size");
            None
        }
    }
}
