//! Provider configuration via `geostrata.toml`
//!
//! A session reads its settings from a small TOML file. On first use a
//! commented default file can be written next to the data; to change
//! settings, edit the file and reopen the session.

use serde::{Deserialize, Serialize};
use std::path::Path;

use geostrata_core::{Error, Result};
use geostrata_index::{RTreeConfig, MIN_NODE_CAPACITY};

/// Config file name placed alongside the data.
pub const CONFIG_FILE_NAME: &str = "geostrata.toml";

/// Provider configuration loaded from `geostrata.toml`.
///
/// # Example
///
/// ```toml
/// # Maximum children per R-tree node (>= 2)
/// node_capacity = 16
///
/// # Spatial reference identifier reported by the session
/// srid = 4326
///
/// # Rebuild the index when the store changes (false = fail with StaleIndex)
/// auto_rebuild = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Maximum children per R-tree node.
    #[serde(default = "default_node_capacity")]
    pub node_capacity: usize,
    /// Spatial reference identifier. Metadata only.
    #[serde(default)]
    pub srid: i32,
    /// Rebuild the spatial index on demand when the store generation moves.
    #[serde(default = "default_auto_rebuild")]
    pub auto_rebuild: bool,
}

fn default_node_capacity() -> usize {
    RTreeConfig::default().node_capacity
}

fn default_auto_rebuild() -> bool {
    true
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            node_capacity: default_node_capacity(),
            srid: 0,
            auto_rebuild: default_auto_rebuild(),
        }
    }
}

impl ProviderConfig {
    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `node_capacity` is below the R-tree minimum.
    pub fn validate(&self) -> Result<()> {
        if self.node_capacity < MIN_NODE_CAPACITY {
            return Err(Error::config(format!(
                "node_capacity must be at least {}, got {}",
                MIN_NODE_CAPACITY, self.node_capacity
            )));
        }
        Ok(())
    }

    /// R-tree settings derived from this config.
    pub fn rtree_config(&self) -> RTreeConfig {
        RTreeConfig::with_node_capacity(self.node_capacity)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# GeoStrata provider configuration
#
# Maximum children per R-tree node (default: 16, minimum: 2).
# Larger nodes mean a shallower tree and fewer, wider envelope checks.
node_capacity = 16

# Spatial reference identifier reported by the session (default: 0).
# Queries never reproject; this value is informational.
srid = 0

# Rebuild the spatial index when the store changes (default: true).
# When false, queries against a changed store fail with a stale-index error.
auto_rebuild = true
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: ProviderConfig = toml::from_str(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
