//! Configuration handling for the ReadStore CLI
//!
//! Supports loading configuration from readstore.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use readstore_core::{DuplicateMode, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CliError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub hic: HicConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Duplicate removal applied when a data set is finalised
    #[serde(default)]
    pub duplicate_mode: DuplicateMode,

    /// Trust the input to be sorted by position
    #[serde(default)]
    pub presorted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HicConfig {
    /// Cis pairs closer than this are discarded
    #[serde(default = "default_min_distance")]
    pub min_distance: u32,

    /// Discard pairs between chromosomes
    #[serde(default)]
    pub ignore_trans: bool,

    #[serde(default)]
    pub duplicate_mode: DuplicateMode,
}

fn default_min_distance() -> u32 { 0 }

impl Default for ImportConfig {
    fn default() -> Self {
        Self { duplicate_mode: DuplicateMode::None, presorted: false }
    }
}

impl Default for HicConfig {
    fn default() -> Self {
        Self { min_distance: default_min_distance(), ignore_trans: false, duplicate_mode: DuplicateMode::None }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from("readstore.toml");
                if default_path.exists() {
                    log::info!("Loading configuration from: readstore.toml");
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CliError::file_not_found(path.to_path_buf()).into());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .map_err(CliError::from)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(CliError::from).context("Failed to serialize configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;
        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default())
            .map_err(CliError::from)
            .context("Failed to serialize default configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.import.duplicate_mode, DuplicateMode::None);
        assert_eq!(config.hic.min_distance, 0);
        assert!(config.store.verify_checksums);
    }

    #[test]
    fn test_config_roundtrip() -> Result<()> {
        let mut config = Config::default();
        config.hic.ignore_trans = true;
        config.import.duplicate_mode = DuplicateMode::Start;

        let temp_file = NamedTempFile::new()?;
        config.save_to_file(temp_file.path())?;
        let loaded = Config::load_from_file(temp_file.path())?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let config: Config = toml::from_str("[hic]\nmin_distance = 1000\n")?;
        assert_eq!(config.hic.min_distance, 1000);
        assert!(!config.hic.ignore_trans);
        assert_eq!(config.store, StoreConfig::default());
        Ok(())
    }

    #[test]
    fn test_example_toml_generation() -> Result<()> {
        let example = Config::example_toml()?;
        assert!(example.contains("[store]"));
        assert!(example.contains("[import]"));
        assert!(example.contains("[hic]"));
        assert!(example.contains("duplicate_mode = \"none\""));
        Ok(())
    }
}
