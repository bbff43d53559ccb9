//! Configuration management for nxvault
//!
//! Handles library paths, download defaults and remote endpoints.
//! Configuration lives in TOML files, a system-wide one overlaid by a per-user one.

mod sections;

pub use sections::{DownloadConfig, LibraryConfig, RemoteConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Standard configuration paths
pub const CONFIG_DIR: &str = "/etc/nxvault";
pub const USER_CONFIG_DIR: &str = ".nxvault";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Overrides the user configuration file location
pub const CONFIG_ENV_VAR: &str = "NXVAULT_CONFIG";

/// Main nxvault configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub remote: RemoteConfig,
}

impl VaultConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the system file with the user file merged over it
    ///
    /// Either file may be missing. Keys present in the user file win,
    /// tables are merged key by key.
    pub fn load_layered() -> Result<Self, ConfigError> {
        let system_config = Path::new(CONFIG_DIR).join(CONFIG_FILE_NAME);
        let user_config = user_config_path();
        if !system_config.exists() && !user_config.exists() {
            tracing::warn!("No configuration file found, using defaults");
            return Ok(Self::default());
        }

        let mut merged = toml::Value::Table(toml::map::Map::new());
        for path in [system_config, user_config] {
            if path.exists() {
                let contents = std::fs::read_to_string(&path)?;
                let value: toml::Value = toml::from_str(&contents)?;
                tracing::debug!("Merging configuration from {}", path.display());
                merge_toml(&mut merged, value);
            }
        }

        let config: Self = merged.try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ext = self.download.archive_extension.trim_start_matches('.');
        if ext.is_empty() {
            return Err(ConfigError::Invalid(
                "download.archive_extension must not be empty".to_string(),
            ));
        }
        if self.library.extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "library.extensions must list at least one extension".to_string(),
            ));
        }
        Ok(())
    }
}

/// User configuration file, honouring `NXVAULT_CONFIG`
pub fn user_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }

    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(USER_CONFIG_DIR)
        .join(CONFIG_FILE_NAME)
}

/// Helper function to merge TOML values
pub fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(&key) {
                    merge_toml(base_value, value);
                } else {
                    base_table.insert(key, value);
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
