// src/config.rs

//! Configuration loading utilities.
//!
//! The configuration is read once at startup and then passed around as an
//! immutable value.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Load configuration from a TOML file.
///
/// Falls back to defaults if loading fails.
pub fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).or_else(|e| {
        log::warn!("Failed to load config from {path:?}: {e}");
        log::warn!("Using default configuration.");
        Ok(Config::default())
    })
}

/// Load a configuration file and reject invalid values.
pub fn load_validated(path: &Path) -> Result<Config> {
    let config = Config::load(path)?;
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid config {path:?}: {e}")))?;
    Ok(config)
}

/// Write the default configuration to `path`.
///
/// Existing files are left alone unless `force` is set. Returns whether a
/// file was written.
pub fn write_default_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, Config::default().to_toml()?)?;
    Ok(true)
}

/// Create the default configuration file on first start.
pub fn ensure_config_file(path: &Path) -> Result<()> {
    if write_default_config(path, false)? {
        log::info!("Created default config file: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_default_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        assert!(write_default_config(&path, false).unwrap());
        let config = load_validated(&path).unwrap();
        assert_eq!(config.schedule.time, "09:00");
    }

    #[test]
    fn test_existing_file_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "output_dir = \"mine\"\n").unwrap();

        assert!(!write_default_config(&path, false).unwrap());
        let config = load_config(&path).unwrap();
        assert_eq!(config.output_dir, std::path::PathBuf::from("mine"));

        assert!(write_default_config(&path, true).unwrap());
        let config = load_config(&path).unwrap();
        assert_eq!(config.output_dir, std::path::PathBuf::from("output"));
    }

    #[test]
    fn test_load_config_falls_back_on_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        assert!(load_validated(&path).is_err());
        let config = load_config(&path).unwrap();
        assert_eq!(config.search_filters.tenders.len(), 1);
    }
}
