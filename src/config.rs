//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the tcd-config.toml file.
//! It names the database the `tcd` tool works on.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "tcd-config.toml";

/// Application configuration loaded from tcd-config.toml
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Database location
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Database file configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path of the .tcd database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("harmonics.tcd"),
        }
    }
}

impl Config {
    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    log::info!(
                        "Loaded configuration for database: {}",
                        config.database.path.display()
                    );
                    config
                }
                Err(e) => {
                    log::warn!("Invalid config file format: {}", e);
                    log::warn!("Using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file found, using default configuration");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, PathBuf::from("harmonics.tcd"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.database.path, parsed.database.path);
    }

    #[test]
    fn test_empty_config_fills_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert_eq!(parsed.database.path, PathBuf::from("harmonics.tcd"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[database]\npath = \"/data/west-coast.tcd\"").unwrap();

        let loaded = Config::load_from_path(file.path());
        assert_eq!(loaded.database.path, PathBuf::from("/data/west-coast.tcd"));
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[database]\npath = 42").unwrap();

        let loaded = Config::load_from_path(file.path());
        assert_eq!(loaded.database.path, PathBuf::from("harmonics.tcd"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.database.path, PathBuf::from("harmonics.tcd"));
    }
}
