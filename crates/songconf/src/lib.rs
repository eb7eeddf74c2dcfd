//! Layered configuration for songform.
//!
//! Every value has a compiled default, so a missing config file is never an
//! error. Files and environment variables only override what they name.
//!
//! # Usage
//!
//! ```rust,no_run
//! use songconf::SongformConfig;
//!
//! let config = SongformConfig::load().expect("Failed to load config");
//! println!("database: {}", config.paths.database.display());
//! println!("comprehensive by default: {}", config.processing.comprehensive);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/songform/config.toml` (system)
//! 2. `~/.config/songform/config.toml` (user)
//! 3. `./songform.toml` (local override, replaced by `--config`)
//! 4. Environment variables (`SONGFORM_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! output_dir = "~/music/tables"
//! database = "$XDG_DATA_HOME/songform/songform.db"
//!
//! [telemetry]
//! log_level = "songform=debug,info"
//!
//! [processing]
//! comprehensive = true
//! validate = true
//! store = false
//! ```

pub mod loader;
pub mod settings;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use settings::{PathsConfig, ProcessingConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete songform configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SongformConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl SongformConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/songform/config.toml`
    /// 3. `~/.config/songform/config.toml`
    /// 4. `./songform.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` standing in for `./songform.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and return information about sources.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        Self::load_with_sources_from(None)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = SongformConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let layer = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, layer);
            tracing::debug!(path = %path.display(), "loaded config file");
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# songform configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "output_dir = \"{}\"\n",
            self.paths.output_dir.display()
        ));
        output.push_str(&format!("database = \"{}\"\n", self.paths.database.display()));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output.push_str("\n[processing]\n");
        output.push_str(&format!("comprehensive = {}\n", self.processing.comprehensive));
        output.push_str(&format!("validate = {}\n", self.processing.validate));
        output.push_str(&format!("store = {}\n", self.processing.store));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = SongformConfig::default();
        assert_eq!(config.telemetry.log_level, "info");
        assert!(!config.processing.comprehensive);
        assert!(config.processing.validate);
        assert!(config.paths.database.ends_with("songform/songform.db"));
    }

    #[test]
    fn test_to_toml() {
        let toml = SongformConfig::default().to_toml();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[processing]"));
        assert!(toml.contains("validate = true"));
    }

    #[test]
    fn test_to_toml_parses_back() {
        let mut config = SongformConfig::default();
        config.processing.comprehensive = true;
        config.telemetry.log_level = "debug".into();

        let parsed: SongformConfig = toml::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("songform.toml");
        std::fs::write(&path, "[processing]\nstore = true\n").unwrap();

        let (config, sources) = SongformConfig::load_with_sources_from(Some(&path)).unwrap();
        assert!(config.processing.store);
        assert_eq!(sources.files.last(), Some(&path));
    }

    #[test]
    fn test_broken_file_names_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[processing\n").unwrap();

        let err = SongformConfig::load_from(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }
}
