//! The three config sections: where output goes, how loud the logs are,
//! and what a run does by default.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem locations for songform output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory that `process --out` writes table sets into when given a
    /// bare file name.
    /// Default: ~/.local/share/songform
    #[serde(default = "PathsConfig::default_output_dir")]
    pub output_dir: PathBuf,

    /// SQLite database used by `process --store`.
    /// Default: ~/.local/share/songform/songform.db
    #[serde(default = "PathsConfig::default_database")]
    pub database: PathBuf,
}

impl PathsConfig {
    fn default_output_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/songform"))
            .unwrap_or_else(|| PathBuf::from(".local/share/songform"))
    }

    fn default_database() -> PathBuf {
        Self::default_output_dir().join("songform.db")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: Self::default_output_dir(),
            database: Self::default_database(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter directive handed to the log subscriber.
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// Defaults for a processing run; command-line flags still win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Produce the nine summary tables as well.
    /// Default: false
    #[serde(default)]
    pub comprehensive: bool,

    /// Gate output on the schema validator.
    /// Default: true
    #[serde(default = "ProcessingConfig::default_validate")]
    pub validate: bool,

    /// Write every successful run into the database.
    /// Default: false
    #[serde(default)]
    pub store: bool,
}

impl ProcessingConfig {
    fn default_validate() -> bool {
        true
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            comprehensive: false,
            validate: Self::default_validate(),
            store: false,
        }
    }
}
