//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, SongformConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Values one config file sets. Anything left `None` keeps the value from
/// the layers below.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigLayer {
    pub output_dir: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub log_level: Option<String>,
    pub comprehensive: Option<bool>,
    pub validate: Option<bool>,
    pub store: Option<bool>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// `cli_path` replaces the local `./songform.toml`. Unlike the standard
/// locations it is returned even when missing, so loading reports the
/// unreadable file instead of silently using defaults.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/songform/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("songform/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("songform.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load one config layer from a TOML file.
pub fn load_from_file(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

fn parse_error(path: &Path, message: impl Into<String>) -> ConfigError {
    ConfigError::Parse {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn string_key(
    table: &toml::Table,
    section: &str,
    key: &str,
    path: &Path,
) -> Result<Option<String>, ConfigError> {
    match table.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| parse_error(path, format!("{section}.{key} must be a string"))),
    }
}

fn bool_key(
    table: &toml::Table,
    section: &str,
    key: &str,
    path: &Path,
) -> Result<Option<bool>, ConfigError> {
    match table.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| parse_error(path, format!("{section}.{key} must be true or false"))),
    }
}

/// Parse config from TOML string.
fn parse_toml(contents: &str, path: &Path) -> Result<ConfigLayer, ConfigError> {
    let table: toml::Table = contents
        .parse()
        .map_err(|e: toml::de::Error| parse_error(path, e.to_string()))?;

    let mut layer = ConfigLayer::default();

    if let Some(paths) = table.get("paths").and_then(|v| v.as_table()) {
        layer.output_dir = string_key(paths, "paths", "output_dir", path)?.map(|v| expand_path(&v));
        layer.database = string_key(paths, "paths", "database", path)?.map(|v| expand_path(&v));
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        layer.log_level = string_key(telemetry, "telemetry", "log_level", path)?;
    }

    if let Some(processing) = table.get("processing").and_then(|v| v.as_table()) {
        layer.comprehensive = bool_key(processing, "processing", "comprehensive", path)?;
        layer.validate = bool_key(processing, "processing", "validate", path)?;
        layer.store = bool_key(processing, "processing", "store", path)?;
    }

    Ok(layer)
}

/// Apply a file layer on top of the configuration loaded so far.
pub fn merge_configs(base: SongformConfig, overlay: ConfigLayer) -> SongformConfig {
    let mut config = base;
    if let Some(v) = overlay.output_dir {
        config.paths.output_dir = v;
    }
    if let Some(v) = overlay.database {
        config.paths.database = v;
    }
    if let Some(v) = overlay.log_level {
        config.telemetry.log_level = v;
    }
    if let Some(v) = overlay.comprehensive {
        config.processing.comprehensive = v;
    }
    if let Some(v) = overlay.validate {
        config.processing.validate = v;
    }
    if let Some(v) = overlay.store {
        config.processing.store = v;
    }
    config
}

/// Accepts 1/0, true/false, yes/no and on/off.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Apply environment variable overrides.
pub fn apply_env_overrides(config: &mut SongformConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from any key lookup; `apply_env_overrides` passes the
/// process environment.
pub fn apply_overrides_from(
    config: &mut SongformConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("SONGFORM_OUTPUT_DIR") {
        config.paths.output_dir = expand_path(&v);
        sources.env_overrides.push("SONGFORM_OUTPUT_DIR".to_string());
    }
    if let Some(v) = lookup("SONGFORM_DATABASE") {
        config.paths.database = expand_path(&v);
        sources.env_overrides.push("SONGFORM_DATABASE".to_string());
    }

    if let Some(v) = lookup("SONGFORM_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("SONGFORM_LOG_LEVEL".to_string());
    } else if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }

    let flags: [(&str, &mut bool); 3] = [
        ("SONGFORM_COMPREHENSIVE", &mut config.processing.comprehensive),
        ("SONGFORM_VALIDATE", &mut config.processing.validate),
        ("SONGFORM_STORE", &mut config.processing.store),
    ];
    for (key, slot) in flags {
        match lookup(key).as_deref().map(parse_flag) {
            Some(Some(v)) => {
                *slot = v;
                sources.env_overrides.push(key.to_string());
            }
            Some(None) => tracing::warn!(key, "ignoring unrecognised boolean in environment"),
            None => {}
        }
    }
}

/// Expand `~/` and a leading `$VAR` in a configured path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        let (var_name, rest) = match stripped.find('/') {
            Some(slash_pos) => (&stripped[..slash_pos], Some(&stripped[slash_pos + 1..])),
            None => (stripped, None),
        };
        if let Ok(var_value) = env::var(var_name) {
            let base = PathBuf::from(var_value);
            return match rest {
                Some(rest) => base.join(rest),
                None => base,
            };
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        assert_eq!(expand_path("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_path_unknown_var_is_left_alone() {
        assert_eq!(
            expand_path("$SONGFORM_SURELY_UNSET_VAR/db"),
            PathBuf::from("$SONGFORM_SURELY_UNSET_VAR/db")
        );
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[paths]
database = "/custom/songform.db"
"#;
        let layer = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert_eq!(
            layer,
            ConfigLayer {
                database: Some(PathBuf::from("/custom/songform.db")),
                ..ConfigLayer::default()
            }
        );
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[paths]
output_dir = "/data/tables"
database = "/data/songform.db"

[telemetry]
log_level = "debug"

[processing]
comprehensive = true
validate = false
store = true
"#;
        let layer = parse_toml(toml, Path::new("test.toml")).unwrap();
        let config = merge_configs(SongformConfig::default(), layer);
        assert_eq!(config.paths.output_dir, PathBuf::from("/data/tables"));
        assert_eq!(config.telemetry.log_level, "debug");
        assert!(config.processing.comprehensive);
        assert!(!config.processing.validate);
        assert!(config.processing.store);
    }

    #[test]
    fn test_wrong_value_type_is_a_parse_error() {
        let err = parse_toml("[processing]\nvalidate = \"nope\"\n", Path::new("bad.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("processing.validate"));
    }

    #[test]
    fn test_later_layer_can_restore_a_default() {
        let off = parse_toml("[processing]\nvalidate = false\n", Path::new("user.toml")).unwrap();
        let on = parse_toml("[processing]\nvalidate = true\n", Path::new("local.toml")).unwrap();
        let config = merge_configs(merge_configs(SongformConfig::default(), off), on);
        assert!(config.processing.validate);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SONGFORM_COMPREHENSIVE", "yes"),
            ("SONGFORM_VALIDATE", "0"),
            ("SONGFORM_STORE", "maybe"),
            ("RUST_LOG", "trace"),
        ]);
        let mut config = SongformConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |key| env.get(key).map(|v| v.to_string()));

        assert!(config.processing.comprehensive);
        assert!(!config.processing.validate);
        assert!(!config.processing.store);
        assert_eq!(config.telemetry.log_level, "trace");
        assert_eq!(
            sources.env_overrides,
            vec!["RUST_LOG", "SONGFORM_COMPREHENSIVE", "SONGFORM_VALIDATE"]
        );
    }

    #[test]
    fn test_songform_log_level_beats_rust_log() {
        let mut config = SongformConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |key| match key {
            "SONGFORM_LOG_LEVEL" => Some("warn".into()),
            "RUST_LOG" => Some("trace".into()),
            _ => None,
        });
        assert_eq!(config.telemetry.log_level, "warn");
        assert_eq!(sources.env_overrides, vec!["SONGFORM_LOG_LEVEL"]);
    }

    #[test]
    fn test_missing_cli_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let files = discover_config_files_with_override(Some(&missing));
        assert_eq!(files.last(), Some(&missing));
        assert!(matches!(load_from_file(&missing), Err(ConfigError::FileRead { .. })));
    }
}
