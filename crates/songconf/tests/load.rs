use std::path::PathBuf;

use pretty_assertions::assert_eq;
use songconf::{ConfigError, SongformConfig};

#[test]
fn cli_file_overrides_defaults_and_expands_home() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("songform.toml");
    std::fs::write(
        &path,
        r#"
[paths]
output_dir = "~/tables"

[telemetry]
log_level = "songform=debug"

[processing]
comprehensive = true
"#,
    )
    .unwrap();

    let (config, sources) = SongformConfig::load_with_sources_from(Some(&path)).unwrap();
    assert_eq!(sources.files.last(), Some(&path));
    assert!(config.paths.output_dir.ends_with("tables"));
    assert!(!config.paths.output_dir.starts_with("~"));
    assert_eq!(config.telemetry.log_level, "songform=debug");
    assert!(config.processing.comprehensive);
    assert!(config.processing.validate);
}

#[test]
fn missing_cli_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("absent.toml");
    match SongformConfig::load_from(Some(&path)) {
        Err(ConfigError::FileRead { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected a read error, got {other:?}"),
    }
}

#[test]
fn rendered_config_loads_back_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = SongformConfig::default();
    config.paths.database = dir.path().join("db/songform.db");
    config.processing.store = true;

    let path = dir.path().join("rendered.toml");
    std::fs::write(&path, config.to_toml()).unwrap();

    let loaded = SongformConfig::load_from(Some(&path)).unwrap();
    assert_eq!(loaded.paths.database, config.paths.database);
    assert!(loaded.processing.store);
}
