//! CLI command implementations

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use songconf::{ConfigSources, SongformConfig};
use songform::{
    process_and_validate, validation_message, Mode, Outcome, Schema, TableSet, Timeline, SUCCESS,
};
use songstore::TableStore;
use tracing::{info, warn};

/// Flags of `songform process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub comprehensive: bool,
    pub no_validate: bool,
    pub store: bool,
    pub out: Option<PathBuf>,
}

/// What one run does once flags and config are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunSettings {
    mode: Mode,
    validate: bool,
    store: bool,
}

/// Flags can switch a behaviour on over the config; `--no-validate` can
/// only switch validation off.
fn run_settings(config: &SongformConfig, options: &ProcessOptions) -> RunSettings {
    RunSettings {
        mode: Mode::from_flag(options.comprehensive || config.processing.comprehensive),
        validate: config.processing.validate && !options.no_validate,
        store: options.store || config.processing.store,
    }
}

/// A bare file name lands in the configured output directory; anything
/// with a directory part is used as given.
fn output_path(config: &SongformConfig, out: &Path) -> PathBuf {
    let bare = out.is_relative()
        && out
            .parent()
            .map_or(true, |parent| parent.as_os_str().is_empty());
    if bare {
        config.paths.output_dir.join(out)
    } else {
        out.to_path_buf()
    }
}

fn run(timeline: &Timeline, settings: RunSettings) -> Outcome {
    if settings.validate {
        return process_and_validate(timeline, settings.mode);
    }
    match songform::process(timeline, settings.mode) {
        Ok(tables) => Outcome::Tables(tables),
        Err(err) => {
            warn!(error = %err, "processing failed");
            Outcome::Failed {
                message: err.to_string(),
            }
        }
    }
}

fn emit(config: &SongformConfig, out: Option<&Path>, json: &str) -> Result<()> {
    match out {
        Some(out) => {
            let path = output_path(config, out);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote tables");
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Build the tables for one timeline file.
pub fn process(config: &SongformConfig, timeline: &Path, options: ProcessOptions) -> Result<ExitCode> {
    let settings = run_settings(config, &options);
    let text = std::fs::read_to_string(timeline)
        .with_context(|| format!("Failed to read timeline {}", timeline.display()))?;

    let outcome = match Timeline::from_json(&text) {
        Ok(parsed) => run(&parsed, settings),
        Err(err) => Outcome::Failed {
            message: err.to_string(),
        },
    };

    if let Outcome::Tables(tables) = &outcome {
        if settings.store {
            let store = TableStore::open(&config.paths.database)?;
            store.put(tables, Schema::standard())?;
        }
    }

    let json = serde_json::to_string_pretty(&outcome)?;
    match outcome {
        Outcome::Tables(_) => {
            emit(config, options.out.as_deref(), &json)?;
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Failed { .. } => {
            println!("{json}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Where `validate` reads a table map from: the path as given when it
/// exists, else a bare name is looked up in the output directory that
/// `process --out` writes to.
fn tables_path(config: &SongformConfig, tables: &Path) -> PathBuf {
    if tables.exists() {
        tables.to_path_buf()
    } else {
        output_path(config, tables)
    }
}

/// Validate a table map and print the canonical message.
pub fn validate(config: &SongformConfig, tables: &Path) -> Result<ExitCode> {
    let tables = tables_path(config, tables);
    let text = std::fs::read_to_string(&tables)
        .with_context(|| format!("Failed to read tables {}", tables.display()))?;
    let tables = TableSet::from_json(&text).context("Failed to parse table map")?;

    let message = validation_message(&tables, Schema::standard());
    println!("{message}");
    Ok(if message == SUCCESS {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Print the declared schema as JSON.
pub fn schema(comprehensive: bool) -> Result<ExitCode> {
    let schema = Schema::standard().for_mode(comprehensive);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(ExitCode::SUCCESS)
}

/// Print the effective configuration followed by its sources.
pub fn show_config(config: &SongformConfig, sources: &ConfigSources) {
    print!("{}", config.to_toml());
    println!();
    if sources.files.is_empty() {
        println!("# No config files found; using defaults");
    } else {
        println!("# Loaded from:");
        for file in &sources.files {
            println!("#   {}", file.display());
        }
    }
    if !sources.env_overrides.is_empty() {
        println!("# Environment overrides: {}", sources.env_overrides.join(", "));
    }
}
