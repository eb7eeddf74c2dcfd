//! songform - song form, melody and harmony tables from a timeline
//!
//! Subcommands:
//! - `songform process <timeline.json>` - Build (and validate) the tables
//! - `songform validate <tables.json>` - Check a stored table map
//! - `songform schema` - Print the declared tables and columns
//! - `songform config` - Show the effective configuration

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use songconf::SongformConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "songform")]
#[command(about = "Relational song-form tables from symbolic music timelines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the tables for one timeline document
    Process {
        /// Timeline JSON file
        timeline: PathBuf,

        /// Also produce the nine summary tables
        #[arg(short, long)]
        comprehensive: bool,

        /// Skip the schema validator
        #[arg(long)]
        no_validate: bool,

        /// Write the tables into the configured database
        #[arg(long)]
        store: bool,

        /// Write the table map here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Config file (replaces ./songform.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate a previously produced table map
    Validate {
        /// Table map JSON file; a bare name not found here is read from
        /// `paths.output_dir`
        tables: PathBuf,

        /// Config file (replaces ./songform.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the declared schema
    Schema {
        /// Include the summary tables
        #[arg(short, long)]
        comprehensive: bool,
    },

    /// Print the effective configuration and where it came from
    Config {
        /// Config file (replaces ./songform.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Commands {
    fn config_path(&self) -> Option<&std::path::Path> {
        match self {
            Commands::Process { config, .. }
            | Commands::Validate { config, .. }
            | Commands::Config { config } => config.as_deref(),
            Commands::Schema { .. } => None,
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` wins
/// over the configured level.
fn init_tracing(config: &SongformConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let (config, sources) = SongformConfig::load_with_sources_from(cli.command.config_path())?;
    init_tracing(&config);
    tracing::debug!(files = ?sources.files, env = ?sources.env_overrides, "configuration loaded");

    match cli.command {
        Commands::Process {
            timeline,
            comprehensive,
            no_validate,
            store,
            out,
            config: _,
        } => commands::process(
            &config,
            &timeline,
            commands::ProcessOptions {
                comprehensive,
                no_validate,
                store,
                out,
            },
        ),
        Commands::Validate { tables, config: _ } => commands::validate(&config, &tables),
        Commands::Schema { comprehensive } => commands::schema(comprehensive),
        Commands::Config { config: _ } => {
            commands::show_config(&config, &sources);
            Ok(ExitCode::SUCCESS)
        }
    }
}
