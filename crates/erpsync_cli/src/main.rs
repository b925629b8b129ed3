//! erpsync CLI
//!
//! Operator tools for inspecting the mapper journal of an erpsync engine.
//!
//! # Commands
//!
//! - `mappers` - List mappers, optionally filtered
//! - `tombstones` - List tombstones, optionally filtered
//! - `stats` - Count mappers and tombstones by state
//! - `check-config` - Parse and validate settings and mapping files

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// erpsync operator tools.
#[derive(Parser)]
#[command(name = "erpsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the mapper journal file
    #[arg(global = true, short, long)]
    journal: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format shared by the listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Aligned columns
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List mappers
    Mappers {
        /// Only mappers of this local kind
        #[arg(short, long)]
        kind: Option<String>,

        /// Only mappers of this remote model
        #[arg(short, long)]
        model: Option<String>,

        /// Only mappers awaiting sync
        #[arg(short, long)]
        dirty: bool,

        /// Free-text search over kind, model and ids
        #[arg(short, long)]
        search: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// List tombstones
    Tombstones {
        /// Only tombstones of this remote model
        #[arg(short, long)]
        model: Option<String>,

        /// Only deletions still pending
        #[arg(short, long)]
        dirty: bool,

        /// Free-text search over kind, model and ids
        #[arg(short, long)]
        search: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Count mappers and tombstones by state
    Stats {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Parse and validate configuration files
    CheckConfig {
        /// Settings file (JSON)
        #[arg(long)]
        settings: PathBuf,

        /// Mapping file (JSON)
        #[arg(long)]
        mapping: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Mappers {
            kind,
            model,
            dirty,
            search,
            format,
        } => {
            let path = cli.journal.ok_or("Journal path required for mappers")?;
            let filter = commands::mappers::filter(kind, model, dirty, search);
            commands::mappers::run(&path, &filter, format)?;
        }
        Commands::Tombstones {
            model,
            dirty,
            search,
            format,
        } => {
            let path = cli.journal.ok_or("Journal path required for tombstones")?;
            let filter = commands::tombstones::filter(model, dirty, search);
            commands::tombstones::run(&path, &filter, format)?;
        }
        Commands::Stats { format } => {
            let path = cli.journal.ok_or("Journal path required for stats")?;
            commands::stats::run(&path, format)?;
        }
        Commands::CheckConfig { settings, mapping } => {
            commands::check_config::run(&settings, mapping.as_deref())?;
        }
    }

    Ok(())
}
