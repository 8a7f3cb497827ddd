//! Satchel CLI
//!
//! Command-line tools for local store maintenance.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics and metadata
//! - `outbox` - List pending outbox entries
//! - `watermarks` - Show per-collection pull watermarks
//! - `compact` - Rewrite the journal, discarding dead entries

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Satchel command-line store tools.
#[derive(Parser)]
#[command(name = "satchel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store journal file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics and metadata
    Inspect {
        /// Show per-collection record counts
        #[arg(short, long)]
        collections: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List pending outbox entries
    Outbox {
        /// Maximum number of entries to list
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show per-collection pull watermarks
    Watermarks {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Rewrite the journal, discarding dead entries
    Compact {
        /// Dry run - report what would be kept without rewriting
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
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
        Commands::Inspect {
            collections,
            format,
        } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, collections, &format)?;
        }
        Commands::Outbox { limit, format } => {
            let path = cli.path.ok_or("Store path required for outbox")?;
            commands::outbox::run(&path, limit, &format)?;
        }
        Commands::Watermarks { format } => {
            let path = cli.path.ok_or("Store path required for watermarks")?;
            commands::watermarks::run(&path, &format)?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Store path required for compact")?;
            commands::compact::run(&path, dry_run)?;
        }
        Commands::Version => {
            println!("satchel {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
