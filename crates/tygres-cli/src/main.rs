//! Tygres CLI - Typed queries for SQL tagged templates
//!
//! Applies the tygres code-generation pipeline to an analysis report: assigns
//! type names to query result shapes, renders TypeScript declarations, and
//! patches the original source files in place.
//!
//! # Usage
//!
//! ```bash
//! # Patch source files from an analysis report
//! tygres generate --report analysed.json
//!
//! # CI mode: fail when generated types are out of date
//! tygres generate --report analysed.json --check
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

/// Tygres - typed-query code generation for SQL tagged templates
#[derive(Parser, Debug)]
#[command(name = "tygres")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate and patch typed query declarations from an analysis report
    Generate(commands::generate::GenerateArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = if cli.global.quiet {
        Level::ERROR
    } else if cli.global.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args),
    }
}
